//! Feature standardization for the linear models (logistic regression, SVC).
//!
//! KNN and the tree families work on the raw feature scale.
//!
//! The scaler is fitted on a training fold only and then applied to the
//! matching test fold, so no test-set statistics reach the model.

use ndarray::{Array1, Array2, Axis};

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug)]
pub struct Scaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl Scaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f64 = 1e-12;

    /// Fit a `Scaler` where rows are samples and columns are features.
    ///
    /// Constant columns keep a unit scale so they transform to zero.
    pub fn fit(x: &Array2<f64>) -> Self {
        let ncols = x.ncols();
        if x.nrows() == 0 {
            return Scaler {
                mean: Array1::zeros(ncols),
                std: Array1::ones(ncols),
            };
        }
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(ncols));
        let std = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s < Self::MIN_STD { 1.0 } else { s });
        Scaler { mean, std }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean) / &self.std
    }
}

/// Fit a scaler and return the transformed matrix in one call.
pub fn fit_transform(x: &Array2<f64>) -> (Scaler, Array2<f64>) {
    let scaler = Scaler::fit(x);
    let transformed = scaler.transform(x);
    (scaler, transformed)
}
