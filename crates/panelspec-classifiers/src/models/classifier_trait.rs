use ndarray::Array2;

use crate::error::Result;

/// Contract every registered classifier family implements.
///
/// Labels follow the crate convention: 0 for the reference class, 1 for
/// the case class. Instances are prototypes as much as predictors: the
/// cross-validator never refits an instance, it asks for an `unfitted`
/// copy per fold so trained state cannot leak between folds.
pub trait ClassifierModel: Send + Sync {
    /// Fit on `x` (samples x features) and 0/1 labels `y`.
    fn fit(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()>;

    /// Probability of the case class for every row of `x`.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>>;

    /// Hard 0/1 predictions. Defaults to thresholding `predict_proba` at 0.5.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<i32>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| i32::from(p >= 0.5))
            .collect())
    }

    /// A fresh instance with the same configuration and no trained state.
    fn unfitted(&self) -> Box<dyn ClassifierModel>;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}
