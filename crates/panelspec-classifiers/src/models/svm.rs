use linfa::dataset::Pr;
use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_svm::{Svm, SvmParams};
use ndarray::{Array1, Array2};

use crate::config::{ModelConfig, ModelType, SvmKernel};
use crate::error::{EvalError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::preprocessing::{fit_transform, Scaler};
use crate::stats::count_classes;

/// Support vector classifier with Platt-scaled probabilities.
///
/// The penalty `C` is split per class as `C * n / (2 * n_class)`, the
/// linfa equivalent of balanced class weights.
pub struct SVMClassifier {
    model: Option<(Scaler, Svm<f64, Pr>)>,
    params: ModelConfig,
}

impl SVMClassifier {
    pub fn new(params: ModelConfig) -> Self {
        SVMClassifier {
            model: None,
            params,
        }
    }
}

impl ClassifierModel for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(EvalError::LengthMismatch {
                what: "training rows and labels",
                left: x.nrows(),
                right: y.len(),
            });
        }
        let (negatives, positives) = count_classes(y)?;
        if negatives == 0 || positives == 0 {
            return Err(EvalError::DegenerateLabels {
                positives,
                negatives,
            });
        }

        let ModelType::SVM {
            c,
            eps,
            kernel,
            gaussian_kernel_eps,
            polynomial_kernel_constant,
            polynomial_kernel_degree,
        } = self.params.model_type.clone()
        else {
            return Err(EvalError::model(format!(
                "expected ModelType::SVM but got {:?}",
                self.params.model_type
            )));
        };

        let n = y.len() as f64;
        let c_pos = c * n / (2.0 * positives as f64);
        let c_neg = c * n / (2.0 * negatives as f64);

        let (scaler, z) = fit_transform(x);
        let targets = Array1::from_iter(y.iter().map(|&l| l == 1));
        let dataset = Dataset::new(z, targets);

        let mut params: SvmParams<f64, Pr> =
            Svm::<f64, Pr>::params().eps(eps).pos_neg_weights(c_pos, c_neg);

        params = match kernel {
            SvmKernel::Linear => params.linear_kernel(),
            SvmKernel::Gauss => params.gaussian_kernel(gaussian_kernel_eps),
            SvmKernel::Poly => {
                params.polynomial_kernel(polynomial_kernel_constant, polynomial_kernel_degree)
            }
        };

        let model = params
            .fit(&dataset)
            .map_err(|e| EvalError::model(format!("SVM fit failed: {}", e)))?;
        self.model = Some((scaler, model));
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let (scaler, model) = self
            .model
            .as_ref()
            .ok_or_else(|| EvalError::model("SVM used before fit"))?;
        let predictions: Array1<Pr> = model.predict(&scaler.transform(x));
        Ok(predictions.iter().map(|p| f64::from(**p)).collect())
    }

    fn unfitted(&self) -> Box<dyn ClassifierModel> {
        Box::new(SVMClassifier::new(self.params.clone()))
    }

    fn name(&self) -> &str {
        self.params.model_type.name()
    }
}
