use ndarray::{Array1, Array2};

use crate::config::{ModelConfig, ModelType, Penalty};
use crate::error::{EvalError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::preprocessing::{fit_transform, Scaler};
use crate::stats::count_classes;

struct FittedLogistic {
    scaler: Scaler,
    coef: Array1<f64>,
    intercept: f64,
}

/// Class-balanced logistic regression with an L1 or L2 penalty.
///
/// Minimizes `C * sum_i w_i * logloss_i + R(coef)` on standardized features,
/// where `w_i = n / (2 * n_class(y_i))` and `R` is `|coef|_1` or
/// `|coef|^2 / 2`. The intercept is not penalized. Solved by (proximal)
/// gradient descent with a fixed `1 / L` step, so fitting is deterministic.
pub struct LogisticRegressionClassifier {
    params: ModelConfig,
    fitted: Option<FittedLogistic>,
}

impl LogisticRegressionClassifier {
    pub fn new(params: ModelConfig) -> Self {
        LogisticRegressionClassifier {
            params,
            fitted: None,
        }
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.coef)
    }
}

fn sigmoid(t: f64) -> f64 {
    1.0 / (1.0 + (-t).exp())
}

fn soft_threshold(v: f64, lambda: f64) -> f64 {
    v.signum() * (v.abs() - lambda).max(0.0)
}

impl ClassifierModel for LogisticRegressionClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()> {
        let ModelType::LogisticRegression {
            penalty,
            c,
            max_iter,
            tol,
        } = self.params.model_type.clone()
        else {
            return Err(EvalError::model(format!(
                "expected LogisticRegression params, got {:?}",
                self.params.model_type
            )));
        };
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

        let (scaler, z) = fit_transform(x);
        let n = z.nrows() as f64;

        let targets = Array1::from_iter(y.iter().map(|&l| l as f64));
        let weights = Array1::from_iter(y.iter().map(|&l| {
            let class_count = if l == 1 { positives } else { negatives };
            n / (2.0 * class_count as f64)
        }));

        let scale = c / n;
        let row_norms: f64 = z
            .rows()
            .into_iter()
            .zip(weights.iter())
            .map(|(row, w)| w * (row.dot(&row) + 1.0))
            .sum();
        let ridge = if penalty == Penalty::L2 { 1.0 / n } else { 0.0 };
        let lipschitz = 0.25 * scale * row_norms + ridge;
        let step = 1.0 / lipschitz.max(f64::EPSILON);

        let mut coef = Array1::<f64>::zeros(z.ncols());
        let mut intercept = 0.0;

        for iteration in 0..max_iter {
            let margins = z.dot(&coef) + intercept;
            let residual = (margins.mapv(sigmoid) - &targets) * &weights;

            let mut grad = z.t().dot(&residual) * scale;
            if penalty == Penalty::L2 {
                grad = grad + &coef * ridge;
            }
            let grad_intercept = residual.sum() * scale;

            let mut next = &coef - &(grad * step);
            if penalty == Penalty::L1 {
                let lambda = step / n;
                next.mapv_inplace(|v| soft_threshold(v, lambda));
            }
            let next_intercept = intercept - step * grad_intercept;

            let delta = next
                .iter()
                .zip(coef.iter())
                .map(|(a, b)| (a - b).abs())
                .fold((next_intercept - intercept).abs(), f64::max);
            coef = next;
            intercept = next_intercept;
            if delta < tol {
                log::trace!("Logistic regression converged after {} iterations", iteration + 1);
                break;
            }
        }

        self.fitted = Some(FittedLogistic {
            scaler,
            coef,
            intercept,
        });
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| EvalError::model("logistic regression used before fit"))?;
        let z = fitted.scaler.transform(x);
        Ok((z.dot(&fitted.coef) + fitted.intercept)
            .mapv(sigmoid)
            .to_vec())
    }

    fn unfitted(&self) -> Box<dyn ClassifierModel> {
        Box::new(LogisticRegressionClassifier::new(self.params.clone()))
    }

    fn name(&self) -> &str {
        self.params.model_type.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Vec<i32>) {
        let x = array![
            [0.1, 1.0],
            [0.3, -1.0],
            [0.2, 0.5],
            [0.4, 0.0],
            [2.1, 0.2],
            [2.4, -0.5],
            [1.9, 1.0],
            [2.2, 0.1]
        ];
        (x, vec![0, 0, 0, 0, 1, 1, 1, 1])
    }

    #[test]
    fn l2_separates_classes() {
        let (x, y) = separable();
        let mut clf = LogisticRegressionClassifier::new(ModelConfig::new("lrl2".parse().unwrap(), 0));
        clf.fit(&x, &y).unwrap();
        let p = clf.predict_proba(&x).unwrap();
        assert!(p.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(p[..4].iter().all(|v| *v < 0.5));
        assert!(p[4..].iter().all(|v| *v > 0.5));
        assert_eq!(clf.predict(&x).unwrap(), y);
    }

    #[test]
    fn probabilities_ignore_feature_units() {
        let (x, y) = separable();
        let mut rescaled = x.clone();
        rescaled.column_mut(0).mapv_inplace(|v| v * 1000.0 + 5.0);

        let params = ModelConfig::new("lrl2".parse().unwrap(), 0);
        let mut a = LogisticRegressionClassifier::new(params.clone());
        let mut b = LogisticRegressionClassifier::new(params);
        a.fit(&x, &y).unwrap();
        b.fit(&rescaled, &y).unwrap();
        let pa = a.predict_proba(&x).unwrap();
        let pb = b.predict_proba(&rescaled).unwrap();
        for (u, v) in pa.iter().zip(&pb) {
            assert!((u - v).abs() < 1e-9, "{} vs {}", u, v);
        }
    }

    #[test]
    fn l1_shrinks_uninformative_feature_more() {
        let (x, y) = separable();
        let mut clf = LogisticRegressionClassifier::new(ModelConfig::new("lrl1".parse().unwrap(), 0));
        clf.fit(&x, &y).unwrap();
        let coef = clf.coefficients().unwrap();
        assert!(coef[0] > 0.0);
        assert!(coef[1].abs() < coef[0].abs());
    }

    #[test]
    fn single_class_fit_fails() {
        let (x, _) = separable();
        let mut clf = LogisticRegressionClassifier::new(ModelConfig::new("lrl2".parse().unwrap(), 0));
        assert!(matches!(
            clf.fit(&x, &[1; 8]),
            Err(EvalError::DegenerateLabels { .. })
        ));
    }

    #[test]
    fn predict_before_fit_errors() {
        let clf = LogisticRegressionClassifier::new(ModelConfig::new("lrl2".parse().unwrap(), 0));
        assert!(clf.predict_proba(&array![[0.0, 0.0]]).is_err());
    }
}
