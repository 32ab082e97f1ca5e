use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::Array2;

use crate::config::{ModelConfig, ModelType};
use crate::error::{EvalError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::stats::count_classes;

/// Convert rows and per-row targets/weights into gbdt training data.
pub(crate) fn to_data_vec(x: &Array2<f64>, targets: &[f32], weights: &[f32]) -> DataVec {
    let mut data = DataVec::with_capacity(x.nrows());
    for (i, row) in x.rows().into_iter().enumerate() {
        let features: Vec<f32> = row.iter().map(|&v| v as f32).collect();
        data.push(Data::new_training_data(features, weights[i], targets[i], None));
    }
    data
}

/// Rows of `x` wrapped as unlabeled gbdt data for prediction.
pub(crate) fn to_test_vec(x: &Array2<f64>) -> DataVec {
    let mut data = DataVec::with_capacity(x.nrows());
    for row in x.rows() {
        let features: Vec<f32> = row.iter().map(|&v| v as f32).collect();
        data.push(Data::new_training_data(features, 1.0, 0.0, None));
    }
    data
}

/// Per-row weights `n / (2 * n_class)` so both classes carry equal mass.
pub(crate) fn balanced_weights(y: &[i32]) -> Result<Vec<f32>> {
    let (negatives, positives) = count_classes(y)?;
    if negatives == 0 || positives == 0 {
        return Err(EvalError::DegenerateLabels {
            positives,
            negatives,
        });
    }
    let n = y.len() as f32;
    Ok(y.iter()
        .map(|&l| {
            let count = if l == 1 { positives } else { negatives };
            n / (2.0 * count as f32)
        })
        .collect())
}

/// Clamp raw tree outputs into probabilities, rejecting NaN.
pub(crate) fn to_probabilities(raw: &[f32]) -> Result<Vec<f64>> {
    raw.iter()
        .map(|&v| {
            if v.is_nan() {
                Err(EvalError::model("tree ensemble produced a NaN score"))
            } else {
                Ok(f64::from(v).clamp(0.0, 1.0))
            }
        })
        .collect()
}

pub(crate) fn check_shapes(x: &Array2<f64>, y: &[i32]) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(EvalError::LengthMismatch {
            what: "training rows and labels",
            left: x.nrows(),
            right: y.len(),
        });
    }
    Ok(())
}

/// Gradient Boosting Decision Tree (GBDT) classifier
pub struct GBDTClassifier {
    model: Option<GBDT>,
    params: ModelConfig,
}

impl GBDTClassifier {
    pub fn new(params: ModelConfig) -> Self {
        GBDTClassifier {
            model: None,
            params,
        }
    }
}

impl ClassifierModel for GBDTClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()> {
        check_shapes(x, y)?;
        let (negatives, positives) = count_classes(y)?;
        if negatives == 0 || positives == 0 {
            return Err(EvalError::DegenerateLabels {
                positives,
                negatives,
            });
        }

        match &self.params.model_type {
            ModelType::GBDT {
                max_depth,
                num_boost_round,
                learning_rate,
                training_optimization_level,
                loss_type,
            } => {
                let mut config = Config::new();

                config.set_feature_size(x.ncols());
                config.set_shrinkage(*learning_rate as f32);
                config.set_max_depth(*max_depth);
                config.set_iterations(*num_boost_round as usize);
                config.set_debug(false);
                config.set_training_optimization_level(*training_optimization_level);
                config.set_loss(loss_type);

                let mut gbdt = GBDT::new(&config);

                // LogLikelyhood expects labels in {-1, 1}
                let targets: Vec<f32> = y.iter().map(|&l| if l == 1 { 1.0 } else { -1.0 }).collect();
                let mut train_x = to_data_vec(x, &targets, &vec![1.0; y.len()]);

                gbdt.fit(&mut train_x);
                log::trace!(
                    "Fitted GBDT with {} rounds on {} samples",
                    num_boost_round,
                    x.nrows()
                );

                self.model = Some(gbdt);
                Ok(())
            }
            other => Err(EvalError::model(format!(
                "expected ModelType::GBDT params, got {:?}",
                other
            ))),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| EvalError::model("GBDT used before fit"))?;
        let predictions = model.predict(&to_test_vec(x));
        to_probabilities(&predictions)
    }

    fn unfitted(&self) -> Box<dyn ClassifierModel> {
        Box::new(GBDTClassifier::new(self.params.clone()))
    }

    fn name(&self) -> &str {
        self.params.model_type.name()
    }
}
