use ndarray::Array2;

use crate::config::{ModelConfig, ModelType};
use crate::error::{EvalError, Result};
use crate::models::classifier_trait::ClassifierModel;

/// k-nearest-neighbour classifier with uniform weights and Euclidean distance.
///
/// The case probability is the fraction of case labels among the `k`
/// nearest training rows. Distance ties are broken by training row order.
pub struct KNNClassifier {
    params: ModelConfig,
    train: Option<(Array2<f64>, Vec<i32>)>,
}

impl KNNClassifier {
    pub fn new(params: ModelConfig) -> Self {
        KNNClassifier {
            params,
            train: None,
        }
    }

    fn n_neighbors(&self) -> Result<usize> {
        match &self.params.model_type {
            ModelType::KNN { n_neighbors } => Ok(*n_neighbors as usize),
            other => Err(EvalError::model(format!(
                "expected KNN params, got {:?}",
                other
            ))),
        }
    }
}

impl ClassifierModel for KNNClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()> {
        let k = self.n_neighbors()?;
        if x.nrows() != y.len() {
            return Err(EvalError::LengthMismatch {
                what: "training rows and labels",
                left: x.nrows(),
                right: y.len(),
            });
        }
        if x.nrows() < k {
            return Err(EvalError::model(format!(
                "n_neighbors = {} exceeds the {} training samples",
                k,
                x.nrows()
            )));
        }
        self.train = Some((x.to_owned(), y.to_vec()));
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let k = self.n_neighbors()?;
        let (train_x, train_y) = self
            .train
            .as_ref()
            .ok_or_else(|| EvalError::model("KNN used before fit"))?;
        if x.ncols() != train_x.ncols() {
            return Err(EvalError::LengthMismatch {
                what: "feature columns at fit and predict",
                left: train_x.ncols(),
                right: x.ncols(),
            });
        }

        let probabilities = x
            .rows()
            .into_iter()
            .map(|query| {
                let mut distances: Vec<(f64, usize)> = train_x
                    .rows()
                    .into_iter()
                    .enumerate()
                    .map(|(i, row)| {
                        let d: f64 = row
                            .iter()
                            .zip(query.iter())
                            .map(|(a, b)| (a - b) * (a - b))
                            .sum();
                        (d, i)
                    })
                    .collect();
                distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                let cases = distances[..k]
                    .iter()
                    .filter(|(_, i)| train_y[*i] == 1)
                    .count();
                cases as f64 / k as f64
            })
            .collect();
        Ok(probabilities)
    }

    fn unfitted(&self) -> Box<dyn ClassifierModel> {
        Box::new(KNNClassifier::new(self.params.clone()))
    }

    fn name(&self) -> &str {
        self.params.model_type.name()
    }
}
