//! Tree families built from single gbdt regression trees on 0/1 targets.
//!
//! A squared-error tree fitted to 0/1 labels with class-balanced weights
//! stores a weighted case fraction in every leaf, which is used directly
//! as the case probability. The forest averages such trees over
//! bootstrap resamples drawn from the configured `random_state`; each
//! tree also sees a random subset of `floor(sqrt(n_features))` columns
//! (at least one) drawn from the same generator. The subset is fixed per
//! tree rather than per split, since gbdt trees split on every column
//! they are given.
use gbdt::config::Config;
use gbdt::gradient_boost::GBDT;
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

use crate::config::{ModelConfig, ModelType};
use crate::error::{EvalError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::gbdt::{balanced_weights, check_shapes, to_data_vec, to_probabilities, to_test_vec};

fn tree_config(n_features: usize, max_depth: u32, min_samples_leaf: u32) -> Config {
    let mut config = Config::new();
    config.set_feature_size(n_features);
    config.set_max_depth(max_depth);
    config.set_min_leaf_size(min_samples_leaf as usize);
    config.set_iterations(1);
    config.set_shrinkage(1.0);
    config.set_loss("SquaredError");
    config.set_debug(false);
    config
}

fn fit_tree(config: &Config, x: &Array2<f64>, y: &[i32], weights: &[f32]) -> GBDT {
    let targets: Vec<f32> = y.iter().map(|&l| l as f32).collect();
    let mut data = to_data_vec(x, &targets, weights);
    let mut tree = GBDT::new(config);
    tree.fit(&mut data);
    tree
}

/// Single class-balanced regression tree.
pub struct DecisionTreeClassifier {
    params: ModelConfig,
    tree: Option<GBDT>,
}

impl DecisionTreeClassifier {
    pub fn new(params: ModelConfig) -> Self {
        DecisionTreeClassifier { params, tree: None }
    }
}

impl ClassifierModel for DecisionTreeClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()> {
        check_shapes(x, y)?;
        let ModelType::DecisionTree {
            max_depth,
            min_samples_leaf,
        } = self.params.model_type
        else {
            return Err(EvalError::model(format!(
                "expected DecisionTree params, got {:?}",
                self.params.model_type
            )));
        };
        let weights = balanced_weights(y)?;
        let config = tree_config(x.ncols(), max_depth, min_samples_leaf);
        self.tree = Some(fit_tree(&config, x, y, &weights));
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| EvalError::model("decision tree used before fit"))?;
        to_probabilities(&tree.predict(&to_test_vec(x)))
    }

    fn unfitted(&self) -> Box<dyn ClassifierModel> {
        Box::new(DecisionTreeClassifier::new(self.params.clone()))
    }

    fn name(&self) -> &str {
        self.params.model_type.name()
    }
}

/// Features drawn for each forest tree.
pub(crate) fn max_features(n_features: usize) -> usize {
    ((n_features as f64).sqrt().floor() as usize).clamp(1, n_features.max(1))
}

/// One forest member and the feature columns it was trained on.
struct ForestTree {
    columns: Vec<usize>,
    tree: GBDT,
}

/// Class-balanced regression trees on bootstrap rows and random feature subsets.
pub struct RandomForestClassifier {
    params: ModelConfig,
    trees: Vec<ForestTree>,
}

impl RandomForestClassifier {
    pub fn new(params: ModelConfig) -> Self {
        RandomForestClassifier {
            params,
            trees: Vec::new(),
        }
    }
}

impl ClassifierModel for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()> {
        check_shapes(x, y)?;
        let ModelType::RandomForest {
            n_estimators,
            max_depth,
            min_samples_leaf,
        } = self.params.model_type
        else {
            return Err(EvalError::model(format!(
                "expected RandomForest params, got {:?}",
                self.params.model_type
            )));
        };
        if x.ncols() == 0 {
            return Err(EvalError::model("random forest needs at least one feature"));
        }
        let weights = balanced_weights(y)?;
        let n_columns = max_features(x.ncols());
        let config = tree_config(n_columns, max_depth, min_samples_leaf);
        let mut rng = StdRng::seed_from_u64(self.params.random_state);
        let n = x.nrows();

        self.trees = (0..n_estimators)
            .map(|_| {
                let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut columns = sample(&mut rng, x.ncols(), n_columns).into_vec();
                columns.sort_unstable();
                let boot_x = x.select(Axis(0), &rows).select(Axis(1), &columns);
                let boot_y: Vec<i32> = rows.iter().map(|&i| y[i]).collect();
                let boot_w: Vec<f32> = rows.iter().map(|&i| weights[i]).collect();
                let tree = fit_tree(&config, &boot_x, &boot_y, &boot_w);
                ForestTree { columns, tree }
            })
            .collect();
        log::trace!(
            "Fitted {} bootstrap trees on {} samples, {} of {} features each",
            self.trees.len(),
            n,
            n_columns,
            x.ncols()
        );
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(EvalError::model("random forest used before fit"));
        }
        let mut sums = vec![0.0f64; x.nrows()];
        for member in &self.trees {
            if let Some(&last) = member.columns.last() {
                if last >= x.ncols() {
                    return Err(EvalError::LengthMismatch {
                        what: "feature columns at fit and predict",
                        left: last + 1,
                        right: x.ncols(),
                    });
                }
            }
            let test = to_test_vec(&x.select(Axis(1), &member.columns));
            for (sum, p) in sums.iter_mut().zip(to_probabilities(&member.tree.predict(&test))?) {
                *sum += p;
            }
        }
        let n_trees = self.trees.len() as f64;
        Ok(sums.into_iter().map(|s| s / n_trees).collect())
    }

    fn unfitted(&self) -> Box<dyn ClassifierModel> {
        Box::new(RandomForestClassifier::new(self.params.clone()))
    }

    fn name(&self) -> &str {
        self.params.model_type.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn data() -> (Array2<f64>, Vec<i32>) {
        let x = array![
            [0.1, 3.0],
            [0.2, 1.0],
            [0.3, 2.0],
            [0.4, 1.5],
            [0.5, 2.5],
            [1.1, 2.0],
            [1.2, 1.0],
            [1.3, 3.0],
            [1.4, 2.2],
            [1.5, 1.7]
        ];
        (x, vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1])
    }

    #[test]
    fn tree_learns_threshold() {
        let (x, y) = data();
        let mut clf = DecisionTreeClassifier::new(ModelConfig::new("dt".parse().unwrap(), 0));
        clf.fit(&x, &y).unwrap();
        let p = clf.predict_proba(&x).unwrap();
        assert!(p.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(p[..5].iter().all(|v| *v < 0.5));
        assert!(p[5..].iter().all(|v| *v > 0.5));
    }

    #[test]
    fn forest_is_reproducible_for_a_seed() {
        let (x, y) = data();
        let params = ModelConfig::new(
            ModelType::RandomForest {
                n_estimators: 15,
                max_depth: 3,
                min_samples_leaf: 1,
            },
            7,
        );
        let mut a = RandomForestClassifier::new(params.clone());
        let mut b = RandomForestClassifier::new(params);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        let pa = a.predict_proba(&x).unwrap();
        assert_eq!(pa, b.predict_proba(&x).unwrap());
        assert!(pa[5..].iter().sum::<f64>() > pa[..5].iter().sum::<f64>());
    }

    #[test]
    fn forest_trees_use_sqrt_feature_subsets() {
        assert_eq!(max_features(1), 1);
        assert_eq!(max_features(2), 1);
        assert_eq!(max_features(9), 3);
        assert_eq!(max_features(10), 3);

        let (x, y) = data();
        let noise = Array2::from_shape_fn((10, 7), |(i, j)| ((i * 7 + j * 3) % 5) as f64);
        let x = ndarray::concatenate(Axis(1), &[x.view(), noise.view()]).unwrap();
        let params = ModelConfig::new(
            ModelType::RandomForest {
                n_estimators: 20,
                max_depth: 3,
                min_samples_leaf: 1,
            },
            11,
        );
        let mut clf = RandomForestClassifier::new(params);
        clf.fit(&x, &y).unwrap();

        let mut seen = std::collections::BTreeSet::new();
        for member in &clf.trees {
            assert_eq!(member.columns.len(), 3);
            assert!(member.columns.windows(2).all(|w| w[0] < w[1]));
            assert!(member.columns.iter().all(|&c| c < 9));
            seen.insert(member.columns.clone());
        }
        assert!(seen.len() > 1, "every tree drew the same features");

        let p = clf.predict_proba(&x).unwrap();
        assert_eq!(p.len(), 10);
        assert!(p.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(clf.predict_proba(&x.slice(ndarray::s![.., ..2]).to_owned()).is_err());
    }

    #[test]
    fn forest_rejects_single_class() {
        let (x, _) = data();
        let mut clf = RandomForestClassifier::new(ModelConfig::new("rf".parse().unwrap(), 0));
        assert!(matches!(
            clf.fit(&x, &[0; 10]),
            Err(EvalError::DegenerateLabels { .. })
        ));
    }
}
