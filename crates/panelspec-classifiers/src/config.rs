use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::stats::DEFAULT_GRID_POINTS;

/// Central configuration for a classifier instance.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Seed for families with a stochastic constructor (bootstrap draws).
    pub random_state: u64,

    #[serde(flatten)]
    pub model_type: ModelType,
}

impl ModelConfig {
    pub fn new(model_type: ModelType, random_state: u64) -> Self {
        Self {
            random_state,
            model_type,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            random_state: 0,
            model_type: ModelType::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    L1,
    L2,
}

#[cfg(feature = "linfa")]
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SvmKernel {
    Linear,
    Gauss,
    Poly,
}

/// Supported classifier families and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    /// Class-balanced logistic regression on standardized features.
    LogisticRegression {
        penalty: Penalty,
        c: f64,
        max_iter: u32,
        tol: f64,
    },
    /// Single class-balanced regression tree on 0/1 targets.
    DecisionTree {
        max_depth: u32,
        min_samples_leaf: u32,
    },
    /// Bagged regression trees, bootstrap drawn from `random_state`.
    RandomForest {
        n_estimators: u32,
        max_depth: u32,
        min_samples_leaf: u32,
    },
    GBDT {
        max_depth: u32,
        num_boost_round: u32,
        learning_rate: f64,
        training_optimization_level: u8,
        loss_type: String,
    },
    KNN {
        n_neighbors: u32,
    },
    #[cfg(feature = "linfa")]
    SVM {
        c: f64,
        eps: f64,
        kernel: SvmKernel,
        gaussian_kernel_eps: f64,
        polynomial_kernel_constant: f64,
        polynomial_kernel_degree: f64,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::GBDT {
            max_depth: 3,
            num_boost_round: 100,
            learning_rate: 0.1,
            training_optimization_level: 2,
            loss_type: "LogLikelyhood".to_string(),
        }
    }
}

/// Expected type of a hyperparameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Positive integer count.
    Int,
    /// Strictly positive real.
    Float,
}

/// A hyperparameter value as supplied by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HyperValue {
    Int(i64),
    Float(f64),
    /// Restores the family default.
    Null,
}

impl fmt::Display for HyperValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HyperValue::Int(v) => write!(f, "{}", v),
            HyperValue::Float(v) => write!(f, "{}", v),
            HyperValue::Null => write!(f, "None"),
        }
    }
}

impl FromStr for HyperValue {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("null") {
            return Ok(HyperValue::Null);
        }
        if let Ok(v) = s.parse::<i64>() {
            return Ok(HyperValue::Int(v));
        }
        s.parse::<f64>()
            .map(HyperValue::Float)
            .map_err(|_| format!("'{}' is not a number", s))
    }
}

/// Hyperparameter overrides keyed by parameter name.
pub type Hyperparameters = BTreeMap<String, HyperValue>;

const LOGISTIC_SCHEMA: &[(&str, ParamKind)] = &[
    ("C", ParamKind::Float),
    ("max_iter", ParamKind::Int),
    ("tol", ParamKind::Float),
];
const TREE_SCHEMA: &[(&str, ParamKind)] = &[
    ("max_depth", ParamKind::Int),
    ("min_samples_leaf", ParamKind::Int),
];
const FOREST_SCHEMA: &[(&str, ParamKind)] = &[
    ("n_estimators", ParamKind::Int),
    ("max_depth", ParamKind::Int),
    ("min_samples_leaf", ParamKind::Int),
];
const GBDT_SCHEMA: &[(&str, ParamKind)] = &[
    ("n_estimators", ParamKind::Int),
    ("learning_rate", ParamKind::Float),
    ("max_depth", ParamKind::Int),
];
const KNN_SCHEMA: &[(&str, ParamKind)] = &[("n_neighbors", ParamKind::Int)];
#[cfg(feature = "linfa")]
const SVM_SCHEMA: &[(&str, ParamKind)] = &[
    ("C", ParamKind::Float),
    ("tol", ParamKind::Float),
    ("gaussian_kernel_eps", ParamKind::Float),
    // scikit-learn's RBF `gamma`; stored as `gaussian_kernel_eps = 1 / gamma`.
    ("gamma", ParamKind::Float),
];

impl ModelType {
    /// Registry name of the family.
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::LogisticRegression {
                penalty: Penalty::L1,
                ..
            } => "LRl1",
            ModelType::LogisticRegression {
                penalty: Penalty::L2,
                ..
            } => "LRl2",
            ModelType::DecisionTree { .. } => "DT",
            ModelType::RandomForest { .. } => "RF",
            ModelType::GBDT { .. } => "GB",
            ModelType::KNN { .. } => "KNN",
            #[cfg(feature = "linfa")]
            ModelType::SVM { .. } => "SVC",
        }
    }

    /// Hyperparameters this family accepts, with their expected types.
    pub fn schema(&self) -> &'static [(&'static str, ParamKind)] {
        match self {
            ModelType::LogisticRegression { .. } => LOGISTIC_SCHEMA,
            ModelType::DecisionTree { .. } => TREE_SCHEMA,
            ModelType::RandomForest { .. } => FOREST_SCHEMA,
            ModelType::GBDT { .. } => GBDT_SCHEMA,
            ModelType::KNN { .. } => KNN_SCHEMA,
            #[cfg(feature = "linfa")]
            ModelType::SVM { .. } => SVM_SCHEMA,
        }
    }

    /// Current value of a schema parameter.
    pub fn param(&self, name: &str) -> Option<HyperValue> {
        let int = |v: u32| Some(HyperValue::Int(i64::from(v)));
        let float = |v: f64| Some(HyperValue::Float(v));
        match (self, name) {
            (ModelType::LogisticRegression { c, .. }, "C") => float(*c),
            (ModelType::LogisticRegression { max_iter, .. }, "max_iter") => int(*max_iter),
            (ModelType::LogisticRegression { tol, .. }, "tol") => float(*tol),
            (ModelType::DecisionTree { max_depth, .. }, "max_depth")
            | (ModelType::RandomForest { max_depth, .. }, "max_depth")
            | (ModelType::GBDT { max_depth, .. }, "max_depth") => int(*max_depth),
            (ModelType::DecisionTree { min_samples_leaf, .. }, "min_samples_leaf")
            | (ModelType::RandomForest { min_samples_leaf, .. }, "min_samples_leaf") => {
                int(*min_samples_leaf)
            }
            (ModelType::RandomForest { n_estimators, .. }, "n_estimators") => int(*n_estimators),
            (ModelType::GBDT { num_boost_round, .. }, "n_estimators") => int(*num_boost_round),
            (ModelType::GBDT { learning_rate, .. }, "learning_rate") => float(*learning_rate),
            (ModelType::KNN { n_neighbors }, "n_neighbors") => int(*n_neighbors),
            #[cfg(feature = "linfa")]
            (ModelType::SVM { c, .. }, "C") => float(*c),
            #[cfg(feature = "linfa")]
            (ModelType::SVM { eps, .. }, "tol") => float(*eps),
            #[cfg(feature = "linfa")]
            (ModelType::SVM { gaussian_kernel_eps, .. }, "gaussian_kernel_eps") => {
                float(*gaussian_kernel_eps)
            }
            #[cfg(feature = "linfa")]
            (ModelType::SVM { gaussian_kernel_eps, .. }, "gamma") => float(1.0 / *gaussian_kernel_eps),
            _ => None,
        }
    }

    /// Override parameters from `hyperparameters`, validated against
    /// [`ModelType::schema`]. `Null` values restore the value in `defaults`.
    pub fn apply_hyperparameters(
        &mut self,
        hyperparameters: &Hyperparameters,
        defaults: &ModelType,
    ) -> Result<()> {
        for (name, value) in hyperparameters {
            let value = match value {
                HyperValue::Null => defaults.param(name).ok_or_else(|| self.unknown(name))?,
                other => other.clone(),
            };
            self.set_param(name, &value)?;
        }
        Ok(())
    }

    fn unknown(&self, name: &str) -> EvalError {
        let accepted: Vec<&str> = self.schema().iter().map(|(n, _)| *n).collect();
        EvalError::InvalidHyperparameter {
            classifier: self.name().to_string(),
            name: name.to_string(),
            reason: format!("not a parameter of this classifier (accepted: {})", accepted.join(", ")),
        }
    }

    fn set_param(&mut self, name: &str, value: &HyperValue) -> Result<()> {
        let kind = self
            .schema()
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| self.unknown(name))?;

        let invalid = |reason: String| EvalError::InvalidHyperparameter {
            classifier: self.name().to_string(),
            name: name.to_string(),
            reason,
        };

        match kind {
            ParamKind::Int => {
                let v = match value {
                    HyperValue::Int(v) => *v,
                    other => return Err(invalid(format!("expected an integer, got {}", other))),
                };
                let v = u32::try_from(v)
                    .ok()
                    .filter(|v| *v >= 1)
                    .ok_or_else(|| invalid(format!("expected a positive integer, got {}", v)))?;
                self.set_int(name, v);
            }
            ParamKind::Float => {
                let v = match value {
                    HyperValue::Int(v) => *v as f64,
                    HyperValue::Float(v) => *v,
                    HyperValue::Null => return Err(invalid("no value".to_string())),
                };
                if !(v.is_finite() && v > 0.0) {
                    return Err(invalid(format!("expected a positive number, got {}", v)));
                }
                self.set_float(name, v);
            }
        }
        Ok(())
    }

    fn set_int(&mut self, name: &str, v: u32) {
        match (self, name) {
            (ModelType::LogisticRegression { max_iter, .. }, "max_iter") => *max_iter = v,
            (ModelType::DecisionTree { max_depth, .. }, "max_depth")
            | (ModelType::RandomForest { max_depth, .. }, "max_depth")
            | (ModelType::GBDT { max_depth, .. }, "max_depth") => *max_depth = v,
            (ModelType::DecisionTree { min_samples_leaf, .. }, "min_samples_leaf")
            | (ModelType::RandomForest { min_samples_leaf, .. }, "min_samples_leaf") => {
                *min_samples_leaf = v
            }
            (ModelType::RandomForest { n_estimators, .. }, "n_estimators") => *n_estimators = v,
            (ModelType::GBDT { num_boost_round, .. }, "n_estimators") => *num_boost_round = v,
            (ModelType::KNN { n_neighbors }, "n_neighbors") => *n_neighbors = v,
            _ => {}
        }
    }

    fn set_float(&mut self, name: &str, v: f64) {
        match (self, name) {
            (ModelType::LogisticRegression { c, .. }, "C") => *c = v,
            (ModelType::LogisticRegression { tol, .. }, "tol") => *tol = v,
            (ModelType::GBDT { learning_rate, .. }, "learning_rate") => *learning_rate = v,
            #[cfg(feature = "linfa")]
            (ModelType::SVM { c, .. }, "C") => *c = v,
            #[cfg(feature = "linfa")]
            (ModelType::SVM { eps, .. }, "tol") => *eps = v,
            #[cfg(feature = "linfa")]
            (ModelType::SVM { gaussian_kernel_eps, .. }, "gaussian_kernel_eps") => {
                *gaussian_kernel_eps = v
            }
            #[cfg(feature = "linfa")]
            (ModelType::SVM { gaussian_kernel_eps, .. }, "gamma") => *gaussian_kernel_eps = 1.0 / v,
            _ => {}
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lrl1" => Ok(ModelType::LogisticRegression {
                penalty: Penalty::L1,
                c: 1.0,
                max_iter: 500,
                tol: 1e-4,
            }),
            "lrl2" => Ok(ModelType::LogisticRegression {
                penalty: Penalty::L2,
                c: 1.0,
                max_iter: 500,
                tol: 1e-4,
            }),
            "dt" => Ok(ModelType::DecisionTree {
                max_depth: 10,
                min_samples_leaf: 1,
            }),
            "rf" => Ok(ModelType::RandomForest {
                n_estimators: 100,
                max_depth: 10,
                min_samples_leaf: 1,
            }),
            "gb" | "gbdt" => Ok(ModelType::default()),
            "knn" => Ok(ModelType::KNN { n_neighbors: 3 }),
            #[cfg(feature = "linfa")]
            "svc" | "svm" => Ok(ModelType::SVM {
                c: 1.0,
                eps: 1e-3,
                kernel: SvmKernel::Gauss,
                gaussian_kernel_eps: 10.0,
                polynomial_kernel_constant: 1.0,
                polynomial_kernel_degree: 3.0,
            }),
            _ => Err(format!(
                "Unknown model type: {}. To use svc, please compile with `--features linfa`",
                s
            )),
        }
    }
}

/// What to do with panel columns absent from the external feature table.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPanelPolicy {
    /// Evaluate on the panel columns that are present; log the rest.
    #[default]
    Drop,
    /// Fail the run with `MissingPanelColumns`.
    Error,
}

/// What to do when one (seed, group) unit fails.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the whole run with the unit's error.
    #[default]
    Abort,
    /// Leave the cell empty and keep the failure on the table.
    RecordMissing,
}

/// Cross-validation and outer-loop settings.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EvaluationConfig {
    pub n_folds: usize,
    pub seeds: Vec<u64>,
    pub grid_points: usize,
    pub missing_panel_columns: MissingPanelPolicy,
    pub on_unit_failure: FailurePolicy,
    /// Evaluate (seed, group) units on the rayon pool.
    pub parallel: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            n_folds: 5,
            seeds: (1..=10).collect(),
            grid_points: DEFAULT_GRID_POINTS,
            missing_panel_columns: MissingPanelPolicy::default(),
            on_unit_failure: FailurePolicy::default(),
            parallel: false,
        }
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_folds < 2 {
            return Err(EvalError::FoldCount {
                n_folds: self.n_folds,
                reason: "at least 2 folds are required".to_string(),
            });
        }
        if self.seeds.is_empty() {
            return Err(EvalError::invalid_config("at least one seed is required"));
        }
        if self.grid_points < 2 {
            return Err(EvalError::invalid_config(format!(
                "grid_points must be at least 2, got {}",
                self.grid_points
            )));
        }
        Ok(())
    }
}

/// How samples map to groups and cohorts in the metadata table.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CohortConfig {
    /// Group label every other group is contrasted with.
    pub reference_label: String,
    pub group_column: String,
    pub batch_column: String,
}

/// Full run configuration, loadable from JSON.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SpecificityConfig {
    pub classifier: String,
    pub hyperparameters: Hyperparameters,
    /// Seed for the classifier constructors; fold seeds come from `evaluation.seeds`.
    pub random_state: u64,
    pub cohort: CohortConfig,
    pub evaluation: EvaluationConfig,
}

impl Default for SpecificityConfig {
    fn default() -> Self {
        Self {
            classifier: "RF".to_string(),
            hyperparameters: Hyperparameters::new(),
            random_state: 0,
            cohort: CohortConfig {
                reference_label: "Control".to_string(),
                group_column: "Group".to_string(),
                batch_column: "Batch".to_string(),
            },
            evaluation: EvaluationConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyper_value_parsing_distinguishes_int_and_float() {
        assert_eq!("3".parse::<HyperValue>().unwrap(), HyperValue::Int(3));
        assert_eq!("0.5".parse::<HyperValue>().unwrap(), HyperValue::Float(0.5));
        assert_eq!("1e-3".parse::<HyperValue>().unwrap(), HyperValue::Float(1e-3));
        assert_eq!("".parse::<HyperValue>().unwrap(), HyperValue::Null);
        assert_eq!("None".parse::<HyperValue>().unwrap(), HyperValue::Null);
        assert!("sqrt".parse::<HyperValue>().is_err());
    }

    #[test]
    fn int_accepted_for_float_param() {
        let defaults: ModelType = "lrl2".parse().unwrap();
        let mut mt = defaults.clone();
        let hp = Hyperparameters::from([("C".to_string(), HyperValue::Int(10))]);
        mt.apply_hyperparameters(&hp, &defaults).unwrap();
        assert_eq!(mt.param("C"), Some(HyperValue::Float(10.0)));
    }

    #[test]
    fn float_rejected_for_int_param() {
        let defaults: ModelType = "knn".parse().unwrap();
        let mut mt = defaults.clone();
        let hp = Hyperparameters::from([("n_neighbors".to_string(), HyperValue::Float(5.5))]);
        let err = mt.apply_hyperparameters(&hp, &defaults).unwrap_err();
        assert!(matches!(err, EvalError::InvalidHyperparameter { ref name, .. } if name == "n_neighbors"));
    }

    #[test]
    fn null_restores_default() {
        let defaults: ModelType = "rf".parse().unwrap();
        let mut mt = defaults.clone();
        let hp = Hyperparameters::from([("max_depth".to_string(), HyperValue::Int(2))]);
        mt.apply_hyperparameters(&hp, &defaults).unwrap();
        assert_eq!(mt.param("max_depth"), Some(HyperValue::Int(2)));
        let hp = Hyperparameters::from([("max_depth".to_string(), HyperValue::Null)]);
        mt.apply_hyperparameters(&hp, &defaults).unwrap();
        assert_eq!(mt, defaults);
    }

    #[test]
    fn non_positive_values_rejected() {
        let defaults = ModelType::default();
        let mut mt = defaults.clone();
        for (name, value) in [
            ("max_depth", HyperValue::Int(0)),
            ("n_estimators", HyperValue::Int(-3)),
            ("learning_rate", HyperValue::Float(0.0)),
        ] {
            let hp = Hyperparameters::from([(name.to_string(), value)]);
            assert!(mt.apply_hyperparameters(&hp, &defaults).is_err(), "{}", name);
        }
    }

    #[cfg(feature = "linfa")]
    #[test]
    fn svc_accepts_scikit_learn_gamma() {
        let defaults: ModelType = "svc".parse().unwrap();
        let mut mt = defaults.clone();
        let hp = Hyperparameters::from([("gamma".to_string(), HyperValue::Float(0.25))]);
        mt.apply_hyperparameters(&hp, &defaults).unwrap();
        assert_eq!(mt.param("gaussian_kernel_eps"), Some(HyperValue::Float(4.0)));
        assert_eq!(mt.param("gamma"), Some(HyperValue::Float(0.25)));

        let hp = Hyperparameters::from([("gamma".to_string(), HyperValue::Null)]);
        mt.apply_hyperparameters(&hp, &defaults).unwrap();
        assert_eq!(mt, defaults);

        let hp = Hyperparameters::from([("gamma".to_string(), HyperValue::Float(-1.0))]);
        assert!(mt.apply_hyperparameters(&hp, &defaults).is_err());
    }

    #[test]
    fn evaluation_defaults_match_reference_protocol() {
        let cfg = EvaluationConfig::default();
        assert_eq!(cfg.n_folds, 5);
        assert_eq!(cfg.seeds, (1..=10).collect::<Vec<u64>>());
        assert_eq!(cfg.grid_points, 100);
        assert_eq!(cfg.on_unit_failure, FailurePolicy::Abort);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn evaluation_config_validation() {
        let cfg = EvaluationConfig {
            n_folds: 1,
            ..EvaluationConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(EvalError::FoldCount { .. })));
        let cfg = EvaluationConfig {
            seeds: vec![],
            ..EvaluationConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
