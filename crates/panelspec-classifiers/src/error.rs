use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Failures raised while evaluating a panel.
///
/// Every variant is deterministic for a given input, so none of them is
/// retried. A unit of work that hits one of these never yields a partial
/// or sentinel AUC.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EvalError {
    /// ROC computation was given labels from a single class.
    #[error("labels contain a single class ({positives} positives, {negatives} negatives); ROC curve is undefined")]
    DegenerateLabels { positives: usize, negatives: usize },

    /// Stratified folding cannot place both classes in every fold.
    #[error("insufficient samples for stratified folding: {0}")]
    InsufficientSamples(String),

    /// The requested fold count cannot be honoured.
    #[error("cannot build {n_folds} stratified folds: {reason}")]
    FoldCount { n_folds: usize, reason: String },

    #[error("unknown classifier '{name}'; registered classifiers: {available}")]
    UnknownClassifier { name: String, available: String },

    #[error("invalid hyperparameter '{name}' for {classifier}: {reason}")]
    InvalidHyperparameter {
        classifier: String,
        name: String,
        reason: String,
    },

    /// A required metadata column is absent.
    #[error("missing column '{0}'")]
    MissingColumn(String),

    /// Panel columns absent from the external feature table.
    #[error("{} panel column(s) missing from the external feature table: {}", .0.len(), .0.join(", "))]
    MissingPanelColumns(Vec<String>),

    #[error("no panel column is present in the external feature table")]
    EmptyPanel,

    #[error("length mismatch: {what} ({left} vs {right})")]
    LengthMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    #[error("invalid label {0}; expected 0 (reference) or 1 (case)")]
    InvalidLabel(i32),

    #[error("found {0} non-finite values in scores")]
    NonFiniteScores(usize),

    /// A classifier failed to fit or predict.
    #[error("model error: {0}")]
    Model(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A (seed, group) unit of the specificity run failed.
    #[error("evaluation of group '{group}' with seed {seed} failed: {source}")]
    UnitFailed {
        seed: u64,
        group: String,
        #[source]
        source: Box<EvalError>,
    },
}

impl EvalError {
    pub fn model(msg: impl Into<String>) -> Self {
        EvalError::Model(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        EvalError::InvalidConfig(msg.into())
    }

    /// The innermost error, looking through `UnitFailed`.
    pub fn root(&self) -> &EvalError {
        match self {
            EvalError::UnitFailed { source, .. } => source.root(),
            other => other,
        }
    }
}
