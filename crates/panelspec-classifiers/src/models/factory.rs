use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::forest::{DecisionTreeClassifier, RandomForestClassifier};
use crate::models::gbdt::GBDTClassifier;
use crate::models::knn::KNNClassifier;
use crate::models::logistic::LogisticRegressionClassifier;

/// Build a boxed classifier model from a `ModelConfig`.
/// Currently this is a thin factory implemented as a single function.
pub fn build_model(params: ModelConfig) -> Box<dyn ClassifierModel> {
    match params.model_type {
        ModelType::LogisticRegression { .. } => Box::new(LogisticRegressionClassifier::new(params)),
        ModelType::DecisionTree { .. } => Box::new(DecisionTreeClassifier::new(params)),
        ModelType::RandomForest { .. } => Box::new(RandomForestClassifier::new(params)),
        ModelType::GBDT { .. } => Box::new(GBDTClassifier::new(params)),
        ModelType::KNN { .. } => Box::new(KNNClassifier::new(params)),

        #[cfg(feature = "linfa")]
        ModelType::SVM { .. } => Box::new(crate::models::svm::SVMClassifier::new(params)),
        // When compiled, `ModelType` only contains the variants enabled by
        // features, so no catch-all arm is necessary.
    }
}
