pub mod forest;
pub mod gbdt;
pub mod knn;
pub mod logistic;
#[cfg(feature = "linfa")]
pub mod svm;

pub mod classifier_trait;
pub mod factory;
pub mod registry;
