//! panelspec-classifiers: cross-cohort specificity of a biomarker panel.
//!
//! The crate evaluates how well a fixed feature panel separates each group
//! label from a reference label inside the cohorts where both were
//! collected. It provides the ROC/AUC engine (`stats`), stratified k-fold
//! evaluation of a classifier (`cross_validation`), the seed x group
//! runner (`specificity`) and a registry of classifier families
//! (`models::registry`), plus TSV I/O and plotly/maud reporting helpers.
//!
//! The optional `linfa` feature adds a support vector classifier.
pub mod config;
pub mod cross_validation;
pub mod data_handling;
pub mod error;
pub mod io;
pub mod models;
pub mod preprocessing;
pub mod report;
pub mod specificity;
pub mod stats;

pub use error::{EvalError, Result};
