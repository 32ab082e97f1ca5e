//! In-memory tables the specificity runner consumes.
//!
//! `FeatureTable` holds the numeric profile (samples x features) together
//! with its row and column names; `MetadataTable` holds the string-valued
//! sample annotations from which group and batch assignments are read.
use std::collections::HashMap;

use ndarray::{Array2, Axis};

use crate::config::MissingPanelPolicy;
use crate::error::{EvalError, Result};

/// Numeric feature profile with named rows and columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub sample_ids: Vec<String>,
    pub columns: Vec<String>,
    /// Samples x features; `NaN` marks a missing value.
    pub values: Array2<f64>,
}

impl FeatureTable {
    pub fn new(sample_ids: Vec<String>, columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.nrows() != sample_ids.len() {
            return Err(EvalError::LengthMismatch {
                what: "feature rows and sample ids",
                left: values.nrows(),
                right: sample_ids.len(),
            });
        }
        if values.ncols() != columns.len() {
            return Err(EvalError::LengthMismatch {
                what: "feature columns and column names",
                left: values.ncols(),
                right: columns.len(),
            });
        }
        Ok(FeatureTable {
            sample_ids,
            columns,
            values,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Keep only the panel columns, in panel order, with missing values set to 0.
    ///
    /// Panel columns absent from this table are dropped with a warning or
    /// reported as `MissingPanelColumns`, depending on `policy`.
    pub fn restrict_to_panel(&self, panel: &[String], policy: MissingPanelPolicy) -> Result<FeatureTable> {
        let positions: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut kept = Vec::new();
        let mut missing = Vec::new();
        for column in panel {
            match positions.get(column.as_str()) {
                Some(&i) => kept.push((column.clone(), i)),
                None => missing.push(column.clone()),
            }
        }

        if !missing.is_empty() {
            match policy {
                MissingPanelPolicy::Error => return Err(EvalError::MissingPanelColumns(missing)),
                MissingPanelPolicy::Drop => log::warn!(
                    "Dropping {} panel column(s) absent from the external profile: {}",
                    missing.len(),
                    missing.join(", ")
                ),
            }
        }
        if kept.is_empty() {
            return Err(EvalError::EmptyPanel);
        }

        let indices: Vec<usize> = kept.iter().map(|(_, i)| *i).collect();
        let values = self
            .values
            .select(Axis(1), &indices)
            .mapv(|v| if v.is_nan() { 0.0 } else { v });
        log::info!(
            "Panel restricted to {} of {} requested columns",
            kept.len(),
            panel.len()
        );

        Ok(FeatureTable {
            sample_ids: self.sample_ids.clone(),
            columns: kept.into_iter().map(|(c, _)| c).collect(),
            values,
        })
    }

    /// Row index of every sample id.
    pub fn row_index(&self) -> HashMap<&str, usize> {
        self.sample_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect()
    }
}

/// String-valued sample annotations keyed by sample id.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataTable {
    pub sample_ids: Vec<String>,
    pub columns: Vec<String>,
    /// One entry per sample, aligned with `columns`.
    pub rows: Vec<Vec<String>>,
}

impl MetadataTable {
    pub fn new(sample_ids: Vec<String>, columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if rows.len() != sample_ids.len() {
            return Err(EvalError::LengthMismatch {
                what: "metadata rows and sample ids",
                left: rows.len(),
                right: sample_ids.len(),
            });
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(EvalError::LengthMismatch {
                what: "metadata row width and header",
                left: bad.len(),
                right: columns.len(),
            });
        }
        Ok(MetadataTable {
            sample_ids,
            columns,
            rows,
        })
    }

    /// Values of column `name`, one per sample.
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| EvalError::MissingColumn(name.to_string()))?;
        Ok(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }
}

/// Group and batch of every annotated sample, in metadata order.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortAssignment {
    pub sample_ids: Vec<String>,
    pub groups: Vec<String>,
    pub batches: Vec<String>,
}

impl CohortAssignment {
    /// Read the group and batch columns out of `metadata`.
    pub fn from_metadata(metadata: &MetadataTable, group_column: &str, batch_column: &str) -> Result<Self> {
        let groups = metadata.column(group_column)?;
        let batches = metadata.column(batch_column)?;
        Ok(CohortAssignment {
            sample_ids: metadata.sample_ids.clone(),
            groups: groups.into_iter().map(str::to_string).collect(),
            batches: batches.into_iter().map(str::to_string).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_ids.is_empty()
    }

    /// Distinct group labels other than `reference`, sorted.
    pub fn case_groups(&self, reference: &str) -> Vec<String> {
        let mut groups: Vec<String> = self
            .groups
            .iter()
            .filter(|g| g.as_str() != reference)
            .cloned()
            .collect();
        groups.sort();
        groups.dedup();
        groups
    }
}
