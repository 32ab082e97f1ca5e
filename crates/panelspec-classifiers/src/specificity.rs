//! Cross-cohort specificity of a biomarker panel.
//!
//! For every group label other than the reference, the runner collects the
//! batches (cohorts) that contain the group, labels their samples 1 for the
//! group and 0 for the reference, and cross-validates the classifier once
//! per seed. The mean AUC of each (seed, group) unit fills one cell of the
//! [`SpecificityTable`].
use std::collections::BTreeSet;

use ndarray::{Array2, Axis};
use rayon::prelude::*;

use crate::config::{CohortConfig, EvaluationConfig, FailurePolicy};
use crate::cross_validation::CrossValidator;
use crate::data_handling::{CohortAssignment, FeatureTable, MetadataTable};
use crate::error::{EvalError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::stats::Summary;

/// Samples taking part in the evaluation of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortSelection {
    pub group: String,
    /// Batches holding at least one sample of `group`, sorted.
    pub batches: Vec<String>,
    pub sample_ids: Vec<String>,
    /// Row of each selected sample in the feature table.
    pub rows: Vec<usize>,
    /// 1 for `group`, 0 for the reference label.
    pub labels: Vec<i32>,
    /// Metadata samples of the matched batches without a feature row.
    pub unmatched: Vec<String>,
}

impl CohortSelection {
    pub fn n_cases(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    pub fn n_reference(&self) -> usize {
        self.labels.len() - self.n_cases()
    }
}

/// Select the matched cohorts of `group`.
///
/// Every sample of a batch that contains `group` is taken, so reference
/// samples only come from cohorts where the group was also collected.
/// Samples of other non-reference groups inside those batches are labelled
/// 1 as well, matching the one-vs-reference contrast of the table.
pub fn select_cohort(
    cohorts: &CohortAssignment,
    features: &FeatureTable,
    group: &str,
    reference: &str,
) -> CohortSelection {
    let batches: BTreeSet<&str> = cohorts
        .groups
        .iter()
        .zip(&cohorts.batches)
        .filter(|(g, _)| g.as_str() == group)
        .map(|(_, b)| b.as_str())
        .collect();

    let row_index = features.row_index();
    let mut selection = CohortSelection {
        group: group.to_string(),
        batches: batches.iter().map(|b| b.to_string()).collect(),
        sample_ids: Vec::new(),
        rows: Vec::new(),
        labels: Vec::new(),
        unmatched: Vec::new(),
    };

    for i in 0..cohorts.len() {
        if !batches.contains(cohorts.batches[i].as_str()) {
            continue;
        }
        let id = &cohorts.sample_ids[i];
        match row_index.get(id.as_str()) {
            Some(&row) => {
                selection.sample_ids.push(id.clone());
                selection.rows.push(row);
                selection
                    .labels
                    .push(i32::from(cohorts.groups[i] != reference));
            }
            None => selection.unmatched.push(id.clone()),
        }
    }
    selection
}

/// A (seed, group) unit that failed under the record-missing policy.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFailure {
    pub seed: u64,
    pub group: String,
    pub error: EvalError,
}

/// Seed x group table of mean AUC values.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecificityTable {
    pub seeds: Vec<u64>,
    pub groups: Vec<String>,
    /// `values[seed_idx][group_idx]`; `None` only for a recorded failure.
    pub values: Vec<Vec<Option<f64>>>,
    pub failures: Vec<UnitFailure>,
    /// FPR grid of `mean_curves`.
    pub grid: Vec<f64>,
    /// Per group, the mean ROC curve averaged over the successful seeds.
    pub mean_curves: Vec<Option<Vec<f64>>>,
}

impl SpecificityTable {
    pub fn new(seeds: Vec<u64>, groups: Vec<String>, grid: Vec<f64>) -> Self {
        let values = vec![vec![None; groups.len()]; seeds.len()];
        let mean_curves = vec![None; groups.len()];
        SpecificityTable {
            seeds,
            groups,
            values,
            failures: Vec::new(),
            grid,
            mean_curves,
        }
    }

    fn seed_index(&self, seed: u64) -> Option<usize> {
        self.seeds.iter().position(|&s| s == seed)
    }

    fn group_index(&self, group: &str) -> Option<usize> {
        self.groups.iter().position(|g| g == group)
    }

    pub fn get(&self, seed: u64, group: &str) -> Option<f64> {
        let row = self.seed_index(seed)?;
        let col = self.group_index(group)?;
        self.values[row][col]
    }

    /// Set a cell; `false` when `seed` or `group` is not part of the table.
    pub fn set(&mut self, seed: u64, group: &str, value: f64) -> bool {
        match (self.seed_index(seed), self.group_index(group)) {
            (Some(row), Some(col)) => {
                self.values[row][col] = Some(value);
                true
            }
            _ => false,
        }
    }

    /// Column of `group`, one entry per seed.
    pub fn column(&self, group: &str) -> Option<Vec<Option<f64>>> {
        let col = self.group_index(group)?;
        Some(self.values.iter().map(|row| row[col]).collect())
    }

    /// Distribution summary of each group's finite AUCs.
    pub fn summaries(&self) -> Vec<(String, Option<Summary>)> {
        self.groups
            .iter()
            .enumerate()
            .map(|(col, group)| {
                let values: Vec<f64> = self.values.iter().filter_map(|row| row[col]).collect();
                (group.clone(), Summary::from_values(&values))
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

struct UnitOutcome {
    mean_auc: f64,
    mean_tpr: Vec<f64>,
}

/// Runs the seed x group specificity evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecificityRunner {
    pub cohort: CohortConfig,
    pub evaluation: EvaluationConfig,
}

impl SpecificityRunner {
    pub fn new(cohort: CohortConfig, evaluation: EvaluationConfig) -> Self {
        SpecificityRunner { cohort, evaluation }
    }

    /// Evaluate `classifier` on the panel for every non-reference group.
    ///
    /// # Arguments
    ///
    /// * `features` - External profile; restricted to `panel_columns`.
    /// * `metadata` - Must contain the configured group and batch columns.
    /// * `panel_columns` - Ordered panel feature names.
    /// * `classifier` - Prototype; every fold fits a fresh copy.
    ///
    /// # Errors
    ///
    /// Table preparation errors (`MissingColumn`, `MissingPanelColumns`,
    /// `EmptyPanel`, invalid evaluation settings) always abort. Unit errors
    /// abort as `UnitFailed` or are recorded, per `on_unit_failure`.
    pub fn run(
        &self,
        features: &FeatureTable,
        metadata: &MetadataTable,
        panel_columns: &[String],
        classifier: &dyn ClassifierModel,
    ) -> Result<SpecificityTable> {
        self.evaluation.validate()?;
        let validator = CrossValidator::new(self.evaluation.n_folds, self.evaluation.grid_points)?;

        let panel = features.restrict_to_panel(panel_columns, self.evaluation.missing_panel_columns)?;
        let cohorts = CohortAssignment::from_metadata(
            metadata,
            &self.cohort.group_column,
            &self.cohort.batch_column,
        )?;
        let reference = self.cohort.reference_label.as_str();
        if !cohorts.groups.iter().any(|g| g == reference) {
            log::warn!(
                "Reference label '{}' does not occur in column '{}'; every group will lack reference samples",
                reference,
                self.cohort.group_column
            );
        }

        let groups = cohorts.case_groups(reference);
        log::info!(
            "Evaluating {} group(s) x {} seed(s) with {} on {} panel feature(s)",
            groups.len(),
            self.evaluation.seeds.len(),
            classifier.name(),
            panel.columns.len()
        );

        let datasets: Vec<(CohortSelection, Array2<f64>)> = groups
            .iter()
            .map(|group| {
                let selection = select_cohort(&cohorts, &panel, group, reference);
                if !selection.unmatched.is_empty() {
                    log::warn!(
                        "{}: {} sample(s) without a profile row were dropped: {}",
                        group,
                        selection.unmatched.len(),
                        selection.unmatched.join(", ")
                    );
                }
                log::info!(
                    "{} testing: {} case / {} reference samples from batch(es) {}",
                    group,
                    selection.n_cases(),
                    selection.n_reference(),
                    selection.batches.join(", ")
                );
                let x = panel.values.select(Axis(0), &selection.rows);
                (selection, x)
            })
            .collect();

        let units: Vec<(usize, usize)> = (0..groups.len())
            .flat_map(|g| (0..self.evaluation.seeds.len()).map(move |s| (g, s)))
            .collect();

        let evaluate_unit = |&(g, s): &(usize, usize)| -> Result<UnitOutcome> {
            let (selection, x) = &datasets[g];
            let seed = self.evaluation.seeds[s];
            let result = validator.evaluate(x, &selection.labels, classifier, seed)?;
            log::debug!(
                "{} seed {}: mean AUC {:.4} (folds {:?})",
                selection.group,
                seed,
                result.mean_auc,
                result.fold_aucs
            );
            Ok(UnitOutcome {
                mean_auc: result.mean_auc,
                mean_tpr: result.mean_tpr,
            })
        };

        let outcomes: Vec<Result<UnitOutcome>> = if self.evaluation.parallel {
            units.par_iter().map(evaluate_unit).collect()
        } else if self.evaluation.on_unit_failure == FailurePolicy::Abort {
            let mut outcomes = Vec::with_capacity(units.len());
            for unit in &units {
                let outcome = evaluate_unit(unit);
                let failed = outcome.is_err();
                outcomes.push(outcome);
                if failed {
                    break;
                }
            }
            outcomes
        } else {
            units.iter().map(evaluate_unit).collect()
        };

        let mut table = SpecificityTable::new(
            self.evaluation.seeds.clone(),
            groups.clone(),
            validator.grid().to_vec(),
        );
        let mut curve_sums: Vec<Option<(Vec<f64>, usize)>> = vec![None; groups.len()];

        for (&(g, s), outcome) in units.iter().zip(outcomes) {
            let seed = self.evaluation.seeds[s];
            let group = &groups[g];
            match outcome {
                Ok(unit) => {
                    table.values[s][g] = Some(unit.mean_auc);
                    match &mut curve_sums[g] {
                        Some((sum, n)) => {
                            for (acc, v) in sum.iter_mut().zip(&unit.mean_tpr) {
                                *acc += v;
                            }
                            *n += 1;
                        }
                        slot => *slot = Some((unit.mean_tpr, 1)),
                    }
                }
                Err(error) => match self.evaluation.on_unit_failure {
                    FailurePolicy::Abort => {
                        return Err(EvalError::UnitFailed {
                            seed,
                            group: group.clone(),
                            source: Box::new(error),
                        })
                    }
                    FailurePolicy::RecordMissing => {
                        log::warn!("{} seed {}: recorded as missing ({})", group, seed, error);
                        table.failures.push(UnitFailure {
                            seed,
                            group: group.clone(),
                            error,
                        });
                    }
                },
            }
        }

        table.mean_curves = curve_sums
            .into_iter()
            .map(|slot| slot.map(|(sum, n)| sum.into_iter().map(|v| v / n as f64).collect()))
            .collect();

        log::info!(
            "Specificity run finished: {} cell(s), {} failure(s)",
            table.seeds.len() * table.groups.len(),
            table.failures.len()
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MissingPanelPolicy;
    use ndarray::array;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn cohorts() -> CohortAssignment {
        CohortAssignment {
            sample_ids: strings(&["a", "b", "c", "d", "e"]),
            groups: strings(&["CRC", "Control", "Control", "CD", "Control"]),
            batches: strings(&["b1", "b1", "b2", "b2", "b3"]),
        }
    }

    fn features() -> FeatureTable {
        FeatureTable::new(
            strings(&["a", "b", "c", "e"]),
            strings(&["f1"]),
            array![[1.0], [2.0], [3.0], [4.0]],
        )
        .unwrap()
    }

    #[test]
    fn selection_uses_matched_batches_only() {
        let selection = select_cohort(&cohorts(), &features(), "CRC", "Control");
        assert_eq!(selection.batches, strings(&["b1"]));
        assert_eq!(selection.sample_ids, strings(&["a", "b"]));
        assert_eq!(selection.rows, vec![0, 1]);
        assert_eq!(selection.labels, vec![1, 0]);
        assert!(selection.unmatched.is_empty());
    }

    #[test]
    fn selection_reports_samples_without_features() {
        let selection = select_cohort(&cohorts(), &features(), "CD", "Control");
        assert_eq!(selection.sample_ids, strings(&["c"]));
        assert_eq!(selection.unmatched, strings(&["d"]));
    }

    #[test]
    fn table_cells_and_summaries() {
        let mut table = SpecificityTable::new(vec![1, 2], strings(&["A", "B"]), vec![0.0, 1.0]);
        assert!(table.set(1, "A", 0.8));
        assert!(table.set(2, "A", 0.6));
        assert!(!table.set(3, "A", 0.6));
        assert_eq!(table.get(1, "A"), Some(0.8));
        assert_eq!(table.column("B"), Some(vec![None, None]));
        let summaries = table.summaries();
        assert!((summaries[0].1.unwrap().mean - 0.7).abs() < 1e-12);
        assert!(summaries[1].1.is_none());
    }

    #[test]
    fn invalid_evaluation_settings_abort_before_work() {
        let runner = SpecificityRunner::new(
            CohortConfig {
                reference_label: "Control".to_string(),
                group_column: "Group".to_string(),
                batch_column: "Batch".to_string(),
            },
            EvaluationConfig {
                n_folds: 1,
                missing_panel_columns: MissingPanelPolicy::Drop,
                ..EvaluationConfig::default()
            },
        );
        let metadata = MetadataTable::new(vec![], strings(&["Group", "Batch"]), vec![]).unwrap();
        let clf = crate::models::knn::KNNClassifier::new(crate::config::ModelConfig::new(
            crate::config::ModelType::KNN { n_neighbors: 1 },
            0,
        ));
        assert!(matches!(
            runner.run(&features(), &metadata, &strings(&["f1"]), &clf),
            Err(EvalError::FoldCount { .. })
        ));
    }
}
