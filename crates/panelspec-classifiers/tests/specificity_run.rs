//! End-to-end runs of the specificity runner on small synthetic cohorts.

use ndarray::Array2;
use panelspec_classifiers::config::{
    CohortConfig, EvaluationConfig, FailurePolicy, MissingPanelPolicy, ModelConfig, ModelType,
};
use panelspec_classifiers::data_handling::{FeatureTable, MetadataTable};
use panelspec_classifiers::error::EvalError;
use panelspec_classifiers::models::classifier_trait::ClassifierModel;
use panelspec_classifiers::models::logistic::LogisticRegressionClassifier;
use panelspec_classifiers::specificity::SpecificityRunner;

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

struct Cohorts {
    features: FeatureTable,
    metadata: MetadataTable,
}

/// `spec` lists (sample id, group, batch, informative feature value).
fn cohorts(spec: &[(&str, &str, &str, f64)]) -> Cohorts {
    let mut values = Vec::new();
    for (i, (_, _, _, v)) in spec.iter().enumerate() {
        values.push(*v);
        values.push((i % 3) as f64);
    }
    let features = FeatureTable::new(
        spec.iter().map(|s| s.0.to_string()).collect(),
        strings(&["marker", "noise"]),
        Array2::from_shape_vec((spec.len(), 2), values).unwrap(),
    )
    .unwrap();
    let metadata = MetadataTable::new(
        spec.iter().map(|s| s.0.to_string()).collect(),
        strings(&["Group", "Batch"]),
        spec.iter().map(|s| strings(&[s.1, s.2])).collect(),
    )
    .unwrap();
    Cohorts { features, metadata }
}

fn single_batch() -> Cohorts {
    let ids: Vec<String> = (0..20).map(|i| format!("s{}", i)).collect();
    let spec: Vec<(&str, &str, &str, f64)> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            if i < 10 {
                (id.as_str(), "CRC", "b1", 2.0 + i as f64 * 0.1)
            } else {
                (id.as_str(), "Control", "b1", i as f64 * 0.05)
            }
        })
        .collect();
    cohorts(&spec)
}

fn runner(policy: FailurePolicy) -> SpecificityRunner {
    SpecificityRunner::new(
        CohortConfig {
            reference_label: "Control".to_string(),
            group_column: "Group".to_string(),
            batch_column: "Batch".to_string(),
        },
        EvaluationConfig {
            on_unit_failure: policy,
            ..EvaluationConfig::default()
        },
    )
}

fn classifier() -> Box<dyn ClassifierModel> {
    Box::new(LogisticRegressionClassifier::new(ModelConfig::new(
        "lrl2".parse::<ModelType>().unwrap(),
        0,
    )))
}

#[test]
fn single_batch_group_fills_ten_finite_rows() {
    let data = single_batch();
    let table = runner(FailurePolicy::Abort)
        .run(&data.features, &data.metadata, &strings(&["marker", "noise"]), classifier().as_ref())
        .unwrap();

    assert_eq!(table.groups, strings(&["CRC"]));
    assert_eq!(table.seeds, (1..=10).collect::<Vec<u64>>());
    let column = table.column("CRC").unwrap();
    assert_eq!(column.len(), 10);
    for auc in column {
        let auc = auc.unwrap();
        assert!(auc.is_finite() && (0.0..=1.0).contains(&auc));
        assert!(auc > 0.9);
    }
    assert!(table.is_complete());
    assert_eq!(table.mean_curves[0].as_ref().unwrap().len(), table.grid.len());
}

#[test]
fn parallel_run_matches_sequential() {
    let data = single_batch();
    let panel = strings(&["marker", "noise"]);
    let sequential = runner(FailurePolicy::Abort)
        .run(&data.features, &data.metadata, &panel, classifier().as_ref())
        .unwrap();
    let mut parallel_runner = runner(FailurePolicy::Abort);
    parallel_runner.evaluation.parallel = true;
    let parallel = parallel_runner
        .run(&data.features, &data.metadata, &panel, classifier().as_ref())
        .unwrap();
    assert_eq!(sequential.values, parallel.values);
}

/// CD only occurs in `b2`, which holds no reference samples.
fn without_reference() -> Cohorts {
    let ids: Vec<String> = (0..26).map(|i| format!("s{}", i)).collect();
    let spec: Vec<(&str, &str, &str, f64)> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| match i {
            0..=5 => (id.as_str(), "CRC", "b1", 2.0 + i as f64 * 0.1),
            6..=11 => (id.as_str(), "Control", "b1", i as f64 * 0.05),
            _ => (id.as_str(), "CD", "b2", 1.0 + i as f64 * 0.01),
        })
        .collect();
    cohorts(&spec)
}

#[test]
fn group_without_reference_aborts() {
    let data = without_reference();
    let err = runner(FailurePolicy::Abort)
        .run(&data.features, &data.metadata, &strings(&["marker"]), classifier().as_ref())
        .unwrap_err();
    match &err {
        EvalError::UnitFailed { seed, group, .. } => {
            assert_eq!(*seed, 1);
            assert_eq!(group, "CD");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(matches!(err.root(), EvalError::InsufficientSamples(_)));
}

#[test]
fn group_without_reference_is_recorded_missing() {
    let data = without_reference();
    let table = runner(FailurePolicy::RecordMissing)
        .run(&data.features, &data.metadata, &strings(&["marker"]), classifier().as_ref())
        .unwrap();

    assert_eq!(table.groups, strings(&["CD", "CRC"]));
    assert!(table.column("CD").unwrap().iter().all(Option::is_none));
    assert!(table.column("CRC").unwrap().iter().all(Option::is_some));
    assert_eq!(table.failures.len(), 10);
    assert!(table
        .failures
        .iter()
        .all(|f| f.group == "CD" && matches!(f.error, EvalError::InsufficientSamples(_))));
    assert!(table.mean_curves[0].is_none());
}

#[test]
fn missing_panel_columns_policy() {
    let data = single_batch();
    let panel = strings(&["marker", "absent"]);

    let table = runner(FailurePolicy::Abort)
        .run(&data.features, &data.metadata, &panel, classifier().as_ref())
        .unwrap();
    assert_eq!(table.groups, strings(&["CRC"]));

    let mut strict = runner(FailurePolicy::Abort);
    strict.evaluation.missing_panel_columns = MissingPanelPolicy::Error;
    assert_eq!(
        strict
            .run(&data.features, &data.metadata, &panel, classifier().as_ref())
            .unwrap_err(),
        EvalError::MissingPanelColumns(strings(&["absent"]))
    );
}

#[test]
fn missing_metadata_column() {
    let data = single_batch();
    let mut other = runner(FailurePolicy::Abort);
    other.cohort.batch_column = "Study".to_string();
    assert_eq!(
        other
            .run(&data.features, &data.metadata, &strings(&["marker"]), classifier().as_ref())
            .unwrap_err(),
        EvalError::MissingColumn("Study".to_string())
    );
}
