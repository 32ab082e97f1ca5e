use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};

use panelspec_classifiers::io::{
    read_feature_table, read_metadata_table, read_panel_columns, write_specificity_table,
};
use panelspec_classifiers::models::registry::ClassifierRegistry;
use panelspec_classifiers::specificity::{SpecificityRunner, SpecificityTable};

use crate::specificity::input::SpecificityRunConfig;
use crate::specificity::report::write_specificity_report;

/// Files written by a run and the table they hold.
#[derive(Debug)]
pub struct SpecificityOutput {
    pub table: SpecificityTable,
    pub result_path: PathBuf,
    pub report_path: Option<PathBuf>,
}

/// Read the inputs, evaluate every group and write the results.
pub fn run_specificity(config: &SpecificityRunConfig) -> Result<SpecificityOutput> {
    let start_time = Instant::now();

    let panel = read_panel_columns(config.profile_path())
        .with_context(|| "Failed to read the panel (optimal biomarker) table")?;
    let features = read_feature_table(config.other_profile_path())
        .with_context(|| "Failed to read the external profile")?;
    let metadata = read_metadata_table(config.metadata_path())
        .with_context(|| "Failed to read the external metadata")?;
    log::info!(
        "Loaded panel of {} features, profile of {} samples, metadata of {} samples",
        panel.len(),
        features.n_samples(),
        metadata.sample_ids.len()
    );

    let settings = &config.specificity;
    let hyperparameters = config.hyperparameters()?;
    let registry = ClassifierRegistry::with_defaults(settings.random_state);
    let classifier = registry
        .get(&settings.classifier, &hyperparameters)
        .with_context(|| format!("Failed to configure classifier '{}'", settings.classifier))?;

    let runner = SpecificityRunner::new(settings.cohort.clone(), settings.evaluation.clone());
    let table = runner
        .run(&features, &metadata, &panel, classifier.as_ref())
        .with_context(|| "Specificity evaluation failed")?;
    log::info!("Evaluation completed in {:?}", start_time.elapsed());

    let result_path = config.result_path();
    write_specificity_table(&result_path, &table)?;
    log::info!("Result table written to: {}", result_path.display());

    let report_path = if config.report {
        let path = config.report_path();
        write_specificity_report(&table, config, &panel, &path)?;
        log::info!("Report written to: {}", path.display());
        Some(path)
    } else {
        None
    };

    Ok(SpecificityOutput {
        table,
        result_path,
        report_path,
    })
}
