use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use panelspec_classifiers::config::{FailurePolicy, MissingPanelPolicy, SpecificityConfig};
use panelspec_classifiers::io::read_hyperparameters;

/// Inputs, outputs and evaluation settings of one specificity run.
///
/// Input file names are relative to `workplace`, as are the outputs
/// `<output>_specificity_result.txt` and `<output>_specificity_auc.html`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpecificityRunConfig {
    pub workplace: PathBuf,
    /// Table whose header lists the panel features.
    pub profile: String,
    pub other_metadata: String,
    pub other_profile: String,
    /// Optional `name value` hyperparameter file.
    pub hyperparameter: Option<String>,
    pub output: String,
    pub report: bool,
    pub specificity: SpecificityConfig,
}

impl Default for SpecificityRunConfig {
    fn default() -> Self {
        SpecificityRunConfig {
            workplace: PathBuf::from("."),
            profile: String::new(),
            other_metadata: String::new(),
            other_profile: String::new(),
            hyperparameter: None,
            output: String::from("panelspec"),
            report: true,
            specificity: SpecificityConfig::default(),
        }
    }
}

/// Load a run configuration from a JSON file.
pub fn load_run_config<P: AsRef<Path>>(path: P) -> Result<SpecificityRunConfig> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: SpecificityRunConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

impl SpecificityRunConfig {
    /// Start from `config_path` (or the defaults) and apply CLI overrides.
    pub fn from_arguments(config_path: Option<&PathBuf>, matches: &ArgMatches) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => load_run_config(path)?,
            None => SpecificityRunConfig::default(),
        };

        if let Some(workplace) = matches.get_one::<PathBuf>("workplace") {
            config.workplace = workplace.clone();
        }
        let strings = [
            ("profile", &mut config.profile),
            ("other_metadata", &mut config.other_metadata),
            ("other_profile", &mut config.other_profile),
            ("output", &mut config.output),
            ("exposure", &mut config.specificity.cohort.reference_label),
            ("group", &mut config.specificity.cohort.group_column),
            ("batch", &mut config.specificity.cohort.batch_column),
            ("classifier", &mut config.specificity.classifier),
        ];
        for (id, field) in strings {
            if let Some(value) = matches.get_one::<String>(id) {
                *field = value.clone();
            }
        }
        if let Some(hyperparameter) = matches.get_one::<String>("hyperparameter") {
            config.hyperparameter = Some(hyperparameter.clone());
        }
        if let Some(seed) = matches.get_one::<u64>("seed") {
            config.specificity.random_state = *seed;
        }

        let evaluation = &mut config.specificity.evaluation;
        if let Some(folds) = matches.get_one::<usize>("folds") {
            evaluation.n_folds = *folds;
        }
        if let Some(repeats) = matches.get_one::<u64>("repeats") {
            evaluation.seeds = (1..=*repeats).collect();
        }
        if let Some(points) = matches.get_one::<usize>("grid_points") {
            evaluation.grid_points = *points;
        }
        if let Some(policy) = matches.get_one::<String>("missing_panel_columns") {
            evaluation.missing_panel_columns = match policy.as_str() {
                "error" => MissingPanelPolicy::Error,
                _ => MissingPanelPolicy::Drop,
            };
        }
        if let Some(policy) = matches.get_one::<String>("on_unit_failure") {
            evaluation.on_unit_failure = match policy.as_str() {
                "record-missing" => FailurePolicy::RecordMissing,
                _ => FailurePolicy::Abort,
            };
        }
        if matches.get_flag("parallel") {
            evaluation.parallel = true;
        }
        if matches.get_flag("no_report") {
            config.report = false;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that every input is named and exists in the workplace.
    pub fn validate(&self) -> Result<()> {
        for (flag, name) in [
            ("--profile", &self.profile),
            ("--other-metadata", &self.other_metadata),
            ("--other-profile", &self.other_profile),
        ] {
            if name.is_empty() {
                anyhow::bail!("Missing input: {} is required", flag);
            }
            validate_input_file(&self.input_path(name))?;
        }
        if let Some(name) = &self.hyperparameter {
            validate_input_file(&self.input_path(name))?;
        }
        if self.output.is_empty() {
            anyhow::bail!("Output prefix must not be empty");
        }
        Ok(())
    }

    pub fn input_path(&self, name: &str) -> PathBuf {
        self.workplace.join(name)
    }

    /// Panel feature names are read from here.
    pub fn profile_path(&self) -> PathBuf {
        self.input_path(&self.profile)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.input_path(&self.other_metadata)
    }

    pub fn other_profile_path(&self) -> PathBuf {
        self.input_path(&self.other_profile)
    }

    pub fn result_path(&self) -> PathBuf {
        self.workplace
            .join(format!("{}_specificity_result.txt", self.output))
    }

    pub fn report_path(&self) -> PathBuf {
        self.workplace
            .join(format!("{}_specificity_auc.html", self.output))
    }

    /// Hyperparameters of the config with the hyperparameter file applied on top.
    pub fn hyperparameters(&self) -> Result<panelspec_classifiers::config::Hyperparameters> {
        let mut params = self.specificity.hyperparameters.clone();
        if let Some(name) = &self.hyperparameter {
            let path = self.input_path(name);
            let from_file = read_hyperparameters(&path)
                .with_context(|| format!("Failed to read hyperparameters: {}", path.display()))?;
            params.extend(from_file);
        }
        Ok(params)
    }
}

pub fn validate_input_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        anyhow::bail!("File does not exist: {}", path.display());
    }
    Ok(())
}
