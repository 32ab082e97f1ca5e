use std::path::Path;

use anyhow::{Context, Result};
use maud::html;

use panelspec_classifiers::report::plots::{plot_auc_boxplot, plot_mean_roc};
use panelspec_classifiers::report::{Report, ReportSection};
use panelspec_classifiers::specificity::SpecificityTable;

use crate::specificity::input::SpecificityRunConfig;

fn fmt3(v: f64) -> String {
    format!("{:.3}", v)
}

/// Write the HTML report: AUC distribution, mean ROC curves, failures and configuration.
pub fn write_specificity_report(
    table: &SpecificityTable,
    config: &SpecificityRunConfig,
    panel: &[String],
    path: &Path,
) -> Result<()> {
    let settings = &config.specificity;
    let mut report = Report::new(
        "panelspec",
        clap::crate_version!(),
        None,
        &format!("Panel specificity ({})", settings.classifier),
    );

    /* Section 1: Overview */
    {
        let mut overview_section = ReportSection::new("Overview");
        overview_section.add_content(html! {
            p {
                "Mean cross-validated AUC of the " (panel.len()) "-feature panel for every group against '"
                (settings.cohort.reference_label) "', using only the cohorts ('"
                (settings.cohort.batch_column) "') in which the group was collected. Each point is one of "
                (table.seeds.len()) " seeds of " (settings.evaluation.n_folds) "-fold stratified cross-validation."
            }
        });
        overview_section.add_plot(plot_auc_boxplot(table, "AUC per group"));

        let summaries = table.summaries();
        overview_section.add_content(html! {
            table {
                tr { th { "Group" } th { "n" } th { "Mean" } th { "SD" } th { "Min" } th { "Median" } th { "Max" } }
                @for (group, summary) in &summaries {
                    tr {
                        td { (group) }
                        @if let Some(s) = summary {
                            td { (s.n) } td { (fmt3(s.mean)) } td { (fmt3(s.std_dev)) }
                            td { (fmt3(s.min)) } td { (fmt3(s.median)) } td { (fmt3(s.max)) }
                        } @else {
                            td colspan="6" { "no successful evaluation" }
                        }
                    }
                }
            }
        });
        overview_section.add_plot(plot_mean_roc(table, "Mean ROC curve per group"));
        report.add_section(overview_section);
    }

    /* Section 2: Failures */
    if !table.failures.is_empty() {
        let mut failure_section = ReportSection::new("Failures");
        failure_section.add_content(html! {
            table {
                tr { th { "Seed" } th { "Group" } th { "Error" } }
                @for failure in &table.failures {
                    tr { td { (failure.seed) } td { (failure.group) } td { (failure.error.to_string()) } }
                }
            }
        });
        report.add_section(failure_section);
    }

    /* Section 3: Configuration */
    {
        let mut config_section = ReportSection::new("Configuration");
        config_section.add_content(html! {
            p { "Panel: " (panel.join(", ")) }
            div class="code-container" {
                pre {
                    code { (serde_json::to_string_pretty(config)?) }
                }
            }
        });
        report.add_section(config_section);
    }

    let path_str = path.to_string_lossy();
    report
        .save_to_file(&path_str)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}
