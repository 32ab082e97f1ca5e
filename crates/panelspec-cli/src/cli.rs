use std::path::PathBuf;

use clap::{Arg, ArgAction, Command, ValueHint};

fn input_arg(id: &'static str, long: &'static str, short: char, help: &'static str) -> Arg {
    Arg::new(id)
        .short(short)
        .long(long)
        .help(help)
        .value_parser(clap::builder::NonEmptyStringValueParser::new())
        .value_hint(ValueHint::FilePath)
}

fn param_arg(id: &'static str, long: &'static str, short: char, help: &'static str) -> Arg {
    Arg::new(id)
        .short(short)
        .long(long)
        .help(help)
        .value_parser(clap::builder::NonEmptyStringValueParser::new())
}

/// The `panelspec` command line.
pub fn build_cli() -> Command {
    Command::new("panelspec")
        .version(clap::crate_version!())
        .about("\u{1F9EC} panelspec - cross-cohort specificity of biomarker panels")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("specificity")
                .about("Evaluate a biomarker panel against every group of an external dataset")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .help("JSON run configuration; command line flags override its values")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("workplace")
                        .short('W')
                        .long("workplace")
                        .help("Directory holding the input files; outputs are written here too")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(input_arg(
                    "profile",
                    "profile",
                    'p',
                    "Table of the selected panel; its header names the panel features",
                ))
                .arg(input_arg(
                    "other_metadata",
                    "other-metadata",
                    'a',
                    "External metadata table (sample id in the first column)",
                ))
                .arg(input_arg(
                    "other_profile",
                    "other-profile",
                    'x',
                    "External feature profile (sample id in the first column)",
                ))
                .arg(param_arg(
                    "exposure",
                    "exposure",
                    'e',
                    "Reference (control) group label",
                ))
                .arg(param_arg(
                    "group",
                    "group",
                    'g',
                    "Metadata column holding the group label",
                ))
                .arg(param_arg(
                    "batch",
                    "batch",
                    'b',
                    "Metadata column holding the cohort (dataset) id",
                ))
                .arg(param_arg(
                    "classifier",
                    "classifier",
                    'c',
                    "Classifier family: LRl1, LRl2, DT, RF, GB, KNN or SVC (with the linfa feature)",
                ))
                .arg(input_arg(
                    "hyperparameter",
                    "hyperparameter",
                    'r',
                    "File of tuned hyperparameters, one 'name value' pair per line (SVC accepts scikit-learn's gamma)",
                ))
                .arg(
                    Arg::new("seed")
                        .short('s')
                        .long("seed")
                        .help("Random state of the classifier constructors")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(param_arg(
                    "output",
                    "output",
                    'o',
                    "Output file prefix",
                ))
                .arg(
                    Arg::new("folds")
                        .short('k')
                        .long("folds")
                        .help("Number of stratified folds")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("repeats")
                        .short('n')
                        .long("repeats")
                        .help("Number of fold seeds, 1..=n")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(
                    Arg::new("grid_points")
                        .long("grid-points")
                        .help("Points on the FPR grid of the mean ROC curve")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("missing_panel_columns")
                        .long("missing-panel-columns")
                        .help("Panel features absent from the external profile")
                        .value_parser(["drop", "error"]),
                )
                .arg(
                    Arg::new("on_unit_failure")
                        .long("on-unit-failure")
                        .help("A failing (seed, group) evaluation aborts the run or leaves its cell empty")
                        .value_parser(["abort", "record-missing"]),
                )
                .arg(
                    Arg::new("parallel")
                        .long("parallel")
                        .help("Evaluate (seed, group) units in parallel")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("no_report")
                        .long("no-report")
                        .help("Skip the HTML report")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("classifiers").about("List the registered classifier families and their hyperparameters"),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
}
