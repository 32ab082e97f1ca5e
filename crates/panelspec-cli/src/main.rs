use std::path::PathBuf;

use anyhow::Result;
use clap::ArgMatches;
use log::LevelFilter;

use panelspec_classifiers::models::registry::ClassifierRegistry;
use panelspec_cli::cli::build_cli;
use panelspec_cli::specificity::input::SpecificityRunConfig;
use panelspec_cli::specificity::runner::run_specificity;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("PANELSPEC_LOG", "error,panelspec=info"))
        .init();

    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("specificity", sub_m)) => handle_specificity(sub_m),
        Some(("classifiers", _)) => {
            list_classifiers();
            Ok(())
        }
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_specificity(matches: &ArgMatches) -> Result<()> {
    let config_path: Option<&PathBuf> = matches.get_one("config");
    if let Some(path) = config_path {
        log::info!("[panelspec::specificity] Using config: {:?}", path);
    }
    let config = SpecificityRunConfig::from_arguments(config_path, matches)?;

    match run_specificity(&config) {
        Ok(output) => {
            if !output.table.is_complete() {
                log::warn!(
                    "{} (seed, group) evaluation(s) were recorded as missing",
                    output.table.failures.len()
                );
            }
            eprintln!(
                "[panelspec::specificity] Wrote {}",
                output.result_path.display()
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Specificity run failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn list_classifiers() {
    let registry = ClassifierRegistry::default();
    for name in registry.names() {
        let params = match registry.configure(name, &Default::default()) {
            Ok(config) => config
                .model_type
                .schema()
                .iter()
                .map(|(param, _)| match config.model_type.param(param) {
                    Some(value) => format!("{}={}", param, value),
                    None => param.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" "),
            Err(_) => String::new(),
        };
        println!("{}\t{}", name, params);
    }
}
