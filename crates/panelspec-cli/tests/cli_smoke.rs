//! CLI binary smoke tests using assert_cmd.
//!
//! These tests exercise the compiled `panelspec` binary to verify that
//! argument parsing, help text, error handling and a full run work
//! end-to-end.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("panelspec").unwrap()
}

/// Two cohorts: CRC vs Control in `b1`, CD vs Control in `b2`.
fn write_workplace(dir: &Path) {
    let mut profile = String::from("sample\tf1\tf2\tf3\n");
    let mut metadata = String::from("sample\tGroup\tBatch\n");
    for i in 0..12 {
        let (group, batch) = match i {
            0..=5 => ("CRC", "b1"),
            _ => ("CD", "b2"),
        };
        let case = format!("case{}", i);
        let control = format!("ctrl{}", i);
        let shift = i as f64 * 0.1;
        profile.push_str(&format!("{}\t{}\t{}\tNA\n", case, 3.0 + shift, 1.0 - shift));
        profile.push_str(&format!("{}\t{}\t{}\t0.5\n", control, 1.0 + shift, 1.2 - shift));
        metadata.push_str(&format!("{}\t{}\t{}\n", case, group, batch));
        metadata.push_str(&format!("{}\tControl\t{}\n", control, batch));
    }
    fs::write(dir.join("panel.txt"), "sample\tf1\tf2\tf_absent\nx\t1\t2\t3\n").unwrap();
    fs::write(dir.join("profile.txt"), profile).unwrap();
    fs::write(dir.join("metadata.txt"), metadata).unwrap();
    fs::write(dir.join("params.txt"), "n_neighbors 3\n").unwrap();
}

fn specificity_args(dir: &Path) -> Vec<String> {
    [
        "specificity",
        "-W",
        dir.to_str().unwrap(),
        "-p",
        "panel.txt",
        "-a",
        "metadata.txt",
        "-x",
        "profile.txt",
        "-e",
        "Control",
        "-g",
        "Group",
        "-b",
        "Batch",
        "-c",
        "KNN",
        "-r",
        "params.txt",
        "-s",
        "0",
        "-o",
        "smoke",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[test]
fn no_args_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_flag() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("specificity"))
        .stdout(predicate::str::contains("classifiers"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("panelspec"));
}

#[test]
fn classifiers_lists_registered_families() {
    cmd()
        .arg("classifiers")
        .assert()
        .success()
        .stdout(predicate::str::contains("LRl1"))
        .stdout(predicate::str::contains("n_neighbors=3"));
}

// ---------------------------------------------------------------------------
// Specificity subcommand
// ---------------------------------------------------------------------------

#[test]
fn specificity_without_inputs_errors() {
    cmd()
        .arg("specificity")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--profile"));
}

#[test]
fn specificity_nonexistent_input_errors() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args(["specificity", "-W"])
        .arg(dir.path())
        .args(["-p", "panel.txt", "-a", "metadata.txt", "-x", "profile.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("File does not exist"));
}

#[test]
fn specificity_unknown_classifier_errors() {
    let dir = tempfile::tempdir().unwrap();
    write_workplace(dir.path());
    let mut args = specificity_args(dir.path());
    let idx = args.iter().position(|a| a == "KNN").unwrap();
    args[idx] = "XGB".to_string();
    cmd().args(&args).assert().failure();
    assert!(!dir.path().join("smoke_specificity_result.txt").exists());
}

#[test]
fn specificity_full_run_writes_table_and_report() {
    let dir = tempfile::tempdir().unwrap();
    write_workplace(dir.path());

    cmd()
        .args(specificity_args(dir.path()))
        .assert()
        .success();

    let table = fs::read_to_string(dir.path().join("smoke_specificity_result.txt")).unwrap();
    let mut lines = table.lines();
    assert_eq!(lines.next(), Some("seed\tCD\tCRC"));
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 10);
    for (i, row) in rows.iter().enumerate() {
        let fields: Vec<&str> = row.split('\t').collect();
        assert_eq!(fields[0], (i + 1).to_string());
        for value in &fields[1..] {
            let auc: f64 = value.parse().unwrap();
            assert!((0.0..=1.0).contains(&auc));
        }
    }

    let report = fs::read_to_string(dir.path().join("smoke_specificity_auc.html")).unwrap();
    assert!(report.contains("AUC per group"));
}

#[test]
fn specificity_no_report_flag() {
    let dir = tempfile::tempdir().unwrap();
    write_workplace(dir.path());

    cmd()
        .args(specificity_args(dir.path()))
        .args(["--no-report", "--repeats", "2", "--parallel"])
        .assert()
        .success();

    let table = fs::read_to_string(dir.path().join("smoke_specificity_result.txt")).unwrap();
    assert_eq!(table.lines().count(), 3);
    assert!(!dir.path().join("smoke_specificity_auc.html").exists());
}
