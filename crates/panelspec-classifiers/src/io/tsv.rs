//! Tab-separated readers and writers for profiles, metadata and results.
//!
//! Tables are row-indexed: the first field of every row is the sample id.
//! A header with one field fewer than the rows (no name for the id column)
//! is accepted as well.
use std::io::{BufRead, BufReader};
use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;
use ndarray::Array2;

use crate::config::{HyperValue, Hyperparameters};
use crate::data_handling::{FeatureTable, MetadataTable};
use crate::specificity::SpecificityTable;

/// Cell values read as missing in a numeric profile.
const MISSING_VALUES: &[&str] = &["", "NA", "NaN", "nan", "N/A", "null"];

struct RawTable {
    columns: Vec<String>,
    ids: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn reader_for(path: &Path) -> Result<csv::Reader<File>> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open table: {}", path.display()))
}

fn header_columns(headers: &StringRecord, row_width: Option<usize>) -> Vec<String> {
    let all: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
    match row_width {
        Some(width) if width == all.len() + 1 => all,
        _ => all.into_iter().skip(1).collect(),
    }
}

fn read_raw_table(path: &Path) -> Result<RawTable> {
    let mut reader = reader_for(path)?;
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header row of {}", path.display()))?
        .clone();

    let mut columns = None;
    let mut ids = Vec::new();
    let mut rows = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        let columns = columns.get_or_insert_with(|| header_columns(&headers, Some(record.len())));
        if record.len() != columns.len() + 1 {
            return Err(anyhow!(
                "Row {} of {} has {} fields, expected {}",
                row_idx + 1,
                path.display(),
                record.len(),
                columns.len() + 1
            ));
        }
        let mut fields = record.iter().map(|f| f.trim().to_string());
        ids.push(fields.next().unwrap_or_default());
        rows.push(fields.collect());
    }

    Ok(RawTable {
        columns: columns.unwrap_or_else(|| header_columns(&headers, None)),
        ids,
        rows,
    })
}

/// Feature names of a panel table; only its header is used.
pub fn read_panel_columns<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let table = read_raw_table(path)?;
    if table.columns.is_empty() {
        return Err(anyhow!("Panel table {} has no feature columns", path.display()));
    }
    Ok(table.columns)
}

/// Read a numeric profile; empty and NA-like cells become `NaN`.
pub fn read_feature_table<P: AsRef<Path>>(path: P) -> Result<FeatureTable> {
    let path = path.as_ref();
    let table = read_raw_table(path)?;

    let mut values = Vec::with_capacity(table.rows.len() * table.columns.len());
    for (row_idx, row) in table.rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            let value = if MISSING_VALUES.contains(&cell.as_str()) {
                f64::NAN
            } else {
                cell.parse::<f64>().with_context(|| {
                    format!(
                        "Invalid value '{}' for feature '{}' of sample '{}'",
                        cell, table.columns[col_idx], table.ids[row_idx]
                    )
                })?
            };
            values.push(value);
        }
    }

    let x = Array2::from_shape_vec((table.rows.len(), table.columns.len()), values)
        .context("Failed to build feature matrix")?;
    log::debug!(
        "Read {} samples x {} features from {}",
        x.nrows(),
        x.ncols(),
        path.display()
    );
    Ok(FeatureTable::new(table.ids, table.columns, x)?)
}

/// Read string-valued sample annotations.
pub fn read_metadata_table<P: AsRef<Path>>(path: P) -> Result<MetadataTable> {
    let path = path.as_ref();
    let table = read_raw_table(path)?;
    log::debug!(
        "Read metadata for {} samples ({} columns) from {}",
        table.ids.len(),
        table.columns.len(),
        path.display()
    );
    Ok(MetadataTable::new(table.ids, table.columns, table.rows)?)
}

/// Parse `name value` lines; blank lines and `#` comments are skipped.
///
/// Values parse as integers when possible, then as floats; a missing value
/// or `None` restores the classifier default.
pub fn read_hyperparameters<P: AsRef<Path>>(path: P) -> Result<Hyperparameters> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open hyperparameter file: {}", path.display()))?;

    let mut params = Hyperparameters::new();
    for (line_idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_idx + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let name = fields.next().unwrap_or_default();
        let raw = fields.next().unwrap_or_default();
        if fields.next().is_some() {
            return Err(anyhow!(
                "Line {} of {}: expected 'name value', got '{}'",
                line_idx + 1,
                path.display(),
                line
            ));
        }
        let value: HyperValue = raw.parse().map_err(|e| {
            anyhow!("Line {}: invalid value for '{}': {}", line_idx + 1, name, e)
        })?;
        params.insert(name.to_string(), value);
    }
    Ok(params)
}

/// Write the seed x group table; failed cells are left empty.
pub fn write_specificity_table<P: AsRef<Path>>(path: P, table: &SpecificityTable) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut header = vec!["seed".to_string()];
    header.extend(table.groups.iter().cloned());
    writer.write_record(&header)?;

    for (seed, row) in table.seeds.iter().zip(&table.values) {
        let mut record = vec![seed.to_string()];
        record.extend(row.iter().map(|v| v.map(|v| v.to_string()).unwrap_or_default()));
        writer.write_record(&record)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
