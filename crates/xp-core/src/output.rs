//! Serialization of aggregated records.
//!
//! Tables are written with the `csv` crate. Columns are the union of record
//! keys in first-seen order, seeded with the rule's declared columns so an
//! empty table still carries a header. Missing and `null` values are empty
//! cells; nested values are written as compact JSON.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::rules::{OutputKind, Record, Rule};

/// Errors while writing output artifacts.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Union of `seed` and every record's keys, in first-seen order.
pub fn columns(seed: &[&str], records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    let keys = seed
        .iter()
        .copied()
        .chain(records.iter().flat_map(|r| r.keys().map(String::as_str)));
    for key in keys {
        if !columns.iter().any(|c| c == key) {
            columns.push(key.to_string());
        }
    }
    columns
}

/// Renders one value as a table cell.
pub fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Writes records as comma-separated text with a header row.
pub fn write_table<W: Write>(writer: W, seed: &[&str], records: &[Record]) -> Result<(), OutputError> {
    let header = columns(seed, records);
    let mut csv = csv::Writer::from_writer(writer);
    if !header.is_empty() {
        csv.write_record(&header)?;
    }
    for record in records {
        csv.write_record(header.iter().map(|column| cell(record.get(column))))?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Writes records as a JSON array of objects.
pub fn write_json<W: Write>(writer: W, records: &[Record]) -> Result<(), OutputError> {
    serde_json::to_writer(writer, records)?;
    Ok(())
}

/// Writes `<dir>/<rule>.<ext>` and returns its path.
pub fn write_rule_output(dir: &Path, rule: &Rule, records: &[Record]) -> Result<PathBuf, OutputError> {
    let path = dir.join(rule.file_name());
    let io_err = |source| OutputError::Io {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(dir).map_err(io_err)?;
    let mut writer = BufWriter::new(File::create(&path).map_err(io_err)?);
    match rule.kind {
        OutputKind::Table => write_table(&mut writer, rule.columns, records)?,
        OutputKind::Json => write_json(&mut writer, records)?,
    }
    writer.flush().map_err(io_err)?;

    tracing::debug!(path = %path.display(), rows = records.len(), "wrote rule output");
    Ok(path)
}
