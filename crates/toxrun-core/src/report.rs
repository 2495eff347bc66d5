//! Report writers: pretty JSON and a flattened per-molecule CSV.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use tracing::debug;

use crate::domain::{EndpointOutcome, RunResult};
use crate::error::Result;

/// Destination names that mean standard output.
const STDOUT_NAMES: [&str; 2] = ["-", "stdout"];

/// Cell text for an endpoint with an error and no value.
pub const CSV_ERROR: &str = "ERROR";
/// Cell text for an endpoint with neither value nor error.
pub const CSV_NA: &str = "NA";

pub fn is_stdout(dest: &str) -> bool {
    STDOUT_NAMES.contains(&dest)
}

pub fn to_json_pretty(result: &RunResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn from_json_str(text: &str) -> Result<RunResult> {
    Ok(serde_json::from_str(text)?)
}

/// Write the JSON report to `dest`, or to stdout for `-`/`stdout`.
pub fn write_json(result: &RunResult, dest: &str) -> Result<()> {
    let mut text = to_json_pretty(result)?;
    text.push('\n');

    if is_stdout(dest) {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(text.as_bytes())?;
        handle.flush()?;
    } else {
        std::fs::write(dest, text)?;
        debug!(path = %dest, "wrote JSON report");
    }
    Ok(())
}

/// Columns of the CSV report: `SMILES` then the requested endpoints, sorted.
pub fn csv_header(result: &RunResult) -> Vec<String> {
    let mut endpoints = result.metadata.endpoints_requested.clone();
    endpoints.sort();
    endpoints.dedup();

    let mut header = Vec::with_capacity(endpoints.len() + 1);
    header.push("SMILES".to_string());
    header.extend(endpoints);
    header
}

fn csv_cell(outcome: Option<&EndpointOutcome>) -> String {
    match outcome {
        Some(EndpointOutcome {
            value: Some(value), ..
        }) => value.to_string(),
        Some(EndpointOutcome { error: Some(_), .. }) => CSV_ERROR.to_string(),
        _ => CSV_NA.to_string(),
    }
}

/// Flatten the run into header plus one row per molecule, in index order.
pub fn csv_table(result: &RunResult) -> Vec<Vec<String>> {
    let header = csv_header(result);
    let mut table = Vec::with_capacity(result.molecules.len() + 1);

    for molecule in &result.molecules {
        let mut row = Vec::with_capacity(header.len());
        row.push(molecule.smiles.clone());
        for endpoint in &header[1..] {
            row.push(csv_cell(molecule.property(endpoint)));
        }
        table.push(row);
    }

    table.insert(0, header);
    table
}

pub fn write_csv_to<W: Write>(result: &RunResult, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in csv_table(result) {
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the CSV report to a file.
pub fn write_csv(result: &RunResult, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_csv_to(result, file)?;
    debug!(path = %path.display(), rows = result.molecules.len(), "wrote CSV report");
    Ok(())
}
