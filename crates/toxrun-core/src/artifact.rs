//! Output artifact probing and parsing.
//!
//! The prediction tool writes either a comma-separated table whose header
//! names the columns (`Index`, one or more `Pred*` columns, optionally
//! `Error`) or free text when something went wrong before it could emit a
//! table. A first line containing a comma is the only signal used to tell
//! the two apart.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One data row keyed by header name, in column order.
pub type ArtifactRow = IndexMap<String, String>;

/// Parsed content of an output artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ParsedArtifact {
    /// Delimited table, one entry per data row.
    Csv(Vec<ArtifactRow>),

    /// Opaque text blob.
    Text(String),
}

impl ParsedArtifact {
    /// Table rows, when the artifact is a table with at least one row.
    pub fn rows(&self) -> Option<&[ArtifactRow]> {
        match self {
            ParsedArtifact::Csv(rows) if !rows.is_empty() => Some(rows),
            _ => None,
        }
    }
}

/// Whether an artifact exists as a regular file.
pub fn artifact_exists(path: &Path) -> bool {
    path.is_file()
}

/// Whether an artifact exists as a regular file with nonzero size.
pub fn artifact_ready(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Read and classify an artifact. Invalid UTF-8 is replaced, not rejected.
pub fn parse_artifact(path: &Path) -> Result<ParsedArtifact> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    parse_artifact_text(text)
}

/// Classify artifact content already in memory.
pub fn parse_artifact_text(text: String) -> Result<ParsedArtifact> {
    let first_line = text.split('\n').next().unwrap_or_default();
    if !first_line.contains(',') {
        return Ok(ParsedArtifact::Text(text));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        // Short rows simply lack the trailing columns; extra fields have no
        // header to attach to and are dropped.
        let row: ArtifactRow = headers
            .iter()
            .zip(record.iter())
            .map(|(column, field)| (column.to_string(), field.to_string()))
            .collect();
        rows.push(row);
    }

    Ok(ParsedArtifact::Csv(rows))
}

/// Read the 1-based `Index` column of a row; anything unparseable is 0,
/// which never matches a molecule.
pub fn row_index(row: &ArtifactRow) -> usize {
    row.get("Index")
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .unwrap_or(0)
}
