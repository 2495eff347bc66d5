//! Terminal aggregate of a run.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::JobOutcome;
use super::molecule::Molecule;

/// Schema version of the JSON report.
pub const REPORT_VERSION: &str = "1.0";

/// Run-level information recorded in the report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    pub version: String,
    pub tool: String,
    pub tool_version: String,
    pub timestamp: DateTime<Utc>,
    pub endpoint_count: usize,
    pub endpoints_requested: Vec<String>,
    pub workers: usize,
    pub timeout_sec: Option<u64>,
    pub wait_timeout_sec: u64,
    pub virtual_display: bool,
    pub duration_ms: u64,
    /// The raw endpoint subset string, when one was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculate: Option<String>,
}

/// Per-endpoint summary of a job, kept for post-hoc debugging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSummary {
    pub artifact: String,
    pub exit_code: i32,
    pub status: String,
    pub duration_ms: u64,
    pub recovered: bool,
}

impl From<&JobOutcome> for JobSummary {
    fn from(outcome: &JobOutcome) -> Self {
        Self {
            artifact: outcome
                .artifact_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            exit_code: outcome.exit_code,
            status: outcome.status_label().to_string(),
            duration_ms: outcome.duration_ms,
            recovered: outcome.recovered,
        }
    }
}

/// Temporary-artifact facts. Never used for control flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunDiagnostics {
    pub tmpdir: PathBuf,
    pub run_token: String,
    pub input_file: PathBuf,
    pub input_filename: String,
    pub input_file_exists: bool,
    pub output_dir: PathBuf,
    pub output_dir_exists: bool,
    pub output_files_count: usize,
    /// Whether every successful job's artifact was present when waiting ended.
    pub artifacts_ready: bool,
    /// Whether the temporary directory is kept after the run.
    pub kept: bool,
    pub note: String,
    #[serde(default)]
    pub jobs: BTreeMap<String, JobSummary>,
}

/// Everything a run produced: ordered molecules, metadata, diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    pub metadata: RunMetadata,
    pub diagnostics: RunDiagnostics,
    pub molecules: Vec<Molecule>,
}

impl RunResult {
    /// Assemble the aggregate, ordering molecules by index.
    pub fn new(metadata: RunMetadata, diagnostics: RunDiagnostics, mut molecules: Vec<Molecule>) -> Self {
        molecules.sort_by_key(|m| m.index);
        Self {
            metadata,
            diagnostics,
            molecules,
        }
    }

    /// Plain JSON form of the run.
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_orders_molecules() {
        let molecules = vec![Molecule::new(3, "C"), Molecule::new(1, "CCO"), Molecule::new(2, "CC")];
        let result = RunResult::new(fixtures::metadata(&["BP"]), fixtures::diagnostics(), molecules);
        let order: Vec<usize> = result.molecules.iter().map(|m| m.index).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(result.molecules[1].smiles, "CC");
    }

    #[test]
    fn test_top_level_keys() {
        let result = RunResult::new(fixtures::metadata(&["BP"]), fixtures::diagnostics(), vec![]);
        let v = result.to_value().unwrap();
        let obj = v.as_object().expect("top-level object");
        for key in &["metadata", "diagnostics", "molecules"] {
            assert!(obj.contains_key(*key), "missing key: {}", key);
        }
        assert!(v["metadata"].get("calculate").is_none());
    }

    #[test]
    fn test_job_summary_from_outcome() {
        let outcome = JobOutcome {
            endpoint: "BP".to_string(),
            artifact_path: PathBuf::from("/tmp/out/pred_x_BP.csv"),
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 42,
            recovered: true,
        };
        let summary = JobSummary::from(&outcome);
        assert_eq!(summary.artifact, "pred_x_BP.csv");
        assert_eq!(summary.status, "recovered");
        assert!(summary.recovered);
    }
}
