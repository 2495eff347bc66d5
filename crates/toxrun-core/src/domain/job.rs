//! Jobs and their execution outcomes.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exit code recorded when a job exceeded its timeout and was killed.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Exit code recorded when a job could not be launched at all.
pub const LAUNCH_FAILED_EXIT_CODE: i32 = -2;

/// Exit code recorded when the process was terminated by a signal.
pub const SIGNALED_EXIT_CODE: i32 = -3;

/// One external invocation computing one endpoint for the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    /// Endpoint id this job computes.
    pub endpoint: String,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Working directory for the process.
    pub working_dir: PathBuf,

    /// Where the tool is expected to write its output table.
    pub artifact_path: PathBuf,

    /// Whether the command is wrapped by a virtual-display launcher.
    pub virtual_display: bool,
}

impl Job {
    /// File name of the expected artifact.
    pub fn artifact_name(&self) -> String {
        self.artifact_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Result of executing one [`Job`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobOutcome {
    /// Endpoint id of the job.
    pub endpoint: String,

    /// Expected artifact path (copied from the job).
    pub artifact_path: PathBuf,

    /// Exit code (0 = success, negative values are sentinels).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,

    /// Whether a reported failure was overridden because the artifact
    /// appeared anyway.
    pub recovered: bool,
}

impl JobOutcome {
    pub fn new(job: &Job, exit_code: i32, stdout: String, stderr: String, elapsed: Duration) -> Self {
        Self {
            endpoint: job.endpoint.clone(),
            artifact_path: job.artifact_path.clone(),
            exit_code,
            stdout,
            stderr,
            duration_ms: elapsed.as_millis() as u64,
            recovered: false,
        }
    }

    /// Outcome for a job that never produced a process result.
    pub fn launch_failed(job: &Job, error: impl Into<String>, elapsed: Duration) -> Self {
        Self::new(
            job,
            LAUNCH_FAILED_EXIT_CODE,
            String::new(),
            error.into(),
            elapsed,
        )
    }

    /// Whether the job counts as successful (exit code 0).
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    pub fn timed_out(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE
    }

    /// Short status label for logs and diagnostics.
    pub fn status_label(&self) -> &'static str {
        match self.exit_code {
            0 if self.recovered => "recovered",
            0 => "ok",
            TIMEOUT_EXIT_CODE => "timeout",
            LAUNCH_FAILED_EXIT_CODE => "launch_failed",
            SIGNALED_EXIT_CODE => "signaled",
            _ => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job {
            endpoint: "LC50".to_string(),
            command: vec!["java".to_string(), "-version".to_string()],
            working_dir: PathBuf::from("."),
            artifact_path: PathBuf::from("/tmp/run/output/pred_abcd1234_LC50.csv"),
            virtual_display: false,
        }
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(job().artifact_name(), "pred_abcd1234_LC50.csv");
    }

    #[test]
    fn test_outcome_success() {
        let outcome = JobOutcome::new(
            &job(),
            0,
            "done".to_string(),
            String::new(),
            Duration::from_millis(1500),
        );
        assert!(outcome.succeeded());
        assert_eq!(outcome.duration_ms, 1500);
        assert_eq!(outcome.status_label(), "ok");
    }

    #[test]
    fn test_launch_failed_sentinel() {
        let outcome = JobOutcome::launch_failed(&job(), "No such file or directory", Duration::ZERO);
        assert!(!outcome.succeeded());
        assert_eq!(outcome.exit_code, LAUNCH_FAILED_EXIT_CODE);
        assert_eq!(outcome.stderr, "No such file or directory");
        assert_eq!(outcome.status_label(), "launch_failed");
    }

    #[test]
    fn test_status_labels() {
        let mut outcome = JobOutcome::new(&job(), TIMEOUT_EXIT_CODE, String::new(), String::new(), Duration::ZERO);
        assert!(outcome.timed_out());
        assert_eq!(outcome.status_label(), "timeout");

        outcome.exit_code = 1;
        assert_eq!(outcome.status_label(), "failed");

        outcome.exit_code = 0;
        outcome.recovered = true;
        assert_eq!(outcome.status_label(), "recovered");
    }
}
