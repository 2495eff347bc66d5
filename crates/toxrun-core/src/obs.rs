//! Structured lifecycle events for a run.
//!
//! Every event carries an `event` field (`run.started`, `job.finished`, ...)
//! so log pipelines can filter on it. All of them are emitted inside the
//! span from [`run_span`], which tags lines with the run token.

use tracing::{info, warn};

use crate::domain::JobOutcome;

/// Span carrying the run token. Attach it to the run future with
/// [`tracing::Instrument`] so it survives across await points.
///
/// ```ignore
/// runner.execute(token).instrument(run_span(&token)).await
/// // every log line inside carries run_token=3f9a01bc
/// ```
pub fn run_span(run_token: &str) -> tracing::Span {
    tracing::info_span!("toxrun.run", run_token = %run_token)
}

pub fn emit_run_started(run_token: &str, molecules: usize, endpoints: usize, workers: usize) {
    info!(
        event = "run.started",
        run_token = %run_token,
        molecules = molecules,
        endpoints = endpoints,
        workers = workers,
    );
}

pub fn emit_job_started(endpoint: &str, command: &[String]) {
    info!(event = "job.started", endpoint = %endpoint, command = %command.join(" "));
}

/// Emit event: a job finished, whatever its exit code.
pub fn emit_job_finished(outcome: &JobOutcome) {
    if outcome.succeeded() {
        info!(
            event = "job.finished",
            endpoint = %outcome.endpoint,
            exit_code = outcome.exit_code,
            status = outcome.status_label(),
            duration_ms = outcome.duration_ms,
        );
    } else {
        warn!(
            event = "job.finished",
            endpoint = %outcome.endpoint,
            exit_code = outcome.exit_code,
            status = outcome.status_label(),
            duration_ms = outcome.duration_ms,
            stderr = %tail(&outcome.stderr, 400),
        );
    }
}

/// Emit event: a failed job was reclassified because its artifact showed up.
pub fn emit_job_recovered(endpoint: &str, attempts: u32) {
    info!(event = "job.recovered", endpoint = %endpoint, attempts = attempts);
}

pub fn emit_artifacts_waited(expected: usize, ready: bool, polls: u32) {
    if ready {
        info!(event = "artifacts.waited", expected = expected, ready = ready, polls = polls);
    } else {
        warn!(event = "artifacts.waited", expected = expected, ready = ready, polls = polls);
    }
}

pub fn emit_run_finished(run_token: &str, duration_ms: u64, molecules: usize, failed_jobs: usize) {
    info!(
        event = "run.finished",
        run_token = %run_token,
        duration_ms = duration_ms,
        molecules = molecules,
        failed_jobs = failed_jobs,
    );
}

/// Emit event: the temporary directory could not be removed (warning level).
pub fn emit_cleanup_error(path: &std::path::Path, error: &dyn std::fmt::Display) {
    warn!(event = "run.cleanup_error", path = %path.display(), error = %error);
}

fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text.trim_end();
    }
    let start = text
        .char_indices()
        .nth(count - max_chars)
        .map(|(i, _)| i)
        .unwrap_or(0);
    text[start..].trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let _entered = run_span("deadbeef").entered();
        emit_run_started("deadbeef", 2, 3, 6);
    }

    #[test]
    fn test_tail_keeps_end() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("ab\n", 10), "ab");
        assert_eq!(tail("ééé", 2), "éé");
    }
}
