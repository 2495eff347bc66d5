//! Reclassification of jobs hit by the virtual-display cleanup race.
//!
//! `xvfb-run` sometimes fails to kill its X server because the server has
//! already exited, and reports exit code 1 even though the wrapped tool
//! finished and wrote its artifact. Such a job is polled for its artifact
//! for a bounded time and reclassified as successful if it shows up.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use toxrun_core::artifact::artifact_ready;
use toxrun_core::obs;
use toxrun_core::{JobOutcome, RecoveryPolicy};

/// Note recorded in stderr when a job is reclassified.
pub const RECOVERED_NOTE: &str = "virtual display cleanup error ignored; artifact present";

/// Localised "no such process" messages seen from the launcher.
fn cleanup_race_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"No such process|No existe el proceso")
            .unwrap_or_else(|e| unreachable!("static pattern is valid: {e}"))
    })
}

/// Whether a failed outcome matches the cleanup race signature.
pub fn is_cleanup_race(outcome: &JobOutcome) -> bool {
    outcome.exit_code == 1
        && outcome.stderr.contains("kill:")
        && cleanup_race_pattern().is_match(&outcome.stderr)
}

/// Sleeps between artifact checks. Injected so tests run without waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeping on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Where a failed job ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// Not a cleanup race; the failure stands.
    Failed,
    /// Still polling; `attempt` checks done so far.
    Polling { attempt: u32 },
    /// Artifact appeared after `attempts` checks.
    Recovered { attempts: u32 },
    /// Window elapsed with no usable artifact.
    Exhausted,
}

/// Reclassify `outcome` in place if it is a cleanup race whose artifact
/// becomes ready within the policy window. Each check is preceded by a
/// sleep of one poll interval.
pub async fn reclassify(
    outcome: &mut JobOutcome,
    policy: &RecoveryPolicy,
    sleeper: &dyn Sleeper,
) -> RecoveryState {
    if !is_cleanup_race(outcome) {
        return RecoveryState::Failed;
    }

    let mut state = RecoveryState::Polling { attempt: 0 };
    while let RecoveryState::Polling { attempt } = state {
        if attempt >= policy.max_attempts {
            state = RecoveryState::Exhausted;
            break;
        }
        sleeper.sleep(policy.interval()).await;
        let attempt = attempt + 1;
        state = if artifact_ready(&outcome.artifact_path) {
            RecoveryState::Recovered { attempts: attempt }
        } else {
            RecoveryState::Polling { attempt }
        };
    }

    match state {
        RecoveryState::Recovered { attempts } => {
            outcome.exit_code = 0;
            outcome.recovered = true;
            outcome.stderr = RECOVERED_NOTE.to_string();
            obs::emit_job_recovered(&outcome.endpoint, attempts);
        }
        _ => {
            debug!(
                endpoint = %outcome.endpoint,
                window_ms = policy.window().as_millis() as u64,
                "cleanup race without artifact, failure stands"
            );
        }
    }
    state
}
