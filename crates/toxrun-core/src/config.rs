//! Run configuration.
//!
//! Defaults are plain constants; the orchestrator only ever sees an explicit
//! [`RunConfig`] value.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToxError};

/// Default size of the job worker pool.
pub const DEFAULT_WORKERS: usize = 6;

/// Default upper bound on waiting for output artifacts (one hour).
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 3600;

/// Default poll interval used while waiting for artifacts.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Directory created under the current working directory when no temp root
/// is given.
pub const DEFAULT_TMP_DIR_NAME: &str = ".toxrun_tmp";

/// Polling policy for reclassifying a failed job whose artifact may still
/// show up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Delay before each artifact check (milliseconds).
    pub poll_interval_ms: u64,
    /// Number of checks before giving up.
    pub max_attempts: u32,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_attempts: 20,
        }
    }
}

impl RecoveryPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Total time the policy is willing to wait.
    pub fn window(&self) -> Duration {
        self.interval() * self.max_attempts
    }
}

/// Configuration for a single run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Maximum number of external processes running at once.
    pub workers: usize,

    /// Per-job timeout in seconds (`None` = unbounded).
    pub job_timeout_secs: Option<u64>,

    /// Upper bound on waiting for artifacts of successful jobs.
    pub wait_timeout_secs: u64,

    /// Poll interval used by the artifact waiter (milliseconds).
    pub wait_poll_interval_ms: u64,

    /// Parent directory for the per-run temporary directory.
    pub tmp_root: Option<PathBuf>,

    /// Keep the temporary directory after the run.
    pub keep_tmp: bool,

    /// Reclassification policy for the virtual-display cleanup race.
    pub recovery: RecoveryPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            job_timeout_secs: None,
            wait_timeout_secs: DEFAULT_WAIT_TIMEOUT_SECS,
            wait_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            tmp_root: None,
            keep_tmp: false,
            recovery: RecoveryPolicy::default(),
        }
    }
}

impl RunConfig {
    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ToxError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.job_timeout_secs == Some(0) {
            return Err(ToxError::InvalidConfig(
                "per-job timeout must be positive".to_string(),
            ));
        }
        if self.wait_poll_interval_ms == 0 || self.recovery.poll_interval_ms == 0 {
            return Err(ToxError::InvalidConfig(
                "poll intervals must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_poll_interval_ms)
    }

    /// Resolve the temp root to an absolute path, falling back to
    /// `<cwd>/.toxrun_tmp`. Jobs run in the tool home, so relative paths
    /// would point somewhere else.
    pub fn resolved_tmp_root(&self) -> Result<PathBuf> {
        match &self.tmp_root {
            Some(root) if root.is_absolute() => Ok(root.clone()),
            Some(root) => Ok(std::env::current_dir()?.join(root)),
            None => Ok(std::env::current_dir()?.join(DEFAULT_TMP_DIR_NAME)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_default() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.workers, 6);
        assert_eq!(cfg.job_timeout_secs, None);
        assert_eq!(cfg.wait_timeout_secs, 3600);
        assert!(!cfg.keep_tmp);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_recovery_policy_window_is_ten_seconds() {
        let policy = RecoveryPolicy::default();
        assert_eq!(policy.interval(), Duration::from_millis(500));
        assert_eq!(policy.window(), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let cfg = RunConfig {
            workers: 0,
            ..RunConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_zero_job_timeout_rejected() {
        let cfg = RunConfig {
            job_timeout_secs: Some(0),
            ..RunConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_explicit_tmp_root_wins() {
        let cfg = RunConfig {
            tmp_root: Some(PathBuf::from("/var/tmp/toxrun")),
            ..RunConfig::default()
        };
        assert_eq!(
            cfg.resolved_tmp_root().unwrap(),
            PathBuf::from("/var/tmp/toxrun")
        );
    }

    #[test]
    fn test_relative_tmp_root_made_absolute() {
        let cfg = RunConfig {
            tmp_root: Some(PathBuf::from("scratch")),
            ..RunConfig::default()
        };
        let root = cfg.resolved_tmp_root().unwrap();
        assert!(root.is_absolute());
        assert!(root.ends_with("scratch"));
        assert!(RunConfig::default().resolved_tmp_root().unwrap().ends_with(DEFAULT_TMP_DIR_NAME));
    }
}
