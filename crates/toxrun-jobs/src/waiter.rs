//! Waiting for output artifacts after the jobs have returned.
//!
//! Some tool builds flush their output table slightly after the process
//! exits. The waiter polls until every expected artifact exists with
//! nonzero size, or the deadline passes.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use toxrun_core::artifact::artifact_ready;

/// Result of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitReport {
    pub ready: bool,
    /// Number of readiness checks made.
    pub polls: u32,
}

pub struct ArtifactWaiter {
    paths: Vec<PathBuf>,
    timeout: Duration,
    poll_interval: Duration,
}

impl ArtifactWaiter {
    pub fn new(paths: Vec<PathBuf>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            paths,
            timeout,
            poll_interval,
        }
    }

    fn all_ready(&self) -> bool {
        self.paths.iter().all(|p| artifact_ready(p))
    }

    /// Poll until ready or timed out. A zero timeout checks exactly once; a
    /// timeout too large to represent as an instant never expires.
    pub async fn wait(&self) -> WaitReport {
        let deadline = Instant::now().checked_add(self.timeout);
        let mut polls = 0;
        loop {
            polls += 1;
            if self.all_ready() {
                return WaitReport { ready: true, polls };
            }
            let expired = deadline.is_some_and(|d| Instant::now() >= d);
            if self.timeout.is_zero() || expired {
                return WaitReport { ready: false, polls };
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_no_paths_ready_immediately() {
        let report = ArtifactWaiter::new(vec![], Duration::from_secs(5), Duration::from_millis(10))
            .wait()
            .await;
        assert_eq!(report, WaitReport { ready: true, polls: 1 });
    }

    #[tokio::test]
    async fn test_zero_timeout_checks_once() {
        let dir = tempfile::tempdir().unwrap();
        let report = ArtifactWaiter::new(
            vec![dir.path().join("absent.csv")],
            Duration::ZERO,
            Duration::from_millis(10),
        )
        .wait()
        .await;
        assert_eq!(report, WaitReport { ready: false, polls: 1 });
    }

    #[tokio::test]
    async fn test_ready_when_all_present() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        fs::write(&a, "x").unwrap();
        fs::write(&b, "y").unwrap();
        let report = ArtifactWaiter::new(vec![a, b], Duration::from_secs(1), Duration::from_millis(10))
            .wait()
            .await;
        assert!(report.ready);
    }

    #[tokio::test]
    async fn test_times_out_on_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        fs::write(&a, "").unwrap();
        let report = ArtifactWaiter::new(vec![a], Duration::from_millis(100), Duration::from_millis(20))
            .wait()
            .await;
        assert!(!report.ready);
        assert!(report.polls >= 2);
    }

    #[tokio::test]
    async fn test_picks_up_late_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let writer_path = a.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fs::write(writer_path, "Index,Pred_Value\n").unwrap();
        });

        let report = ArtifactWaiter::new(vec![a], Duration::from_secs(5), Duration::from_millis(10))
            .wait()
            .await;
        writer.await.unwrap();
        assert!(report.ready);
        assert!(report.polls > 1);
    }

    #[tokio::test]
    async fn test_unbounded_timeout_does_not_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let writer_path = a.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fs::write(writer_path, "Index,Pred_Value\n1,2.5\n").unwrap();
        });

        let report = ArtifactWaiter::new(
            vec![a],
            Duration::from_secs(u64::MAX),
            Duration::from_millis(10),
        )
        .wait()
        .await;
        writer.await.unwrap();
        assert!(report.ready);
    }
}
