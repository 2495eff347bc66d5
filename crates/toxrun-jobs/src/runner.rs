//! Process execution for a single job.
//!
//! [`JobExecutor`] is the seam the pool and the orchestrator talk to; the
//! production implementation is [`ProcessExecutor`]. Executors never fail:
//! every way a job can go wrong is folded into the returned [`JobOutcome`].

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

use toxrun_core::{Job, JobOutcome, SIGNALED_EXIT_CODE, TIMEOUT_EXIT_CODE};

/// How long to keep draining pipes after a kill before giving up on them.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs one job to completion.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: &Job) -> JobOutcome;
}

/// Spawns the job's command as a child process.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    timeout: Option<Duration>,
}

impl ProcessExecutor {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    async fn run(&self, job: &Job, start: Instant) -> anyhow::Result<JobOutcome> {
        let (exe, args) = job
            .command
            .split_first()
            .with_context(|| format!("job {} has an empty command", job.endpoint))?;

        let mut command = Command::new(exe);
        command
            .args(args)
            .current_dir(&job.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The child leads its own group so a timeout can take down
        // xvfb-run together with the JVM and X server it started.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to launch {exe}"))?;
        let group = child.id();

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let waited = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
            None => Some(child.wait().await),
        };

        let (exit_code, timed_out) = match waited {
            Some(status) => {
                let status = status.context("failed to wait for child process")?;
                (exit_code(status), false)
            }
            None => {
                // Timed out: kill and reap, then collect what was written so far.
                kill_group(group);
                let _ = child.start_kill();
                let _ = child.wait().await;
                (TIMEOUT_EXIT_CODE, true)
            }
        };

        let stdout = collect(stdout, timed_out).await;
        let mut stderr = collect(stderr, timed_out).await;
        if timed_out {
            let secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
            stderr.push_str(&format!("\nTIMEOUT after {secs}s"));
        }

        Ok(JobOutcome::new(job, exit_code, stdout, stderr, start.elapsed()))
    }
}

#[async_trait]
impl JobExecutor for ProcessExecutor {
    async fn execute(&self, job: &Job) -> JobOutcome {
        let start = Instant::now();
        match self.run(job, start).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(endpoint = %job.endpoint, error = %e, "job could not be run");
                JobOutcome::launch_failed(job, format!("{e:#}"), start.elapsed())
            }
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(SIGNALED_EXIT_CODE)
}

/// SIGKILL every process in the job's group.
#[cfg(unix)]
fn kill_group(group: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = group.and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        debug!(pgid, error = %e, "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_group(_group: Option<u32>) {}

fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    })
}

/// Join a drain task. After a kill, grandchildren may still hold the pipe;
/// give up after [`DRAIN_GRACE`].
async fn collect(handle: JoinHandle<Vec<u8>>, bounded: bool) -> String {
    let bytes = if bounded {
        let abort = handle.abort_handle();
        match tokio::time::timeout(DRAIN_GRACE, handle).await {
            Ok(joined) => joined.unwrap_or_default(),
            Err(_) => {
                abort.abort();
                Vec::new()
            }
        }
    } else {
        handle.await.unwrap_or_default()
    };
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use toxrun_core::LAUNCH_FAILED_EXIT_CODE;

    fn job(command: &[&str]) -> Job {
        Job {
            endpoint: "LC50".to_string(),
            command: command.iter().map(|s| s.to_string()).collect(),
            working_dir: PathBuf::from("."),
            artifact_path: PathBuf::from("/nonexistent/pred_LC50.csv"),
            virtual_display: false,
        }
    }

    #[tokio::test]
    async fn test_execute_simple_command() {
        let outcome = ProcessExecutor::default().execute(&job(&["echo", "hello"])).await;
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.succeeded());
        assert!(outcome.stdout.contains("hello"));
        assert_eq!(outcome.endpoint, "LC50");
    }

    #[tokio::test]
    async fn test_execute_failing_command() {
        let outcome = ProcessExecutor::default().execute(&job(&["false"])).await;
        assert_eq!(outcome.exit_code, 1);
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn test_captures_stderr() {
        let outcome = ProcessExecutor::default()
            .execute(&job(&["sh", "-c", "echo oops >&2; exit 3"]))
            .await;
        assert_eq!(outcome.exit_code, 3);
        assert_eq!(outcome.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_timeout_sentinel() {
        let executor = ProcessExecutor::new(Some(Duration::from_secs(1)));
        let outcome = executor.execute(&job(&["sh", "-c", "echo partial; sleep 30"])).await;
        assert_eq!(outcome.exit_code, TIMEOUT_EXIT_CODE);
        assert!(outcome.timed_out());
        assert!(outcome.stderr.ends_with("TIMEOUT after 1s"));
        assert!(outcome.duration_ms < 10_000);
    }

    /// Whether `pid` is still running (zombies count as gone).
    #[cfg(target_os = "linux")]
    fn process_running(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("grandchild.pid");
        let script = format!("sleep 300 & echo $! > {}; wait", pidfile.display());

        let executor = ProcessExecutor::new(Some(Duration::from_secs(1)));
        let outcome = executor.execute(&job(&["sh", "-c", &script])).await;
        assert!(outcome.timed_out());

        let pid = std::fs::read_to_string(&pidfile).unwrap().trim().to_string();
        let mut running = true;
        for _ in 0..50 {
            running = process_running(&pid);
            if !running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(!running, "grandchild {pid} outlived the timeout");
    }

    #[tokio::test]
    async fn test_launch_failure_sentinel() {
        let outcome = ProcessExecutor::default()
            .execute(&job(&["/definitely/not/a/binary"]))
            .await;
        assert_eq!(outcome.exit_code, LAUNCH_FAILED_EXIT_CODE);
        assert!(outcome.stderr.contains("failed to launch"));
    }

    #[tokio::test]
    async fn test_empty_command_is_launch_failure() {
        let outcome = ProcessExecutor::default().execute(&job(&[])).await;
        assert_eq!(outcome.exit_code, LAUNCH_FAILED_EXIT_CODE);
        assert!(outcome.stderr.contains("empty command"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_sentinel() {
        let outcome = ProcessExecutor::default()
            .execute(&job(&["sh", "-c", "kill -9 $$"]))
            .await;
        assert_eq!(outcome.exit_code, SIGNALED_EXIT_CODE);
    }
}
