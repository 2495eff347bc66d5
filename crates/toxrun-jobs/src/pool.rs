//! Bounded parallel execution of a run's jobs.
//!
//! Every job gets its own task; a semaphore caps how many hold a process
//! at once. The permit covers process execution only: a job waiting out
//! the cleanup race does not block a sibling from starting. All tasks are
//! awaited before the pool returns, and a task that dies is recorded as a
//! launch failure for its endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{instrument, warn};

use toxrun_core::obs;
use toxrun_core::{Job, JobOutcome, RecoveryPolicy};

use crate::recovery::{reclassify, Sleeper, TokioSleeper};
use crate::runner::JobExecutor;

/// Fixed-size worker pool over a [`JobExecutor`].
#[derive(Clone)]
pub struct JobPool {
    workers: usize,
    executor: Arc<dyn JobExecutor>,
    sleeper: Arc<dyn Sleeper>,
    recovery: RecoveryPolicy,
}

impl JobPool {
    /// A pool of `workers` slots (at least one).
    pub fn new(workers: usize, executor: Arc<dyn JobExecutor>) -> Self {
        Self {
            workers: workers.max(1),
            executor,
            sleeper: Arc::new(TokioSleeper),
            recovery: RecoveryPolicy::default(),
        }
    }

    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every job and return one outcome per endpoint.
    #[instrument(skip_all, fields(jobs = jobs.len(), workers = self.workers))]
    pub async fn run_all(&self, jobs: Vec<Job>) -> BTreeMap<String, JobOutcome> {
        let sem = Arc::new(Semaphore::new(self.workers));

        let mut tasks = Vec::with_capacity(jobs.len());
        for job in &jobs {
            let job = job.clone();
            let sem = Arc::clone(&sem);
            let executor = Arc::clone(&self.executor);
            let sleeper = Arc::clone(&self.sleeper);
            let recovery = self.recovery;

            tasks.push(tokio::spawn(async move {
                let permit = sem.acquire_owned().await.ok();
                obs::emit_job_started(&job.endpoint, &job.command);
                let mut outcome = executor.execute(&job).await;
                drop(permit);

                if !outcome.succeeded() {
                    reclassify(&mut outcome, &recovery, sleeper.as_ref()).await;
                }
                obs::emit_job_finished(&outcome);
                outcome
            }));
        }

        let started = Instant::now();
        let joined = join_all(tasks).await;

        let mut outcomes = BTreeMap::new();
        for (job, result) in jobs.iter().zip(joined) {
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(endpoint = %job.endpoint, error = %e, "job task did not complete");
                    JobOutcome::launch_failed(job, format!("job task failed: {e}"), started.elapsed())
                }
            };
            outcomes.insert(job.endpoint.clone(), outcome);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use toxrun_core::LAUNCH_FAILED_EXIT_CODE;

    fn jobs(endpoints: &[&str]) -> Vec<Job> {
        endpoints
            .iter()
            .map(|ep| Job {
                endpoint: ep.to_string(),
                command: vec!["true".to_string()],
                working_dir: PathBuf::from("."),
                artifact_path: PathBuf::from(format!("/nonexistent/{ep}.csv")),
                virtual_display: false,
            })
            .collect()
    }

    /// Tracks the peak number of concurrent executions.
    #[derive(Default)]
    struct GaugeExecutor {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl JobExecutor for GaugeExecutor {
        async fn execute(&self, job: &Job) -> JobOutcome {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            JobOutcome::new(job, 0, String::new(), String::new(), Duration::from_millis(20))
        }
    }

    struct PanickingExecutor;

    #[async_trait]
    impl JobExecutor for PanickingExecutor {
        async fn execute(&self, job: &Job) -> JobOutcome {
            if job.endpoint == "BP" {
                panic!("executor blew up");
            }
            JobOutcome::new(job, 0, String::new(), String::new(), Duration::ZERO)
        }
    }

    #[tokio::test]
    async fn test_concurrency_bounded_by_workers() {
        let executor = Arc::new(GaugeExecutor::default());
        let pool = JobPool::new(2, executor.clone());
        let outcomes = pool.run_all(jobs(&["A", "B", "C", "D", "E"])).await;

        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.values().all(JobOutcome::succeeded));
        let peak = executor.peak.load(Ordering::SeqCst);
        assert_eq!(peak, 2, "jobs should overlap up to the pool size");
    }

    #[tokio::test]
    async fn test_zero_workers_clamped() {
        let pool = JobPool::new(0, Arc::new(GaugeExecutor::default()));
        assert_eq!(pool.workers(), 1);
        assert_eq!(pool.run_all(jobs(&["A", "B"])).await.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let pool = JobPool::new(4, Arc::new(GaugeExecutor::default()));
        assert!(pool.run_all(Vec::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_job_isolated() {
        let pool = JobPool::new(3, Arc::new(PanickingExecutor));
        let outcomes = pool.run_all(jobs(&["LC50", "BP", "MP"])).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes["BP"].exit_code, LAUNCH_FAILED_EXIT_CODE);
        assert!(outcomes["BP"].stderr.contains("job task failed"));
        assert!(outcomes["LC50"].succeeded());
        assert!(outcomes["MP"].succeeded());
    }
}
