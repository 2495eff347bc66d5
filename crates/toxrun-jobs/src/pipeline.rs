//! Run orchestration.
//!
//! One run: write the batch to a private temporary directory, fan one job
//! per endpoint out to the pool, wait for the artifacts of the jobs that
//! succeeded, reconcile everything into molecules and remove the directory
//! unless asked to keep it. Configuration problems fail the run before any
//! job starts; after that, every failure is data in the result.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tempfile::TempDir;
use tracing::{info, Instrument};
use uuid::Uuid;

use toxrun_core::obs;
use toxrun_core::reconcile::{find_endpoint_artifact, reconcile, reconcile_dir};
use toxrun_core::{
    write_smiles_file, EndpointCatalog, Job, JobOutcome, JobSummary, Result, RunConfig,
    RunDiagnostics, RunMetadata, RunResult, ToxError, REPORT_VERSION,
};

use crate::builder::{input_file_name, JobBuilder};
use crate::pool::JobPool;
use crate::recovery::{Sleeper, TokioSleeper};
use crate::runner::{JobExecutor, ProcessExecutor};
use crate::waiter::ArtifactWaiter;

/// Name reported as `metadata.tool`.
pub const TOOL_NAME: &str = "toxrun";

/// Sub-directory of the run directory the tool writes into.
pub const OUTPUT_DIR_NAME: &str = "output";

/// Short random token naming one run's files.
pub fn new_run_token() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(8);
    token
}

/// Drives a complete run.
pub struct ToxRunner {
    builder: JobBuilder,
    catalog: EndpointCatalog,
    config: RunConfig,
    executor: Arc<dyn JobExecutor>,
    sleeper: Arc<dyn Sleeper>,
}

impl ToxRunner {
    /// A runner for the endpoints in `catalog`, executing real processes.
    pub fn new(builder: JobBuilder, catalog: EndpointCatalog, config: RunConfig) -> Self {
        let executor = Arc::new(ProcessExecutor::new(config.job_timeout()));
        Self {
            builder,
            catalog,
            config,
            executor,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn JobExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Run the batch against every endpoint of the catalog.
    pub async fn run(&self, smiles: &[String]) -> Result<RunResult> {
        self.config.validate()?;
        if smiles.is_empty() {
            return Err(ToxError::NoMolecules);
        }
        if self.catalog.is_empty() {
            return Err(ToxError::NoEndpoints);
        }

        let token = new_run_token();
        let span = obs::run_span(&token);
        self.execute(smiles, token).instrument(span).await
    }

    async fn execute(&self, smiles: &[String], token: String) -> Result<RunResult> {
        let start = Instant::now();
        let timestamp = Utc::now();
        let endpoints = self.catalog.ids();
        obs::emit_run_started(&token, smiles.len(), endpoints.len(), self.config.workers);

        let run_dir = create_run_dir(&self.config, &token)?;
        let input_file = run_dir.path().join(input_file_name(&token));
        let output_dir = run_dir.path().join(OUTPUT_DIR_NAME);
        write_smiles_file(smiles, &input_file)?;
        fs::create_dir_all(&output_dir)?;

        let jobs = plan(&self.builder, &self.catalog, &token, run_dir.path());
        let pool = JobPool::new(self.config.workers, Arc::clone(&self.executor))
            .with_recovery(self.config.recovery)
            .with_sleeper(Arc::clone(&self.sleeper));
        let outcomes = pool.run_all(jobs).await;

        let artifacts_ready = self.wait_for_artifacts(&outcomes).await;
        let molecules = reconcile(smiles, &outcomes, &self.catalog);

        let diagnostics = RunDiagnostics {
            tmpdir: run_dir.path().to_path_buf(),
            run_token: token.clone(),
            input_filename: input_file_name(&token),
            input_file_exists: input_file.is_file(),
            input_file,
            output_dir_exists: output_dir.is_dir(),
            output_files_count: count_files(&output_dir),
            output_dir,
            artifacts_ready,
            kept: self.config.keep_tmp,
            note: cleanup_note(self.config.keep_tmp).to_string(),
            jobs: outcomes
                .iter()
                .map(|(endpoint, outcome)| (endpoint.clone(), JobSummary::from(outcome)))
                .collect(),
        };

        finish_run_dir(run_dir, self.config.keep_tmp);

        let duration_ms = start.elapsed().as_millis() as u64;
        let metadata = RunMetadata {
            version: REPORT_VERSION.to_string(),
            tool: TOOL_NAME.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp,
            endpoint_count: endpoints.len(),
            endpoints_requested: endpoints,
            workers: self.config.workers,
            timeout_sec: self.config.job_timeout_secs,
            wait_timeout_sec: self.config.wait_timeout_secs,
            virtual_display: self.builder.virtual_display().is_some(),
            duration_ms,
            calculate: None,
        };

        let failed_jobs = outcomes.values().filter(|o| !o.succeeded()).count();
        obs::emit_run_finished(&token, duration_ms, molecules.len(), failed_jobs);

        Ok(RunResult::new(metadata, diagnostics, molecules))
    }

    /// Wait for the artifacts of the jobs that succeeded.
    async fn wait_for_artifacts(&self, outcomes: &BTreeMap<String, JobOutcome>) -> bool {
        let expected: Vec<PathBuf> = outcomes
            .values()
            .filter(|o| o.succeeded())
            .map(|o| o.artifact_path.clone())
            .collect();
        let count = expected.len();

        let report = ArtifactWaiter::new(
            expected,
            self.config.wait_timeout(),
            self.config.wait_poll_interval(),
        )
        .wait()
        .await;

        obs::emit_artifacts_waited(count, report.ready, report.polls);
        report.ready
    }
}

fn create_run_dir(config: &RunConfig, token: &str) -> Result<TempDir> {
    let root = config.resolved_tmp_root()?;
    fs::create_dir_all(&root).map_err(ToxError::TempDir)?;
    tempfile::Builder::new()
        .prefix(&format!("toxrun_{token}_"))
        .tempdir_in(&root)
        .map_err(ToxError::TempDir)
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .count()
        })
        .unwrap_or(0)
}

fn cleanup_note(keep: bool) -> &'static str {
    if keep {
        "temporary directory kept for inspection"
    } else {
        "temporary directory removed after the run; paths are informational"
    }
}

/// Keep or remove the run directory. Removal failure is only logged.
fn finish_run_dir(run_dir: TempDir, keep: bool) {
    if keep {
        let kept = run_dir.keep();
        info!(path = %kept.display(), "keeping temporary directory");
        return;
    }
    let path = run_dir.path().to_path_buf();
    if let Err(e) = run_dir.close() {
        obs::emit_cleanup_error(&path, &e);
    }
}

/// Build a report from the artifacts an earlier run left in `output_dir`,
/// without launching anything. Nothing is removed afterwards.
pub fn collect_existing(
    smiles: &[String],
    output_dir: &Path,
    catalog: &EndpointCatalog,
) -> Result<RunResult> {
    if smiles.is_empty() {
        return Err(ToxError::NoMolecules);
    }
    if !output_dir.is_dir() {
        return Err(ToxError::InvalidConfig(format!(
            "output directory {} does not exist",
            output_dir.display()
        )));
    }

    let start = Instant::now();
    let timestamp = Utc::now();
    let endpoints = catalog.ids();
    let found = endpoints
        .iter()
        .filter(|ep| find_endpoint_artifact(output_dir, ep).is_some())
        .count();
    let molecules = reconcile_dir(smiles, output_dir, catalog);
    info!(
        output_dir = %output_dir.display(),
        found,
        expected = endpoints.len(),
        "collected existing artifacts"
    );

    let diagnostics = RunDiagnostics {
        tmpdir: output_dir.parent().unwrap_or(output_dir).to_path_buf(),
        run_token: String::new(),
        input_file: PathBuf::new(),
        input_filename: String::new(),
        input_file_exists: false,
        output_dir: output_dir.to_path_buf(),
        output_dir_exists: true,
        output_files_count: count_files(output_dir),
        artifacts_ready: found == endpoints.len(),
        kept: true,
        note: "collected from an existing output directory; no jobs were run".to_string(),
        jobs: BTreeMap::new(),
    };

    let metadata = RunMetadata {
        version: REPORT_VERSION.to_string(),
        tool: TOOL_NAME.to_string(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp,
        endpoint_count: endpoints.len(),
        endpoints_requested: endpoints,
        workers: 0,
        timeout_sec: None,
        wait_timeout_sec: 0,
        virtual_display: false,
        duration_ms: start.elapsed().as_millis() as u64,
        calculate: None,
    };

    Ok(RunResult::new(metadata, diagnostics, molecules))
}

/// The jobs of one run laid out under `run_dir`.
pub fn plan(builder: &JobBuilder, catalog: &EndpointCatalog, token: &str, run_dir: &Path) -> Vec<Job> {
    builder.build(
        &catalog.ids(),
        token,
        &run_dir.join(input_file_name(token)),
        &run_dir.join(OUTPUT_DIR_NAME),
    )
}
