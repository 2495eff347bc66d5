//! toxrun - batch toxicity predictions with the T.E.S.T. command-line tool
//!
//! Runs the prediction tool once per endpoint for a batch of SMILES and
//! prints a single JSON report.
//!
//! ## Commands
//!
//! - (default): run a batch
//! - `check`: verify Java, `WebTEST.jar`, the `Database` folder and `xvfb-run`
//! - `collect`: rebuild a report from an existing output directory

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use toxrun_core::config::{DEFAULT_WAIT_TIMEOUT_SECS, DEFAULT_WORKERS};
use toxrun_core::report::{write_csv, write_json};
use toxrun_core::telemetry::{init_tracing, LogFormat};
use toxrun_core::{collect_smiles, EndpointCatalog, RunConfig, RunResult, ToxError};
use toxrun_jobs::locate::{find_database, find_jar, resolve_java, resolve_virtual_display};
use toxrun_jobs::pipeline::collect_existing;
use toxrun_jobs::{check_environment, JobBuilder, ToolInvocation, ToxRunner};

#[derive(Parser)]
#[command(name = "toxrun")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run T.E.S.T. toxicity predictions for SMILES batches", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
#[command(after_help = "Examples:\n  \
    toxrun --smiles 'CCO' --smiles 'c1ccccc1' > results.json\n  \
    toxrun -f molecules.smi --calculate LC50,BP --output-csv results.csv\n  \
    toxrun check --test-home /opt/test")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that everything a run needs is installed
    Check {
        #[command(flatten)]
        tool: ToolArgs,
    },

    /// Build a report from artifacts already in an output directory
    Collect {
        /// Directory holding per-endpoint CSV artifacts
        output_dir: PathBuf,

        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        endpoints: EndpointArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct ToolArgs {
    /// Java executable (name on PATH or path)
    #[arg(long, env = "TOXRUN_JAVA", default_value = "java")]
    java: String,

    /// Directory holding WebTEST.jar and the Database folder
    #[arg(long, env = "TOXRUN_HOME", default_value = ".")]
    test_home: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct InputArgs {
    /// SMILES string (repeatable)
    #[arg(short = 's', long = "smiles")]
    smiles: Vec<String>,

    /// File with one SMILES per line (repeatable)
    #[arg(short = 'f', long = "smiles-file")]
    smiles_files: Vec<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct EndpointArgs {
    /// Comma-separated endpoint subset, e.g. LC50,BP (default: all)
    #[arg(long)]
    calculate: Option<String>,

    /// JSON endpoint catalog replacing the built-in one
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Write the JSON report here ("-" for stdout)
    #[arg(short = 'o', long, default_value = "-")]
    output_json: String,

    /// Also write a CSV table (one molecule per row, endpoints as columns)
    #[arg(long)]
    output_csv: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    tool: ToolArgs,

    #[command(flatten)]
    endpoints: EndpointArgs,

    #[command(flatten)]
    output: OutputArgs,

    /// Number of prediction processes run in parallel
    #[arg(short, long, env = "TOXRUN_WORKERS", default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Per-endpoint timeout in seconds (default: none)
    #[arg(long)]
    timeout: Option<u64>,

    /// Parent directory for the per-run temporary directory
    #[arg(long, env = "TOXRUN_TMP_DIR")]
    tmp_dir: Option<PathBuf>,

    /// Keep the temporary directory after the run
    #[arg(long)]
    keep_tmp: bool,

    /// Seconds to wait for the artifacts of successful jobs
    #[arg(long, default_value_t = DEFAULT_WAIT_TIMEOUT_SECS)]
    wait_timeout: u64,

    /// Do not wrap the tool in xvfb-run
    #[arg(long)]
    no_xvfb: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing(format, cli.verbose);

    match cli.command {
        Some(Commands::Check { tool }) => cmd_check(&tool).await,
        Some(Commands::Collect {
            output_dir,
            input,
            endpoints,
            output,
        }) => cmd_collect(&output_dir, &input, &endpoints, &output),
        None => cmd_run(cli.run).await,
    }
}

fn load_catalog(args: &EndpointArgs) -> Result<EndpointCatalog> {
    let catalog = match &args.catalog {
        Some(path) => EndpointCatalog::from_json_file(path)
            .with_context(|| format!("failed to load endpoint catalog {}", path.display()))?,
        None => EndpointCatalog::builtin(),
    };
    Ok(catalog.select(args.calculate.as_deref())?)
}

fn load_smiles(args: &InputArgs) -> Result<Vec<String>> {
    let smiles = collect_smiles(&args.smiles, &args.smiles_files)?;
    if smiles.is_empty() {
        return Err(ToxError::NoMolecules.into());
    }
    Ok(smiles)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

fn write_outputs(result: &RunResult, output: &OutputArgs) -> Result<()> {
    write_json(result, &output.output_json)
        .with_context(|| format!("failed to write JSON report to {}", output.output_json))?;
    if let Some(csv) = &output.output_csv {
        write_csv(result, csv)
            .with_context(|| format!("failed to write CSV report to {}", csv.display()))?;
        info!(path = %csv.display(), "CSV report written");
    }
    Ok(())
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    // Configuration errors surface before anything is launched.
    let catalog = load_catalog(&args.endpoints)?;
    let smiles = load_smiles(&args.input)?;
    let java = resolve_java(&args.tool.java)
        .context("Java not found; pass --java or install java on PATH")?;
    let home = absolute(&args.tool.test_home)?;
    let jar = find_jar(&home)?;
    if find_database(&home).is_none() {
        warn!(home = %home.display(), "Database folder not found, predictions will likely fail");
    }

    let builder = JobBuilder::new(ToolInvocation::new(java, jar, home))
        .with_virtual_display(resolve_virtual_display(args.no_xvfb));

    let config = RunConfig {
        workers: args.workers,
        job_timeout_secs: args.timeout,
        wait_timeout_secs: args.wait_timeout,
        tmp_root: args.tmp_dir.clone(),
        keep_tmp: args.keep_tmp,
        ..RunConfig::default()
    };

    let mut result = ToxRunner::new(builder, catalog, config).run(&smiles).await?;
    result.metadata.calculate = args.endpoints.calculate.clone();

    write_outputs(&result, &args.output)
}

fn cmd_collect(
    output_dir: &Path,
    input: &InputArgs,
    endpoints: &EndpointArgs,
    output: &OutputArgs,
) -> Result<()> {
    let catalog = load_catalog(endpoints)?;
    let smiles = load_smiles(input)?;

    let mut result = collect_existing(&smiles, output_dir, &catalog)?;
    result.metadata.calculate = endpoints.calculate.clone();

    write_outputs(&result, output)
}

async fn cmd_check(tool: &ToolArgs) -> Result<()> {
    let home = absolute(&tool.test_home)?;
    let report = check_environment(&tool.java, &home).await;

    println!("toxrun {} environment check", env!("CARGO_PKG_VERSION"));
    println!("  tool home: {}", home.display());
    for component in &report.components {
        let mark = match (component.found(), component.required) {
            (true, _) => "ok",
            (false, true) => "MISSING",
            (false, false) => "absent",
        };
        let location = component
            .location
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  [{mark:>7}] {:<12} {location}", component.name);
        if let Some(detail) = &component.detail {
            println!("            {detail}");
        }
    }

    if !report.ok() {
        let missing: Vec<&str> = report.missing_required().map(|c| c.name.as_str()).collect();
        anyhow::bail!("required components missing: {}", missing.join(", "));
    }
    println!("All required components found.");
    Ok(())
}
