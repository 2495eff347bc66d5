//! toxrun core library
//!
//! Domain model, endpoint catalog, artifact parsing, output reconciliation
//! and report writers for batch toxicity prediction runs. Process execution
//! lives in `toxrun-jobs`; this crate never spawns anything.

pub mod artifact;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod input;
pub mod obs;
pub mod reconcile;
pub mod report;
pub mod telemetry;

pub use artifact::{ArtifactRow, ParsedArtifact};
pub use catalog::{EndpointCatalog, EndpointInfo};
pub use config::{RecoveryPolicy, RunConfig};
pub use domain::{
    EndpointOutcome, Job, JobOutcome, JobSummary, Molecule, RawData, RunDiagnostics, RunMetadata,
    RunResult, LAUNCH_FAILED_EXIT_CODE, REPORT_VERSION, SIGNALED_EXIT_CODE, TIMEOUT_EXIT_CODE,
};
pub use error::{Result, ToxError};
pub use input::{collect_smiles, write_smiles_file};
pub use reconcile::{reconcile, reconcile_dir, Reconciler, Resolution};
