//! Domain model: jobs, per-endpoint outcomes, molecules and the run aggregate.

pub mod job;
pub mod molecule;
pub mod outcome;
pub mod run;

pub use job::{Job, JobOutcome, LAUNCH_FAILED_EXIT_CODE, SIGNALED_EXIT_CODE, TIMEOUT_EXIT_CODE};
pub use molecule::{number_batch, Molecule};
pub use outcome::{EndpointOutcome, RawData};
pub use run::{JobSummary, RunDiagnostics, RunMetadata, RunResult, REPORT_VERSION};
