//! toxrun jobs
//!
//! Everything that touches processes: building one job per endpoint,
//! running jobs on a bounded pool, recovering jobs hit by the virtual
//! display cleanup race, waiting for artifacts and orchestrating a run.

pub mod builder;
pub mod locate;
pub mod pipeline;
pub mod pool;
pub mod recovery;
pub mod runner;
pub mod waiter;

// Re-export key types
pub use builder::{JobBuilder, ToolInvocation, VirtualDisplay};
pub use locate::{check_environment, EnvironmentReport};
pub use pipeline::ToxRunner;
pub use pool::JobPool;
pub use recovery::{Sleeper, TokioSleeper};
pub use runner::{JobExecutor, ProcessExecutor};
pub use waiter::ArtifactWaiter;
