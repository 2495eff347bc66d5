//! Error taxonomy for toxrun.
//!
//! Only configuration-class errors are meant to escape a run. Job failures
//! live in [`crate::domain::JobOutcome`] and artifact parse failures in
//! [`crate::domain::EndpointOutcome::error`].

use std::path::PathBuf;

/// toxrun errors.
#[derive(Debug, thiserror::Error)]
pub enum ToxError {
    #[error("invalid endpoints: {}", .0.join(", "))]
    UnknownEndpoints(Vec<String>),

    #[error("no endpoints selected")]
    NoEndpoints,

    #[error("no SMILES provided")]
    NoMolecules,

    #[error("executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("WebTEST.jar not found under {}", .0.display())]
    JarNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid endpoint catalog: {0}")]
    Catalog(String),

    #[error("error creating temporary directory: {0}")]
    TempDir(#[source] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToxError {
    /// Whether this error belongs to the configuration class that fails a
    /// run before any job is built.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ToxError::UnknownEndpoints(_)
                | ToxError::NoEndpoints
                | ToxError::NoMolecules
                | ToxError::ExecutableNotFound(_)
                | ToxError::JarNotFound(_)
                | ToxError::InvalidConfig(_)
                | ToxError::Catalog(_)
        )
    }
}

/// Result type for toxrun operations.
pub type Result<T> = std::result::Result<T, ToxError>;
