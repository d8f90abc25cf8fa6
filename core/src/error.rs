use std::io;

use hashaudit_commons::{MaskError, UnknownHashType};
use thiserror::Error;

pub type AuditResult<T> = std::result::Result<T, AuditError>;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Invalid mask: {0}")]
    Mask(#[from] MaskError),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Malformed target digest: {0}")]
    MalformedDigest(String),

    #[error("The {0} target is missing its salt")]
    MissingSalt(&'static str),

    #[error("Only spaces up to 2^{limit} candidates are allowed, but the provided space is 2^{bits}")]
    Space { bits: u32, limit: u32 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unable to read the wordlist: {0}")]
    Source(String),

    #[error("Unable to access the wordlist at the given path. Make sure the right permissions are available")]
    Io(#[from] io::Error),

    #[error("Failed to create the worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("A worker panicked: {0}")]
    WorkerPanic(String),
}

impl From<UnknownHashType> for AuditError {
    fn from(err: UnknownHashType) -> Self {
        AuditError::UnsupportedAlgorithm(err.0)
    }
}

impl AuditError {
    /// Returns true if the error is raised before any work starts.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            AuditError::Mask(_)
                | AuditError::UnsupportedAlgorithm(_)
                | AuditError::MalformedDigest(_)
                | AuditError::MissingSalt(_)
                | AuditError::Space { .. }
                | AuditError::Config(_)
        )
    }
}
