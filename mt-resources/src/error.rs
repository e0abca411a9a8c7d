use mt_core::error::MtError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by cache storage.
///
/// Reads are lenient: a missing or corrupt entry is a miss, not an error.
/// These variants cover the cases where the backing directory itself
/// misbehaves.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to lock cache entry {path}: {source}")]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to move cache entry into place at {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors that stop a pipeline run outright.
///
/// Compiler failures are not errors at this level; they are collected as
/// [`crate::BuildFailure`] values and reported through
/// [`crate::BuildOutcome::Aborted`].
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("failed to read resource {path}: {source}")]
    ReadSource {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no compiled output cached for {path}")]
    MissingCompiledOutput { path: PathBuf },
    #[error("failed to write bundle {path}: {source}")]
    WriteBundle {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid compiler for '.{extension}': {reason}")]
    InvalidCompiler { extension: String, reason: String },
    #[error("failed to start compile workers: {0}")]
    WorkerPool(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CacheError> for MtError {
    fn from(err: CacheError) -> Self {
        MtError::Cache(err.to_string())
    }
}

impl From<PipelineError> for MtError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Cache(e) => e.into(),
            PipelineError::Io(e) => MtError::Io(e),
            invalid @ PipelineError::InvalidCompiler { .. } => MtError::Config(invalid.to_string()),
            other => MtError::Filesystem(other.to_string()),
        }
    }
}
