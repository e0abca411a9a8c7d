use thiserror::Error;

#[derive(Error, Debug)]
pub enum MtError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Plugin error: {0}")]
    Plugin(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Command failed: {0}")]
    Command(String),
    #[error("Dependency not found: {0}")]
    Dependency(String),
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Filesystem error: {0}")]
    Filesystem(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Internal error: {0}")]
    Internal(String),
    /// One or more resource compilations failed; the count is reported
    /// and the individual diagnostics have already been logged.
    #[error("{0} resource build failure(s)")]
    BuildFailed(usize),
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl MtError {
    /// Process exit status for this error.
    ///
    /// Build failures get their own status so scripts can tell a broken
    /// asset apart from a broken invocation.
    pub fn exit_code(&self) -> i32 {
        match self {
            MtError::BuildFailed(_) => 2,
            _ => 1,
        }
    }
}

impl From<serde_yaml_ng::Error> for MtError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        MtError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MtError>;
