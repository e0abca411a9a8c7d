use mt_core::error::MtError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating the tool configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found at {path}")]
    NotFound { path: PathBuf },
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml_ng::Error,
    },
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl From<ConfigError> for MtError {
    fn from(err: ConfigError) -> Self {
        MtError::Config(err.to_string())
    }
}
