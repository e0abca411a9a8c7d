//! Tracing initialization for the multitool
//!
//! Filtering follows `RUST_LOG`; `RUST_LOG_FORMAT` selects the layout.

use crate::error::{MtError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize with a default filter if RUST_LOG is not set
///
/// Uses RUST_LOG_FORMAT for output format (optional):
/// - `json` - JSON formatted output
/// - `pretty` - Pretty formatted output
/// - `compact` - Compact single-line output (default)
///
/// Log lines go to stderr so stdout stays clean for command output.
pub fn init_with_defaults(default_filter: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format.as_str() {
        "json" => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false).json())
            .try_init(),
        "pretty" => registry
            .with(fmt::layer().with_writer(std::io::stderr).pretty())
            .try_init(),
        _ => registry
            .with(fmt::layer().with_writer(std::io::stderr).compact().with_target(false))
            .try_init(),
    };

    result.map_err(|e| MtError::Internal(format!("Failed to initialize tracing: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info, info_span};

    #[test]
    fn test_second_initialization_is_an_error_not_a_panic() {
        // Only one global subscriber per process; whichever call loses must
        // come back as an error.
        let first = init_with_defaults("debug");
        let second = init_with_defaults("debug");
        assert!(first.is_err() || second.is_err());

        let span = info_span!("build", plugin = "core");
        let _enter = span.enter();
        info!("inside span");
        debug!("debug inside span");
    }
}
