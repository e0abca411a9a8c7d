//! Global configuration for the plugin multitool
//!
//! Settings live in `<user config dir>/multitool/config.yaml` (or the file
//! passed with `--config`). Every field has a default, so a missing file is
//! the same as an empty one.

pub mod error;
pub mod tool_config;

pub use error::ConfigError;
pub use tool_config::{BuildSettings, CompilerEntry, ToolConfig, ENV_CACHE_DIR, ENV_JOBS};
