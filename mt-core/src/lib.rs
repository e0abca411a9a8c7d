//! Core utilities for the plugin multitool
//!
//! Shared error type, subprocess helpers, output macros, tracing setup and
//! user directory lookups used by every other crate in the workspace.

pub mod command_stream;
pub mod error;
pub mod output_macros;
pub mod tracing_init;
pub mod user_paths;

pub use anyhow::bail;
pub use command_stream::{
    is_tool_installed, run_captured_with_deadline, CapturedOutput, CommandOutcome,
};
