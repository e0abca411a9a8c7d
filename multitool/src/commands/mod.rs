// Command handlers

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cli::{Args, Command};
use mt_core::error::{MtError, Result};
use mt_plugin::Plugin;

pub mod build;
pub mod bump;
pub mod cache;
pub mod find;
pub mod i18n;
pub mod install;

/// Main command dispatcher
#[must_use = "command execution results should be handled"]
pub fn execute_command(args: Args) -> Result<()> {
    let config_path = args.config.as_deref();
    match &args.command {
        Command::Find => {
            debug!("Handling find command");
            find::handle_find(&args.root)
        }
        Command::Build {
            rebuild,
            jobs,
            timeout,
            plugins,
        } => {
            debug!(rebuild, "Handling build command");
            build::handle_build(
                &args.root,
                plugins,
                build::BuildFlags {
                    rebuild: *rebuild,
                    jobs: *jobs,
                    timeout_secs: *timeout,
                },
                config_path,
            )
        }
        Command::Install => {
            debug!("Handling install command");
            install::handle_install(&args.root)
        }
        Command::Bump => {
            debug!("Handling bump command");
            bump::handle_bump(&args.root)
        }
        Command::Xgettext => {
            debug!("Handling xgettext command");
            i18n::handle_xgettext(&args.root)
        }
        Command::Msgfmt => {
            debug!("Handling msgfmt command");
            i18n::handle_msgfmt(&args.root)
        }
        Command::Cache { command } => {
            debug!("Handling cache command");
            cache::handle_cache_command(command, config_path)
        }
    }
}

/// Plugins to operate on: the given directories, or every plugin below `root`.
pub fn select_plugins(root: &Path, dirs: &[PathBuf]) -> Result<Vec<Plugin>> {
    if dirs.is_empty() {
        let plugins = mt_plugin::discover_plugins(root)
            .with_context(|| format!("Failed to discover plugins in {}", root.display()))?;
        return Ok(plugins);
    }
    dirs.iter()
        .map(|dir| mt_plugin::load_plugin(dir).map_err(MtError::from))
        .collect()
}
