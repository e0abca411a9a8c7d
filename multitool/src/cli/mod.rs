// CLI argument parsing and definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "multitool")]
#[command(about = "Build, install and translate plugins of a modular application")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a custom configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory searched for plugins
    #[arg(short, long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CacheSubcommand {
    /// Show the cache location and size
    Info,
    /// Remove every cached resource
    Clear,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List plugins below the root directory
    Find,

    /// Compile and bundle plugin resources
    Build {
        /// Ignore cached output and recompile everything
        #[arg(long)]
        rebuild: bool,

        /// Maximum number of compilers running at once
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Seconds a single compiler may run (0 disables the limit)
        #[arg(long)]
        timeout: Option<u64>,

        /// Plugin directories to build instead of discovering them
        plugins: Vec<PathBuf>,
    },

    /// Install plugin front-end dependencies (yarn/npm, bower)
    Install,

    /// Increment the version of every plugin
    Bump,

    /// Extract translatable strings into locale/app.pot
    Xgettext,

    /// Compile translation catalogs (locale/*/LC_MESSAGES/app.po)
    Msgfmt,

    /// Inspect or clear the shared resource cache
    Cache {
        #[command(subcommand)]
        command: CacheSubcommand,
    },
}
