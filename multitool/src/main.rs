// External crates
use clap::Parser;
use tracing::debug;

// Internal imports
use mt_core::{mt_error, mt_warning};

// Local modules
mod cli;
mod commands;

use cli::Args;
use commands::execute_command;

fn main() {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    if mt_core::tracing_init::init_with_defaults(default_filter).is_err() {
        mt_warning!("Failed to initialize logging");
    }
    debug!(command = ?args.command, "starting multitool");

    if let Err(e) = execute_command(args) {
        mt_error!("{}", e);
        std::process::exit(e.exit_code());
    }
}
