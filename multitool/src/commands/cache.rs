use std::path::Path;

use mt_config::ToolConfig;
use mt_core::error::Result;
use mt_core::{mt_println, mt_success};
use mt_resources::DiskCache;

use crate::cli::CacheSubcommand;

pub fn handle_cache_command(command: &CacheSubcommand, config_path: Option<&Path>) -> Result<()> {
    let config = ToolConfig::load(config_path)?;
    let cache_dir = config.build.resolved_cache_dir()?;
    let cache = DiskCache::open(&cache_dir)?;

    match command {
        CacheSubcommand::Info => {
            let stats = cache.stats()?;
            mt_println!("Location: {}", cache.dir().display());
            mt_println!("Entries:  {}", stats.entries);
            mt_println!("Size:     {} bytes", stats.total_bytes);
        }
        CacheSubcommand::Clear => {
            let removed = cache.clear()?;
            mt_success!("Removed {} cached resource(s)", removed);
        }
    }
    Ok(())
}
