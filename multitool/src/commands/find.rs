use std::path::Path;

use mt_core::error::Result;
use mt_core::{mt_println, mt_warning};

use super::select_plugins;

pub fn handle_find(root: &Path) -> Result<()> {
    let plugins = select_plugins(root, &[])?;

    if plugins.is_empty() {
        mt_warning!("No plugins found in {}", root.display());
        return Ok(());
    }

    for plugin in &plugins {
        let version = plugin.info.version.as_deref().unwrap_or("-");
        mt_println!(
            "{}\t{}\t{}",
            plugin.root.display(),
            plugin.info.name,
            version
        );
    }
    Ok(())
}
