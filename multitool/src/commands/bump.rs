use std::path::Path;

use mt_core::error::Result;
use mt_core::{mt_println, mt_warning};
use mt_plugin::bump_version;

use super::select_plugins;

pub fn handle_bump(root: &Path) -> Result<()> {
    let plugins = select_plugins(root, &[])?;
    if plugins.is_empty() {
        mt_warning!("No plugins found in {}", root.display());
        return Ok(());
    }

    for plugin in &plugins {
        let (old, new) = bump_version(&plugin.root)?;
        mt_println!("{}: {} -> {}", plugin.info.name, old, new);
    }
    Ok(())
}
