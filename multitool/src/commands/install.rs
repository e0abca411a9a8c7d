use std::path::Path;
use tracing::info;

use mt_core::command_stream::stream_command;
use mt_core::error::{MtError, Result};
use mt_core::{is_tool_installed, mt_progress, mt_success};
use mt_plugin::Plugin;

use super::select_plugins;

/// Front-end package manager for `package.json`, preferring yarn.
fn node_installer() -> Result<&'static str> {
    ["yarn", "npm"]
        .into_iter()
        .find(|tool| is_tool_installed(tool))
        .ok_or_else(|| {
            MtError::Dependency(
                "yarn or npm is required to install package.json dependencies".into(),
            )
        })
}

fn install_plugin(plugin: &Plugin) -> Result<bool> {
    let mut installed = false;

    if plugin.root.join("package.json").is_file() {
        let installer = node_installer()?;
        mt_progress!("{}: {} install", plugin.info.name, installer);
        stream_command(installer, &["install"], Some(plugin.root.as_path()))?;
        installed = true;
    }

    if plugin.root.join("bower.json").is_file() {
        if !is_tool_installed("bower") {
            return Err(MtError::Dependency(
                "bower is required to install bower.json dependencies".into(),
            ));
        }
        mt_progress!("{}: bower install", plugin.info.name);
        stream_command("bower", &["install", "--allow-root"], Some(plugin.root.as_path()))?;
        installed = true;
    }

    Ok(installed)
}

pub fn handle_install(root: &Path) -> Result<()> {
    let plugins = select_plugins(root, &[])?;
    let mut count = 0;
    for plugin in &plugins {
        if install_plugin(plugin)? {
            count += 1;
        } else {
            info!(plugin = %plugin.info.name, "no front-end dependencies declared");
        }
    }
    mt_success!("Installed dependencies for {} plugin(s)", count);
    Ok(())
}
