use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::types::{Plugin, PluginInfo};

/// Accepted metadata file names, in lookup order.
pub const METADATA_FILES: &[&str] = &["plugin.yml", "plugin.yaml"];

/// Directories never searched for plugins.
const SKIPPED_DIRS: &[&str] = &["node_modules", "bower_components", "build", "__pycache__"];

fn is_skipped(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    entry.file_type().is_dir() && (name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()))
}

/// Returns the metadata file of `dir`, if it has one.
pub fn find_metadata_file(dir: &Path) -> Option<PathBuf> {
    METADATA_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Discovers plugins below `root`, sorted by path.
///
/// A directory is a plugin when it holds a metadata file. Plugins whose
/// metadata cannot be read are reported and skipped.
pub fn discover_plugins(root: &Path) -> Result<Vec<Plugin>> {
    let mut plugins = Vec::new();

    if !root.exists() {
        return Ok(plugins);
    }

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e));

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        if find_metadata_file(entry.path()).is_none() {
            continue;
        }
        match load_plugin(entry.path()) {
            Ok(plugin) => {
                debug!(plugin = %plugin.info.name, path = %plugin.root.display(), "found plugin");
                plugins.push(plugin);
            }
            Err(e) => {
                warn!("Skipping plugin at {}: {:#}", entry.path().display(), e);
            }
        }
    }

    Ok(plugins)
}

/// Loads a single plugin from its directory
pub fn load_plugin(plugin_dir: &Path) -> Result<Plugin> {
    let metadata_file = find_metadata_file(plugin_dir)
        .with_context(|| format!("Plugin metadata not found in {}", plugin_dir.display()))?;

    let content = fs::read_to_string(&metadata_file)
        .with_context(|| format!("Failed to read plugin metadata: {}", metadata_file.display()))?;

    let info: PluginInfo = serde_yaml_ng::from_str(&content)
        .with_context(|| format!("Failed to parse plugin metadata: {}", metadata_file.display()))?;

    if info.name.trim().is_empty() {
        anyhow::bail!("Plugin name is empty in {}", metadata_file.display());
    }

    Ok(Plugin {
        info,
        root: plugin_dir.to_path_buf(),
        metadata_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_plugin(root: &Path, rel: &str, name: &str) -> Result<PathBuf> {
        let dir = root.join(rel);
        fs::create_dir_all(&dir)?;
        fs::write(
            dir.join("plugin.yml"),
            format!("name: {name}\nversion: '1.0'\nresources:\n  - resources/js/module.es\n"),
        )?;
        Ok(dir)
    }

    #[test]
    fn test_discover_empty_directory() -> Result<()> {
        let temp_dir = TempDir::new()?;
        assert!(discover_plugins(temp_dir.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_nonexistent_directory() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let plugins = discover_plugins(&temp_dir.path().join("does-not-exist"))?;
        assert!(plugins.is_empty());
        Ok(())
    }

    #[test]
    fn test_discover_sorted_plugins() -> Result<()> {
        let temp_dir = TempDir::new()?;
        create_plugin(temp_dir.path(), "plugins/terminal", "terminal")?;
        create_plugin(temp_dir.path(), "plugins/core", "core")?;
        create_plugin(temp_dir.path(), "plugins/dashboard", "dashboard")?;

        let plugins = discover_plugins(temp_dir.path())?;
        let names: Vec<_> = plugins.iter().map(|p| p.info.name.as_str()).collect();
        assert_eq!(names, vec!["core", "dashboard", "terminal"]);
        assert!(plugins[0].metadata_file.ends_with("plugin.yml"));
        Ok(())
    }

    #[test]
    fn test_root_itself_can_be_a_plugin() -> Result<()> {
        let temp_dir = TempDir::new()?;
        create_plugin(temp_dir.path(), "", "solo")?;
        let plugins = discover_plugins(temp_dir.path())?;
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].root, temp_dir.path());
        Ok(())
    }

    #[test]
    fn test_skips_dependency_and_hidden_dirs() -> Result<()> {
        let temp_dir = TempDir::new()?;
        create_plugin(temp_dir.path(), "core", "core")?;
        create_plugin(temp_dir.path(), "core/resources/node_modules/dep", "dep")?;
        create_plugin(temp_dir.path(), "core/resources/vendor/bower_components/x", "x")?;
        create_plugin(temp_dir.path(), ".git/hooks", "hooks")?;

        let plugins = discover_plugins(temp_dir.path())?;
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].info.name, "core");
        Ok(())
    }

    #[test]
    fn test_invalid_plugin_skipped() -> Result<()> {
        let temp_dir = TempDir::new()?;
        create_plugin(temp_dir.path(), "valid", "valid")?;

        let invalid = temp_dir.path().join("invalid");
        fs::create_dir_all(&invalid)?;
        fs::write(invalid.join("plugin.yml"), "resources: [a.js\n")?;

        let plugins = discover_plugins(temp_dir.path())?;
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].info.name, "valid");
        Ok(())
    }

    #[test]
    fn test_load_plugin_accepts_yaml_extension() -> Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("plugin.yaml"), "name: alt\n")?;
        let plugin = load_plugin(temp_dir.path())?;
        assert_eq!(plugin.info.name, "alt");
        assert!(plugin.metadata_file.ends_with("plugin.yaml"));
        Ok(())
    }

    #[test]
    fn test_load_plugin_without_metadata() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let err = load_plugin(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("Plugin metadata not found"));
        Ok(())
    }

    #[test]
    fn test_load_plugin_rejects_empty_name() -> Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("plugin.yml"), "name: ''\n")?;
        assert!(load_plugin(temp_dir.path()).is_err());
        Ok(())
    }
}
