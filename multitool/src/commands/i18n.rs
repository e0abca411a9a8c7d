//! Translation string extraction and catalog compilation.
//!
//! Both commands shell out to the gettext toolchain. Extraction is skipped
//! per source kind when its extractor is not installed; compiling catalogs
//! requires `msgfmt`.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use mt_core::command_stream::stream_command;
use mt_core::error::{MtError, Result};
use mt_core::{is_tool_installed, mt_progress, mt_success, mt_warning};
use mt_plugin::Plugin;

use super::select_plugins;

const LOCALE_DIR: &str = "locale";
const PYTHON_TEMPLATE: &str = "app.pot";
const FRONTEND_TEMPLATE: &str = "app.js.pot";
const FRONTEND_EXTENSIONS: &[&str] = &["html", "js", "es"];
const FRONTEND_PATTERN: &str = "**/*.+(html|js|es)";
const IGNORED_DIRS: &[&str] = &["node_modules", "bower_components", "vendor", "build", LOCALE_DIR];

/// True if any file below `dir` has one of `extensions`, outside vendored
/// and generated directories.
fn has_sources(dir: &Path, extensions: &[&str]) -> bool {
    WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !(e.file_type().is_dir()
                    && (IGNORED_DIRS.contains(&e.file_name().to_string_lossy().as_ref())
                        || e.file_name().to_string_lossy().starts_with('.')))
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .any(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| extensions.contains(&ext.to_string_lossy().as_ref()))
        })
}

fn extract_plugin(plugin: &Plugin) -> Result<()> {
    let locale = plugin.root.join(LOCALE_DIR);
    fs::create_dir_all(&locale)?;
    let root = Some(plugin.root.as_path());

    if has_sources(&plugin.root, &["py"]) {
        if is_tool_installed("pybabel") {
            mt_progress!("{}: extracting Python strings", plugin.info.name);
            let output = format!("{LOCALE_DIR}/{PYTHON_TEMPLATE}");
            stream_command("pybabel", &["extract", "-o", output.as_str(), "."], root)?;
        } else {
            mt_warning!("pybabel not found, skipping Python strings of {}", plugin.info.name);
        }
    }

    if has_sources(&plugin.root, FRONTEND_EXTENSIONS) {
        if is_tool_installed("angular-gettext-cli") {
            mt_progress!("{}: extracting front-end strings", plugin.info.name);
            let output = format!("{LOCALE_DIR}/{FRONTEND_TEMPLATE}");
            stream_command(
                "angular-gettext-cli",
                &["--files", FRONTEND_PATTERN, "--dest", output.as_str()],
                root,
            )?;
        } else {
            mt_warning!(
                "angular-gettext-cli not found, skipping front-end strings of {}",
                plugin.info.name
            );
        }
    }
    Ok(())
}

pub fn handle_xgettext(root: &Path) -> Result<()> {
    let plugins = select_plugins(root, &[])?;
    for plugin in &plugins {
        extract_plugin(plugin)?;
    }
    mt_success!("Extracted strings for {} plugin(s)", plugins.len());
    Ok(())
}

/// `(app.po, app.mo)` pairs under `<plugin>/locale/<lang>/LC_MESSAGES`.
fn catalogs(plugin_root: &Path) -> Vec<(PathBuf, PathBuf)> {
    let locale = plugin_root.join(LOCALE_DIR);
    let Ok(languages) = fs::read_dir(&locale) else {
        return Vec::new();
    };
    let mut found: Vec<(PathBuf, PathBuf)> = languages
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join("LC_MESSAGES"))
        .map(|dir| (dir.join("app.po"), dir.join("app.mo")))
        .filter(|(po, _)| po.is_file())
        .collect();
    found.sort();
    found
}

pub fn handle_msgfmt(root: &Path) -> Result<()> {
    let plugins = select_plugins(root, &[])?;
    let pending: Vec<(PathBuf, PathBuf)> = plugins
        .iter()
        .flat_map(|plugin| catalogs(&plugin.root))
        .collect();

    if pending.is_empty() {
        info!("no translation catalogs found");
        return Ok(());
    }
    if !is_tool_installed("msgfmt") {
        return Err(MtError::Dependency(
            "msgfmt (gettext) is required to compile catalogs".into(),
        ));
    }

    for (po, mo) in &pending {
        debug!(po = %po.display(), "compiling catalog");
        stream_command(
            "msgfmt",
            &[po.as_os_str(), OsStr::new("-o"), mo.as_os_str()],
            None,
        )?;
    }
    mt_success!("Compiled {} catalog(s)", pending.len());
    Ok(())
}
