//! In-place version bumping for plugin metadata.
//!
//! The metadata file is edited line-wise so comments and key order survive.

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::discovery::find_metadata_file;

fn version_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r#"(?m)^(?P<head>version:\s*['"]?)"#,
            r#"(?P<version>[0-9][0-9A-Za-z.\-]*)"#,
            r#"(?P<tail>['"]?[ \t]*)$"#,
        ))
        .expect("version regex is valid")
    })
}

/// Increments the last numeric component: `1.2.9` → `1.2.10`, `0.1-rc1` → `0.2-rc1`.
pub fn bump_version_string(version: &str) -> Result<String> {
    let mut parts: Vec<String> = version.split('.').map(str::to_string).collect();
    let index = parts
        .iter()
        .rposition(|p| !p.is_empty() && p.chars().take_while(char::is_ascii_digit).count() > 0)
        .with_context(|| format!("Version '{version}' has no numeric component"))?;

    let part = &parts[index];
    let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
    let suffix = &part[digits.len()..];
    let next = digits
        .parse::<u64>()
        .with_context(|| format!("Version component '{digits}' is too large"))?
        + 1;
    parts[index] = format!("{next}{suffix}");
    Ok(parts.join("."))
}

/// Bumps the `version:` line of the plugin in `plugin_dir`.
///
/// Returns the old and new version.
pub fn bump_version(plugin_dir: &Path) -> Result<(String, String)> {
    let metadata_file = find_metadata_file(plugin_dir)
        .with_context(|| format!("Plugin metadata not found in {}", plugin_dir.display()))?;
    let content = fs::read_to_string(&metadata_file)
        .with_context(|| format!("Failed to read {}", metadata_file.display()))?;

    let caps = version_line()
        .captures(&content)
        .with_context(|| format!("No version line in {}", metadata_file.display()))?;
    let old = caps["version"].to_string();
    let new = bump_version_string(&old)?;

    let updated = version_line().replace(&content, |c: &regex::Captures| {
        format!("{}{}{}", &c["head"], new, &c["tail"])
    });
    fs::write(&metadata_file, updated.as_bytes())
        .with_context(|| format!("Failed to write {}", metadata_file.display()))?;

    Ok((old, new))
}
