use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prefix of resource entries that name a front-end module instead of a file.
pub const MODULE_PREFIX: &str = "ng:";

/// Plugin metadata (stored in plugin.yml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<serde_yaml_ng::Value>,
    /// Front-end assets, in bundle order
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
}

/// One entry of the `resources` list: a bare path or a `{path: ...}` record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceDecl {
    Path(String),
    Record(ResourceRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub path: String,
    /// Keys the build does not interpret, kept for round-tripping
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml_ng::Value>,
}

impl ResourceDecl {
    pub fn path(&self) -> &str {
        match self {
            ResourceDecl::Path(path) => path,
            ResourceDecl::Record(record) => &record.path,
        }
    }

    /// True for `ng:<module>` entries, which declare a module rather than a file.
    pub fn is_module_declaration(&self) -> bool {
        self.path().starts_with(MODULE_PREFIX)
    }
}

/// A plugin found on disk
#[derive(Debug, Clone)]
pub struct Plugin {
    pub info: PluginInfo,
    /// Plugin root; resource paths are relative to it
    pub root: PathBuf,
    pub metadata_file: PathBuf,
}

impl Plugin {
    /// Declared resource paths in manifest order, module declarations included.
    pub fn resource_paths(&self) -> Vec<&str> {
        self.info.resources.iter().map(ResourceDecl::path).collect()
    }

    /// Front-end modules declared with the `ng:` prefix.
    pub fn declared_modules(&self) -> Vec<&str> {
        self.info
            .resources
            .iter()
            .filter_map(|r| r.path().strip_prefix(MODULE_PREFIX))
            .collect()
    }

    pub fn has_resources(&self) -> bool {
        self.info
            .resources
            .iter()
            .any(|r| !r.is_module_declaration())
    }
}
