//! Ordered resource entries of one plugin.

use std::io;
use std::path::{Component, Path, PathBuf};

use mt_plugin::{Plugin, MODULE_PREFIX};

use crate::dispatcher::{AssetCategory, CompilerRegistry};

/// One declared asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    /// Path as declared, relative to the plugin root
    pub path: String,
    /// Absolute location on disk
    pub source: PathBuf,
}

/// How an entry takes part in a build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRole {
    /// Third-party asset, bundled raw into a vendor bundle
    Vendor(AssetCategory),
    /// Compiled through the cache
    Compiled(AssetCategory),
    /// Already in final form, bundled raw
    Raw(AssetCategory),
    /// Neither compiled nor bundled
    Ignored,
}

impl ResourceEntry {
    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.path)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    /// True when any directory segment of the declared path is a vendor dir.
    pub fn is_vendor(&self, vendor_dirs: &[String]) -> bool {
        let path = Path::new(&self.path);
        let Some(parent) = path.parent() else {
            return false;
        };
        parent.components().any(|component| match component {
            Component::Normal(segment) => vendor_dirs
                .iter()
                .any(|dir| segment.to_string_lossy() == dir.as_str()),
            _ => false,
        })
    }

    pub fn role(&self, registry: &CompilerRegistry, vendor_dirs: &[String]) -> ResourceRole {
        let Some(category) = registry.category_of(Path::new(&self.path)) else {
            return ResourceRole::Ignored;
        };
        if self.is_vendor(vendor_dirs) {
            ResourceRole::Vendor(category)
        } else if registry.is_compilable(Path::new(&self.path)) {
            ResourceRole::Compiled(category)
        } else {
            ResourceRole::Raw(category)
        }
    }
}

/// A plugin's resources in declaration order. Module declarations are dropped.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub root: PathBuf,
    pub entries: Vec<ResourceEntry>,
}

impl Manifest {
    /// Builds a manifest from declared paths relative to `root`.
    ///
    /// A relative `root` is resolved against the current directory so cache
    /// keys always come from absolute paths.
    pub fn new<I, S>(root: &Path, paths: I) -> io::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let absolute = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        // `./core` and `core` must yield the same keys
        let root: PathBuf = absolute
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
        let entries = paths
            .into_iter()
            .filter(|path| !path.as_ref().starts_with(MODULE_PREFIX))
            .map(|path| ResourceEntry {
                path: path.as_ref().to_string(),
                source: root.join(path.as_ref()),
            })
            .collect();
        Ok(Self { root, entries })
    }

    pub fn from_plugin(plugin: &Plugin) -> io::Result<Self> {
        Self::new(&plugin.root, plugin.resource_paths())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
