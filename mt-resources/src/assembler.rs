//! Bundle assembly.
//!
//! A second, ordered walk of the manifest concatenates each entry into one
//! of four bundles. Compiled sources come from the cache; raw and vendor
//! sources are read from disk. Every unit is followed by a newline.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::cache::{CacheKey, CacheStore};
use crate::dispatcher::{AssetCategory, CompilerRegistry};
use crate::error::PipelineError;
use crate::manifest::{Manifest, ResourceRole};

/// Bundle directory, relative to the plugin root.
pub const BUILD_DIR: &str = "resources/build";

const SEPARATOR: &[u8] = b"\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleKind {
    Script,
    Style,
    VendorScript,
    VendorStyle,
}

impl BundleKind {
    pub const ALL: [BundleKind; 4] = [
        BundleKind::Script,
        BundleKind::Style,
        BundleKind::VendorScript,
        BundleKind::VendorStyle,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            BundleKind::Script => "all.js",
            BundleKind::Style => "all.css",
            BundleKind::VendorScript => "all.vendor.js",
            BundleKind::VendorStyle => "all.vendor.css",
        }
    }

    fn for_entry(category: AssetCategory, vendor: bool) -> Self {
        match (category, vendor) {
            (AssetCategory::Script, false) => BundleKind::Script,
            (AssetCategory::Style, false) => BundleKind::Style,
            (AssetCategory::Script, true) => BundleKind::VendorScript,
            (AssetCategory::Style, true) => BundleKind::VendorStyle,
        }
    }
}

/// The four bundle bodies of one plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleSet {
    pub script: Vec<u8>,
    pub style: Vec<u8>,
    pub vendor_script: Vec<u8>,
    pub vendor_style: Vec<u8>,
}

impl BundleSet {
    pub fn get(&self, kind: BundleKind) -> &[u8] {
        match kind {
            BundleKind::Script => &self.script,
            BundleKind::Style => &self.style,
            BundleKind::VendorScript => &self.vendor_script,
            BundleKind::VendorStyle => &self.vendor_style,
        }
    }

    fn get_mut(&mut self, kind: BundleKind) -> &mut Vec<u8> {
        match kind {
            BundleKind::Script => &mut self.script,
            BundleKind::Style => &mut self.style,
            BundleKind::VendorScript => &mut self.vendor_script,
            BundleKind::VendorStyle => &mut self.vendor_style,
        }
    }

    fn append(&mut self, kind: BundleKind, content: &[u8]) {
        let bundle = self.get_mut(kind);
        bundle.extend_from_slice(content);
        bundle.extend_from_slice(SEPARATOR);
    }
}

/// Concatenates manifest entries into bundles and writes them out.
pub struct Assembler<'a> {
    cache: &'a dyn CacheStore,
    registry: &'a CompilerRegistry,
    vendor_dirs: &'a [String],
}

impl<'a> Assembler<'a> {
    pub fn new(
        cache: &'a dyn CacheStore,
        registry: &'a CompilerRegistry,
        vendor_dirs: &'a [String],
    ) -> Self {
        Self {
            cache,
            registry,
            vendor_dirs,
        }
    }

    /// Builds the four bundles in manifest order.
    ///
    /// Only meaningful after a compile pass with no failures; a compiled
    /// source without a cache entry is an error.
    pub fn assemble(&self, manifest: &Manifest) -> Result<BundleSet, PipelineError> {
        let mut bundles = BundleSet::default();

        for entry in &manifest.entries {
            match entry.role(self.registry, self.vendor_dirs) {
                ResourceRole::Vendor(category) => {
                    let content = read_source(&entry.source)?;
                    bundles.append(BundleKind::for_entry(category, true), &content);
                }
                ResourceRole::Compiled(category) => {
                    let key = CacheKey::for_path(&entry.source);
                    let content = self.cache.get(&key)?.ok_or_else(|| {
                        PipelineError::MissingCompiledOutput {
                            path: entry.source.clone(),
                        }
                    })?;
                    bundles.append(BundleKind::for_entry(category, false), &content);
                }
                ResourceRole::Raw(category) => {
                    let content = read_source(&entry.source)?;
                    bundles.append(BundleKind::for_entry(category, false), &content);
                }
                ResourceRole::Ignored => {
                    debug!(path = %entry.path, "not a bundled resource, skipping");
                }
            }
        }
        Ok(bundles)
    }
}

fn read_source(path: &Path) -> Result<Vec<u8>, PipelineError> {
    fs::read(path).map_err(|source| PipelineError::ReadSource {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes all four bundles into `out_dir`, creating it if needed.
///
/// Every bundle is staged as a temp file in `out_dir` before any of them
/// is renamed into place, so a failure while staging leaves the previous
/// bundles untouched. `mode` sets the permission bits on unix.
pub fn write_bundles(
    bundles: &BundleSet,
    out_dir: &Path,
    mode: Option<u32>,
) -> Result<Vec<PathBuf>, PipelineError> {
    fs::create_dir_all(out_dir).map_err(|source| PipelineError::WriteBundle {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut staged = Vec::with_capacity(BundleKind::ALL.len());
    for kind in BundleKind::ALL {
        let target = out_dir.join(kind.file_name());
        let temp = stage(bundles.get(kind), out_dir, mode).map_err(|source| {
            PipelineError::WriteBundle {
                path: target.clone(),
                source,
            }
        })?;
        staged.push((temp, target));
    }

    let mut written = Vec::with_capacity(staged.len());
    for (temp, target) in staged {
        temp.persist(&target)
            .map_err(|e| PipelineError::WriteBundle {
                path: target.clone(),
                source: e.error,
            })?;
        written.push(target);
    }
    info!(dir = %out_dir.display(), "bundles written");
    Ok(written)
}

fn stage(content: &[u8], dir: &Path, mode: Option<u32>) -> std::io::Result<NamedTempFile> {
    let mut temp = tempfile::Builder::new()
        .prefix(".bundle-")
        .tempfile_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_data()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = mode {
            temp.as_file()
                .set_permissions(fs::Permissions::from_mode(mode))?;
        }
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(temp)
}
