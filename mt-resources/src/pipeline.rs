//! Per-plugin build driver.
//!
//! `Idle → Scanning → Joined → (Aborted | Assembling → Done)`. Bundles are
//! only touched after a compile pass with no failures.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use mt_config::BuildSettings;
use mt_plugin::Plugin;

use crate::assembler::{write_bundles, Assembler, BUILD_DIR};
use crate::cache::CacheStore;
use crate::dispatcher::CompilerRegistry;
use crate::error::PipelineError;
use crate::manifest::Manifest;
use crate::scheduler::{BuildFailure, Scheduler};

const DEFAULT_OUTPUT_MODE: u32 = 0o666;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Scanning,
    Joined,
    Assembling,
    Done,
    Aborted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Scanning => "scanning",
            PipelineState::Joined => "joined",
            PipelineState::Assembling => "assembling",
            PipelineState::Done => "done",
            PipelineState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Knobs for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// `false` recompiles everything
    pub cache_enabled: bool,
    pub jobs: usize,
    pub timeout: Option<Duration>,
    /// Permission bits for bundle files (unix)
    pub output_mode: u32,
    pub vendor_dirs: Vec<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_settings(&BuildSettings::default(), DEFAULT_OUTPUT_MODE)
    }
}

impl PipelineOptions {
    /// Options from validated build settings; `output_mode` is passed in
    /// already parsed.
    pub fn from_settings(settings: &BuildSettings, output_mode: u32) -> Self {
        Self {
            cache_enabled: true,
            jobs: settings.effective_jobs(),
            timeout: settings.timeout(),
            output_mode,
            vendor_dirs: settings.vendor_dirs.clone(),
        }
    }
}

/// A successful build
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    pub bundles: Vec<PathBuf>,
    pub compiled: usize,
    pub fresh: usize,
}

#[derive(Debug, Clone)]
pub enum BuildOutcome {
    /// The plugin declares no file resources
    NoResources,
    /// At least one compile failed; no bundle was written
    Aborted(Vec<BuildFailure>),
    Done(BuildSummary),
}

impl BuildOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, BuildOutcome::Aborted(_))
    }
}

/// Builds plugin bundles against one shared cache.
pub struct ResourcePipeline<'a> {
    cache: &'a dyn CacheStore,
    registry: &'a CompilerRegistry,
    options: PipelineOptions,
}

impl<'a> ResourcePipeline<'a> {
    pub fn new(
        cache: &'a dyn CacheStore,
        registry: &'a CompilerRegistry,
        options: PipelineOptions,
    ) -> Self {
        Self {
            cache,
            registry,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Builds `<plugin>/resources/build/*` from the plugin's manifest.
    pub fn build_plugin(&self, plugin: &Plugin) -> Result<BuildOutcome, PipelineError> {
        if !plugin.has_resources() {
            debug!(plugin = %plugin.info.name, "no resources declared");
            return Ok(BuildOutcome::NoResources);
        }
        let manifest = Manifest::from_plugin(plugin)?;
        self.build_manifest(&manifest)
    }

    /// Compiles, then assembles into `<manifest root>/resources/build`.
    pub fn build_manifest(&self, manifest: &Manifest) -> Result<BuildOutcome, PipelineError> {
        let mut state = PipelineState::Idle;
        if manifest.is_empty() {
            return Ok(BuildOutcome::NoResources);
        }

        transition(&mut state, PipelineState::Scanning);
        let report = Scheduler::new(self.cache, self.registry, &self.options.vendor_dirs)
            .with_jobs(self.options.jobs)
            .with_timeout(self.options.timeout)
            .schedule(manifest, self.options.cache_enabled)?;
        transition(&mut state, PipelineState::Joined);

        if !report.succeeded() {
            transition(&mut state, PipelineState::Aborted);
            for failure in &report.failures {
                warn!(path = %failure.source_path.display(), "compile failed");
            }
            return Ok(BuildOutcome::Aborted(report.failures));
        }

        transition(&mut state, PipelineState::Assembling);
        let bundles = Assembler::new(self.cache, self.registry, &self.options.vendor_dirs)
            .assemble(manifest)?;
        let out_dir = manifest.root.join(BUILD_DIR);
        let written = write_bundles(&bundles, &out_dir, Some(self.options.output_mode))?;
        transition(&mut state, PipelineState::Done);

        info!(
            root = %manifest.root.display(),
            compiled = report.compiled.len(),
            fresh = report.fresh.len(),
            "resources built"
        );
        Ok(BuildOutcome::Done(BuildSummary {
            bundles: written,
            compiled: report.compiled.len(),
            fresh: report.fresh.len(),
        }))
    }
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    debug!(from = %state, to = %next, "pipeline state");
    *state = next;
}
