use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use mt_config::ToolConfig;
use mt_core::error::{MtError, Result};
use mt_core::{mt_error, mt_error_with_details, mt_progress, mt_success};
use mt_plugin::validate_plugin;
use mt_resources::{
    BuildOutcome, CompilerRegistry, DiskCache, PipelineOptions, ResourcePipeline,
};

use super::select_plugins;

/// Command-line overrides for the build settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildFlags {
    pub rebuild: bool,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
}

fn pipeline_options(config: &ToolConfig, flags: BuildFlags) -> Result<PipelineOptions> {
    let mut options =
        PipelineOptions::from_settings(&config.build, config.build.output_mode_bits()?);
    options.cache_enabled = !flags.rebuild;
    if let Some(jobs) = flags.jobs {
        options.jobs = jobs.max(1);
    }
    if let Some(secs) = flags.timeout_secs {
        options.timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    Ok(options)
}

/// Builds every selected plugin, then fails with a build status if any
/// plugin had a compile failure or could not be assembled.
pub fn handle_build(
    root: &Path,
    dirs: &[PathBuf],
    flags: BuildFlags,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = ToolConfig::load(config_path)?;
    let registry = CompilerRegistry::from_config(&config)?;
    let cache_dir = config.build.resolved_cache_dir()?;
    let cache = DiskCache::open(&cache_dir)?;
    let options = pipeline_options(&config, flags)?;
    info!(
        cache = %cache_dir.display(),
        jobs = options.jobs,
        rebuild = flags.rebuild,
        "starting build"
    );

    let plugins = select_plugins(root, dirs)?;
    let pipeline = ResourcePipeline::new(&cache, &registry, options);
    let mut failures = 0;

    for plugin in &plugins {
        let validation = validate_plugin(plugin);
        if !validation.is_valid {
            mt_error_with_details!(
                format!("Invalid resources in {}", plugin.info.name),
                validation
                    .errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
            );
            failures += validation.errors.len();
            continue;
        }

        match pipeline.build_plugin(plugin) {
            Err(e) => {
                mt_error!("{}: {}", plugin.info.name, e);
                error!(plugin = %plugin.info.name, error = %e, "build aborted");
                failures += 1;
            }
            Ok(BuildOutcome::NoResources) => {}
            Ok(BuildOutcome::Done(summary)) => {
                mt_success!(
                    "{}: {} compiled, {} cached",
                    plugin.info.name,
                    summary.compiled,
                    summary.fresh
                );
            }
            Ok(BuildOutcome::Aborted(plugin_failures)) => {
                mt_error!("{}: build failed", plugin.info.name);
                for failure in &plugin_failures {
                    error!(
                        plugin = %plugin.info.name,
                        path = %failure.source_path.display(),
                        "{}",
                        failure.diagnostic.trim_end()
                    );
                    mt_error_with_details!(
                        failure.source_path.display(),
                        failure.diagnostic.trim_end().lines()
                    );
                }
                failures += plugin_failures.len();
            }
        }
    }

    if failures > 0 {
        return Err(MtError::BuildFailed(failures));
    }
    mt_progress!("Built {} plugin(s)", plugins.len());
    Ok(())
}
