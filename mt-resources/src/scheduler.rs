//! Parallel compilation of stale resources.
//!
//! Planning walks the manifest in order and creates one [`BuildTask`] per
//! stale, compilable, non-vendor source. Tasks then run on a bounded rayon
//! pool. Every task runs to completion and returns its own result; the
//! collected results are the only join point, so no failure list is shared
//! between workers.

use rayon::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use mt_core::command_stream::{run_captured_with_deadline, CommandOutcome};

use crate::cache::{CacheKey, CacheStore};
use crate::dispatcher::{CompilerInvocation, CompilerRegistry};
use crate::error::PipelineError;
use crate::manifest::{Manifest, ResourceEntry, ResourceRole};

/// One compile of one stale source
#[derive(Debug, Clone)]
pub struct BuildTask {
    pub source_path: PathBuf,
    pub key: CacheKey,
    pub invocation: CompilerInvocation,
}

/// A source that could not be compiled, with whatever the compiler said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub source_path: PathBuf,
    pub diagnostic: String,
}

impl BuildFailure {
    fn new(source_path: PathBuf, diagnostic: impl Into<String>) -> Self {
        Self {
            source_path,
            diagnostic: diagnostic.into(),
        }
    }
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source_path.display(), self.diagnostic.trim_end())
    }
}

/// What one `schedule` call did
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Sources compiled and cached by this run
    pub compiled: Vec<PathBuf>,
    /// Sources whose cache entry was already fresh
    pub fresh: Vec<PathBuf>,
    pub failures: Vec<BuildFailure>,
}

impl BuildReport {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn tasks_launched(&self) -> usize {
        self.compiled.len() + self.failures.len()
    }
}

/// Schedules compiler runs against a shared cache.
pub struct Scheduler<'a> {
    cache: &'a dyn CacheStore,
    registry: &'a CompilerRegistry,
    vendor_dirs: &'a [String],
    jobs: usize,
    timeout: Option<Duration>,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        cache: &'a dyn CacheStore,
        registry: &'a CompilerRegistry,
        vendor_dirs: &'a [String],
    ) -> Self {
        Self {
            cache,
            registry,
            vendor_dirs,
            jobs: num_workers_default(),
            timeout: None,
        }
    }

    /// Caps the number of compilers running at once. `0` is treated as `1`.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Kills a compiler that runs longer than `timeout` and records a failure.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Compiles every stale source of `manifest` and waits for all of them.
    ///
    /// With `cache_enabled` false every compilable source is stale.
    pub fn schedule(
        &self,
        manifest: &Manifest,
        cache_enabled: bool,
    ) -> Result<BuildReport, PipelineError> {
        let mut report = BuildReport::default();
        let tasks = self.plan(manifest, cache_enabled, &mut report);

        if tasks.is_empty() {
            debug!(fresh = report.fresh.len(), "nothing to compile");
            return Ok(report);
        }

        info!(
            tasks = tasks.len(),
            jobs = self.jobs,
            "compiling stale resources"
        );
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs.min(tasks.len()))
            .thread_name(|index| format!("mt-compile-{index}"))
            .build()
            .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;

        let results: Vec<Result<PathBuf, BuildFailure>> =
            pool.install(|| tasks.par_iter().map(|task| self.run_task(task)).collect());

        for result in results {
            match result {
                Ok(path) => report.compiled.push(path),
                Err(failure) => report.failures.push(failure),
            }
        }
        Ok(report)
    }

    /// Creates tasks in manifest order. Sources that cannot be inspected
    /// become failures without a task.
    fn plan(
        &self,
        manifest: &Manifest,
        cache_enabled: bool,
        report: &mut BuildReport,
    ) -> Vec<BuildTask> {
        let mut tasks = Vec::new();
        let mut seen = HashSet::new();

        for entry in &manifest.entries {
            if !matches!(
                entry.role(self.registry, self.vendor_dirs),
                ResourceRole::Compiled(_)
            ) {
                continue;
            }
            let key = CacheKey::for_path(&entry.source);
            // A source listed twice is still compiled once
            if !seen.insert(key.clone()) {
                continue;
            }

            let source_mtime = match source_mtime(entry) {
                Ok(mtime) => mtime,
                Err(failure) => {
                    warn!(path = %entry.source.display(), "cannot stat resource");
                    report.failures.push(failure);
                    continue;
                }
            };

            if self.cache.is_fresh(&key, source_mtime, cache_enabled) {
                debug!(path = %entry.path, "cache fresh");
                report.fresh.push(entry.source.clone());
                continue;
            }

            let Some(invocation) = self.registry.dispatch(&entry.source) else {
                continue;
            };
            tasks.push(BuildTask {
                source_path: entry.source.clone(),
                key,
                invocation,
            });
        }
        tasks
    }

    fn run_task(&self, task: &BuildTask) -> Result<PathBuf, BuildFailure> {
        let source = task.source_path.clone();
        info!(path = %source.display(), compiler = %task.invocation.program, "compiling");

        let outcome = run_captured_with_deadline(
            &task.invocation.program,
            task.invocation.args.as_slice(),
            None,
            self.timeout,
        )
        .map_err(|e| BuildFailure::new(source.clone(), e.to_string()))?;

        let output = match outcome {
            CommandOutcome::Finished(output) => output,
            CommandOutcome::TimedOut => {
                let limit = self.timeout.unwrap_or_default();
                return Err(BuildFailure::new(
                    source,
                    format!("{} timed out after {:?}", task.invocation, limit),
                ));
            }
        };

        if !output.success() {
            let status = output
                .status_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(BuildFailure::new(
                source,
                format!(
                    "{} exited with status {}\n{}",
                    task.invocation,
                    status,
                    output.combined()
                ),
            ));
        }

        self.cache
            .put(&task.key, &output.stdout)
            .map_err(|e| BuildFailure::new(source.clone(), e.to_string()))?;
        Ok(source)
    }
}

fn source_mtime(entry: &ResourceEntry) -> Result<SystemTime, BuildFailure> {
    fs::metadata(&entry.source)
        .and_then(|metadata| metadata.modified())
        .map_err(|e| BuildFailure::new(entry.source.clone(), format!("cannot read source: {e}")))
}

fn num_workers_default() -> usize {
    num_cpus::get().max(1)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::dispatcher::{AssetCategory, CompilerSpec};
    use std::path::Path;
    use tempfile::TempDir;

    fn vendor_dirs() -> Vec<String> {
        vec!["vendor".to_string()]
    }

    /// `.t` files compile by printing themselves upper-cased; `.bad` files fail.
    fn registry() -> CompilerRegistry {
        let mut registry = CompilerRegistry::with_defaults();
        registry.register(
            "t",
            CompilerSpec::new(
                AssetCategory::Script,
                ["sh", "-c", "tr a-z A-Z < \"$1\"", "sh", "{path}"],
            ),
        );
        registry.register(
            "bad",
            CompilerSpec::new(
                AssetCategory::Style,
                ["sh", "-c", "echo \"syntax error in $1\" >&2; exit 3", "sh", "{path}"],
            ),
        );
        registry.register(
            "slow",
            CompilerSpec::new(AssetCategory::Script, ["sh", "-c", "exec sleep 5", "sh", "{path}"]),
        );
        registry
    }

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_compiles_stale_and_caches_stdout() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.t", "hello");
        write(dir.path(), "b.js", "raw");
        let manifest = Manifest::new(dir.path(), ["a.t", "b.js"]).unwrap();

        let cache = MemoryCache::new();
        let registry = registry();
        let dirs = vendor_dirs();
        let report = Scheduler::new(&cache, &registry, &dirs)
            .schedule(&manifest, true)
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(report.compiled, vec![dir.path().join("a.t")]);
        let key = CacheKey::for_path(&dir.path().join("a.t"));
        assert_eq!(cache.get(&key).unwrap(), Some(b"HELLO".to_vec()));
        // raw sources are never cached
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_fresh_entries_launch_nothing() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.t", "hello");
        let manifest = Manifest::new(dir.path(), ["a.t"]).unwrap();

        let cache = MemoryCache::new();
        let key = CacheKey::for_path(&dir.path().join("a.t"));
        let later = SystemTime::now() + Duration::from_secs(3600);
        cache.insert_with_time(key.clone(), b"cached".to_vec(), later);

        let registry = registry();
        let dirs = vendor_dirs();
        let report = Scheduler::new(&cache, &registry, &dirs)
            .schedule(&manifest, true)
            .unwrap();
        assert_eq!(report.tasks_launched(), 0);
        assert_eq!(report.fresh.len(), 1);
        assert_eq!(cache.get(&key).unwrap(), Some(b"cached".to_vec()));

        // Disabled cache forces the compile
        let report = Scheduler::new(&cache, &registry, &dirs)
            .schedule(&manifest, false)
            .unwrap();
        assert_eq!(report.compiled.len(), 1);
        assert_eq!(cache.get(&key).unwrap(), Some(b"HELLO".to_vec()));
    }

    #[test]
    fn test_collects_every_failure() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "one.bad", "");
        write(dir.path(), "two.bad", "");
        write(dir.path(), "ok.t", "fine");
        let manifest =
            Manifest::new(dir.path(), ["one.bad", "ok.t", "two.bad", "missing.t"]).unwrap();

        let cache = MemoryCache::new();
        let registry = registry();
        let dirs = vendor_dirs();
        let report = Scheduler::new(&cache, &registry, &dirs)
            .with_jobs(1)
            .schedule(&manifest, true)
            .unwrap();

        assert!(!report.succeeded());
        assert_eq!(report.failures.len(), 3);
        assert_eq!(report.compiled, vec![dir.path().join("ok.t")]);

        let bad = report
            .failures
            .iter()
            .find(|f| f.source_path.ends_with("one.bad"))
            .unwrap();
        assert!(bad.diagnostic.contains("exited with status 3"));
        assert!(bad.diagnostic.contains("syntax error in"));
        assert!(report
            .failures
            .iter()
            .any(|f| f.source_path.ends_with("missing.t")
                && f.diagnostic.contains("cannot read source")));
        // failed compiles leave nothing behind
        assert!(cache
            .get(&CacheKey::for_path(&dir.path().join("one.bad")))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_vendor_and_duplicate_entries() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "vendor/lib.t", "vendored");
        write(dir.path(), "a.t", "x");
        let manifest = Manifest::new(dir.path(), ["vendor/lib.t", "a.t", "a.t"]).unwrap();

        let cache = MemoryCache::new();
        let registry = registry();
        let dirs = vendor_dirs();
        let report = Scheduler::new(&cache, &registry, &dirs)
            .schedule(&manifest, true)
            .unwrap();
        assert_eq!(report.tasks_launched(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_timeout_becomes_failure() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "hang.slow", "");
        let manifest = Manifest::new(dir.path(), ["hang.slow"]).unwrap();

        let cache = MemoryCache::new();
        let registry = registry();
        let dirs = vendor_dirs();
        let report = Scheduler::new(&cache, &registry, &dirs)
            .with_timeout(Some(Duration::from_millis(200)))
            .schedule(&manifest, true)
            .unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].diagnostic.contains("timed out after 200ms"));
    }

    #[test]
    fn test_jobs_caps_running_compilers() {
        let dir = TempDir::new().unwrap();
        let running = dir.path().join("running");
        fs::create_dir_all(&running).unwrap();
        let peak = dir.path().join("peak.log");

        // Each compile leaves a marker while it runs and logs how many
        // markers it saw, so the log holds every observed level.
        let script = format!(
            "touch {running}/$$; sleep 0.3; ls {running} | wc -l >> {peak}; \
             sleep 0.2; rm {running}/$$; cat \"$1\"",
            running = running.display(),
            peak = peak.display(),
        );
        let mut registry = CompilerRegistry::empty();
        registry.register(
            "t",
            CompilerSpec::new(
                AssetCategory::Script,
                ["sh", "-c", script.as_str(), "sh", "{path}"],
            ),
        );

        let names: Vec<String> = (0..6).map(|i| format!("src{i}.t")).collect();
        for name in &names {
            write(dir.path(), name, name);
        }
        let manifest = Manifest::new(dir.path(), &names).unwrap();

        let cache = MemoryCache::new();
        let dirs = vendor_dirs();
        let report = Scheduler::new(&cache, &registry, &dirs)
            .with_jobs(2)
            .schedule(&manifest, true)
            .unwrap();

        assert!(report.succeeded(), "{:?}", report.failures);
        assert_eq!(report.compiled.len(), 6);
        assert_eq!(cache.len(), 6);

        let levels: Vec<usize> = fs::read_to_string(&peak)
            .unwrap()
            .lines()
            .map(|line| line.trim().parse().unwrap())
            .collect();
        assert_eq!(levels.len(), 6);
        let max = levels.iter().copied().max().unwrap();
        assert!(max <= 2, "saw {max} compilers running at once");
        assert!(levels.iter().all(|&level| level >= 1));
        assert!(fs::read_dir(&running).unwrap().next().is_none());
    }

    #[test]
    fn test_missing_compiler_is_a_failure() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.zz", "");
        let mut registry = CompilerRegistry::empty();
        registry.register(
            "zz",
            CompilerSpec::new(AssetCategory::Script, ["definitely-not-a-compiler-xyz"]),
        );
        let manifest = Manifest::new(dir.path(), ["a.zz"]).unwrap();

        let cache = MemoryCache::new();
        let dirs = vendor_dirs();
        let report = Scheduler::new(&cache, &registry, &dirs)
            .schedule(&manifest, true)
            .unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0]
            .diagnostic
            .contains("definitely-not-a-compiler-xyz"));
    }
}
