//! Front-end resource build pipeline
//!
//! Compiles each declared plugin asset at most once per change, with bounded
//! concurrency, then concatenates the results into four bundles in manifest
//! order:
//!
//! - [`cache`]: path-keyed store of compiled output, mtime freshness
//! - [`dispatcher`]: extension → external compiler registry
//! - [`scheduler`]: parallel compile of stale sources, collects every failure
//! - [`assembler`]: ordered concatenation and bundle writing
//! - [`pipeline`]: ties the four together per plugin

pub mod assembler;
pub mod cache;
pub mod dispatcher;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod scheduler;

pub use assembler::{write_bundles, Assembler, BundleKind, BundleSet, BUILD_DIR};
pub use cache::{CacheKey, CacheStats, CacheStore, DiskCache, MemoryCache};
pub use dispatcher::{AssetCategory, CompilerInvocation, CompilerRegistry, CompilerSpec};
pub use error::{CacheError, PipelineError};
pub use manifest::{Manifest, ResourceEntry, ResourceRole};
pub use pipeline::{BuildOutcome, BuildSummary, PipelineOptions, PipelineState, ResourcePipeline};
pub use scheduler::{BuildFailure, BuildReport, BuildTask, Scheduler};
