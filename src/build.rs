//! Bundle building orchestration.
//!
//! # Architecture
//!
//! ```text
//! build_project()
//!     │
//!     ├── bundler::build() ──► BuildResult (text + failed units)
//!     │
//!     ├── bundler::write_bundle() ──► <exportDirectory>/<bundleName>
//!     │
//!     └── log_build_result() ──► "done" or failure list
//! ```

use crate::{
    bundler::{self, BuildResult},
    config::ProjectConfig,
    log,
};
use anyhow::{Context, Result};
use std::{
    path::{Path, PathBuf},
    time::Instant,
};

/// What a finished build produced, for callers that report or compare it.
#[derive(Debug)]
pub struct BuildReport {
    pub output_path: PathBuf,
    pub result: BuildResult,
}

/// Build the project at `root` and write the bundle to disk.
pub fn build_project(root: &Path, config: &ProjectConfig) -> Result<BuildReport> {
    let started = Instant::now();

    let result = bundler::build(root, config)
        .with_context(|| format!("Failed to bundle {}", root.display()))?;
    let output_path = bundler::write_bundle(root, config, &result)?;

    log_build_result(root, &output_path, &result, started);

    Ok(BuildReport {
        output_path,
        result,
    })
}

/// Log the outcome: a summary line, then one line per skipped unit.
fn log_build_result(root: &Path, output_path: &Path, result: &BuildResult, started: Instant) {
    let rel = output_path.strip_prefix(root).unwrap_or(output_path);
    log!(
        "build";
        "{} modules, {} imports → {}",
        result.modules,
        result.imports,
        rel.display()
    );

    let elapsed = started.elapsed().as_secs_f64();
    if result.failed.is_empty() {
        log!("build"; "done in {elapsed:.2}s with 0 issues");
        return;
    }

    log!(
        "warn";
        "failed to build the following files: {}",
        result.failed_paths().join(", ")
    );
    for unit in &result.failed {
        log!("warn"; "{}: {}", unit.path, unit.reason);
    }
    log!("build"; "done in {elapsed:.2}s with {} issues", result.failed.len());
}
