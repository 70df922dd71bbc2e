//! Exclusion rules deciding which project files stay out of the bundle.
//!
//! Rules are checked in order; the first four are structural and hold even
//! when the project declares no `exclude` patterns:
//!
//! 1. anything under the output directory
//! 2. the entry file
//! 3. prelude files
//! 4. the project file and housekeeping entries (`.git`, `.gitignore`, `.vscode`)
//! 5. user `exclude` patterns (plain substring match)

use super::discover::{DEFAULT_SCRIPT_EXTENSION, normalize_relative};
use crate::config::ProjectConfig;
use std::path::Path;

/// Path components that never belong to a bundle, wherever they appear.
pub const RESERVED_NAMES: &[&str] = &[".git", ".gitignore", ".vscode"];

/// Whether `relative_path` (root-relative, `/`-separated) must be left out.
pub fn is_excluded(relative_path: &str, config: &ProjectConfig) -> bool {
    let path = normalize_relative(relative_path);

    is_output(&path, config)
        || path == normalize_relative(&config.main)
        || config
            .prelude_files()
            .into_iter()
            .any(|prelude| path == normalize_relative(prelude))
        || is_reserved(&path, config)
        || matches_pattern(&path, &config.exclude)
}

/// Rule 1: component-wise prefix, so `build/` does not swallow `buildings.lua`.
fn is_output(path: &str, config: &ProjectConfig) -> bool {
    let output = normalize_relative(&config.export_directory.to_string_lossy());
    Path::new(path).starts_with(output)
}

/// Rule 4
fn is_reserved(path: &str, config: &ProjectConfig) -> bool {
    path == normalize_relative(&config.config_file)
        || path.split('/').any(|component| RESERVED_NAMES.contains(&component))
}

/// Rule 5: extensionless paths are matched as if they were scripts, so a
/// pattern written as `tools/gen.lua` also hides the file `tools/gen`.
fn matches_pattern(path: &str, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return false;
    }

    let candidate = if Path::new(path).extension().is_some() {
        path.to_owned()
    } else {
        format!("{path}{DEFAULT_SCRIPT_EXTENSION}")
    };

    patterns
        .iter()
        .any(|pattern| candidate.contains(pattern.as_str()))
}
