//! Project file discovery and classification.
//!
//! Entries of one directory are visited in file-name order, so two walks over
//! the same tree always yield the same sequence. That order is the bundle's
//! module order.

use super::BuildError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions treated as script modules.
pub const SCRIPT_EXTENSIONS: &[&str] = &["lua", "luau"];

/// Appended to extensionless paths before exclusion matching.
pub const DEFAULT_SCRIPT_EXTENSION: &str = ".lua";

/// How a discovered file is embedded into the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `.lua` / `.luau`: wrapped in a module closure
    Script,
    /// `.json`: rebuilt as a table literal
    Json,
    /// Anything else: embedded byte-for-byte
    Opaque,
}

impl FileKind {
    pub fn from_extension(extension: &str) -> Self {
        if SCRIPT_EXTENSIONS.contains(&extension) {
            Self::Script
        } else if extension == "json" {
            Self::Json
        } else {
            Self::Opaque
        }
    }
}

/// A file found under the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub absolute_path: PathBuf,
    /// Root-relative, `/`-separated on every platform. Lossy when the path
    /// is not valid UTF-8.
    pub relative_path: String,
    /// False when `relative_path` had to replace invalid bytes
    pub utf8_path: bool,
    /// Without the leading dot; empty when the file has none
    pub extension: String,
    pub kind: FileKind,
}

impl DiscoveredFile {
    fn new(root: &Path, path: PathBuf) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(&path);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_owned();

        Self {
            relative_path: to_slash(relative),
            utf8_path: relative.to_str().is_some(),
            kind: FileKind::from_extension(&extension),
            extension,
            absolute_path: path,
        }
    }
}

/// Recursively collect files under `root`.
///
/// Directories are always traversed. With `extension_filter`, only files whose
/// extension is listed are returned. Any unreadable entry aborts the walk.
pub fn discover(
    root: &Path,
    extension_filter: Option<&[&str]>,
) -> Result<Vec<DiscoveredFile>, BuildError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| BuildError::Discovery(root.to_path_buf(), err))?;
        if entry.file_type().is_dir() {
            continue;
        }

        let file = DiscoveredFile::new(root, entry.into_path());
        if let Some(filter) = extension_filter
            && !filter.contains(&file.extension.as_str())
        {
            continue;
        }
        files.push(file);
    }

    Ok(files)
}

/// Render a relative path with `/` separators.
///
/// Invalid UTF-8 is replaced per component, so no component is ever dropped.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .filter(|c| *c != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalize a user-written relative path (`./a\b.lua` → `a/b.lua`).
pub fn normalize_relative(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let mut path = path.as_str();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path.trim_start_matches('/').to_owned()
}

/// Whether `path` already ends in one of the script extensions.
pub fn has_script_extension(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SCRIPT_EXTENSIONS.contains(&e))
}
