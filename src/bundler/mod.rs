//! The bundling engine.
//!
//! # Pipeline
//!
//! ```text
//! discover() ──► is_excluded() ──► render_*() ──► assemble()
//!     │                                 ▲
//!     └──────► scan() ─► resolve_target()┘ (unresolved → failures)
//! ```
//!
//! [`build`] is pure with respect to the output: it reads the project and
//! returns the bundle text together with every unit that had to be skipped.
//! [`write_bundle`] puts the text on disk. Fatal problems (no project, no
//! entry file, unreadable tree) surface as [`BuildError`]; everything else is
//! collected in [`BuildResult::failed`] and the build carries on.

pub mod assemble;
pub mod discover;
pub mod exclude;
pub mod references;
pub mod render;

use crate::config::{ConfigError, ProjectConfig};
use assemble::Sections;
use discover::{DiscoveredFile, FileKind, normalize_relative};
use references::ReferenceSet;
use render::RenderedUnit;
use rustc_hash::FxHashMap;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

// ============================================================================
// Errors and results
// ============================================================================

/// Problems that stop a build before anything is written.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no luacompact project found at `{0}` (run `luacompact init` to create one)")]
    ProjectNotFound(PathBuf),

    #[error("invalid project file")]
    Config(#[from] ConfigError),

    #[error("project root `{0}` does not exist")]
    RootNotFound(PathBuf),

    #[error("entry file `{0}` not found (check `main` in the project file)")]
    EntryNotFound(PathBuf),

    #[error("failed to read entry file `{0}`")]
    Entry(PathBuf, #[source] io::Error),

    #[error("failed to scan `{0}`")]
    Discovery(PathBuf, #[source] walkdir::Error),

    #[error("failed to write bundle `{0}`")]
    Write(PathBuf, #[source] io::Error),
}

/// Why a single unit was left out of the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("unreadable: {0}")]
    Unreadable(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("prelude file not found")]
    MissingPrelude,

    #[error("load target not found")]
    UnresolvedLoad,

    #[error("import target not found")]
    UnresolvedImport,

    #[error("load target `{0}` is not a script")]
    NotAScript(String),

    #[error("import target `{0}` is a script, use load()")]
    NotAnAsset(String),

    #[error("module is registered as `{0}` by its _NAME line, load it by that name")]
    RenamedModule(String),

    #[error("path is not valid UTF-8")]
    NonUtf8Path,
}

/// A skipped unit and the reason it was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUnit {
    pub path: String,
    pub reason: FailureReason,
}

/// Outcome of a build that got far enough to produce a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub output_text: String,
    pub failed: Vec<FailedUnit>,
    pub modules: usize,
    pub imports: usize,
}

impl BuildResult {
    pub fn failed_paths(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.path.as_str()).collect()
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Load and validate `<root>/<config_name>`.
pub fn load_config(root: &Path, config_name: &Path) -> Result<ProjectConfig, BuildError> {
    let path = root.join(config_name);
    if !path.is_file() {
        return Err(BuildError::ProjectNotFound(root.to_path_buf()));
    }
    let config = ProjectConfig::from_path(&path)?;
    config.validate()?;
    Ok(config)
}

/// Load the project file from `root` and build it.
pub fn bundle_project(root: &Path, config_name: &Path) -> Result<BuildResult, BuildError> {
    let config = load_config(root, config_name)?;
    build(root, &config)
}

/// Build the bundle text for the project at `root`.
pub fn build(root: &Path, config: &ProjectConfig) -> Result<BuildResult, BuildError> {
    if !root.is_dir() {
        return Err(BuildError::RootNotFound(root.to_path_buf()));
    }

    let entry_path = root.join(normalize_relative(&config.main));
    if !entry_path.is_file() {
        return Err(BuildError::EntryNotFound(entry_path));
    }
    let entry = fs::read_to_string(&entry_path).map_err(|e| BuildError::Entry(entry_path, e))?;

    let files = discover::discover(root, None)?;
    let mut state = BuildState::default();

    let preludes = state.read_preludes(root, config);

    let mut references = references::scan(&entry);
    for prelude in &preludes {
        references.merge(references::scan(prelude));
    }

    for file in files.iter().filter(|f| !exclude::is_excluded(&f.relative_path, config)) {
        if !file.utf8_path {
            state.fail(&file.relative_path, FailureReason::NonUtf8Path);
            continue;
        }
        match file.kind {
            FileKind::Script => {
                if let Some(source) = state.read_text(file) {
                    references.merge(references::scan(&source));
                    let unit = render::render_module(&file.relative_path, &source);
                    state
                        .module_keys
                        .insert(file.relative_path.clone(), unit.key.clone());
                    state.add_module(unit);
                }
            }
            FileKind::Json => {
                if let Some(source) = state.read_text(file) {
                    match render::render_json(&file.relative_path, &source) {
                        Ok(unit) => state.add_import(unit),
                        Err(e) => state.fail(&file.relative_path, FailureReason::InvalidJson(e.to_string())),
                    }
                }
            }
            FileKind::Opaque => match fs::read(&file.absolute_path) {
                Ok(bytes) => state.add_import(render::render_opaque(&file.relative_path, &bytes)),
                Err(e) => state.fail(&file.relative_path, FailureReason::Unreadable(e.to_string())),
            },
        }
    }

    state.check_references(&references, &files, config);

    let output_text = assemble::assemble(&Sections {
        imports: &state.imports,
        preludes: &preludes,
        modules: &state.modules,
        entry: &entry,
    });

    Ok(BuildResult {
        output_text,
        modules: state.modules.len(),
        imports: state.imports.len(),
        failed: state.failed,
    })
}

/// Write the bundle into the configured output directory, replacing any
/// previous file. Returns the path written.
pub fn write_bundle(
    root: &Path,
    config: &ProjectConfig,
    result: &BuildResult,
) -> Result<PathBuf, BuildError> {
    let output_dir = config.output_dir(root);
    fs::create_dir_all(&output_dir).map_err(|e| BuildError::Write(output_dir.clone(), e))?;

    let path = config.output_path(root);
    fs::write(&path, &result.output_text).map_err(|e| BuildError::Write(path.clone(), e))?;
    Ok(path)
}

// ============================================================================
// Accumulators
// ============================================================================

#[derive(Debug, Default)]
struct BuildState {
    modules: Vec<RenderedUnit>,
    imports: Vec<RenderedUnit>,
    failed: Vec<FailedUnit>,
    /// Relative path of each rendered script → key it was emitted under
    module_keys: FxHashMap<String, String>,
}

impl BuildState {
    fn fail(&mut self, path: &str, reason: FailureReason) {
        self.failed.push(FailedUnit {
            path: path.to_owned(),
            reason,
        });
    }

    fn read_text(&mut self, file: &DiscoveredFile) -> Option<String> {
        match fs::read_to_string(&file.absolute_path) {
            Ok(text) => Some(text),
            Err(e) => {
                self.fail(&file.relative_path, FailureReason::Unreadable(e.to_string()));
                None
            }
        }
    }

    /// Keys are unique per table; a repeated key replaces the earlier unit in place.
    fn upsert(units: &mut Vec<RenderedUnit>, unit: RenderedUnit) {
        match units.iter_mut().find(|u| u.key == unit.key) {
            Some(existing) => *existing = unit,
            None => units.push(unit),
        }
    }

    fn add_module(&mut self, unit: RenderedUnit) {
        Self::upsert(&mut self.modules, unit);
    }

    fn add_import(&mut self, unit: RenderedUnit) {
        Self::upsert(&mut self.imports, unit);
    }

    fn read_preludes(&mut self, root: &Path, config: &ProjectConfig) -> Vec<String> {
        let mut preludes = Vec::new();
        for prelude in config.prelude_files() {
            let path = root.join(normalize_relative(prelude));
            if !path.is_file() {
                self.fail(prelude, FailureReason::MissingPrelude);
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(text) => preludes.push(text),
                Err(e) => self.fail(prelude, FailureReason::Unreadable(e.to_string())),
            }
        }
        preludes
    }

    /// Record targets that name nothing bundleable.
    ///
    /// Targets that resolve to excluded files are skipped without a record.
    fn check_references(
        &mut self,
        references: &ReferenceSet,
        files: &[DiscoveredFile],
        config: &ProjectConfig,
    ) {
        if references.is_empty() {
            return;
        }

        for target in &references.load_targets {
            if self.modules.iter().any(|m| &m.key == target) {
                continue;
            }
            match references::resolve_target(target, files) {
                None => self.fail(target, FailureReason::UnresolvedLoad),
                Some(file) if exclude::is_excluded(&file.relative_path, config) => {}
                Some(file) if file.kind != FileKind::Script => {
                    self.fail(target, FailureReason::NotAScript(file.relative_path.clone()));
                }
                Some(file) => {
                    // unreadable scripts have no key and are already recorded
                    if let Some(key) = self.module_keys.get(&file.relative_path)
                        && *key != file.relative_path
                    {
                        let reason = FailureReason::RenamedModule(key.clone());
                        self.fail(target, reason);
                    }
                }
            }
        }

        for target in &references.import_targets {
            match references::resolve_target(target, files) {
                None => self.fail(target, FailureReason::UnresolvedImport),
                Some(file) if exclude::is_excluded(&file.relative_path, config) => {}
                Some(file) if file.kind == FileKind::Script => {
                    self.fail(target, FailureReason::NotAnAsset(file.relative_path.clone()));
                }
                Some(_) => {}
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use super::assemble::runtime_header;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: impl AsRef<[u8]>) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn project(config: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "luacompact.json", config);
        dir
    }

    fn build_dir(dir: &TempDir) -> BuildResult {
        bundle_project(dir.path(), Path::new("luacompact.json")).unwrap()
    }

    #[test]
    fn test_entry_only_project() {
        let dir = project(r#"{ "main": "index.lua" }"#);
        write(dir.path(), "index.lua", "print(\"Hello World!\")");

        let result = build_dir(&dir);
        assert_eq!(
            result.output_text,
            format!("{}print(\"Hello World!\")", runtime_header())
        );
        assert!(result.failed.is_empty());
        assert_eq!((result.modules, result.imports), (0, 0));
    }

    #[test]
    fn test_full_layout() {
        let dir = project(r#"{ "main": "index.lua", "prelude": "prelude.lua" }"#);
        let root = dir.path();
        write(root, "index.lua", "local util = load(\"src/util\")\nlocal cfg = import(\"data/cfg.json\")");
        write(root, "prelude.lua", "PRELUDE = true");
        write(root, "src/util.lua", "return {}");
        write(root, "data/cfg.json", r#"{"name": "demo"}"#);

        let result = build_dir(&dir);
        assert!(result.failed.is_empty(), "{:?}", result.failed);

        let expected = format!(
            "{}{}{}{}{}",
            runtime_header(),
            "luacompactImports[\"data/cfg.json\"] = function()\n\tlocal object = {}\n\tobject[\"name\"] = \"demo\"\n\treturn object\nend\n\n",
            "PRELUDE = true\n",
            "luacompactModules[\"src/util.lua\"] = function()\n\treturn {}\nend\n\n",
            "local util = load(\"src/util\")\nlocal cfg = import(\"data/cfg.json\")",
        );
        assert_eq!(result.output_text, expected);
    }

    #[test]
    fn test_build_is_deterministic() {
        let dir = project(r#"{ "main": "main.lua" }"#);
        let root = dir.path();
        write(root, "main.lua", "load(\"z\")\nload(\"a\")");
        for name in ["z.lua", "a.lua", "m/x.lua", "m/b.luau", "img.bin"] {
            write(root, name, name);
        }

        let first = build_dir(&dir);
        let second = build_dir(&dir);
        assert_eq!(first.output_text, second.output_text);

        // modules follow path order, not reference order
        let a = first.output_text.find("[\"a.lua\"]").unwrap();
        let b = first.output_text.find("[\"m/b.luau\"]").unwrap();
        let z = first.output_text.find("[\"z.lua\"]").unwrap();
        assert!(a < b && b < z);
    }

    #[test]
    fn test_excluded_file_never_bundled_even_when_referenced() {
        let dir = project(r#"{ "main": "index.lua", "exclude": ["src/secret.lua", "assets/private"] }"#);
        let root = dir.path();
        write(root, "index.lua", "load(\"src/secret\")\nimport(\"assets/private.txt\")");
        write(root, "src/secret.lua", "return 42");
        write(root, "assets/private.txt", "hidden");

        let result = build_dir(&dir);
        assert!(!result.output_text.contains("src/secret.lua\"]"));
        assert!(!result.output_text.contains("assets/private.txt\"]"));
        assert!(result.failed.is_empty());
    }

    #[test]
    fn test_malformed_json_is_one_failure() {
        let dir = project(r#"{ "main": "index.lua" }"#);
        let root = dir.path();
        write(root, "index.lua", "print(1)");
        write(root, "bad.json", "{ \"a\": ");
        write(root, "good.json", "{ \"a\": 1 }");
        write(root, "lib.lua", "return 1");

        let result = build_dir(&dir);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].path, "bad.json");
        assert!(matches!(result.failed[0].reason, FailureReason::InvalidJson(_)));
        assert!(!result.output_text.contains("[\"bad.json\"]"));
        assert!(result.output_text.contains("luacompactImports[\"good.json\"]"));
        assert!(result.output_text.contains("luacompactModules[\"lib.lua\"]"));
    }

    #[test]
    fn test_unresolved_references_are_recorded() {
        let dir = project(r#"{ "main": "index.lua" }"#);
        let root = dir.path();
        write(root, "index.lua", "load(\"missing/mod\")\nimport(\"missing.png\")\nload(\"missing/mod\")");

        let result = build_dir(&dir);
        assert_eq!(result.failed_paths(), vec!["missing/mod", "missing.png"]);
        assert_eq!(result.failed[0].reason, FailureReason::UnresolvedLoad);
        assert_eq!(result.failed[1].reason, FailureReason::UnresolvedImport);
    }

    #[test]
    fn test_reference_kind_mismatch() {
        let dir = project(r#"{ "main": "index.lua" }"#);
        let root = dir.path();
        write(root, "index.lua", "load(\"data.json\")\nimport(\"lib\")");
        write(root, "data.json", "{}");
        write(root, "lib.lua", "return 1");

        let result = build_dir(&dir);
        assert_eq!(
            result.failed[0].reason,
            FailureReason::NotAScript("data.json".into())
        );
        assert_eq!(
            result.failed[1].reason,
            FailureReason::NotAnAsset("lib.lua".into())
        );
    }

    #[test]
    fn test_named_module_satisfies_load() {
        let dir = project(r#"{ "main": "index.lua" }"#);
        let root = dir.path();
        write(root, "index.lua", "local v = load(\"Vector\")");
        write(root, "math/vec.lua", "_NAME = \"Vector\"\nreturn {}");

        let result = build_dir(&dir);
        assert!(result.failed.is_empty());
        assert!(result.output_text.contains("luacompactModules[\"Vector\"] = function()"));
    }

    #[test]
    fn test_load_by_path_of_named_module_fails() {
        let dir = project(r#"{ "main": "index.lua" }"#);
        let root = dir.path();
        write(root, "index.lua", "local v = load(\"math/vec\")");
        write(root, "math/vec.lua", "_NAME = \"Vector\"\nreturn {}");

        let result = build_dir(&dir);
        assert_eq!(result.failed_paths(), vec!["math/vec"]);
        assert_eq!(
            result.failed[0].reason,
            FailureReason::RenamedModule("Vector".into())
        );
        assert!(!result.output_text.contains("luacompactModules[\"math/vec.lua\"]"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_are_recorded_not_merged() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let dir = project(r#"{ "main": "index.lua" }"#);
        let root = dir.path();
        write(root, "index.lua", "main()");
        write(root, "util.lua", "return 'real'");

        let odd = root.join(OsStr::from_bytes(b"caf\xe9"));
        if fs::create_dir(&odd).is_err() {
            // filesystem refuses non-UTF-8 names
            return;
        }
        fs::write(odd.join("util.lua"), "return 'shadow'").unwrap();
        fs::write(odd.join("index.lua"), "return 'dropped'").unwrap();

        let result = build_dir(&dir);
        assert_eq!(result.modules, 1);
        assert!(result.output_text.contains("return 'real'"));
        assert!(!result.output_text.contains("shadow"));
        assert_eq!(result.failed.len(), 2);
        assert!(result.failed.iter().all(|f| f.reason == FailureReason::NonUtf8Path));
        assert!(result.failed.iter().all(|f| f.path.starts_with("caf\u{FFFD}/")));
    }

    #[test]
    fn test_references_in_modules_are_checked() {
        let dir = project(r#"{ "main": "index.lua" }"#);
        let root = dir.path();
        write(root, "index.lua", "load(\"a\")");
        write(root, "a.lua", "-- load(\"ignored\")\nreturn load(\"gone\")");

        let result = build_dir(&dir);
        assert_eq!(result.failed_paths(), vec!["gone"]);
    }

    #[test]
    fn test_missing_prelude_is_recoverable() {
        let dir = project(r#"{ "main": "index.lua", "prelude": ["p1.lua", "p2.lua"] }"#);
        let root = dir.path();
        write(root, "index.lua", "main()");
        write(root, "p2.lua", "P2 = 1");

        let result = build_dir(&dir);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].path, "p1.lua");
        assert_eq!(result.failed[0].reason, FailureReason::MissingPrelude);
        assert!(result.output_text.contains("P2 = 1\nmain()"));
        // prelude is not duplicated as a module
        assert!(!result.output_text.contains("[\"p2.lua\"]"));
    }

    #[test]
    fn test_output_directory_and_reserved_files_skipped() {
        let dir = project(r#"{ "main": "index.lua" }"#);
        let root = dir.path();
        write(root, "index.lua", "x()");
        write(root, "build/build.lua", "old bundle");
        write(root, ".git/HEAD", "ref: refs/heads/main");
        write(root, ".vscode/settings.json", "{}");

        let result = build_dir(&dir);
        assert_eq!(result.output_text, format!("{}x()", runtime_header()));
    }

    #[test]
    fn test_binary_asset_embedded() {
        let dir = project(r#"{ "main": "index.lua" }"#);
        let root = dir.path();
        write(root, "index.lua", "");
        write(root, "blob.bin", [0u8, 255, 10]);

        let result = build_dir(&dir);
        assert!(result.output_text.contains("\treturn \"\\0\\255\\10\"\n"));
    }

    #[test]
    fn test_missing_project_file() {
        let dir = TempDir::new().unwrap();
        let err = bundle_project(dir.path(), Path::new("luacompact.json")).unwrap_err();
        assert!(matches!(err, BuildError::ProjectNotFound(_)));
    }

    #[test]
    fn test_invalid_project_file() {
        let dir = project(r#"{ "main": "index.lua", "exclude": "not-a-list" }"#);
        let err = bundle_project(dir.path(), Path::new("luacompact.json")).unwrap_err();
        assert!(matches!(err, BuildError::Config(ConfigError::Json(_))));
    }

    #[test]
    fn test_missing_entry_file() {
        let dir = project(r#"{ "main": "src/main.lua" }"#);
        let err = bundle_project(dir.path(), Path::new("luacompact.json")).unwrap_err();
        assert!(matches!(err, BuildError::EntryNotFound(_)));
    }

    #[test]
    fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::from_str(r#"{ "main": "index.lua" }"#).unwrap();
        let err = build(&dir.path().join("nope"), &config).unwrap_err();
        assert!(matches!(err, BuildError::RootNotFound(_)));
    }

    #[test]
    fn test_write_bundle_replaces_previous_output() {
        let dir = project(r#"{ "main": "index.lua", "exportDirectory": "dist" }"#);
        let root = dir.path();
        write(root, "index.lua", "print(1)");
        write(root, "dist/build.lua", "stale content that is much longer than the new bundle".repeat(100));

        let config = load_config(root, Path::new("luacompact.json")).unwrap();
        let result = build(root, &config).unwrap();
        let path = write_bundle(root, &config, &result).unwrap();

        assert_eq!(path, root.join("dist/build.lua"));
        assert_eq!(fs::read_to_string(&path).unwrap(), result.output_text);

        // the written bundle is not picked up by the next build
        let again = build(root, &config).unwrap();
        assert_eq!(again.output_text, result.output_text);
    }
}
