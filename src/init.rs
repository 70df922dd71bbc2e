//! Project initialization module.
//!
//! Creates a project file, an entry script and ignore files.

use crate::{
    bundler::discover::{DEFAULT_SCRIPT_EXTENSION, has_script_extension, normalize_relative},
    config::ProjectConfig,
    log,
};
use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

/// Files to write ignore patterns to
const IGNORE_FILES: &[&str] = &[".gitignore"];

/// Body of a freshly created entry script
const ENTRY_TEMPLATE: &str = "print(\"Hello World!\")\n";

/// Create a new project in `root`.
///
/// `main` overrides the entry script name; `.lua` is appended when it has no
/// script extension.
pub fn new_project(root: &Path, config_name: &Path, main: Option<&str>) -> Result<()> {
    let config_path = root.join(config_name);
    if config_path.exists() {
        bail!(
            "Config file `{}` already exists. Remove it manually or init in a different path.",
            config_path.display()
        );
    }

    fs::create_dir_all(root).with_context(|| format!("Failed to create {}", root.display()))?;

    let config = default_config(main);
    init_default_config(&config_path, &config)?;
    init_entry_script(root, &config.main)?;
    init_ignored_files(root, &[config.export_directory.as_path()])?;

    log!("init"; "created {} with entry `{}`", config_path.display(), config.main);
    Ok(())
}

/// Default configuration with the requested entry script.
fn default_config(main: Option<&str>) -> ProjectConfig {
    let mut config = ProjectConfig::default();
    if let Some(main) = main.map(normalize_relative).filter(|m| !m.is_empty()) {
        config.main = if has_script_extension(&main) {
            main
        } else {
            format!("{main}{DEFAULT_SCRIPT_EXTENSION}")
        };
    }
    config
}

/// Write default configuration file
fn init_default_config(path: &Path, config: &ProjectConfig) -> Result<()> {
    let content = config.to_pretty_json()?;
    fs::write(path, content + "\n")
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Create the entry script unless it already exists.
fn init_entry_script(root: &Path, main: &str) -> Result<()> {
    let path = root.join(main);
    if path.exists() {
        log!("init"; "keeping existing {main}");
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&path, ENTRY_TEMPLATE)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(())
}

/// Initialize ignore files with specified paths
pub fn init_ignored_files(root: &Path, paths: &[&Path]) -> Result<()> {
    let content = paths
        .iter()
        .filter_map(|p| p.to_str())
        .map(|p| format!("{}/\n", p.trim_end_matches('/')))
        .collect::<String>();

    for filename in IGNORE_FILES {
        let path = root.join(filename);
        if !path.exists() {
            fs::write(&path, &content)?;
        }
    }

    Ok(())
}
