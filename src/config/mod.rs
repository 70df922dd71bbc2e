//! Project configuration management for `luacompact.json`.
//!
//! # Keys
//!
//! | Key               | Purpose                                            |
//! |-------------------|----------------------------------------------------|
//! | `main`            | Entry script, emitted unwrapped at the bundle end  |
//! | `prelude`         | Script (or list) inserted verbatim before modules  |
//! | `exclude`         | Substring patterns of paths left out of the bundle |
//! | `exportDirectory` | Output directory, relative to the project root     |
//! | `bundleName`      | File name of the bundle inside `exportDirectory`   |
//!
//! # Example
//!
//! ```json
//! {
//!     "main": "index.lua",
//!     "prelude": ["lib/strict.lua"],
//!     "exclude": ["tests/", "scratch.lua"],
//!     "exportDirectory": "dist"
//! }
//! ```

pub mod defaults;
mod error;

pub use error::ConfigError;

use crate::cli::{Cli, Commands};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};

// ============================================================================
// Prelude
// ============================================================================

/// `prelude` accepts a single path or an ordered list of paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prelude {
    One(String),
    Many(Vec<String>),
}

impl Default for Prelude {
    fn default() -> Self {
        Self::One(String::new())
    }
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing `luacompact.json`.
///
/// Loaded once per build and passed by reference to every stage.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectConfig {
    /// Name of the file this config was read from (set after loading).
    #[serde(skip, default = "defaults::config_file")]
    #[educe(Default = defaults::config_file())]
    pub config_file: String,

    /// Entry script, relative to the project root.
    #[educe(Default = defaults::main())]
    pub main: String,

    /// Scripts inserted verbatim between imports and modules.
    #[serde(default)]
    #[educe(Default = Some(Prelude::default()))]
    pub prelude: Option<Prelude>,

    /// Substring patterns; matching paths are never bundled.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Output directory, relative to the project root.
    #[serde(default = "defaults::export_directory")]
    #[educe(Default = defaults::export_directory())]
    pub export_directory: PathBuf,

    /// File name of the bundle written into `export_directory`.
    #[serde(default = "defaults::bundle_name")]
    #[educe(Default = defaults::bundle_name())]
    pub bundle_name: String,
}

impl ProjectConfig {
    /// Parse configuration from a JSON string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut config = Self::from_str(&content)?;
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            config.config_file = name.to_owned();
        }
        Ok(config)
    }

    /// Serialize the way `init` writes a fresh project file.
    pub fn to_pretty_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Configured prelude scripts in declaration order, empty entries dropped.
    pub fn prelude_files(&self) -> Vec<&str> {
        match &self.prelude {
            None => Vec::new(),
            Some(Prelude::One(path)) => [path.as_str()]
                .into_iter()
                .filter(|p| !p.trim().is_empty())
                .collect(),
            Some(Prelude::Many(paths)) => paths
                .iter()
                .map(String::as_str)
                .filter(|p| !p.trim().is_empty())
                .collect(),
        }
    }

    /// Absolute location of the output directory.
    pub fn output_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.export_directory)
    }

    /// Absolute location of the bundle file.
    pub fn output_path(&self, root: &Path) -> PathBuf {
        self.output_dir(root).join(&self.bundle_name)
    }

    /// Apply CLI overrides for the current command
    pub fn update_with_cli(&mut self, cli: &Cli) {
        match &cli.command {
            Commands::Build { output } | Commands::Watch { output } => {
                Self::update_option(&mut self.export_directory, output.as_ref());
            }
            Commands::Init { .. } => {}
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Validate values serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.main.trim().is_empty() {
            return Err(ConfigError::Validation("`main` must not be empty".into()));
        }

        if self.bundle_name.is_empty() || self.bundle_name.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "`bundleName` must be a plain file name".into(),
            ));
        }

        let export = &self.export_directory;
        if export.as_os_str().is_empty() || export.is_absolute() {
            return Err(ConfigError::Validation(
                "`exportDirectory` must be a relative, non-empty path".into(),
            ));
        }
        if export.components().any(|c| matches!(c, Component::ParentDir))
            || export.components().all(|c| matches!(c, Component::CurDir))
        {
            return Err(ConfigError::Validation(
                "`exportDirectory` must name a directory inside the project".into(),
            ));
        }

        if self.exclude.iter().any(String::is_empty) {
            return Err(ConfigError::Validation(
                "`exclude` patterns must not be empty (an empty pattern matches every file)".into(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
