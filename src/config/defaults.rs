//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

use std::path::PathBuf;

/// Name of the project file looked up in the project root.
pub const CONFIG_FILE: &str = "luacompact.json";

pub fn main() -> String {
    "index.lua".into()
}

pub fn export_directory() -> PathBuf {
    "build".into()
}

pub fn bundle_name() -> String {
    "build.lua".into()
}

pub fn config_file() -> String {
    CONFIG_FILE.into()
}
