//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use crate::config::defaults::CONFIG_FILE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// luacompact - bundle a lua/luau project into a single file
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Config file name, relative to the project root
    #[arg(short = 'C', long, global = true, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create a project file and entry script
    Init {
        /// the name(path) of project directory, related to `root`
        name: Option<PathBuf>,

        /// Entry script to create (`.lua` is appended when no script extension is given)
        #[arg(short, long)]
        main: Option<String>,
    },

    /// Bundle the project into `<exportDirectory>/<bundleName>`
    Build {
        /// Override the output directory (relative to project root)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build, then rebuild whenever a project file changes
    Watch {
        /// Override the output directory (relative to project root)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Project root, joined with the init target name when one was given.
    pub fn project_root(&self) -> PathBuf {
        let base = self.root.clone().unwrap_or_else(|| PathBuf::from("./"));
        match &self.command {
            Commands::Init { name: Some(name), .. } => base.join(name),
            _ => base,
        }
    }
}
