//! luacompact - bundle a lua/luau project into a single script.

mod build;
mod bundler;
mod cli;
mod config;
mod init;
mod logger;
mod watch;

use anyhow::{Context, Result};
use build::build_project;
use clap::Parser;
use cli::{Cli, Commands};
use config::ProjectConfig;
use init::new_project;
use watch::watch_project;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = cli.project_root();

    match &cli.command {
        Commands::Init { main, .. } => new_project(&root, &cli.config, main.as_deref()),
        Commands::Build { .. } => {
            let config = load_config(&cli)?;
            build_project(&root, &config).map(|_| ())
        }
        Commands::Watch { .. } => watch_project(&root, || load_config(&cli)),
    }
}

/// Load and validate the project file, then apply CLI overrides.
fn load_config(cli: &Cli) -> Result<ProjectConfig> {
    let root = cli.project_root();
    let mut config = bundler::load_config(&root, &cli.config)
        .with_context(|| format!("Failed to load {}", root.join(&cli.config).display()))?;
    config.update_with_cli(cli);
    config.validate()?;
    Ok(config)
}
