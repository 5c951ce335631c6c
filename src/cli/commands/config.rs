//! Config Command
//!
//! Inspect and initialize QuorumQL configuration.
//!
//! Usage:
//!   quorumql config show [-f json]
//!   quorumql config path
//!   quorumql config init [-g] [--force]

use std::path::Path;

use crate::cli::output::{Output, OutputFormat};
use crate::cli::util::load_config;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the effective configuration (merged from all sources)
pub fn show(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    match format.render(&config)? {
        Some(rendered) => println!("{}", rendered.trim_end()),
        None => print!("{}", ConfigLoader::render_toml(&config)?),
    }
    Ok(())
}

pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Write a starter config globally or under the current directory
pub fn init(global: bool, force: bool) -> Result<()> {
    let path = if global {
        ConfigLoader::init_global(force)?
    } else {
        let root = std::env::current_dir()?;
        ConfigLoader::init_project(&root, force)?
    };
    Output::success(&format!(
        "Initialized {} configuration",
        if global { "global" } else { "project" }
    ));
    Output::field("config", path.display());
    Ok(())
}
