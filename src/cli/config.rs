//! CLI handler for inspecting the configuration.

use crate::config::Config;
use anyhow::{Context, Result};

pub fn handle_config_command() -> Result<()> {
    let path = Config::config_path()?;
    let config = Config::load_from(&path)?;
    let rendered = toml::to_string_pretty(&config).context("Failed to serialize config")?;

    println!("# {}", path.display());
    println!("{}", rendered);
    Ok(())
}
