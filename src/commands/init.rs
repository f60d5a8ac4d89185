use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{CONFIG_FILE_NAME, DEFAULT_CONFIG_TEMPLATE};

pub fn init_config(force: bool) -> Result<()> {
    let path = init_config_in(&std::env::current_dir()?, force)?;
    println!("Created {}", path.display());
    Ok(())
}

/// Write the default configuration into `dir`.
pub fn init_config_in(dir: &Path, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        anyhow::bail!("Configuration file already exists. Use --force to overwrite.");
    }

    fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    Ok(config_path)
}
