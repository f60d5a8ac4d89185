use std::fs;
use std::path::{Path, PathBuf};

use super::core::QualmodelConfig;
use crate::errors::{ModelError, Result};

pub const CONFIG_FILE_NAME: &str = ".qualmodel.toml";

const MAX_TRAVERSAL_DEPTH: usize = 10;

/// Parse and validate config from a TOML string
pub fn parse_and_validate_config(contents: &str) -> Result<QualmodelConfig> {
    let config: QualmodelConfig = toml::from_str(contents)?;
    config.validate()?;
    Ok(config)
}

/// Load a config file named explicitly. Any failure is an error.
pub fn load_config_from_path(path: &Path) -> Result<QualmodelConfig> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ModelError::Configuration(format!("cannot read {}: {e}", path.display())))?;
    parse_and_validate_config(&contents).map_err(|e| {
        ModelError::Configuration(format!("invalid config {}: {e}", path.display()))
    })
}

/// Try one candidate location. Missing files are silent, broken ones warn.
pub(crate) fn try_load_config_from_path(config_path: &Path) -> Option<QualmodelConfig> {
    let contents = match fs::read_to_string(config_path) {
        Ok(contents) => contents,
        Err(e) => {
            handle_read_error(config_path, &e);
            return None;
        }
    };

    match parse_and_validate_config(&contents) {
        Ok(config) => {
            log::debug!("Loaded config from {}", config_path.display());
            Some(config)
        }
        Err(e) => {
            log::warn!(
                "Ignoring config {}: {}. Using defaults.",
                config_path.display(),
                e
            );
            None
        }
    }
}

/// Handle file read errors with appropriate logging
pub(crate) fn handle_read_error(config_path: &Path, error: &std::io::Error) {
    // Only log actual errors, not "file not found"
    if error.kind() != std::io::ErrorKind::NotFound {
        log::warn!(
            "Failed to read config file {}: {}",
            config_path.display(),
            error
        );
    }
}

/// Generate directory ancestors up to a depth limit
pub fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        if parent.pop() {
            Some(parent)
        } else {
            None
        }
    })
    .take(max_depth)
}

/// Per-user config location, e.g. `~/.config/qualmodel/config.toml`.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("qualmodel").join("config.toml"))
}

/// Search `start` and its ancestors, then the user config, else defaults.
pub fn load_config_from(start: &Path) -> QualmodelConfig {
    directory_ancestors(start.to_path_buf(), MAX_TRAVERSAL_DEPTH)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find_map(|path| try_load_config_from_path(&path))
        .or_else(|| user_config_path().and_then(|path| try_load_config_from_path(&path)))
        .unwrap_or_else(|| {
            log::debug!(
                "No config found after checking {} directories. Using default config.",
                MAX_TRAVERSAL_DEPTH
            );
            QualmodelConfig::default()
        })
}

pub fn load_config() -> QualmodelConfig {
    match std::env::current_dir() {
        Ok(dir) => load_config_from(&dir),
        Err(e) => {
            log::warn!(
                "Failed to get current directory: {}. Using default config.",
                e
            );
            QualmodelConfig::default()
        }
    }
}
