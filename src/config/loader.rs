// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::config::validate::resolve_config;
use crate::errors::{Result, StagehandError};

/// Default manifest name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "Stagehand.toml";

/// Load a manifest from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** resolve paths or
/// check semantic constraints. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        StagehandError::ConfigError(format!("cannot read {}: {e}", path.display()))
    })?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a manifest from path, validate it, and resolve relative paths
/// against the manifest's directory.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw_config = load_from_path(path)?;
    resolve_config(raw_config, &config_root_dir(path))
}

/// Helper to resolve a default config path.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Directory relative paths in the manifest are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "deploy/Stagehand.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Stagehand.toml" (parent = ""),
///   we fall back to the current working directory "."
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
