// src/config/mod.rs

//! Project manifest (`Stagehand.toml`) loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a manifest from disk (`loader.rs`).
//! - Validate it and resolve paths and durations (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::{format_duration, parse_duration};
pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    AssetSettings, CompilerSettings, ConfigFile, HealthSettings, InstallerSettings,
    ProjectSettings, ProvisionSettings, RawConfigFile, RunSettings, ShutdownSettings,
};
pub use validate::resolve_config;
