// src/config/model.rs

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::health::HealthCheckConfig;
use crate::types::{AssetStage, CompilerKind, InstallerKind, ShutdownMode};

/// Top-level project manifest as read from `Stagehand.toml`.
///
/// ```toml
/// [project]
/// name = "hledger_reflex_app"
///
/// [provision]
/// lockfile = "stagehand.lock"
/// store = "/opt/packages"
///
/// [assets]
/// include = ["assets/**"]
///
/// [run]
/// command = "reflex run --env {mode} --backend-only --backend-port {port}"
/// port = 8000
/// ```
///
/// Every section is optional except `[run].command`; durations are strings
/// and paths are relative to the manifest until [`ConfigFile`] resolves them.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub provision: ProvisionSection,

    #[serde(default)]
    pub assets: AssetsSection,

    #[serde(default)]
    pub pipeline: PipelineSection,

    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub health: HealthSection,

    #[serde(default)]
    pub shutdown: ShutdownSection,
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    /// Application name, exported to the server as `STAGEHAND_APP`.
    #[serde(default)]
    pub name: Option<String>,

    /// Root of the source tree the asset builder reads.
    #[serde(default = "default_source")]
    pub source: String,

    /// Directory holding the environment, bundle and manifests.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

fn default_source() -> String {
    ".".to_string()
}

fn default_state_dir() -> String {
    ".stagehand".to_string()
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            name: None,
            source: default_source(),
            state_dir: default_state_dir(),
        }
    }
}

/// `[provision]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionSection {
    #[serde(default = "default_lockfile")]
    pub lockfile: String,

    /// Defaults to `<state_dir>/env`.
    #[serde(default)]
    pub env_dir: Option<String>,

    #[serde(default)]
    pub installer: InstallerKind,

    /// Package store root for `installer = "store"`.
    #[serde(default)]
    pub store: Option<String>,

    /// Install command for `installer = "command"`.
    /// Placeholders: `{lockfile}`, `{env}`.
    #[serde(default)]
    pub command: Option<String>,

    /// Regex matched against a failed install command's stderr to classify
    /// the failure as transient.
    #[serde(default = "default_network_error_pattern")]
    pub network_error_pattern: String,
}

fn default_lockfile() -> String {
    "stagehand.lock".to_string()
}

pub(crate) fn default_network_error_pattern() -> String {
    r"(?i)(connection (refused|reset|timed out)|network is unreachable|temporary failure in name resolution|could not resolve|timed out)".to_string()
}

impl Default for ProvisionSection {
    fn default() -> Self {
        Self {
            lockfile: default_lockfile(),
            env_dir: None,
            installer: InstallerKind::default(),
            store: None,
            command: None,
            network_error_pattern: default_network_error_pattern(),
        }
    }
}

/// `[assets]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsSection {
    #[serde(default)]
    pub compiler: CompilerKind,

    /// Globs (relative to the source root) copied by `compiler = "copy"`.
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Build command for `compiler = "command"`.
    /// Placeholders: `{out}`, `{env}`, `{source}`.
    #[serde(default)]
    pub command: Option<String>,

    /// Executables that must resolve in `<env>/bin` or `PATH`.
    #[serde(default)]
    pub toolchain: Vec<String>,

    /// Defaults to `<state_dir>/assets`.
    #[serde(default)]
    pub out_dir: Option<String>,

    #[serde(default = "default_build_timeout")]
    pub timeout: String,
}

fn default_include() -> Vec<String> {
    vec!["assets/**".to_string()]
}

fn default_build_timeout() -> String {
    "10m".to_string()
}

impl Default for AssetsSection {
    fn default() -> Self {
        Self {
            compiler: CompilerKind::default(),
            include: default_include(),
            exclude: Vec::new(),
            command: None,
            toolchain: Vec::new(),
            out_dir: None,
            timeout: default_build_timeout(),
        }
    }
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PipelineSection {
    /// `"image"` (default) or `"start"`.
    #[serde(default)]
    pub assets: AssetStage,
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    /// Server command. Placeholders: `{mode}`, `{port}`, `{assets}`, `{env}`.
    #[serde(default)]
    pub command: String,

    /// The fixed, documented port the server binds.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind_timeout")]
    pub bind_timeout: String,

    /// Extra environment passed to the server (e.g. `API_URL`).
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_port() -> u16 {
    8000
}

fn default_bind_timeout() -> String {
    "60s".to_string()
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            command: String::new(),
            port: default_port(),
            bind_timeout: default_bind_timeout(),
            env: BTreeMap::new(),
        }
    }
}

/// `[health]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthSection {
    #[serde(default = "default_health_path")]
    pub path: String,

    /// Path probed on the server itself; defaults to `path`.
    #[serde(default)]
    pub upstream_path: Option<String>,

    #[serde(default = "default_health_listen")]
    pub listen: String,

    #[serde(default = "default_interval")]
    pub interval: String,

    #[serde(default = "default_probe_timeout")]
    pub timeout: String,

    #[serde(default = "default_start_period")]
    pub start_period: String,

    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_health_path() -> String {
    "/ping".to_string()
}

fn default_health_listen() -> String {
    "0.0.0.0:8081".to_string()
}

fn default_interval() -> String {
    "30s".to_string()
}

fn default_probe_timeout() -> String {
    "5s".to_string()
}

fn default_start_period() -> String {
    "5s".to_string()
}

fn default_retries() -> u32 {
    3
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            path: default_health_path(),
            upstream_path: None,
            listen: default_health_listen(),
            interval: default_interval(),
            timeout: default_probe_timeout(),
            start_period: default_start_period(),
            retries: default_retries(),
        }
    }
}

/// `[shutdown]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownSection {
    #[serde(default)]
    pub mode: ShutdownMode,

    #[serde(default = "default_grace_period")]
    pub grace_period: String,
}

fn default_grace_period() -> String {
    "10s".to_string()
}

impl Default for ShutdownSection {
    fn default() -> Self {
        Self {
            mode: ShutdownMode::default(),
            grace_period: default_grace_period(),
        }
    }
}

/// Validated configuration with resolved paths and parsed durations.
///
/// Construct it through [`crate::config::load_and_validate`] or
/// `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub project: ProjectSettings,
    pub provision: ProvisionSettings,
    pub assets: AssetSettings,
    pub pipeline: AssetStage,
    pub run: RunSettings,
    pub health: HealthSettings,
    pub shutdown: ShutdownSettings,
}

#[derive(Debug, Clone)]
pub struct ProjectSettings {
    pub name: String,
    pub source: PathBuf,
    pub state_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    pub lockfile: PathBuf,
    pub env_dir: PathBuf,
    pub installer: InstallerSettings,
}

#[derive(Debug, Clone)]
pub enum InstallerSettings {
    Store {
        root: PathBuf,
    },
    Command {
        command: String,
        network_error_pattern: Regex,
    },
}

#[derive(Debug, Clone)]
pub struct AssetSettings {
    pub compiler: CompilerSettings,
    pub toolchain: Vec<String>,
    pub out_dir: PathBuf,
    pub manifest: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub enum CompilerSettings {
    Copy {
        include: Vec<String>,
        exclude: Vec<String>,
    },
    Command {
        command: String,
    },
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub command: String,
    pub port: u16,
    pub bind_timeout: Duration,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct HealthSettings {
    pub policy: HealthCheckConfig,
    pub upstream_path: String,
    pub listen: SocketAddr,
}

#[derive(Debug, Clone, Copy)]
pub struct ShutdownSettings {
    pub mode: ShutdownMode,
    pub grace_period: Duration,
}
