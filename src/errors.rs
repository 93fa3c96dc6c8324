// src/errors.rs

//! Crate-wide error types.
//!
//! Each pipeline phase has its own error enum whose variant names double as
//! the "error class" operators see. [`PipelineError`] tags a phase error with
//! the phase it came from.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while loading or validating `Stagehand.toml`.
#[derive(Error, Debug)]
pub enum StagehandError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StagehandError>;

/// Failures of the environment provisioner.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("no lock file at {}", .0.display())]
    LockfileMissing(PathBuf),

    #[error("{}: {reason}", .path.display())]
    LockfileUnreadable { path: PathBuf, reason: String },

    #[error("{0}")]
    DependencyUnsatisfiable(String),

    #[error("{0}")]
    NetworkFailure(String),

    #[error("no provisioned environment at {} (run `stagehand build` first)", .0.display())]
    EnvironmentMissing(PathBuf),

    #[error("environment at {} was provisioned from a different lock file (environment {actual}, lock {expected}); run `stagehand build` again", .path.display())]
    EnvironmentStale {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("{0:#}")]
    Io(#[from] anyhow::Error),
}

impl ProvisionError {
    pub fn class(&self) -> &'static str {
        match self {
            ProvisionError::LockfileMissing(_) => "LockfileMissing",
            ProvisionError::LockfileUnreadable { .. } => "LockfileUnreadable",
            ProvisionError::DependencyUnsatisfiable(_) => "DependencyUnsatisfiable",
            ProvisionError::NetworkFailure(_) => "NetworkFailure",
            ProvisionError::EnvironmentMissing(_) => "EnvironmentMissing",
            ProvisionError::EnvironmentStale { .. } => "EnvironmentStale",
            ProvisionError::Io(_) => "Io",
        }
    }

    /// Transient errors may succeed if the whole pipeline is re-run.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProvisionError::NetworkFailure(_))
    }
}

/// Failures of the asset builder.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("{0}")]
    SourceInvalid(String),

    #[error("{0}")]
    ToolchainMissing(String),

    #[error("asset build did not finish within {}", crate::config::format_duration(*.0))]
    BuildTimeout(Duration),

    #[error("no asset bundle at {} (run `stagehand build` first)", .0.display())]
    BundleMissing(PathBuf),

    #[error("asset bundle at {} does not match its manifest (expected {expected}, found {actual})", .path.display())]
    BundleMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("{0:#}")]
    Io(#[from] anyhow::Error),
}

impl BuildError {
    pub fn class(&self) -> &'static str {
        match self {
            BuildError::SourceInvalid(_) => "SourceInvalid",
            BuildError::ToolchainMissing(_) => "ToolchainMissing",
            BuildError::BuildTimeout(_) => "BuildTimeout",
            BuildError::BundleMissing(_) => "BundleMissing",
            BuildError::BundleMismatch { .. } => "BundleMismatch",
            BuildError::Io(_) => "Io",
        }
    }
}

/// Failures of the run phase (server launch and supervision).
#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to spawn server command `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server exited before binding port {port} (exit code {})", fmt_code(*.code))]
    ExitedBeforeBind { port: u16, code: Option<i32> },

    #[error("server did not bind port {port} within {}", crate::config::format_duration(*.after))]
    BindTimeout { port: u16, after: Duration },

    #[error("a server process is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("no server process has been launched")]
    NotLaunched,

    #[error("health listener on {addr} failed: {reason}")]
    HealthListener { addr: String, reason: String },

    #[error("{0:#}")]
    Io(#[from] anyhow::Error),
}

impl RunError {
    pub fn class(&self) -> &'static str {
        match self {
            RunError::SpawnFailed { .. } => "SpawnFailed",
            RunError::ExitedBeforeBind { .. } => "ExitedBeforeBind",
            RunError::BindTimeout { .. } => "BindTimeout",
            RunError::AlreadyRunning { .. } => "AlreadyRunning",
            RunError::NotLaunched => "NotLaunched",
            RunError::HealthListener { .. } => "HealthListener",
            RunError::Io(_) => "Io",
        }
    }
}

fn fmt_code(code: Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none, killed by signal".to_string(),
    }
}

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Config,
    Provisioning,
    Build,
    Run,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Config => "config",
            Phase::Provisioning => "provisioning",
            Phase::Build => "build",
            Phase::Run => "run",
        }
    }

    /// Process exit status used when a phase fails.
    pub fn exit_code(self) -> i32 {
        match self {
            Phase::Config => 2,
            Phase::Provisioning => 3,
            Phase::Build => 4,
            Phase::Run => 5,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal pipeline failure, labelled with the phase that produced it.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("[config] {0}")]
    Config(#[from] StagehandError),

    #[error("[provisioning] {}: {}", .0.class(), .0)]
    Provision(#[from] ProvisionError),

    #[error("[build] {}: {}", .0.class(), .0)]
    Build(#[from] BuildError),

    #[error("[run] {}: {}", .0.class(), .0)]
    Run(#[from] RunError),
}

impl PipelineError {
    pub fn phase(&self) -> Phase {
        match self {
            PipelineError::Config(_) => Phase::Config,
            PipelineError::Provision(_) => Phase::Provisioning,
            PipelineError::Build(_) => Phase::Build,
            PipelineError::Run(_) => Phase::Run,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.phase().exit_code()
    }
}
