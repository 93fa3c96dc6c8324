// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::Mode;

/// Command-line arguments for `stagehand`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stagehand",
    version,
    about = "Build and supervise a containerized web application.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the project manifest (TOML).
    ///
    /// Default: `Stagehand.toml` in the current working directory.
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "STAGEHAND_CONFIG",
        default_value = "Stagehand.toml"
    )]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STAGEHAND_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Provision the environment from the lock file, then build assets.
    Build,

    /// Launch the server under supervision.
    Run {
        /// Environment mode: production or development.
        #[arg(long, value_name = "MODE", env = "STAGEHAND_MODE", default_value = "production")]
        mode: Mode,
    },

    /// Probe the health endpoint once (exit 0 healthy, 1 otherwise).
    Probe {
        /// Keep probing on the configured interval until unhealthy.
        #[arg(long)]
        watch: bool,

        /// URL to probe instead of the configured health endpoint.
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },

    /// Parse + validate the manifest and print the pipeline without running it.
    Plan,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_mode_accepts_short_names() {
        let args = CliArgs::try_parse_from(["stagehand", "run", "--mode", "dev"]).unwrap();
        match args.command {
            Command::Run { mode } => assert_eq!(mode, Mode::Development),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_work_after_the_subcommand() {
        let args = CliArgs::try_parse_from([
            "stagehand",
            "probe",
            "--config",
            "deploy/Stagehand.toml",
            "--watch",
        ])
        .unwrap();
        assert_eq!(args.config, "deploy/Stagehand.toml");
        assert!(matches!(args.command, Command::Probe { watch: true, url: None }));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(CliArgs::try_parse_from(["stagehand", "run", "--mode", "staging"]).is_err());
    }
}
