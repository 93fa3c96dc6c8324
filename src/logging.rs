// src/logging.rs

//! Logging setup for `stagehand` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `STAGEHAND_LOG` environment variable (a level or a full filter
//!    directive such as `stagehand=debug,reqwest=warn`)
//! 3. default to `info`
//!
//! Logs go to STDERR. The server's own output is relayed through the same
//! subscriber so a container log driver sees one stream.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "STAGEHAND_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV).ok().as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))?;

    Ok(())
}

fn build_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> EnvFilter {
    if let Some(lvl) = cli_level {
        return EnvFilter::new(level_directive(lvl));
    }
    env_value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn level_directive(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_level_wins_over_environment() {
        let filter = build_filter(Some(LogLevel::Debug), Some("error"));
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn environment_filter_is_used_when_valid() {
        let filter = build_filter(None, Some("stagehand=trace"));
        assert_eq!(filter.to_string(), "stagehand=trace");
    }

    #[test]
    fn falls_back_to_info() {
        assert_eq!(build_filter(None, None).to_string(), "info");
        assert_eq!(build_filter(None, Some("  ")).to_string(), "info");
    }
}
