use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Environment mode the server is launched in.
///
/// The mode is substituted into the run command template as `{mode}`
/// (`prod` / `dev`) and exported to the server as `STAGEHAND_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Production,
    Development,
}

impl Mode {
    /// Short form used in command templates.
    pub fn template_value(self) -> &'static str {
        match self {
            Mode::Production => "prod",
            Mode::Development => "dev",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Production => f.write_str("production"),
            Mode::Development => f.write_str("development"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Mode::Production),
            "development" | "dev" => Ok(Mode::Development),
            other => Err(format!(
                "invalid mode: {other} (expected \"production\" or \"development\")"
            )),
        }
    }
}

/// How the supervisor reacts to a termination request.
///
/// - `Forward`: deliver SIGTERM to the server's process group and wait for
///   the grace period before escalating to SIGKILL.
/// - `Forced`: the container declares up front that it answers termination
///   with SIGKILL; no graceful attempt is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownMode {
    #[default]
    Forward,
    Forced,
}

impl ShutdownMode {
    /// The `STOPSIGNAL` a container image must declare for this mode.
    pub fn stop_signal(self) -> &'static str {
        match self {
            ShutdownMode::Forward => "SIGTERM",
            ShutdownMode::Forced => "SIGKILL",
        }
    }
}

/// When the frontend bundle is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetStage {
    /// During `stagehand build` (image build time); `run` only verifies the
    /// bundle is present.
    #[default]
    Image,
    /// During `stagehand run`, before the server is launched.
    Start,
}

/// Which installer materializes the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstallerKind {
    #[default]
    Store,
    Command,
}

/// Which compiler produces the asset bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompilerKind {
    #[default]
    Copy,
    Command,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_accepts_long_and_short_names() {
        assert_eq!("production".parse::<Mode>(), Ok(Mode::Production));
        assert_eq!(" Dev ".parse::<Mode>(), Ok(Mode::Development));
        assert!("staging".parse::<Mode>().is_err());
        assert_eq!(Mode::Development.template_value(), "dev");
    }

    #[test]
    fn shutdown_mode_declares_stop_signal() {
        assert_eq!(ShutdownMode::Forward.stop_signal(), "SIGTERM");
        assert_eq!(ShutdownMode::Forced.stop_signal(), "SIGKILL");
    }
}
