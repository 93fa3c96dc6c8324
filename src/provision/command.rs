// src/provision/command.rs

use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use regex::Regex;
use tracing::{info, warn};

use crate::errors::ProvisionError;
use crate::exec::{BoxFuture, RelayLevel, collect_tail, join_tail, relay_lines, render_template, shell_command};
use crate::lockfile::LockFile;
use crate::provision::environment::InstalledPackage;
use crate::provision::installer::Installer;

const STDERR_TAIL_LINES: usize = 20;

/// Delegates installation to an external package manager command, e.g.
/// `uv pip sync {lockfile} --target {env}`.
///
/// The command is trusted to honour the pins; on success the installed
/// record is the lock's own entries. A failed command is classified by
/// matching its stderr against `network_error_pattern`.
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    command: String,
    network_error_pattern: Regex,
}

impl CommandInstaller {
    pub fn new(command: impl Into<String>, network_error_pattern: Regex) -> Self {
        Self {
            command: command.into(),
            network_error_pattern,
        }
    }

    async fn run(
        &self,
        lock: &LockFile,
        target: &Path,
    ) -> Result<Vec<InstalledPackage>, ProvisionError> {
        let lockfile = lock.path().to_string_lossy().into_owned();
        let env = target.to_string_lossy().into_owned();
        let cmdline = render_template(
            &self.command,
            &[("lockfile", lockfile.as_str()), ("env", env.as_str())],
        );

        info!(cmd = %cmdline, "running install command");

        let mut child = shell_command(&cmdline)
            .env("STAGEHAND_ENV", target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning install command `{cmdline}`"))?;

        if let Some(stdout) = child.stdout.take() {
            relay_lines(stdout, "install".to_string(), "stdout", RelayLevel::Debug);
        }
        let stderr = child
            .stderr
            .take()
            .map(|s| collect_tail(s, "install".to_string(), STDERR_TAIL_LINES));

        let status = child
            .wait()
            .await
            .context("waiting for install command")?;
        let tail = join_tail(stderr).await;

        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            warn!(exit_code = %code, "install command failed");
            let detail = format!("install command exited with {code}: {}", tail.trim());
            return Err(if self.network_error_pattern.is_match(&tail) {
                ProvisionError::NetworkFailure(detail)
            } else {
                ProvisionError::DependencyUnsatisfiable(detail)
            });
        }

        Ok(lock
            .install_order()
            .map(|p| InstalledPackage {
                name: p.name.clone(),
                version: p.version.clone(),
                hash: p.hash.clone(),
            })
            .collect())
    }
}

impl Installer for CommandInstaller {
    fn name(&self) -> &'static str {
        "command"
    }

    fn install<'a>(
        &'a self,
        lock: &'a LockFile,
        target: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<InstalledPackage>, ProvisionError>> {
        Box::pin(self.run(lock, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::default_network_error_pattern;

    fn empty_lock() -> LockFile {
        LockFile::parse("stagehand.lock", "version = 1\n").unwrap()
    }

    fn installer(cmd: &str) -> CommandInstaller {
        CommandInstaller::new(cmd, Regex::new(&default_network_error_pattern()).unwrap())
    }

    #[tokio::test]
    async fn network_errors_are_transient() {
        let tmp = tempfile::tempdir().unwrap();
        let err = installer("echo 'Temporary failure in name resolution' >&2; exit 1")
            .install(&empty_lock(), tmp.path())
            .await
            .unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
    }

    #[tokio::test]
    async fn other_failures_are_unsatisfiable() {
        let tmp = tempfile::tempdir().unwrap();
        let err = installer("echo 'No solution found for pkgA==1.2.3' >&2; exit 1")
            .install(&empty_lock(), tmp.path())
            .await
            .unwrap_err();
        assert_eq!(err.class(), "DependencyUnsatisfiable");
        assert!(err.to_string().contains("pkgA==1.2.3"));
    }

    #[tokio::test]
    async fn placeholders_point_at_lock_and_target() {
        let tmp = tempfile::tempdir().unwrap();
        installer("touch {env}/marker")
            .install(&empty_lock(), tmp.path())
            .await
            .unwrap();
        assert!(tmp.path().join("marker").exists());
    }
}
