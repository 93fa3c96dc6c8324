// src/supervisor/process.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, anyhow};
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::net::TcpStream;
use tokio::process::Child;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::assets::AssetBundle;
use crate::config::{ProjectSettings, RunSettings};
use crate::errors::RunError;
use crate::exec::{RelayLevel, path_with, relay_lines, render_template, shell_command};
use crate::provision::Environment;
use crate::types::Mode;

const BIND_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A fully rendered server command line plus its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub cmdline: String,
    pub workdir: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl ServerCommand {
    pub fn new(cmdline: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            cmdline: cmdline.into(),
            workdir: workdir.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Render `[run].command` for `mode`.
    ///
    /// Placeholders: `{mode}` (`prod` / `dev`), `{port}`, `{assets}`, `{env}`.
    /// `[run.env]` is exported first; the `STAGEHAND_*` variables, `PORT`
    /// and `PATH` are set by stagehand and cannot be overridden there.
    pub fn for_app(
        project: &ProjectSettings,
        run: &RunSettings,
        mode: Mode,
        env: &Environment,
        bundle: &AssetBundle,
    ) -> Self {
        let port = run.port.to_string();
        let assets = bundle.root.to_string_lossy().into_owned();
        let env_root = env.root().to_string_lossy().into_owned();
        let cmdline = render_template(
            &run.command,
            &[
                ("mode", mode.template_value()),
                ("port", port.as_str()),
                ("assets", assets.as_str()),
                ("env", env_root.as_str()),
            ],
        );

        let mut command = Self::new(cmdline, project.source.clone());
        for (key, value) in &run.env {
            command = command.env(key, value);
        }
        command
            .env("STAGEHAND_MODE", mode.template_value())
            .env("STAGEHAND_APP", project.name.clone())
            .env("STAGEHAND_ASSETS", assets)
            .env("STAGEHAND_ENV", env_root)
            .env("PORT", port)
            .env("PATH", path_with(&env.bin_dir()).to_string_lossy().into_owned())
    }
}

/// The single server child, running in its own process group.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    pid: u32,
}

impl ServerProcess {
    pub fn spawn(command: &ServerCommand) -> Result<Self, RunError> {
        info!(cmd = %command.cmdline, workdir = ?command.workdir, "starting server process");

        let mut cmd = shell_command(&command.cmdline);
        cmd.current_dir(&command.workdir)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| RunError::SpawnFailed {
            command: command.cmdline.clone(),
            source,
        })?;
        let pid = child
            .id()
            .ok_or_else(|| anyhow!("server process exited before its pid was read"))?;

        if let Some(stdout) = child.stdout.take() {
            relay_lines(stdout, "server".to_string(), "stdout", RelayLevel::Info);
        }
        if let Some(stderr) = child.stderr.take() {
            relay_lines(stderr, "server".to_string(), "stderr", RelayLevel::Warn);
        }

        info!(pid, "server process started");
        Ok(Self { child, pid })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Deliver `signal` to the server's whole process group.
    ///
    /// A group that no longer exists is not an error.
    pub fn signal(&self, signal: Signal) -> Result<(), RunError> {
        match killpg(Pid::from_raw(self.pid as i32), signal) {
            Ok(()) => {
                debug!(pid = self.pid, ?signal, "signalled server process group");
                Ok(())
            }
            Err(Errno::ESRCH) => {
                debug!(pid = self.pid, ?signal, "server process group already gone");
                Ok(())
            }
            Err(e) => Err(RunError::Io(anyhow!(
                "killpg({}, {:?}) failed: {}",
                self.pid,
                signal,
                e
            ))),
        }
    }

    /// Whether any process is left in the server's group, including workers
    /// that outlived the leader.
    pub fn group_alive(&self) -> bool {
        !matches!(
            killpg(Pid::from_raw(self.pid as i32), None),
            Err(Errno::ESRCH)
        )
    }

    /// Wait for the server to exit. `None` means it was killed by a signal.
    pub async fn wait(&mut self) -> Result<Option<i32>, RunError> {
        let status = self
            .child
            .wait()
            .await
            .with_context(|| format!("waiting for server process {}", self.pid))?;
        Ok(status.code())
    }

    /// Poll `127.0.0.1:<port>` until it accepts a connection.
    pub async fn wait_for_bind(&mut self, port: u16, limit: Duration) -> Result<(), RunError> {
        // `None` only for limits too large to represent; never time out then.
        let deadline = Instant::now().checked_add(limit);
        loop {
            if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                info!(pid = self.pid, port, "server is accepting connections");
                return Ok(());
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(RunError::BindTimeout { port, after: limit });
            }
            tokio::select! {
                code = self.wait() => {
                    return Err(RunError::ExitedBeforeBind { port, code: code? });
                }
                _ = tokio::time::sleep(BIND_POLL_INTERVAL) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unbounded_bind_wait_still_notices_an_early_exit() {
        let tmp = tempfile::tempdir().unwrap();
        let unused = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = unused.local_addr().unwrap().port();
        drop(unused);

        let mut server = ServerProcess::spawn(&ServerCommand::new("exit 3", tmp.path())).unwrap();
        let err = tokio::time::timeout(Duration::from_secs(5), server.wait_for_bind(port, Duration::MAX))
            .await
            .unwrap()
            .unwrap_err();

        assert!(matches!(err, RunError::ExitedBeforeBind { code: Some(3), .. }), "{err:?}");
        assert!(!server.group_alive());
    }
}
