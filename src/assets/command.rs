// src/assets/command.rs

use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::assets::compiler::{AssetCompiler, CompileContext};
use crate::errors::BuildError;
use crate::exec::{
    BoxFuture, RelayLevel, collect_tail, join_tail, path_with, relay_lines, render_template,
    shell_command,
};

const STDERR_TAIL_LINES: usize = 20;

/// Exit status shells use for "command not found".
const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Runs an external frontend build, e.g.
/// `reflex export --frontend-only --no-zip`.
///
/// The command runs in the source root with `<env>/bin` first on `PATH`,
/// and receives the output directory as `{out}` / `STAGEHAND_OUT`.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    command: String,
}

impl CommandCompiler {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    async fn run(&self, ctx: &CompileContext, out: &Path) -> Result<(), BuildError> {
        let out_str = out.to_string_lossy().into_owned();
        let env_str = ctx.env_root.to_string_lossy().into_owned();
        let source_str = ctx.source.to_string_lossy().into_owned();
        let cmdline = render_template(
            &self.command,
            &[
                ("out", out_str.as_str()),
                ("env", env_str.as_str()),
                ("source", source_str.as_str()),
            ],
        );

        info!(cmd = %cmdline, "running asset build command");

        let spawned = shell_command(&cmdline)
            .current_dir(&ctx.source)
            .env("PATH", path_with(&ctx.env_bin))
            .env("STAGEHAND_ENV", &ctx.env_root)
            .env("STAGEHAND_OUT", out)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BuildError::ToolchainMissing(format!(
                    "cannot run `{cmdline}`: {e}"
                )));
            }
            Err(e) => {
                return Err(BuildError::Io(
                    anyhow::Error::new(e).context(format!("spawning `{cmdline}`")),
                ));
            }
        };

        if let Some(stdout) = child.stdout.take() {
            relay_lines(stdout, "assets".to_string(), "stdout", RelayLevel::Debug);
        }
        let stderr = child
            .stderr
            .take()
            .map(|s| collect_tail(s, "assets".to_string(), STDERR_TAIL_LINES));

        let status = match timeout(ctx.timeout, child.wait()).await {
            Ok(status) => status.context("waiting for asset build command")?,
            Err(_elapsed) => {
                warn!(cmd = %cmdline, "asset build timed out; killing build process");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill timed-out build process");
                }
                return Err(BuildError::BuildTimeout(ctx.timeout));
            }
        };
        let tail = join_tail(stderr).await;

        match status.code() {
            Some(0) => Ok(()),
            Some(EXIT_COMMAND_NOT_FOUND) => Err(BuildError::ToolchainMissing(format!(
                "build command could not find a tool: {}",
                tail.trim()
            ))),
            Some(code) => Err(BuildError::SourceInvalid(format!(
                "build command exited with {code}: {}",
                tail.trim()
            ))),
            None => Err(BuildError::SourceInvalid(
                "build command was killed by a signal".to_string(),
            )),
        }
    }
}

impl AssetCompiler for CommandCompiler {
    fn name(&self) -> &'static str {
        "command"
    }

    fn compile<'a>(
        &'a self,
        ctx: &'a CompileContext,
        out: &'a Path,
    ) -> BoxFuture<'a, Result<(), BuildError>> {
        Box::pin(self.run(ctx, out))
    }
}
