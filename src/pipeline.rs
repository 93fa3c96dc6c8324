// src/pipeline.rs

//! Phase chaining: provisioning, asset build, run.
//!
//! Each phase only starts when the previous one succeeded, and every failure
//! is returned as a [`PipelineError`] labelled with its phase.

use tracing::{Instrument, Span, info, info_span};

use crate::assets::{AssetBuilder, AssetBundle};
use crate::config::ConfigFile;
use crate::errors::{PipelineError, RunError};
use crate::lockfile::LockFile;
use crate::provision::{Environment, Provisioner};
use crate::supervisor::{
    RunOutcome, ServerCommand, Supervisor, SupervisorSettings, spawn_signal_listener,
};
use crate::types::{AssetStage, Mode};

/// Everything the run phase needs from the build phase.
#[derive(Debug, Clone)]
pub struct BuildArtifacts {
    pub environment: Environment,
    pub bundle: AssetBundle,
}

/// Provision the environment described by the lock file.
pub async fn provision(cfg: &ConfigFile) -> Result<Environment, PipelineError> {
    let provisioner = Provisioner::from_settings(&cfg.provision);
    let env = provisioner
        .provision(&cfg.provision.lockfile)
        .instrument(info_span!("phase", phase = "provisioning"))
        .await?;
    Ok(env)
}

/// Build the asset bundle against an already provisioned environment.
pub async fn build_assets(
    cfg: &ConfigFile,
    env: &Environment,
) -> Result<AssetBundle, PipelineError> {
    let builder = AssetBuilder::from_settings(&cfg.assets, &cfg.project)?;
    let bundle = builder
        .build(env, &cfg.project.source)
        .instrument(info_span!("phase", phase = "build"))
        .await?;
    Ok(bundle)
}

/// `stagehand build`: provision, then compile assets.
///
/// Safe to re-run; both outputs are replaced wholesale.
pub async fn build(cfg: &ConfigFile) -> Result<BuildArtifacts, PipelineError> {
    let environment = provision(cfg).await?;
    let bundle = build_assets(cfg, &environment).await?;
    Ok(BuildArtifacts {
        environment,
        bundle,
    })
}

/// Artifacts for the run phase: built now when `[pipeline].assets = "start"`,
/// otherwise the ones a previous `stagehand build` left behind.
pub async fn prepare(cfg: &ConfigFile) -> Result<BuildArtifacts, PipelineError> {
    match cfg.pipeline {
        AssetStage::Start => build(cfg).await,
        AssetStage::Image => {
            let environment = Environment::load(&cfg.provision.env_dir)?;
            environment.ensure_matches(&LockFile::load(&cfg.provision.lockfile)?)?;
            let bundle = AssetBuilder::from_settings(&cfg.assets, &cfg.project)?.existing()?;
            info!(
                env = ?environment.root(),
                assets = ?bundle.root,
                digest = %bundle.digest,
                "using prebuilt environment and assets"
            );
            Ok(BuildArtifacts {
                environment,
                bundle,
            })
        }
    }
}

/// `stagehand run`: prepare artifacts, launch the server, supervise it.
///
/// The health endpoint and the signal handlers are up before preparation
/// starts, so the host monitor sees `starting` during a start-time build and
/// a termination request cancels the build.
pub async fn run(cfg: &ConfigFile, mode: Mode) -> Result<RunOutcome, PipelineError> {
    let span = info_span!("phase", phase = "run", %mode);
    let mut supervisor = Supervisor::new(SupervisorSettings::from_config(cfg))?;
    supervisor
        .start_health_listener()
        .instrument(span.clone())
        .await?;
    let signals = spawn_signal_listener(supervisor.handle())?;

    let result = prepare_and_supervise(cfg, mode, &mut supervisor, span).await;
    signals.abort();
    result
}

async fn prepare_and_supervise(
    cfg: &ConfigFile,
    mode: Mode,
    supervisor: &mut Supervisor,
    span: Span,
) -> Result<RunOutcome, PipelineError> {
    let artifacts = tokio::select! {
        prepared = prepare(cfg) => prepared?,
        () = supervisor.termination_requested() => {
            info!("termination requested before the server was launched");
            supervisor.abandon();
            return Ok(RunOutcome::Graceful { code: None });
        }
    };

    let command = ServerCommand::for_app(
        &cfg.project,
        &cfg.run,
        mode,
        &artifacts.environment,
        &artifacts.bundle,
    );
    let outcome = supervise(supervisor, &command).instrument(span).await?;
    Ok(outcome)
}

async fn supervise(
    supervisor: &mut Supervisor,
    command: &ServerCommand,
) -> Result<RunOutcome, RunError> {
    supervisor.launch(command).await?;
    supervisor.run().await
}
