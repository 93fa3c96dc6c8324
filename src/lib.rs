// src/lib.rs

pub mod assets;
pub mod cli;
pub mod config;
pub mod digest;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod health;
pub mod lockfile;
pub mod logging;
pub mod pipeline;
pub mod provision;
pub mod supervisor;
pub mod types;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{
    CompilerSettings, ConfigFile, InstallerSettings, format_duration, load_and_validate,
};
use crate::errors::{PipelineError, RunError};
use crate::health::{HealthStatus, probe_once};
use crate::lockfile::LockFile;
use crate::types::AssetStage;

/// High-level entry point used by `main.rs`.
///
/// Returns the process exit status on success; failures carry their own
/// (see [`PipelineError::exit_code`]).
pub async fn run(args: CliArgs) -> Result<i32, PipelineError> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    debug!(config = ?config_path, project = %cfg.project.name, "manifest loaded");

    match args.command {
        Command::Plan => {
            print_plan(&cfg);
            Ok(0)
        }
        Command::Build => {
            let artifacts = pipeline::build(&cfg).await?;
            info!(
                env = ?artifacts.environment.root(),
                packages = artifacts.environment.packages().len(),
                assets = ?artifacts.bundle.root,
                digest = %artifacts.bundle.digest,
                "build complete"
            );
            Ok(0)
        }
        Command::Run { mode } => {
            let outcome = pipeline::run(&cfg, mode).await?;
            Ok(outcome.exit_code())
        }
        Command::Probe { watch, url } => {
            let url = url.unwrap_or_else(|| local_health_url(&cfg));
            probe(&cfg, &url, watch).await
        }
    }
}

/// URL of the health endpoint as seen from inside the container.
pub fn local_health_url(cfg: &ConfigFile) -> String {
    let listen = cfg.health.listen;
    let host = if listen.ip().is_unspecified() {
        SocketAddr::new([127, 0, 0, 1].into(), listen.port())
    } else {
        listen
    };
    format!("http://{host}{}", cfg.health.policy.path)
}

async fn probe(cfg: &ConfigFile, url: &str, watch: bool) -> Result<i32, PipelineError> {
    let client = reqwest::Client::builder()
        .build()
        .context("building health probe client")
        .map_err(RunError::from)?;
    let policy = &cfg.health.policy;

    if watch {
        info!(url, interval = %format_duration(policy.interval), "watching health endpoint");
        let status = health::watch(&client, url, policy).await;
        warn!(url, status = %status, "health monitor stopped");
        return Ok(if status == HealthStatus::Unhealthy { 1 } else { 0 });
    }

    if probe_once(&client, url, policy.timeout).await {
        debug!(url, "probe succeeded");
        Ok(0)
    } else {
        info!(url, "probe failed");
        Ok(1)
    }
}

/// Print the pipeline described by the manifest; executes nothing.
pub fn print_plan(cfg: &ConfigFile) {
    println!("stagehand plan: {}", cfg.project.name);
    println!("  source    = {}", cfg.project.source.display());
    println!("  state_dir = {}", cfg.project.state_dir.display());
    println!();

    println!("provisioning:");
    println!("  lockfile  = {}", cfg.provision.lockfile.display());
    println!("  env_dir   = {}", cfg.provision.env_dir.display());
    match &cfg.provision.installer {
        InstallerSettings::Store { root } => {
            println!("  installer = store ({})", root.display());
        }
        InstallerSettings::Command { command, .. } => {
            println!("  installer = command: {command}");
        }
    }
    match LockFile::load(&cfg.provision.lockfile) {
        Ok(lock) => {
            println!("  packages ({}, install order):", lock.packages().len());
            for pkg in lock.install_order() {
                println!("    - {}@{}", pkg.name, pkg.version);
            }
        }
        Err(e) => println!("  packages: unavailable ({}: {e})", e.class()),
    }
    println!();

    let stage = match cfg.pipeline {
        AssetStage::Image => "image (stagehand build)",
        AssetStage::Start => "start (stagehand run)",
    };
    println!("assets:");
    println!("  built at  = {stage}");
    match &cfg.assets.compiler {
        CompilerSettings::Copy { include, exclude } => {
            println!("  compiler  = copy");
            println!("  include   = {include:?}");
            if !exclude.is_empty() {
                println!("  exclude   = {exclude:?}");
            }
        }
        CompilerSettings::Command { command } => {
            println!("  compiler  = command: {command}");
        }
    }
    if !cfg.assets.toolchain.is_empty() {
        println!("  toolchain = {:?}", cfg.assets.toolchain);
    }
    println!("  out_dir   = {}", cfg.assets.out_dir.display());
    println!("  timeout   = {}", format_duration(cfg.assets.timeout));
    println!();

    println!("run:");
    println!("  command   = {}", cfg.run.command);
    println!("  port      = {}", cfg.run.port);
    println!("  bind      = within {}", format_duration(cfg.run.bind_timeout));
    for (key, value) in &cfg.run.env {
        println!("  env       {key}={value}");
    }
    println!();

    let policy = &cfg.health.policy;
    println!("health:");
    println!("  endpoint  = {}{}", cfg.health.listen, policy.path);
    println!(
        "  upstream  = http://127.0.0.1:{}{}",
        cfg.run.port, cfg.health.upstream_path
    );
    println!("  {}", policy.docker_healthcheck("stagehand probe"));
    println!();

    println!("shutdown:");
    println!("  mode      = {:?}", cfg.shutdown.mode);
    println!("  STOPSIGNAL {}", cfg.shutdown.mode.stop_signal());
    println!("  grace     = {}", format_duration(cfg.shutdown.grace_period));

    debug!("plan complete (no execution)");
}
