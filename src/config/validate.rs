// src/config/validate.rs

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;

use crate::assets::copy::build_globset;
use crate::config::duration::parse_duration;
use crate::config::model::{
    AssetSettings, CompilerSettings, ConfigFile, HealthSettings, InstallerSettings,
    ProjectSettings, ProvisionSettings, RawConfigFile, RunSettings, ShutdownSettings,
};
use crate::errors::{Result, StagehandError};
use crate::health::HealthCheckConfig;
use crate::types::{CompilerKind, InstallerKind};

/// Name of the asset manifest written next to the bundle.
pub const ASSET_MANIFEST_FILE: &str = "assets.manifest";

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = StagehandError;

    /// Validate with relative paths resolved against the working directory.
    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        resolve_config(raw, Path::new("."))
    }
}

/// Validate a raw manifest and resolve its paths against `base_dir`
/// (normally the directory containing `Stagehand.toml`).
pub fn resolve_config(raw: RawConfigFile, base_dir: &Path) -> Result<ConfigFile> {
    let project = resolve_project(&raw, base_dir)?;
    let provision = resolve_provision(&raw, base_dir, &project)?;
    let assets = resolve_assets(&raw, base_dir, &project)?;
    let run = resolve_run(&raw)?;
    let health = resolve_health(&raw)?;
    let shutdown = ShutdownSettings {
        mode: raw.shutdown.mode,
        grace_period: duration_field("shutdown", "grace_period", &raw.shutdown.grace_period)?,
    };

    Ok(ConfigFile {
        project,
        provision,
        assets,
        pipeline: raw.pipeline.assets,
        run,
        health,
        shutdown,
    })
}

fn resolve_project(raw: &RawConfigFile, base_dir: &Path) -> Result<ProjectSettings> {
    let name = match raw.project.name.as_deref().map(str::trim) {
        Some("") => return Err(config_error("[project].name must not be empty")),
        Some(name) => name.to_string(),
        None => "app".to_string(),
    };

    Ok(ProjectSettings {
        name,
        source: resolve_path(base_dir, &raw.project.source),
        state_dir: resolve_path(base_dir, &raw.project.state_dir),
    })
}

fn resolve_provision(
    raw: &RawConfigFile,
    base_dir: &Path,
    project: &ProjectSettings,
) -> Result<ProvisionSettings> {
    let section = &raw.provision;

    let installer = match section.installer {
        InstallerKind::Store => {
            let store = non_empty(section.store.as_deref()).ok_or_else(|| {
                config_error("[provision].store must be set when installer = \"store\"")
            })?;
            InstallerSettings::Store {
                root: resolve_path(base_dir, store),
            }
        }
        InstallerKind::Command => {
            let command = non_empty(section.command.as_deref()).ok_or_else(|| {
                config_error("[provision].command must be set when installer = \"command\"")
            })?;
            let network_error_pattern = Regex::new(&section.network_error_pattern)
                .map_err(|e| {
                    config_error(format!("[provision].network_error_pattern is invalid: {e}"))
                })?;
            InstallerSettings::Command {
                command: command.to_string(),
                network_error_pattern,
            }
        }
    };

    let env_dir = match non_empty(section.env_dir.as_deref()) {
        Some(dir) => resolve_path(base_dir, dir),
        None => project.state_dir.join("env"),
    };

    Ok(ProvisionSettings {
        lockfile: resolve_path(base_dir, &section.lockfile),
        env_dir,
        installer,
    })
}

fn resolve_assets(
    raw: &RawConfigFile,
    base_dir: &Path,
    project: &ProjectSettings,
) -> Result<AssetSettings> {
    let section = &raw.assets;

    let compiler = match section.compiler {
        CompilerKind::Copy => {
            if section.include.is_empty() {
                return Err(config_error(
                    "[assets].include must list at least one glob when compiler = \"copy\"",
                ));
            }
            build_globset(&section.include)
                .map_err(|e| config_error(format!("[assets].include: {e}")))?;
            build_globset(&section.exclude)
                .map_err(|e| config_error(format!("[assets].exclude: {e}")))?;
            CompilerSettings::Copy {
                include: section.include.clone(),
                exclude: section.exclude.clone(),
            }
        }
        CompilerKind::Command => {
            let command = non_empty(section.command.as_deref()).ok_or_else(|| {
                config_error("[assets].command must be set when compiler = \"command\"")
            })?;
            CompilerSettings::Command {
                command: command.to_string(),
            }
        }
    };

    if let Some(tool) = section.toolchain.iter().find(|t| t.trim().is_empty()) {
        return Err(config_error(format!(
            "[assets].toolchain contains an empty entry ({tool:?})"
        )));
    }

    let out_dir = match non_empty(section.out_dir.as_deref()) {
        Some(dir) => resolve_path(base_dir, dir),
        None => project.state_dir.join("assets"),
    };

    let timeout = duration_field("assets", "timeout", &section.timeout)?;
    ensure_non_zero("assets", "timeout", timeout)?;

    Ok(AssetSettings {
        compiler,
        toolchain: section.toolchain.clone(),
        out_dir,
        manifest: project.state_dir.join(ASSET_MANIFEST_FILE),
        timeout,
    })
}

fn resolve_run(raw: &RawConfigFile) -> Result<RunSettings> {
    let section = &raw.run;

    if section.command.trim().is_empty() {
        return Err(config_error("[run].command must be set"));
    }
    if section.port == 0 {
        return Err(config_error("[run].port must be a fixed port (got 0)"));
    }
    if let Some(key) = section.env.keys().find(|k| k.is_empty() || k.contains('=')) {
        return Err(config_error(format!(
            "[run.env] has an invalid variable name {key:?}"
        )));
    }

    let bind_timeout = duration_field("run", "bind_timeout", &section.bind_timeout)?;
    ensure_non_zero("run", "bind_timeout", bind_timeout)?;

    Ok(RunSettings {
        command: section.command.clone(),
        port: section.port,
        bind_timeout,
        env: section.env.clone(),
    })
}

fn resolve_health(raw: &RawConfigFile) -> Result<HealthSettings> {
    let section = &raw.health;

    ensure_http_path("path", &section.path)?;
    let upstream_path = section
        .upstream_path
        .clone()
        .unwrap_or_else(|| section.path.clone());
    ensure_http_path("upstream_path", &upstream_path)?;

    if section.retries == 0 {
        return Err(config_error("[health].retries must be >= 1 (got 0)"));
    }

    let interval = duration_field("health", "interval", &section.interval)?;
    let timeout = duration_field("health", "timeout", &section.timeout)?;
    let start_period = duration_field("health", "start_period", &section.start_period)?;
    ensure_non_zero("health", "interval", interval)?;
    ensure_non_zero("health", "timeout", timeout)?;

    let listen: SocketAddr = section.listen.parse().map_err(|e| {
        config_error(format!(
            "[health].listen {:?} is not a socket address: {e}",
            section.listen
        ))
    })?;

    Ok(HealthSettings {
        policy: HealthCheckConfig {
            path: section.path.clone(),
            interval,
            timeout,
            start_period,
            retries: section.retries,
        },
        upstream_path,
        listen,
    })
}

fn ensure_http_path(field: &str, path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(config_error(format!(
            "[health].{field} must start with '/' (got {path:?})"
        )));
    }
    Ok(())
}

fn duration_field(section: &str, field: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| config_error(format!("[{section}].{field}: {e}")))
}

fn ensure_non_zero(section: &str, field: &str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(config_error(format!("[{section}].{field} must be > 0")));
    }
    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn resolve_path(base_dir: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn config_error(msg: impl Into<String>) -> StagehandError {
    StagehandError::ConfigError(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        resolve_config(raw, Path::new("/srv/app"))
    }

    const MINIMAL: &str = r#"
[provision]
store = "/opt/packages"

[run]
command = "serve --port {port}"
"#;

    #[test]
    fn minimal_manifest_gets_documented_defaults() {
        let cfg = parse(MINIMAL).unwrap();

        assert_eq!(cfg.project.state_dir, PathBuf::from("/srv/app/.stagehand"));
        assert_eq!(cfg.provision.lockfile, PathBuf::from("/srv/app/stagehand.lock"));
        assert_eq!(cfg.provision.env_dir, PathBuf::from("/srv/app/.stagehand/env"));
        assert_eq!(cfg.assets.out_dir, PathBuf::from("/srv/app/.stagehand/assets"));
        assert_eq!(cfg.run.port, 8000);
        assert_eq!(cfg.health.policy.path, "/ping");
        assert_eq!(cfg.health.upstream_path, "/ping");
        assert_eq!(cfg.health.policy.interval, Duration::from_secs(30));
        assert_eq!(cfg.health.policy.timeout, Duration::from_secs(5));
        assert_eq!(cfg.health.policy.start_period, Duration::from_secs(5));
        assert_eq!(cfg.health.policy.retries, 3);
        assert_eq!(cfg.shutdown.grace_period, Duration::from_secs(10));
    }

    #[test]
    fn run_command_is_required() {
        let err = parse("[provision]\nstore = \"/opt\"\n").unwrap_err();
        assert!(err.to_string().contains("[run].command"));
    }

    #[test]
    fn store_installer_needs_store_path() {
        let err = parse("[run]\ncommand = \"serve\"\n").unwrap_err();
        assert!(err.to_string().contains("[provision].store"));
    }

    #[test]
    fn rejects_zero_retries_and_relative_health_path() {
        let err = parse(&format!("{MINIMAL}\n[health]\nretries = 0\n")).unwrap_err();
        assert!(err.to_string().contains("retries"));

        let err = parse(&format!("{MINIMAL}\n[health]\npath = \"ping\"\n")).unwrap_err();
        assert!(err.to_string().contains("must start with '/'"));
    }

    #[test]
    fn rejects_invalid_glob_and_regex() {
        let err = parse(&format!("{MINIMAL}\n[assets]\ninclude = [\"a/[\"]\n")).unwrap_err();
        assert!(err.to_string().contains("[assets].include"));

        let err = parse(
            r#"
[provision]
installer = "command"
command = "pip sync {lockfile}"
network_error_pattern = "("

[run]
command = "serve"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("network_error_pattern"));
    }

    #[test]
    fn unknown_enum_values_fail_deserialization() {
        let err = parse(&format!("{MINIMAL}\n[shutdown]\nmode = \"polite\"\n")).unwrap_err();
        assert!(matches!(err, StagehandError::TomlError(_)));
    }
}
