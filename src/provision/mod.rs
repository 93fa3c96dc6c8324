// src/provision/mod.rs

//! Environment provisioning.
//!
//! `provision(lockfile) -> Environment` materializes exactly the pinned
//! packages into a fixed directory. The directory is always rebuilt from
//! scratch in a staging sibling and swapped in on success; an existing
//! environment is never patched, and a failed attempt leaves the previous
//! environment (if any) untouched.

pub mod command;
pub mod environment;
pub mod installer;
pub mod store;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{InstallerSettings, ProvisionSettings};
use crate::errors::ProvisionError;
use crate::fs::{fresh_dir, remove_dir_if_exists, replace_dir, staging_path};
use crate::lockfile::LockFile;

pub use command::CommandInstaller;
pub use environment::{Environment, EnvironmentRecord, InstalledPackage, RECORD_FILE};
pub use installer::Installer;
pub use store::StoreInstaller;

/// Owns the environment directory and the installer that fills it.
pub struct Provisioner {
    env_dir: PathBuf,
    installer: Box<dyn Installer>,
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("env_dir", &self.env_dir)
            .field("installer", &self.installer.name())
            .finish()
    }
}

impl Provisioner {
    pub fn new(env_dir: impl Into<PathBuf>, installer: Box<dyn Installer>) -> Self {
        Self {
            env_dir: env_dir.into(),
            installer,
        }
    }

    /// Build a provisioner with the installer selected in `[provision]`.
    pub fn from_settings(settings: &ProvisionSettings) -> Self {
        let installer: Box<dyn Installer> = match &settings.installer {
            InstallerSettings::Store { root } => Box::new(StoreInstaller::new(root.clone())),
            InstallerSettings::Command {
                command,
                network_error_pattern,
            } => Box::new(CommandInstaller::new(
                command.clone(),
                network_error_pattern.clone(),
            )),
        };
        Self::new(settings.env_dir.clone(), installer)
    }

    pub fn env_dir(&self) -> &Path {
        &self.env_dir
    }

    /// Provision the environment for the lock file at `lockfile`.
    pub async fn provision(&self, lockfile: &Path) -> Result<Environment, ProvisionError> {
        let lock = LockFile::load(lockfile)?;
        info!(
            lockfile = ?lockfile,
            packages = lock.packages().len(),
            installer = self.installer.name(),
            "provisioning environment"
        );

        let staging = staging_path(&self.env_dir);
        fresh_dir(&staging)?;

        if let Err(err) = self.populate(&lock, &staging).await {
            if let Err(cleanup) = remove_dir_if_exists(&staging) {
                warn!(error = %cleanup, "failed to discard partial environment");
            }
            return Err(err);
        }

        replace_dir(&staging, &self.env_dir)?;
        let env = Environment::load(&self.env_dir)?;
        info!(env = ?self.env_dir, lock_digest = %env.record().lock_digest, "environment ready");
        Ok(env)
    }

    async fn populate(&self, lock: &LockFile, staging: &Path) -> Result<(), ProvisionError> {
        let installed = self.installer.install(lock, staging).await?;
        let packages = verify_exact_pins(lock, installed)?;

        let record = EnvironmentRecord {
            lock_digest: lock.digest(),
            installer: self.installer.name().to_string(),
            packages,
        };
        Environment::write_record(staging, &record)
    }
}

/// Check that the installer materialized exactly the lock's pins.
///
/// Returns the installed packages sorted by name.
fn verify_exact_pins(
    lock: &LockFile,
    installed: Vec<InstalledPackage>,
) -> Result<Vec<InstalledPackage>, ProvisionError> {
    let mut by_name: BTreeMap<String, InstalledPackage> = BTreeMap::new();
    for pkg in installed {
        if let Some(dup) = by_name.insert(pkg.name.clone(), pkg) {
            return Err(ProvisionError::DependencyUnsatisfiable(format!(
                "installer reported package '{}' more than once",
                dup.name
            )));
        }
    }

    for pinned in lock.packages() {
        let Some(got) = by_name.get(&pinned.name) else {
            return Err(ProvisionError::DependencyUnsatisfiable(format!(
                "{}@{} was not installed",
                pinned.name, pinned.version
            )));
        };
        if got.version != pinned.version {
            return Err(ProvisionError::DependencyUnsatisfiable(format!(
                "{} resolved to {} but the lock pins {}",
                pinned.name, got.version, pinned.version
            )));
        }
        if got.hash != pinned.hash {
            return Err(ProvisionError::DependencyUnsatisfiable(format!(
                "{}@{} installed with hash {} but the lock pins {}",
                pinned.name, pinned.version, got.hash, pinned.hash
            )));
        }
    }

    if let Some(extra) = by_name.keys().find(|name| lock.get(name).is_none()) {
        return Err(ProvisionError::DependencyUnsatisfiable(format!(
            "installer added package '{extra}', which the lock does not pin"
        )));
    }

    Ok(by_name.into_values().collect())
}
