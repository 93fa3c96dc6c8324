// src/provision/store.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info};

use crate::digest::tree_digest;
use crate::errors::ProvisionError;
use crate::exec::BoxFuture;
use crate::fs::copy_tree;
use crate::lockfile::{LockFile, LockedPackage};
use crate::provision::environment::InstalledPackage;
use crate::provision::installer::Installer;

/// Installs packages from a local content-addressed package store.
///
/// Store layout: `<root>/<name>/<version>/...`. The digest of each package
/// directory must equal the lock's `hash`. Package files are copied to
/// `<env>/packages/<name>/`, and anything under a package's own `bin/` is
/// also copied to `<env>/bin/` so the asset toolchain can find it.
///
/// Only the exact pinned version directory is ever read; if it is absent
/// the install fails even when other versions of the package exist.
#[derive(Debug, Clone)]
pub struct StoreInstaller {
    root: PathBuf,
}

impl StoreInstaller {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn install_blocking(
        &self,
        lock: &LockFile,
        target: &Path,
    ) -> Result<Vec<InstalledPackage>, ProvisionError> {
        if !self.root.is_dir() {
            return Err(ProvisionError::NetworkFailure(format!(
                "package store {} is unreachable",
                self.root.display()
            )));
        }

        let mut installed = Vec::new();
        for pkg in lock.install_order() {
            installed.push(self.install_package(pkg, target)?);
        }
        Ok(installed)
    }

    fn install_package(
        &self,
        pkg: &LockedPackage,
        target: &Path,
    ) -> Result<InstalledPackage, ProvisionError> {
        let src = self.root.join(&pkg.name).join(&pkg.version);
        if !src.is_dir() {
            let available = self.available_versions(&pkg.name);
            let hint = if available.is_empty() {
                "no versions of it are in the store".to_string()
            } else {
                format!("store only has {}", available.join(", "))
            };
            return Err(ProvisionError::DependencyUnsatisfiable(format!(
                "{}@{} is not available ({hint})",
                pkg.name, pkg.version
            )));
        }

        let digest = tree_digest(&src)?;
        if digest.digest != pkg.hash {
            return Err(ProvisionError::DependencyUnsatisfiable(format!(
                "{}@{} content hash mismatch: lock pins {}, store has {}",
                pkg.name, pkg.version, pkg.hash, digest.digest
            )));
        }

        let dest = target.join("packages").join(&pkg.name);
        let files = copy_tree(&src, &dest)?;

        let bin = src.join("bin");
        if bin.is_dir() {
            copy_tree(&bin, &target.join("bin"))
                .with_context(|| format!("linking executables of {}", pkg.name))?;
        }

        info!(package = %pkg.name, version = %pkg.version, files, "installed package");

        Ok(InstalledPackage {
            name: pkg.name.clone(),
            version: pkg.version.clone(),
            hash: digest.digest,
        })
    }

    fn available_versions(&self, name: &str) -> Vec<String> {
        let mut versions: Vec<String> = fs::read_dir(self.root.join(name))
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().is_dir())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        versions.sort();
        debug!(package = %name, ?versions, "versions present in store");
        versions
    }
}

impl Installer for StoreInstaller {
    fn name(&self) -> &'static str {
        "store"
    }

    fn install<'a>(
        &'a self,
        lock: &'a LockFile,
        target: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<InstalledPackage>, ProvisionError>> {
        let installer = self.clone();
        let lock = lock.clone();
        let target = target.to_path_buf();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || installer.install_blocking(&lock, &target))
                .await
                .context("store install task panicked")?
        })
    }
}
