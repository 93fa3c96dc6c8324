// src/provision/installer.rs

//! Pluggable installer abstraction.
//!
//! The provisioner talks to an `Installer` instead of a concrete package
//! manager. Production code picks [`StoreInstaller`](super::StoreInstaller)
//! or [`CommandInstaller`](super::CommandInstaller) from the manifest; tests
//! can provide their own implementation that fabricates results.

use std::path::Path;

use crate::errors::ProvisionError;
use crate::exec::BoxFuture;
use crate::lockfile::LockFile;
use crate::provision::environment::InstalledPackage;

pub trait Installer: Send + Sync {
    /// Short name recorded in the environment's version record.
    fn name(&self) -> &'static str;

    /// Materialize every package pinned in `lock` below `target` and report
    /// what was installed.
    ///
    /// `target` is an empty staging directory owned by the provisioner. The
    /// returned list is checked against the lock; an installer that reports
    /// anything other than the exact pins fails the provisioning.
    fn install<'a>(
        &'a self,
        lock: &'a LockFile,
        target: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<InstalledPackage>, ProvisionError>>;
}
