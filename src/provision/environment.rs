// src/provision/environment.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::errors::ProvisionError;
use crate::lockfile::LockFile;

/// Version record written at the root of every environment.
pub const RECORD_FILE: &str = "stagehand-env.toml";

/// One package as materialized in an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    pub hash: String,
}

/// Contents of `stagehand-env.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    /// Digest of the lock file this environment was built from.
    pub lock_digest: String,
    /// Name of the installer that materialized it.
    pub installer: String,
    #[serde(default, rename = "package")]
    pub packages: Vec<InstalledPackage>,
}

/// A provisioned environment on disk.
#[derive(Debug, Clone)]
pub struct Environment {
    root: PathBuf,
    record: EnvironmentRecord,
}

impl Environment {
    /// Open the environment at `root` by reading its version record.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, ProvisionError> {
        let root = root.as_ref();
        let record_path = root.join(RECORD_FILE);
        if !record_path.is_file() {
            return Err(ProvisionError::EnvironmentMissing(root.to_path_buf()));
        }
        let contents = fs::read_to_string(&record_path)
            .with_context(|| format!("reading environment record {:?}", record_path))?;
        let record: EnvironmentRecord = toml::from_str(&contents)
            .with_context(|| format!("parsing environment record {:?}", record_path))?;
        Ok(Self {
            root: root.to_path_buf(),
            record,
        })
    }

    pub(crate) fn write_record(dir: &Path, record: &EnvironmentRecord) -> Result<(), ProvisionError> {
        let path = dir.join(RECORD_FILE);
        let contents = toml::to_string(record).context("serializing environment record")?;
        fs::write(&path, contents).with_context(|| format!("writing {:?}", path))?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Executables provided by installed packages.
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn record(&self) -> &EnvironmentRecord {
        &self.record
    }

    pub fn packages(&self) -> &[InstalledPackage] {
        &self.record.packages
    }

    /// Fail unless this environment was provisioned from `lock`.
    pub fn ensure_matches(&self, lock: &LockFile) -> Result<(), ProvisionError> {
        let expected = lock.digest();
        if self.record.lock_digest == expected {
            return Ok(());
        }
        Err(ProvisionError::EnvironmentStale {
            path: self.root.clone(),
            expected,
            actual: self.record.lock_digest.clone(),
        })
    }

    /// The version actually installed for `name`, if any.
    pub fn version_of(&self, name: &str) -> Option<&str> {
        self.record
            .packages
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.version.as_str())
    }
}
