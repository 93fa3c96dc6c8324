// src/lockfile/mod.rs

//! The pinned dependency manifest (`stagehand.lock`).
//!
//! ```toml
//! version = 1
//!
//! [[package]]
//! name = "pkgA"
//! version = "1.2.3"
//! hash = "blake3:..."
//! dependencies = ["pkgB"]
//! ```
//!
//! A lock file is read-only input: stagehand never writes or updates one.
//! [`LockFile::load`] parses and validates in one step, so every
//! `LockFile` value in the program is known to be fully pinned.

pub mod graph;
pub mod pin;

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::digest::bytes_digest;
use crate::errors::ProvisionError;

/// The only lock format version understood.
pub const LOCKFILE_VERSION: u32 = 1;

/// One fully pinned package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPackage {
    pub name: String,
    pub version: String,
    pub hash: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawLockFile {
    version: u32,
    #[serde(default, rename = "package")]
    packages: Vec<LockedPackage>,
}

/// A validated lock file.
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
    /// Sorted by name.
    packages: Vec<LockedPackage>,
    /// Dependencies before dependents.
    order: Vec<String>,
}

impl LockFile {
    /// Read, parse and validate the lock file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProvisionError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ProvisionError::LockfileMissing(path.to_path_buf()));
            }
            Err(e) => {
                return Err(ProvisionError::LockfileUnreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };
        Self::parse(path, &contents)
    }

    /// Parse and validate lock file contents; `path` is used for messages.
    pub fn parse(path: impl AsRef<Path>, contents: &str) -> Result<Self, ProvisionError> {
        let path = path.as_ref().to_path_buf();
        let unreadable = |reason: String| ProvisionError::LockfileUnreadable {
            path: path.clone(),
            reason,
        };

        let raw: RawLockFile = toml::from_str(contents).map_err(|e| unreadable(e.to_string()))?;
        if raw.version != LOCKFILE_VERSION {
            return Err(unreadable(format!(
                "unsupported lock file version {} (expected {LOCKFILE_VERSION})",
                raw.version
            )));
        }

        let mut packages = raw.packages;
        let mut seen = HashSet::new();
        for pkg in &packages {
            pin::check_package_name(&pkg.name).map_err(unreadable)?;
            if !seen.insert(pkg.name.as_str()) {
                return Err(ProvisionError::DependencyUnsatisfiable(format!(
                    "package '{}' is pinned more than once",
                    pkg.name
                )));
            }
            pin::check_exact_version(&pkg.version).map_err(|reason| {
                ProvisionError::DependencyUnsatisfiable(format!(
                    "package '{}' is not fully pinned: {reason}",
                    pkg.name
                ))
            })?;
            pin::check_content_hash(&pkg.hash)
                .map_err(|reason| unreadable(format!("package '{}': {reason}", pkg.name)))?;
        }

        packages.sort_by(|a, b| a.name.cmp(&b.name));
        for pkg in &mut packages {
            pkg.dependencies.sort();
            pkg.dependencies.dedup();
        }

        let order = graph::install_order(&packages)?;
        debug!(path = ?path, packages = packages.len(), "lock file validated");

        Ok(Self {
            path,
            packages,
            order,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pinned packages, sorted by name.
    pub fn packages(&self) -> &[LockedPackage] {
        &self.packages
    }

    pub fn get(&self, name: &str) -> Option<&LockedPackage> {
        self.packages
            .binary_search_by(|p| p.name.as_str().cmp(name))
            .ok()
            .map(|idx| &self.packages[idx])
    }

    /// Packages in install order: dependencies before dependents.
    pub fn install_order(&self) -> impl Iterator<Item = &LockedPackage> {
        self.order.iter().filter_map(|name| self.get(name))
    }

    /// Digest of the lock's canonical content.
    ///
    /// Formatting, comments and entry order in the file do not affect it.
    pub fn digest(&self) -> String {
        let mut canonical = String::new();
        for pkg in &self.packages {
            canonical.push_str(&pkg.name);
            canonical.push('\0');
            canonical.push_str(&pkg.version);
            canonical.push('\0');
            canonical.push_str(&pkg.hash);
            canonical.push('\0');
            canonical.push_str(&pkg.dependencies.join(","));
            canonical.push('\n');
        }
        bytes_digest(canonical.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(c: char) -> String {
        format!("blake3:{}", c.to_string().repeat(64))
    }

    fn lock_src(entries: &[(&str, &str, &[&str])]) -> String {
        let mut out = String::from("version = 1\n");
        for (i, (name, version, deps)) in entries.iter().enumerate() {
            let deps = deps
                .iter()
                .map(|d| format!("\"{d}\""))
                .collect::<Vec<_>>()
                .join(", ");
            let h = hash(char::from_digit((i % 10) as u32, 10).unwrap_or('0'));
            out.push_str(&format!(
                "\n[[package]]\nname = \"{name}\"\nversion = \"{version}\"\nhash = \"{h}\"\ndependencies = [{deps}]\n"
            ));
        }
        out
    }

    #[test]
    fn install_order_puts_dependencies_first() {
        let src = lock_src(&[
            ("web", "2.0.0", &["http", "templates"]),
            ("http", "1.4.0", &["sockets"]),
            ("templates", "0.3.1", &[]),
            ("sockets", "0.9.0", &[]),
        ]);
        let lock = LockFile::parse("stagehand.lock", &src).unwrap();
        let order: Vec<_> = lock.install_order().map(|p| p.name.as_str()).collect();

        let pos = |n: &str| order.iter().position(|o| *o == n).unwrap();
        assert_eq!(order.len(), 4);
        assert!(pos("sockets") < pos("http"));
        assert!(pos("http") < pos("web"));
        assert!(pos("templates") < pos("web"));
    }

    #[test]
    fn unknown_dependency_is_unsatisfiable() {
        let src = lock_src(&[("web", "2.0.0", &["missing"])]);
        let err = LockFile::parse("stagehand.lock", &src).unwrap_err();
        assert!(matches!(err, ProvisionError::DependencyUnsatisfiable(ref m) if m.contains("missing")));
    }

    #[test]
    fn cycle_is_unsatisfiable() {
        let src = lock_src(&[("a", "1.0.0", &["b"]), ("b", "1.0.0", &["a"])]);
        let err = LockFile::parse("stagehand.lock", &src).unwrap_err();
        assert!(matches!(err, ProvisionError::DependencyUnsatisfiable(ref m) if m.contains("cycle")));
    }

    #[test]
    fn range_version_is_rejected() {
        let src = lock_src(&[("pkgA", "^1.2.3", &[])]);
        let err = LockFile::parse("stagehand.lock", &src).unwrap_err();
        assert_eq!(err.class(), "DependencyUnsatisfiable");
        assert!(err.to_string().contains("pkgA"));
    }

    #[test]
    fn malformed_toml_is_unreadable() {
        let err = LockFile::parse("stagehand.lock", "version = 1\n[[package]\n").unwrap_err();
        assert_eq!(err.class(), "LockfileUnreadable");

        let err = LockFile::parse("stagehand.lock", "version = 2\n").unwrap_err();
        assert_eq!(err.class(), "LockfileUnreadable");
    }

    #[test]
    fn missing_file_is_reported_as_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let err = LockFile::load(tmp.path().join("stagehand.lock")).unwrap_err();
        assert!(matches!(err, ProvisionError::LockfileMissing(_)));
    }

    #[test]
    fn digest_ignores_entry_order() {
        let a = lock_src(&[("x", "1.0.0", &[]), ("y", "2.0.0", &[])]);
        let b = format!(
            "version = 1\n\n[[package]]\nname = \"y\"\nversion = \"2.0.0\"\nhash = \"{}\"\n\n[[package]]\nname = \"x\"\nversion = \"1.0.0\"\nhash = \"{}\"\n",
            hash('1'),
            hash('0'),
        );
        let la = LockFile::parse("a.lock", &a).unwrap();
        let lb = LockFile::parse("b.lock", &b).unwrap();
        assert_eq!(la.digest(), lb.digest());
    }
}
