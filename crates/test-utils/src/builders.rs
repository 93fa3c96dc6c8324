// crates/test-utils/src/builders.rs

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use stagehand::config::{ConfigFile, RawConfigFile, resolve_config};
use stagehand::digest::tree_digest;
use stagehand::types::{AssetStage, CompilerKind, InstallerKind, ShutdownMode};

use crate::write_file;

/// Builder for `ConfigFile` rooted at a scratch project directory.
///
/// Defaults: a store installer reading `<root>/store`, the copy compiler over
/// `assets/**`, a `sleep` server on port 8000 and a health endpoint on an
/// ephemeral localhost port.
pub struct ConfigFileBuilder {
    root: PathBuf,
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(root: &Path) -> Self {
        let mut config = RawConfigFile::default();
        config.project.name = Some("testapp".to_string());
        config.provision.store = Some("store".to_string());
        config.run.command = "sleep 30".to_string();
        config.health.listen = "127.0.0.1:0".to_string();
        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    pub fn lockfile(mut self, rel: &str) -> Self {
        self.config.provision.lockfile = rel.to_string();
        self
    }

    pub fn store(mut self, rel: &str) -> Self {
        self.config.provision.installer = InstallerKind::Store;
        self.config.provision.store = Some(rel.to_string());
        self
    }

    pub fn installer_command(mut self, cmd: &str) -> Self {
        self.config.provision.installer = InstallerKind::Command;
        self.config.provision.command = Some(cmd.to_string());
        self
    }

    pub fn include(mut self, pattern: &str) -> Self {
        self.config.assets.compiler = CompilerKind::Copy;
        self.config.assets.include = vec![pattern.to_string()];
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.assets.exclude.push(pattern.to_string());
        self
    }

    pub fn assets_command(mut self, cmd: &str) -> Self {
        self.config.assets.compiler = CompilerKind::Command;
        self.config.assets.command = Some(cmd.to_string());
        self
    }

    pub fn toolchain(mut self, tool: &str) -> Self {
        self.config.assets.toolchain.push(tool.to_string());
        self
    }

    pub fn assets_timeout(mut self, timeout: &str) -> Self {
        self.config.assets.timeout = timeout.to_string();
        self
    }

    pub fn assets_at(mut self, stage: AssetStage) -> Self {
        self.config.pipeline.assets = stage;
        self
    }

    pub fn run_command(mut self, cmd: &str) -> Self {
        self.config.run.command = cmd.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.run.port = port;
        self
    }

    pub fn bind_timeout(mut self, timeout: &str) -> Self {
        self.config.run.bind_timeout = timeout.to_string();
        self
    }

    pub fn run_env(mut self, key: &str, value: &str) -> Self {
        self.config.run.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn shutdown(mut self, mode: ShutdownMode, grace: &str) -> Self {
        self.config.shutdown.mode = mode;
        self.config.shutdown.grace_period = grace.to_string();
        self
    }

    pub fn health_timeout(mut self, timeout: &str) -> Self {
        self.config.health.timeout = timeout.to_string();
        self
    }

    pub fn raw(&self) -> &RawConfigFile {
        &self.config
    }

    pub fn build(self) -> ConfigFile {
        resolve_config(self.config, &self.root).expect("Failed to build valid config from builder")
    }
}

/// Builder for lock file text.
#[derive(Default)]
pub struct LockFileBuilder {
    packages: BTreeMap<String, (String, String, Vec<String>)>,
}

impl LockFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn package(mut self, name: &str, version: &str, hash: &str) -> Self {
        self.packages.insert(
            name.to_string(),
            (version.to_string(), hash.to_string(), Vec::new()),
        );
        self
    }

    pub fn depends(mut self, name: &str, dep: &str) -> Self {
        if let Some(entry) = self.packages.get_mut(name) {
            entry.2.push(dep.to_string());
        }
        self
    }

    pub fn to_toml(&self) -> String {
        let mut out = String::from("version = 1\n");
        for (name, (version, hash, deps)) in &self.packages {
            out.push_str("\n[[package]]\n");
            out.push_str(&format!("name = {name:?}\n"));
            out.push_str(&format!("version = {version:?}\n"));
            out.push_str(&format!("hash = {hash:?}\n"));
            if !deps.is_empty() {
                out.push_str(&format!("dependencies = {deps:?}\n"));
            }
        }
        out
    }

    pub fn write(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create lock dir");
        }
        fs::write(path, self.to_toml()).expect("write lock file");
    }
}

/// Lays out a package store (`<root>/<name>/<version>/...`) and reports the
/// content hash a lock file must pin for each package.
pub struct PackageStoreBuilder {
    root: PathBuf,
}

impl PackageStoreBuilder {
    pub fn new(root: &Path) -> Self {
        fs::create_dir_all(root).expect("create store root");
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Add `name@version` with a library file and a `bin/<name>` script.
    /// Returns its content hash.
    pub fn package(&self, name: &str, version: &str) -> String {
        let dir = self.root.join(name).join(version);
        write_file(&dir, &format!("lib/{name}.txt"), &format!("{name} {version}\n"));
        crate::write_script(&dir, &format!("bin/{name}"), &format!("echo {name} {version}"));
        self.hash_of(name, version)
    }

    /// Add `name@version` with explicit files. Returns its content hash.
    pub fn package_with(&self, name: &str, version: &str, files: &[(&str, &str)]) -> String {
        let dir = self.root.join(name).join(version);
        for (rel, contents) in files {
            write_file(&dir, rel, contents);
        }
        self.hash_of(name, version)
    }

    pub fn hash_of(&self, name: &str, version: &str) -> String {
        tree_digest(&self.root.join(name).join(version))
            .expect("hash store package")
            .digest
    }
}
