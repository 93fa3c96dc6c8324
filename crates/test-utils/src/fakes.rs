// crates/test-utils/src/fakes.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use stagehand::assets::{AssetCompiler, CompileContext};
use stagehand::errors::{BuildError, ProvisionError};
use stagehand::exec::BoxFuture;
use stagehand::lockfile::LockFile;
use stagehand::provision::{InstalledPackage, Installer};

/// An installer that never touches a real package source.
///
/// It writes one marker file per package and reports the lock's pins,
/// except where a substitute version was configured. That lets tests model
/// a resolver that quietly picks a different version.
#[derive(Default, Clone)]
pub struct FakeInstaller {
    substitutes: BTreeMap<String, String>,
    network_down: bool,
    calls: Arc<AtomicUsize>,
}

impl FakeInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `version` for `name` regardless of the lock.
    pub fn substitute(mut self, name: &str, version: &str) -> Self {
        self.substitutes.insert(name.to_string(), version.to_string());
        self
    }

    /// Write partial output, then fail with a network error.
    pub fn network_down(mut self) -> Self {
        self.network_down = true;
        self
    }

    /// Number of `install` calls so far (shared between clones).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Installer for FakeInstaller {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn install<'a>(
        &'a self,
        lock: &'a LockFile,
        target: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<InstalledPackage>, ProvisionError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut installed = Vec::new();
            for pkg in lock.install_order() {
                let version = self
                    .substitutes
                    .get(&pkg.name)
                    .cloned()
                    .unwrap_or_else(|| pkg.version.clone());
                let dir = target.join("packages").join(&pkg.name);
                fs::create_dir_all(&dir).map_err(anyhow::Error::from)?;
                fs::write(dir.join("VERSION"), &version).map_err(anyhow::Error::from)?;

                if self.network_down {
                    return Err(ProvisionError::NetworkFailure(format!(
                        "fetching {}: connection reset",
                        pkg.name
                    )));
                }

                installed.push(InstalledPackage {
                    name: pkg.name.clone(),
                    version,
                    hash: pkg.hash.clone(),
                });
            }
            Ok(installed)
        })
    }
}

/// A compiler that writes fixed files, or fails after writing some.
#[derive(Clone)]
pub struct FakeCompiler {
    files: Vec<(String, String)>,
    fail: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl FakeCompiler {
    pub fn writing(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
            fail: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Write the files, then report `SourceInvalid(reason)`.
    pub fn failing(mut self, reason: &str) -> Self {
        self.fail = Some(reason.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AssetCompiler for FakeCompiler {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn compile<'a>(
        &'a self,
        _ctx: &'a CompileContext,
        out: &'a Path,
    ) -> BoxFuture<'a, Result<(), BuildError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for (rel, contents) in &self.files {
                let path = out.join(rel);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(anyhow::Error::from)?;
                }
                fs::write(&path, contents).map_err(anyhow::Error::from)?;
            }
            match &self.fail {
                Some(reason) => Err(BuildError::SourceInvalid(reason.clone())),
                None => Ok(()),
            }
        })
    }
}
