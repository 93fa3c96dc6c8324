// src/assets/mod.rs

//! Frontend asset bundle build.
//!
//! `build(environment, source) -> AssetBundle` runs the configured compiler
//! into `<out_dir>.staging`, digests the result, and only then replaces
//! `out_dir`. A failed build discards the staging directory and leaves the
//! previous bundle where it was.

pub mod bundle;
pub mod command;
pub mod compiler;
pub mod copy;
pub mod toolchain;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::config::{AssetSettings, CompilerSettings, ProjectSettings};
use crate::digest::tree_digest;
use crate::errors::BuildError;
use crate::fs::{fresh_dir, remove_dir_if_exists, replace_dir, staging_path};
use crate::provision::Environment;

pub use bundle::{AssetBundle, AssetManifest};
pub use command::CommandCompiler;
pub use compiler::{AssetCompiler, CompileContext};
pub use copy::{CopyCompiler, build_globset};
pub use toolchain::{check_toolchain, find_executable};

pub struct AssetBuilder {
    out_dir: PathBuf,
    manifest: PathBuf,
    toolchain: Vec<String>,
    timeout: Duration,
    skip_dirs: Vec<PathBuf>,
    compiler: Box<dyn AssetCompiler>,
}

impl std::fmt::Debug for AssetBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetBuilder")
            .field("out_dir", &self.out_dir)
            .field("compiler", &self.compiler.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AssetBuilder {
    pub fn new(
        out_dir: impl Into<PathBuf>,
        manifest: impl Into<PathBuf>,
        compiler: Box<dyn AssetCompiler>,
    ) -> Self {
        let out_dir = out_dir.into();
        let skip_dirs = vec![out_dir.clone(), staging_path(&out_dir)];
        Self {
            out_dir,
            manifest: manifest.into(),
            toolchain: Vec::new(),
            timeout: Duration::from_secs(600),
            skip_dirs,
            compiler,
        }
    }

    pub fn with_toolchain(mut self, tools: Vec<String>) -> Self {
        self.toolchain = tools;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Exclude `dir` from the source tree handed to the compiler.
    pub fn skip_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.skip_dirs.push(dir.into());
        self
    }

    /// Build an asset builder from `[assets]`, skipping the project's state
    /// directory.
    pub fn from_settings(
        settings: &AssetSettings,
        project: &ProjectSettings,
    ) -> Result<Self, BuildError> {
        let compiler: Box<dyn AssetCompiler> = match &settings.compiler {
            CompilerSettings::Copy { include, exclude } => {
                Box::new(CopyCompiler::new(include, exclude)?)
            }
            CompilerSettings::Command { command } => Box::new(CommandCompiler::new(command.clone())),
        };

        Ok(
            Self::new(settings.out_dir.clone(), settings.manifest.clone(), compiler)
                .with_toolchain(settings.toolchain.clone())
                .with_timeout(settings.timeout)
                .skip_dir(project.state_dir.clone()),
        )
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest
    }

    /// Open the bundle a previous `build` left at `out_dir`.
    pub fn existing(&self) -> Result<AssetBundle, BuildError> {
        AssetBundle::open(&self.out_dir, &self.manifest)
    }

    /// Compile the bundle for `source` using the tools in `env`.
    pub async fn build(&self, env: &Environment, source: &Path) -> Result<AssetBundle, BuildError> {
        if !source.is_dir() {
            return Err(BuildError::SourceInvalid(format!(
                "source tree {} is not a directory",
                source.display()
            )));
        }
        let env_bin = env.bin_dir();
        check_toolchain(&self.toolchain, &env_bin)?;

        info!(
            source = ?source,
            out_dir = ?self.out_dir,
            compiler = self.compiler.name(),
            "building asset bundle"
        );

        let ctx = CompileContext {
            source: source.to_path_buf(),
            env_root: env.root().to_path_buf(),
            env_bin,
            skip_dirs: self.skip_dirs.clone(),
            timeout: self.timeout,
        };

        let staging = staging_path(&self.out_dir);
        fresh_dir(&staging)?;

        if let Err(err) = self.compiler.compile(&ctx, &staging).await {
            if let Err(cleanup) = remove_dir_if_exists(&staging) {
                warn!(error = %cleanup, "failed to discard partial asset bundle");
            }
            return Err(err);
        }

        let digest = tree_digest(&staging)?;
        replace_dir(&staging, &self.out_dir)?;

        AssetManifest {
            digest: digest.digest.clone(),
            files: digest.files,
            environment: env.record().lock_digest.clone(),
            compiler: self.compiler.name().to_string(),
        }
        .write(&self.manifest)?;

        info!(digest = %digest.digest, files = digest.files, "asset bundle ready");
        Ok(AssetBundle {
            root: self.out_dir.clone(),
            digest: digest.digest,
            files: digest.files,
        })
    }
}
