// src/assets/compiler.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::BuildError;
use crate::exec::BoxFuture;

/// Inputs available to an asset compiler.
#[derive(Debug, Clone)]
pub struct CompileContext {
    /// Root of the source tree.
    pub source: PathBuf,
    /// Root of the provisioned environment.
    pub env_root: PathBuf,
    /// `<env>/bin`, prepended to `PATH` for build commands.
    pub env_bin: PathBuf,
    /// Directories never treated as source (stagehand's state directory and
    /// the bundle output).
    pub skip_dirs: Vec<PathBuf>,
    /// Upper bound on the compile step.
    pub timeout: Duration,
}

/// Trait abstracting how the frontend bundle is produced.
///
/// Implementations write the finished bundle into `out`, an empty staging
/// directory owned by the [`AssetBuilder`](super::AssetBuilder). They must
/// not read anything but the context's source tree and environment.
pub trait AssetCompiler: Send + Sync {
    fn name(&self) -> &'static str;

    fn compile<'a>(
        &'a self,
        ctx: &'a CompileContext,
        out: &'a Path,
    ) -> BoxFuture<'a, Result<(), BuildError>>;
}
