// src/assets/copy.rs

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::assets::compiler::{AssetCompiler, CompileContext};
use crate::errors::BuildError;
use crate::exec::BoxFuture;
use crate::fs::{copy_file, walk_files};

/// Compile a list of glob patterns into a single `GlobSet`.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

/// Builds the bundle by copying matching source files verbatim.
///
/// Paths are matched relative to the source root. Files under the context's
/// skipped directories are never copied, so `include = ["**"]` is safe.
#[derive(Debug, Clone)]
pub struct CopyCompiler {
    include: GlobSet,
    exclude: GlobSet,
}

impl CopyCompiler {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, BuildError> {
        let include = build_globset(include)
            .map_err(|e| BuildError::SourceInvalid(format!("invalid include glob: {e}")))?;
        let exclude = build_globset(exclude)
            .map_err(|e| BuildError::SourceInvalid(format!("invalid exclude glob: {e}")))?;
        Ok(Self { include, exclude })
    }

    fn copy_matching(&self, ctx: &CompileContext, out: &Path) -> Result<(), BuildError> {
        let skipped: Vec<&Path> = ctx
            .skip_dirs
            .iter()
            .filter_map(|d| d.strip_prefix(&ctx.source).ok())
            .filter(|d| !d.as_os_str().is_empty())
            .collect();
        let mut copied = 0usize;

        for rel in walk_files(&ctx.source)? {
            if skipped.iter().any(|s| rel.starts_with(s)) {
                continue;
            }
            if !self.include.is_match(&rel) || self.exclude.is_match(&rel) {
                continue;
            }
            copy_file(&ctx.source.join(&rel), &out.join(&rel))?;
            copied += 1;
        }

        if copied == 0 {
            return Err(BuildError::SourceInvalid(format!(
                "include patterns matched no files in {}",
                ctx.source.display()
            )));
        }

        debug!(files = copied, "copied asset sources");
        Ok(())
    }
}

impl AssetCompiler for CopyCompiler {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn compile<'a>(
        &'a self,
        ctx: &'a CompileContext,
        out: &'a Path,
    ) -> BoxFuture<'a, Result<(), BuildError>> {
        Box::pin(async move { self.copy_matching(ctx, out) })
    }
}
