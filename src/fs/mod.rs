// src/fs/mod.rs

//! Directory helpers for the replace-don't-patch outputs.
//!
//! Both the environment and the asset bundle are produced in a sibling
//! `<dir>.staging` directory and swapped into place only after they are
//! complete, so a failed attempt never leaves a half-written output behind.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Sibling staging directory for `dir` (`<dir>.staging`).
pub fn staging_path(dir: &Path) -> PathBuf {
    let mut name = dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "out".into());
    name.push(".staging");
    dir.with_file_name(name)
}

/// Remove `dir` if it exists, then create it empty.
pub fn fresh_dir(dir: &Path) -> Result<()> {
    remove_dir_if_exists(dir)?;
    fs::create_dir_all(dir).with_context(|| format!("creating directory {:?}", dir))?;
    Ok(())
}

pub fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    if dir.exists() {
        debug!(path = ?dir, "removing directory");
        fs::remove_dir_all(dir).with_context(|| format!("removing directory {:?}", dir))?;
    }
    Ok(())
}

/// Replace `target` wholesale with `staging`.
///
/// The previous `target` (if any) is removed first; `staging` is then
/// renamed into place. Both paths must be on the same filesystem.
pub fn replace_dir(staging: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating directory {:?}", parent))?;
    }
    remove_dir_if_exists(target)?;
    fs::rename(staging, target)
        .with_context(|| format!("moving {:?} into place at {:?}", staging, target))?;
    Ok(())
}

/// All regular files below `root`, as paths relative to `root`, sorted.
///
/// Symlinks are followed for files but never for directories, so a link
/// cycle cannot make the walk loop; skipped links are logged.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk_into(root, Path::new(""), &mut files)?;
    files.sort();
    Ok(files)
}

fn walk_into(root: &Path, rel: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let dir = root.join(rel);
    for entry in fs::read_dir(&dir).with_context(|| format!("reading dir {:?}", dir))? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let rel_path = rel.join(entry.file_name());

        if file_type.is_dir() {
            walk_into(root, &rel_path, out)?;
        } else if file_type.is_file() || (file_type.is_symlink() && entry.path().is_file()) {
            out.push(rel_path);
        } else if file_type.is_symlink() {
            warn!(path = ?entry.path(), "skipping symlink that does not point to a file");
        }
    }
    Ok(())
}

/// Recursively copy the files below `src` into `dst`, preserving relative
/// layout and permissions.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    let files = walk_files(src)?;
    for rel in &files {
        copy_file(&src.join(rel), &dst.join(rel))?;
    }
    Ok(files.len())
}

/// Copy one file, creating parent directories as needed.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
    }
    fs::copy(src, dst).with_context(|| format!("copying {:?} to {:?}", src, dst))?;
    Ok(())
}
