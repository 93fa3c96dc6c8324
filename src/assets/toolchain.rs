// src/assets/toolchain.rs

use std::path::{Path, PathBuf};

use crate::errors::BuildError;

/// Locate `tool` in `env_bin` first, then on `PATH`.
pub fn find_executable(tool: &str, env_bin: &Path) -> Option<PathBuf> {
    let mut dirs = vec![env_bin.to_path_buf()];
    if let Some(path) = std::env::var_os("PATH") {
        dirs.extend(std::env::split_paths(&path));
    }
    dirs.into_iter()
        .map(|dir| dir.join(tool))
        .find(|candidate| is_executable(candidate))
}

/// Fail with `ToolchainMissing` naming every tool that does not resolve.
pub fn check_toolchain(tools: &[String], env_bin: &Path) -> Result<(), BuildError> {
    let missing: Vec<&str> = tools
        .iter()
        .filter(|t| find_executable(t, env_bin).is_none())
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(BuildError::ToolchainMissing(format!(
            "required build tools not found in {} or PATH: {}",
            env_bin.display(),
            missing.join(", ")
        )))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
