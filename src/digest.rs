// src/digest.rs

//! Content digests for packages, lock files and asset bundles.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::fs::walk_files;

/// Prefix used for every digest string stagehand writes or accepts.
pub const DIGEST_PREFIX: &str = "blake3:";

/// Digest of a directory tree plus the number of files it covered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeDigest {
    pub digest: String,
    pub files: usize,
}

/// Compute the hex hash of a single file.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = File::open(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Compute a deterministic digest over every file below `root`.
///
/// Relative paths (with `/` separators) and file contents both feed the
/// hash, in sorted path order, so two trees with the same layout and bytes
/// produce the same digest regardless of where they live or in which order
/// the filesystem lists them. Timestamps and permissions are not included.
pub fn tree_digest(root: &Path) -> Result<TreeDigest> {
    let mut hasher = Hasher::new();
    let files = walk_files(root)?;

    for rel in &files {
        let rel_str = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let file_hash = compute_file_hash(&root.join(rel))?;
        hasher.update(rel_str.as_bytes());
        hasher.update(&[0]);
        hasher.update(file_hash.as_bytes());
        hasher.update(b"\n");
    }

    let digest = format!("{DIGEST_PREFIX}{}", hasher.finalize().to_hex());
    debug!(root = ?root, files = files.len(), digest = %digest, "computed tree digest");
    Ok(TreeDigest {
        digest,
        files: files.len(),
    })
}

/// Digest of an in-memory byte string, in `blake3:<hex>` form.
pub fn bytes_digest(bytes: &[u8]) -> String {
    format!("{DIGEST_PREFIX}{}", blake3::hash(bytes).to_hex())
}
