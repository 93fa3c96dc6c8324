// src/lockfile/pin.rs

//! Checks that a lock entry is fully pinned.

use std::sync::LazyLock;

use regex::Regex;

/// Exact versions: numeric release segments with an optional pre-release or
/// build suffix (`1.2.3`, `2.31.0`, `1.0.0-rc.1`, `4.0.0+local`).
static EXACT_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]+(?:\.[0-9]+)*(?:[-+][0-9A-Za-z][0-9A-Za-z.+-]*)?$")
        .unwrap_or_else(|e| panic!("exact version regex is invalid: {e}"))
});

static CONTENT_HASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^blake3:[0-9a-f]{64}$")
        .unwrap_or_else(|e| panic!("content hash regex is invalid: {e}"))
});

/// Returns `Err(reason)` when `version` is a range, wildcard or otherwise
/// not a single exact version.
pub fn check_exact_version(version: &str) -> Result<(), String> {
    if version.trim().is_empty() {
        return Err("version is empty".to_string());
    }
    if version != version.trim() {
        return Err(format!("version {version:?} has surrounding whitespace"));
    }
    if let Some(op) = version
        .chars()
        .find(|c| matches!(c, '^' | '~' | '>' | '<' | '=' | '*' | ',' | '|' | ' '))
    {
        return Err(format!("version {version:?} is a range (contains {op:?})"));
    }
    if !EXACT_VERSION.is_match(version) {
        return Err(format!("version {version:?} is not an exact version"));
    }
    Ok(())
}

/// Package names become directory names inside the environment, so they
/// must be a single plain path component.
pub fn check_package_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("package with an empty name".to_string());
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(format!("package name {name:?} contains a path separator"));
    }
    if name.starts_with('.') || name.contains("..") {
        return Err(format!("package name {name:?} may not start with '.' or contain '..'"));
    }
    Ok(())
}

pub fn check_content_hash(hash: &str) -> Result<(), String> {
    if CONTENT_HASH.is_match(hash) {
        Ok(())
    } else {
        Err(format!(
            "hash {hash:?} is not of the form blake3:<64 lowercase hex chars>"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_names_must_be_plain_components() {
        for ok in ["pkgA", "python-dateutil", "zope.interface", "_private"] {
            assert!(check_package_name(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in ["", "../escape", "a/b", "a\\b", ".hidden", "..", "x..y"] {
            assert!(check_package_name(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn accepts_exact_versions() {
        for v in ["1.2.3", "0.1", "2024.1.15", "1.0.0-rc.1", "4.0.0+local.7"] {
            assert!(check_exact_version(v).is_ok(), "{v} should be exact");
        }
    }

    #[test]
    fn rejects_ranges_and_wildcards() {
        for v in ["^1.2.3", "~1.2", ">=1.0", "1.*", "1.x", "*", "1.2 - 1.3", "", "latest"] {
            assert!(check_exact_version(v).is_err(), "{v:?} should be rejected");
        }
    }

    #[test]
    fn hash_must_be_full_blake3() {
        let good = format!("blake3:{}", "a".repeat(64));
        assert!(check_content_hash(&good).is_ok());
        assert!(check_content_hash("blake3:abc").is_err());
        assert!(check_content_hash(&format!("sha256:{}", "a".repeat(64))).is_err());
        assert!(check_content_hash(&format!("blake3:{}", "A".repeat(64))).is_err());
    }
}
