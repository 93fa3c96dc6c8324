// src/assets/bundle.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::digest::tree_digest;
use crate::errors::BuildError;

/// Contents of the asset manifest (`<state_dir>/assets.manifest`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    /// Digest over every file in the bundle.
    pub digest: String,
    pub files: usize,
    /// Lock digest of the environment the bundle was built with.
    pub environment: String,
    /// Name of the compiler that produced it.
    pub compiler: String,
}

impl AssetManifest {
    pub fn read(path: &Path) -> Result<Option<Self>, BuildError> {
        if !path.is_file() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading asset manifest {:?}", path))?;
        let manifest = toml::from_str(&contents)
            .with_context(|| format!("parsing asset manifest {:?}", path))?;
        Ok(Some(manifest))
    }

    pub fn write(&self, path: &Path) -> Result<(), BuildError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
        }
        let contents = toml::to_string(self).context("serializing asset manifest")?;
        fs::write(path, contents).with_context(|| format!("writing asset manifest {:?}", path))?;
        Ok(())
    }
}

/// A compiled, deployable asset bundle on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBundle {
    pub root: PathBuf,
    pub digest: String,
    pub files: usize,
}

impl AssetBundle {
    /// Open the bundle at `root` and check it against its manifest.
    ///
    /// Used by the run phase when assets were built at image time: a bundle
    /// that is missing, or whose content no longer matches the manifest, is
    /// never served.
    pub fn open(root: &Path, manifest_path: &Path) -> Result<Self, BuildError> {
        if !root.is_dir() {
            return Err(BuildError::BundleMissing(root.to_path_buf()));
        }
        let Some(manifest) = AssetManifest::read(manifest_path)? else {
            return Err(BuildError::BundleMissing(root.to_path_buf()));
        };

        let actual = tree_digest(root)?;
        if actual.digest != manifest.digest {
            return Err(BuildError::BundleMismatch {
                path: root.to_path_buf(),
                expected: manifest.digest,
                actual: actual.digest,
            });
        }

        Ok(Self {
            root: root.to_path_buf(),
            digest: actual.digest,
            files: actual.files,
        })
    }
}
