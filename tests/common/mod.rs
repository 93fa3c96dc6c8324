#![allow(dead_code)]

pub use stagehand_test_utils::builders;
pub use stagehand_test_utils::fakes;
pub use stagehand_test_utils::{
    free_port, init_tracing, with_deadline, with_timeout, write_file, write_script,
};

use std::path::Path;

use stagehand::provision::{Environment, Provisioner};
use stagehand_test_utils::builders::{LockFileBuilder, PackageStoreBuilder};

/// Lay out a store with `pkgA@1.2.3` and write a lock pinning it.
/// Returns the pinned hash.
pub fn store_with_pkg_a(root: &Path) -> String {
    let store = PackageStoreBuilder::new(&root.join("store"));
    let hash = store.package("pkgA", "1.2.3");
    LockFileBuilder::new()
        .package("pkgA", "1.2.3", &hash)
        .write(&root.join("stagehand.lock"));
    hash
}

/// Provision a real environment from `root/store` and `root/stagehand.lock`.
pub async fn provisioned_env(root: &Path) -> Environment {
    let cfg = builders::ConfigFileBuilder::new(root).build();
    Provisioner::from_settings(&cfg.provision)
        .provision(&cfg.provision.lockfile)
        .await
        .expect("provision test environment")
}
