// tests/lockfile_properties.rs

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use stagehand::lockfile::LockFile;
use stagehand_test_utils::builders::LockFileBuilder;

type Entry = (String, String, Vec<String>);

// Acyclic by construction: package N may only depend on packages 0..N-1.
fn lock_strategy(max_packages: usize) -> impl Strategy<Value = Vec<Entry>> {
    (1..=max_packages).prop_flat_map(|count| {
        (
            proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..count), count),
            proptest::collection::vec((0u8..20, 0u8..20, 0u8..20), count),
        )
            .prop_map(|(raw_deps, versions)| {
                raw_deps
                    .into_iter()
                    .zip(versions)
                    .enumerate()
                    .map(|(i, (picks, (major, minor, patch)))| {
                        let deps: HashSet<usize> = picks
                            .into_iter()
                            .filter(|_| i > 0)
                            .map(|p| p % i.max(1))
                            .collect();
                        (
                            format!("pkg{i}"),
                            format!("{major}.{minor}.{patch}"),
                            deps.into_iter().map(|d| format!("pkg{d}")).collect(),
                        )
                    })
                    .collect()
            })
    })
}

fn hash_for(i: usize) -> String {
    format!("blake3:{:064x}", i + 1)
}

fn builder_for(entries: &[Entry]) -> LockFileBuilder {
    let mut builder = LockFileBuilder::new();
    for (i, (name, version, _)) in entries.iter().enumerate() {
        builder = builder.package(name, version, &hash_for(i));
    }
    for (name, _, deps) in entries {
        for dep in deps {
            builder = builder.depends(name, dep);
        }
    }
    builder
}

/// The same entries, written last-to-first with dependencies reversed.
fn reversed_toml(entries: &[Entry]) -> String {
    let mut out = String::from("# hand-ordered\nversion = 1\n");
    for (i, (name, version, deps)) in entries.iter().enumerate().rev() {
        let mut deps = deps.clone();
        deps.sort();
        deps.reverse();
        out.push_str(&format!(
            "\n[[package]]\nname = {name:?}\nversion = {version:?}\nhash = {:?}\ndependencies = {deps:?}\n",
            hash_for(i)
        ));
    }
    out
}

proptest! {
    #[test]
    fn install_order_puts_dependencies_first(entries in lock_strategy(12)) {
        let lock = LockFile::parse("stagehand.lock", &builder_for(&entries).to_toml()).unwrap();

        let order: Vec<&str> = lock.install_order().map(|p| p.name.as_str()).collect();
        prop_assert_eq!(order.len(), entries.len());

        let position: HashMap<&str, usize> =
            order.iter().enumerate().map(|(i, name)| (*name, i)).collect();
        for (name, _, deps) in &entries {
            for dep in deps {
                prop_assert!(
                    position[dep.as_str()] < position[name.as_str()],
                    "{} installed before its dependency {}", name, dep
                );
            }
        }
    }

    #[test]
    fn digest_depends_only_on_content(entries in lock_strategy(8)) {
        let sorted = LockFile::parse("a.lock", &builder_for(&entries).to_toml()).unwrap();
        let shuffled = LockFile::parse("b.lock", &reversed_toml(&entries)).unwrap();
        prop_assert_eq!(sorted.digest(), shuffled.digest());

        let order_a: Vec<_> = sorted.install_order().map(|p| p.name.clone()).collect();
        let order_b: Vec<_> = shuffled.install_order().map(|p| p.name.clone()).collect();
        prop_assert_eq!(order_a, order_b);
    }

    #[test]
    fn bumping_any_version_changes_the_digest(entries in lock_strategy(8), pick in any::<usize>()) {
        let before = LockFile::parse("a.lock", &builder_for(&entries).to_toml()).unwrap();

        let mut bumped = entries.clone();
        let idx = pick % bumped.len();
        bumped[idx].1.push_str(".1");
        let after = LockFile::parse("a.lock", &builder_for(&bumped).to_toml()).unwrap();

        prop_assert_ne!(before.digest(), after.digest());
    }
}

proptest! {
    #[test]
    fn path_like_package_names_are_rejected(
        prefix in "[a-z]{0,4}",
        sep in prop::sample::select(vec!["/", "\\", "..", "../"]),
        suffix in "[a-z]{0,4}",
    ) {
        let name = format!("{prefix}{sep}{suffix}");
        let src = LockFileBuilder::new().package(&name, "1.0.0", &hash_for(0)).to_toml();

        let err = LockFile::parse("stagehand.lock", &src).unwrap_err();
        prop_assert_eq!(err.class(), "LockfileUnreadable");
    }
}

#[test]
fn parent_directory_names_never_reach_the_store() {
    for name in ["../escape", ".hidden", "nested/pkg"] {
        let src = LockFileBuilder::new().package(name, "1.0.0", &hash_for(0)).to_toml();
        let err = LockFile::parse("stagehand.lock", &src).unwrap_err();
        assert!(err.to_string().contains(name), "{name}: {err}");
    }
}
