// tests/build_assets.rs

mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::fakes::FakeCompiler;
use crate::common::{init_tracing, provisioned_env, store_with_pkg_a, with_timeout, write_file};

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use stagehand::assets::{AssetBuilder, AssetBundle, AssetManifest};
use stagehand::config::ConfigFile;
use stagehand::digest::tree_digest;
use stagehand::errors::BuildError;
use stagehand::fs::{staging_path, walk_files};

fn project(root: &Path) -> ConfigFile {
    store_with_pkg_a(root);
    write_file(root, "assets/index.html", "<h1>ledger</h1>\n");
    write_file(root, "assets/app.js", "console.log('hi');\n");
    write_file(root, "assets/img/logo.svg", "<svg/>\n");
    write_file(root, "app/main.py", "print('backend')\n");
    ConfigFileBuilder::new(root).build()
}

#[tokio::test]
async fn identical_inputs_give_identical_bundles() {
    init_tracing();
    let one = tempfile::tempdir().unwrap();
    let two = tempfile::tempdir().unwrap();

    let mut digests = Vec::new();
    for dir in [one.path(), two.path()] {
        let cfg = project(dir);
        let env = provisioned_env(dir).await;
        let builder = AssetBuilder::from_settings(&cfg.assets, &cfg.project).unwrap();
        let bundle = with_timeout(builder.build(&env, &cfg.project.source)).await.unwrap();
        assert_eq!(bundle.files, 3);
        digests.push(bundle.digest);
    }
    assert_eq!(digests[0], digests[1]);
}

#[tokio::test]
async fn rebuilding_replaces_the_bundle_wholesale() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let cfg = project(tmp.path());
    let env = provisioned_env(tmp.path()).await;
    let builder = AssetBuilder::from_settings(&cfg.assets, &cfg.project).unwrap();

    let first = builder.build(&env, &cfg.project.source).await.unwrap();
    let stray = write_file(&first.root, "stale.js", "old");

    let second = builder.build(&env, &cfg.project.source).await.unwrap();
    assert!(!stray.exists());
    assert_eq!(first.digest, second.digest);

    let manifest = AssetManifest::read(builder.manifest_path()).unwrap().unwrap();
    assert_eq!(manifest.digest, second.digest);
    assert_eq!(manifest.environment, env.record().lock_digest);
    assert_eq!(manifest.compiler, "copy");
}

#[tokio::test]
async fn failed_build_leaves_previous_bundle_untouched() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let cfg = project(tmp.path());
    let env = provisioned_env(tmp.path()).await;

    let good = AssetBuilder::from_settings(&cfg.assets, &cfg.project)
        .unwrap()
        .build(&env, &cfg.project.source)
        .await
        .unwrap();
    let manifest_before = fs::read_to_string(&cfg.assets.manifest).unwrap();

    let compiler = FakeCompiler::writing(&[("half-written.js", "partial")]).failing("syntax error");
    let broken = AssetBuilder::new(&cfg.assets.out_dir, &cfg.assets.manifest, Box::new(compiler.clone()));
    let err = broken.build(&env, &cfg.project.source).await.unwrap_err();

    assert!(matches!(err, BuildError::SourceInvalid(ref m) if m == "syntax error"), "{err:?}");
    assert_eq!(compiler.calls(), 1);
    assert!(!staging_path(&cfg.assets.out_dir).exists());
    assert!(!cfg.assets.out_dir.join("half-written.js").exists());
    assert_eq!(tree_digest(&cfg.assets.out_dir).unwrap().digest, good.digest);
    assert_eq!(fs::read_to_string(&cfg.assets.manifest).unwrap(), manifest_before);
}

#[tokio::test]
async fn copy_compiler_never_bundles_state_directory() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    project(tmp.path());
    let cfg = ConfigFileBuilder::new(tmp.path())
        .include("**")
        .exclude("store/**")
        .build();
    let env = provisioned_env(tmp.path()).await;

    let bundle = AssetBuilder::from_settings(&cfg.assets, &cfg.project)
        .unwrap()
        .build(&env, &cfg.project.source)
        .await
        .unwrap();

    let files = walk_files(&bundle.root).unwrap();
    assert!(files.iter().all(|f| !f.starts_with(".stagehand")), "{files:?}");
    assert!(files.iter().all(|f| !f.starts_with("store")), "{files:?}");
    assert!(files.iter().any(|f| f == Path::new("app/main.py")));
}

#[tokio::test]
async fn include_matching_nothing_is_invalid_source() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    project(tmp.path());
    let cfg = ConfigFileBuilder::new(tmp.path()).include("frontend/**").build();
    let env = provisioned_env(tmp.path()).await;

    let err = AssetBuilder::from_settings(&cfg.assets, &cfg.project)
        .unwrap()
        .build(&env, &cfg.project.source)
        .await
        .unwrap_err();
    assert_eq!(err.class(), "SourceInvalid");
    assert!(!cfg.assets.out_dir.exists());
}

#[tokio::test]
async fn command_compiler_uses_tools_from_the_environment() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    project(tmp.path());
    let cfg = ConfigFileBuilder::new(tmp.path())
        .assets_command("pkgA > {out}/version.txt && cp -R assets/. \"$STAGEHAND_OUT\"")
        .toolchain("pkgA")
        .build();
    let env = provisioned_env(tmp.path()).await;

    let bundle = with_timeout(
        AssetBuilder::from_settings(&cfg.assets, &cfg.project)
            .unwrap()
            .build(&env, &cfg.project.source),
    )
    .await
    .unwrap();

    let version = fs::read_to_string(bundle.root.join("version.txt")).unwrap();
    assert_eq!(version, "pkgA 1.2.3\n");
    assert!(bundle.root.join("index.html").is_file());
}

#[tokio::test]
async fn command_failures_map_to_build_errors() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    project(tmp.path());
    let env = provisioned_env(tmp.path()).await;

    let cases = [
        ("echo 'bad template' >&2; exit 1", "SourceInvalid"),
        ("definitely-not-a-real-bundler --minify", "ToolchainMissing"),
    ];
    for (cmd, class) in cases {
        let cfg = ConfigFileBuilder::new(tmp.path()).assets_command(cmd).build();
        let err = with_timeout(
            AssetBuilder::from_settings(&cfg.assets, &cfg.project)
                .unwrap()
                .build(&env, &cfg.project.source),
        )
        .await
        .unwrap_err();
        assert_eq!(err.class(), class, "{cmd}: {err}");
        if class == "SourceInvalid" {
            assert!(err.to_string().contains("bad template"), "{err}");
        }
    }
}

#[tokio::test]
async fn slow_build_times_out() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    project(tmp.path());
    let cfg = ConfigFileBuilder::new(tmp.path())
        .assets_command("sleep 30")
        .assets_timeout("300ms")
        .build();
    let env = provisioned_env(tmp.path()).await;

    let started = Instant::now();
    let err = with_timeout(
        AssetBuilder::from_settings(&cfg.assets, &cfg.project)
            .unwrap()
            .build(&env, &cfg.project.source),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, BuildError::BuildTimeout(d) if d == Duration::from_millis(300)), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(!cfg.assets.out_dir.exists());
}

#[tokio::test]
async fn missing_toolchain_fails_before_compiling() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let cfg = project(tmp.path());
    let env = provisioned_env(tmp.path()).await;

    let compiler = FakeCompiler::writing(&[("index.html", "x")]);
    let builder = AssetBuilder::new(&cfg.assets.out_dir, &cfg.assets.manifest, Box::new(compiler.clone()))
        .with_toolchain(vec!["node-that-is-not-installed".to_string()]);
    let err = builder.build(&env, &cfg.project.source).await.unwrap_err();

    assert_eq!(err.class(), "ToolchainMissing");
    assert_eq!(compiler.calls(), 0);
}

#[tokio::test]
async fn prebuilt_bundle_is_verified_against_its_manifest() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let cfg = project(tmp.path());
    let env = provisioned_env(tmp.path()).await;
    let builder = AssetBuilder::from_settings(&cfg.assets, &cfg.project).unwrap();

    let err = builder.existing().unwrap_err();
    assert!(matches!(err, BuildError::BundleMissing(_)), "{err:?}");

    let built = builder.build(&env, &cfg.project.source).await.unwrap();
    let opened = AssetBundle::open(&cfg.assets.out_dir, &cfg.assets.manifest).unwrap();
    assert_eq!(opened, built);

    write_file(&cfg.assets.out_dir, "index.html", "<h1>tampered</h1>\n");
    let err = builder.existing().unwrap_err();
    assert_eq!(err.class(), "BundleMismatch");
}
