// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Tree Builder integration tests over real scratch trees.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use friday::builder::{clean_output, BuildTarget, TreeBuilder};
use friday::compiler::Transformer;
use friday::paths::{mirror, relative_path, Classifier};
use friday::{Error, Result};
use tempfile::TempDir;

/// Uppercases sources; fails on "syntax error", emits nothing for empty files.
struct Shout;

#[async_trait]
impl Transformer for Shout {
    async fn transform(&self, path: &Path) -> Result<Option<String>> {
        let source = tokio::fs::read_to_string(path).await?;
        if source.contains("syntax error") {
            return Err(Error::tool(
                "shout",
                format!("{}:1:1: Unexpected token", path.display()),
            ));
        }
        if source.is_empty() {
            return Ok(None);
        }
        Ok(Some(source.to_uppercase()))
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn project() -> (TempDir, BuildTarget) {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    write(&src, "index.ts", "export const a = 1");
    write(&src, "lib/util.ts", "export const b = 2");
    write(&src, "lib/broken.ts", "syntax error");
    write(&src, "lib/empty.ts", "");
    write(&src, "data/config.json", "{\"k\": 1}");
    write(&src, "public/logo.svg", "<svg/>");
    write(&src, ".env", "SECRET=1");
    write(&src, ".cache/tmp.ts", "ignored");

    let target = BuildTarget::new(&src, dir.path().join("dist")).unwrap();
    (dir, target)
}

#[tokio::test]
async fn test_every_file_lands_in_exactly_one_bucket() {
    let (_dir, target) = project();
    let result = TreeBuilder::new(Arc::new(Shout)).build_tree(&target).await.unwrap();

    assert_eq!(result.total, 6);
    assert_eq!(result.compiled, 2);
    assert_eq!(result.copied, 2);
    assert_eq!(result.failed, 2);
    assert_eq!(result.total, result.compiled + result.copied + result.failed);
    assert!(!result.is_success());
}

#[tokio::test]
async fn test_failures_are_recorded_without_output() {
    let (_dir, target) = project();
    let result = TreeBuilder::new(Arc::new(Shout)).build_tree(&target).await.unwrap();
    let out = target.output_root();

    let failed: Vec<PathBuf> = result.failed_files().map(Path::to_path_buf).collect();
    assert!(failed.contains(&target.source_root().join("lib/broken.ts")));
    assert!(failed.contains(&target.source_root().join("lib/empty.ts")));
    assert!(!out.join("lib/broken.js").exists());
    assert!(!out.join("lib/empty.js").exists());

    let broken = result
        .failures
        .iter()
        .find(|f| f.path.ends_with("broken.ts"))
        .unwrap();
    assert!(broken.message.contains("Unexpected token"));
    let empty = result
        .failures
        .iter()
        .find(|f| f.path.ends_with("empty.ts"))
        .unwrap();
    assert_eq!(empty.message, "no code was generated");

    // Siblings were still processed
    assert_eq!(
        std::fs::read_to_string(out.join("lib/util.js")).unwrap(),
        "EXPORT CONST B = 2"
    );
}

#[tokio::test]
async fn test_passthrough_files_are_copied_verbatim() {
    let (_dir, target) = project();
    TreeBuilder::new(Arc::new(Shout)).build_tree(&target).await.unwrap();
    let out = target.output_root();

    assert_eq!(
        std::fs::read_to_string(out.join("data/config.json")).unwrap(),
        "{\"k\": 1}"
    );
    assert_eq!(std::fs::read_to_string(out.join("public/logo.svg")).unwrap(), "<svg/>");
    assert!(!out.join(".env").exists());
    assert!(!out.join(".cache").exists());
}

#[tokio::test]
async fn test_incremental_and_full_builds_agree() {
    let (_dir, target) = project();
    let builder = TreeBuilder::new(Arc::new(Shout));
    let full = builder.build_tree(&target).await.unwrap();

    clean_output(&target).await.unwrap();
    let files: Vec<PathBuf> = ["index.ts", "lib/broken.ts", "data/config.json"]
        .iter()
        .map(|f| target.source_root().join(f))
        .collect();
    let partial = builder.build_files(&files, &target).await.unwrap();

    assert_eq!((partial.compiled, partial.copied, partial.failed), (1, 1, 1));
    let full_index = full.failures.iter().any(|f| f.path.ends_with("index.ts"));
    let partial_index = partial.failures.iter().any(|f| f.path.ends_with("index.ts"));
    assert_eq!(full_index, partial_index);
    assert!(target.output_root().join("index.js").exists());
}

#[tokio::test]
async fn test_custom_classification_and_extension() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    write(&src, "a.ts", "a");
    write(&src, "b.tsx", "b");
    let target = BuildTarget::new(&src, dir.path().join("out")).unwrap();

    let builder = TreeBuilder::new(Arc::new(Shout))
        .with_classifier(Classifier::new(["ts", "tsx"]))
        .with_output_extension("mjs");
    let result = builder.build_tree(&target).await.unwrap();

    assert_eq!(result.compiled, 2);
    assert!(target.output_root().join("a.mjs").exists());
    assert!(target.output_root().join("b.mjs").exists());
}

#[tokio::test]
async fn test_progress_reports_every_file() {
    let (_dir, target) = project();
    let calls = Arc::new(AtomicUsize::new(0));
    let last_total = Arc::new(AtomicUsize::new(0));
    let (c, t) = (calls.clone(), last_total.clone());

    TreeBuilder::new(Arc::new(Shout))
        .with_concurrency(2)
        .with_progress(Arc::new(move |_done, total| {
            c.fetch_add(1, Ordering::SeqCst);
            t.store(total, Ordering::SeqCst);
        }))
        .build_tree(&target)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(last_total.load(Ordering::SeqCst), 6);
}

#[test]
fn test_mirror_preserves_directory_structure() {
    let base = Path::new("/p/src");
    let out = Path::new("/p/dist");
    let file = Path::new("/p/src/a/b/c.ts");

    let mirrored = mirror(file, base, out, Some("js"));
    assert_eq!(mirrored, PathBuf::from("/p/dist/a/b/c.js"));
    assert_eq!(mirror(file, base, out, Some("js")), mirrored);
    assert_eq!(
        mirrored.parent().unwrap(),
        out.join(relative_path(file, base).parent().unwrap())
    );
}

#[test]
fn test_nested_roots_are_rejected() {
    let err = BuildTarget::new("/p/src", "/p/src/dist").unwrap_err();
    assert!(err.is_config());
    assert!(BuildTarget::new("/p/src", "/p/src").is_err());
}
