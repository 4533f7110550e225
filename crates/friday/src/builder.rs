// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Tree Builder.
//!
//! Materializes an output tree from a source tree: transformable files are
//! compiled through the configured [`Transformer`], everything else is copied
//! verbatim. The full-tree build ([`TreeBuilder::build_tree`]) and the
//! incremental build ([`TreeBuilder::build_files`]) share one code path so
//! they never disagree about classification or failure accounting.
//!
//! Copy failures abort the build. Compile failures are recorded per file
//! in [`BuildResult::failures`] and the remaining files are still built.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use glob::{MatchOptions, Pattern};

use crate::compiler::{compile, Transformer};
use crate::error::{Error, Result};
use crate::paths::{self, Classifier, FileClassification};

/// Source and output roots of a build.
///
/// Both roots are absolute and normalized. The output root may be deleted
/// and recreated wholesale; the source root is never written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    source_root: PathBuf,
    output_root: PathBuf,
}

impl BuildTarget {
    /// Creates a target, resolving both roots against the current directory.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the roots are equal or one
    /// contains the other.
    pub fn new(source_root: impl AsRef<Path>, output_root: impl AsRef<Path>) -> Result<Self> {
        let source_root = paths::absolute(source_root.as_ref())?;
        let output_root = paths::absolute(output_root.as_ref())?;

        if source_root == output_root {
            return Err(Error::Config(format!(
                "source and output directories must differ (both are {})",
                source_root.display()
            )));
        }
        if output_root.starts_with(&source_root) || source_root.starts_with(&output_root) {
            return Err(Error::Config(format!(
                "source directory {} and output directory {} must not contain each other",
                source_root.display(),
                output_root.display()
            )));
        }

        Ok(Self {
            source_root,
            output_root,
        })
    }

    /// Root of the source tree.
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Root of the output tree.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Whether a source tree exists to build from.
    pub fn is_buildable(&self) -> bool {
        self.source_root.is_dir()
    }
}

/// A file that failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    /// Source file.
    pub path: PathBuf,
    /// Normalized failure reason.
    pub message: String,
}

/// Aggregate outcome of a build.
///
/// `total == compiled + copied + failed` always holds; a file that failed
/// to compile is never also counted as copied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildResult {
    /// Files considered.
    pub total: usize,
    /// Transformable files compiled and written.
    pub compiled: usize,
    /// Passthrough files copied.
    pub copied: usize,
    /// Transformable files that failed.
    pub failed: usize,
    /// Failures in source order.
    pub failures: Vec<FileFailure>,
}

impl BuildResult {
    /// Paths of the files that failed, in order.
    pub fn failed_files(&self) -> impl Iterator<Item = &Path> {
        self.failures.iter().map(|f| f.path.as_path())
    }

    /// True when no file failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Progress callback: `(processed, total)`.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Builds output trees from source trees.
#[derive(Clone)]
pub struct TreeBuilder {
    transformer: Arc<dyn Transformer>,
    classifier: Classifier,
    output_extension: String,
    concurrency: usize,
    progress: Option<ProgressFn>,
}

impl TreeBuilder {
    /// Creates a builder with the default classifier (`.ts` is
    /// transformable) writing `.js` output.
    pub fn new(transformer: Arc<dyn Transformer>) -> Self {
        Self {
            transformer,
            classifier: Classifier::default(),
            output_extension: "js".to_string(),
            concurrency: 8,
            progress: None,
        }
    }

    /// Sets the classifier.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets the extension written for compiled files.
    pub fn with_output_extension(mut self, ext: impl AsRef<str>) -> Self {
        self.output_extension = ext.as_ref().trim_start_matches('.').to_string();
        self
    }

    /// Sets how many files are compiled concurrently (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Installs a progress callback.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Removes the progress callback.
    pub fn without_progress(mut self) -> Self {
        self.progress = None;
        self
    }

    /// The classifier in use.
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Output path for a source file under `target`, honouring the
    /// classification's extension rewrite.
    pub fn output_path(&self, source_file: &Path, target: &BuildTarget) -> Result<PathBuf> {
        let ext = match self.classifier.classify(source_file) {
            FileClassification::Transformable => Some(self.output_extension.as_str()),
            FileClassification::Passthrough => None,
        };
        paths::mirror_within(source_file, target.source_root(), target.output_root(), ext)
    }

    /// Builds every file under the source root.
    pub async fn build_tree(&self, target: &BuildTarget) -> Result<BuildResult> {
        let files = enumerate_files(target.source_root()).await?;
        tracing::debug!(
            files = files.len(),
            source = %target.source_root().display(),
            "Enumerated source tree"
        );
        self.build_paths(files, target).await
    }

    /// Builds an explicit list of files, used for incremental rebuilds.
    pub async fn build_files(&self, files: &[PathBuf], target: &BuildTarget) -> Result<BuildResult> {
        self.build_paths(files.to_vec(), target).await
    }

    /// Removes the output of a deleted source file. Returns whether a file
    /// was removed.
    pub async fn remove_output(&self, source_file: &Path, target: &BuildTarget) -> Result<bool> {
        let out = self.output_path(source_file, target)?;
        match tokio::fs::remove_file(&out).await {
            Ok(()) => {
                tracing::debug!(output = %out.display(), "Removed output file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn build_paths(&self, files: Vec<PathBuf>, target: &BuildTarget) -> Result<BuildResult> {
        let (transformable, passthrough): (Vec<PathBuf>, Vec<PathBuf>) = files
            .into_iter()
            .partition(|f| self.classifier.is_transformable(f));

        let total = transformable.len() + passthrough.len();
        let processed = AtomicUsize::new(0);
        let tick = &|| {
            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(progress) = &self.progress {
                progress(done, total);
            }
        };

        tracing::debug!(
            compile = transformable.len(),
            copy = passthrough.len(),
            "Partitioned files"
        );

        // Copy failures are fatal for the whole build
        stream::iter(passthrough.iter().cloned())
            .map(|file| async move {
                self.copy_one(&file, target).await?;
                tick();
                Ok::<(), Error>(())
            })
            .buffer_unordered(self.concurrency)
            .try_collect::<Vec<()>>()
            .await?;

        let outcomes: Vec<Option<FileFailure>> = stream::iter(transformable.iter().cloned())
            .map(|file| async move {
                let outcome = self.compile_one(&file, target).await;
                tick();
                outcome
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let failures: Vec<FileFailure> = outcomes.into_iter().flatten().collect();
        let failed = failures.len();

        Ok(BuildResult {
            total,
            compiled: transformable.len() - failed,
            copied: passthrough.len(),
            failed,
            failures,
        })
    }

    async fn copy_one(&self, file: &Path, target: &BuildTarget) -> Result<()> {
        let to = self.output_path(file, target)?;
        tracing::debug!(
            "Copy file: {} => {}",
            paths::display_path(file),
            paths::display_path(&to)
        );

        let copy = async {
            if let Some(parent) = to.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(file, &to).await
        };
        copy.await.map_err(|source| Error::Copy {
            from: file.to_path_buf(),
            to: to.clone(),
            source,
        })?;
        Ok(())
    }

    async fn compile_one(&self, file: &Path, target: &BuildTarget) -> Option<FileFailure> {
        let to = match self.output_path(file, target) {
            Ok(to) => to,
            Err(e) => {
                return Some(FileFailure {
                    path: file.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };
        tracing::debug!(
            "Compile file: {} => {}",
            paths::display_path(file),
            paths::display_path(&to)
        );

        let code = match compile(self.transformer.as_ref(), file).await {
            Ok(code) => code,
            Err(failure) => {
                return Some(FileFailure {
                    path: file.to_path_buf(),
                    message: failure.message,
                })
            }
        };

        let write = async {
            if let Some(parent) = to.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&to, code).await
        };
        match write.await {
            Ok(()) => None,
            Err(e) => Some(FileFailure {
                path: file.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }
}

/// Lists every regular file under `root`, skipping dotfiles, sorted.
pub async fn enumerate_files(root: &Path) -> Result<Vec<PathBuf>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || enumerate_files_blocking(&root))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

fn enumerate_files_blocking(root: &Path) -> Result<Vec<PathBuf>> {
    let root_str = root.to_str().ok_or_else(|| {
        Error::Config(format!("source directory {} is not valid UTF-8", root.display()))
    })?;
    let pattern = format!("{}/**/*", Pattern::escape(root_str));
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: true,
    };

    let entries = glob::glob_with(&pattern, options)
        .map_err(|e| Error::Config(format!("invalid source pattern {}: {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() && !is_hidden(&path, root) => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!("Skipping unreadable path: {}", e),
        }
    }
    files.sort();
    Ok(files)
}

fn is_hidden(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .map(|rel| {
            rel.components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        })
        .unwrap_or(false)
}

/// Deletes the output tree of `target` if it exists.
pub async fn clean_output(target: &BuildTarget) -> Result<()> {
    let out = target.output_root();
    tracing::debug!("Deleting the outputs in {}", out.display());
    match tokio::fs::remove_dir_all(out).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
