// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Path mirroring and file classification.
//!
//! [`mirror`] maps a file in the source tree onto its place in the output
//! tree. [`Classifier`] decides, from the extension alone, whether a file is
//! transformed or copied verbatim. Both are pure: no I/O, no state.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// How a file is materialized in the output tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileClassification {
    /// Needs compilation before it can be used as output.
    Transformable,
    /// Copied byte-for-byte.
    Passthrough,
}

/// Classifies files by extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    transform_extensions: Vec<String>,
}

impl Classifier {
    /// Creates a classifier treating the given extensions (with or without a
    /// leading dot) as transformable.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            transform_extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Classifies a path. Depends only on the path string.
    pub fn classify(&self, path: &Path) -> FileClassification {
        let ext = path.extension().and_then(|e| e.to_str());
        match ext {
            Some(ext) if self.transform_extensions.iter().any(|t| t == ext) => {
                FileClassification::Transformable
            }
            _ => FileClassification::Passthrough,
        }
    }

    /// Shorthand for `classify(path) == Transformable`.
    pub fn is_transformable(&self, path: &Path) -> bool {
        self.classify(path) == FileClassification::Transformable
    }

    /// Extensions considered transformable.
    pub fn extensions(&self) -> &[String] {
        &self.transform_extensions
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(["ts"])
    }
}

/// Lexical relative path from `base` to `path`.
///
/// Both paths should be absolute (or both relative to the same directory).
/// When `path` is not under `base` the result starts with `..` segments.
pub fn relative_path(path: &Path, base: &Path) -> PathBuf {
    let path_components: Vec<Component<'_>> = path.components().collect();
    let base_components: Vec<Component<'_>> = base.components().collect();

    let common = path_components
        .iter()
        .zip(base_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for component in &base_components[common..] {
        if !matches!(component, Component::CurDir) {
            result.push("..");
        }
    }
    for component in &path_components[common..] {
        result.push(component.as_os_str());
    }
    result
}

/// Computes the output path of `source_file`.
///
/// The path of `source_file` relative to `base_dir` is joined onto
/// `output_dir`; the extension is replaced by `override_ext` when given.
/// Never fails: a file outside `base_dir` produces a path with `..`
/// segments, which [`mirror_within`] rejects.
pub fn mirror(
    source_file: &Path,
    base_dir: &Path,
    output_dir: &Path,
    override_ext: Option<&str>,
) -> PathBuf {
    let mut out = output_dir.join(relative_path(source_file, base_dir));
    if let Some(ext) = override_ext {
        out.set_extension(ext.trim_start_matches('.'));
    }
    out
}

/// Like [`mirror`], but fails with [`Error::OutsideSourceRoot`] when the
/// file does not live under `base_dir`.
pub fn mirror_within(
    source_file: &Path,
    base_dir: &Path,
    output_dir: &Path,
    override_ext: Option<&str>,
) -> Result<PathBuf> {
    let relative = relative_path(source_file, base_dir);
    let escapes = relative.as_os_str().is_empty()
        || relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(Error::OutsideSourceRoot {
            path: source_file.to_path_buf(),
            root: base_dir.to_path_buf(),
        });
    }
    Ok(mirror(source_file, base_dir, output_dir, override_ext))
}

/// Path relative to the current working directory, for display.
pub fn display_path(path: &Path) -> String {
    match std::env::current_dir() {
        Ok(cwd) => {
            let rel = relative_path(path, &cwd);
            if rel.as_os_str().is_empty() {
                ".".to_string()
            } else {
                rel.display().to_string()
            }
        }
        Err(_) => path.display().to_string(),
    }
}

/// Strips the `"/abs/path/file.ts: "` prefix tools put in front of
/// diagnostics, keeping the human-readable remainder.
pub fn normalize_error_message(message: &str) -> String {
    let stripped = if message.starts_with('/') {
        match message.find(':') {
            Some(i) => &message[i + 1..],
            None => message,
        }
    } else {
        message
    };
    stripped.trim_start().to_string()
}

/// Resolves `path` against the current directory and removes `.` and `..`
/// segments lexically.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}
