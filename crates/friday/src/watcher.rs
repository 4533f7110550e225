// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File system watching.
//!
//! [`FileWatcher`] watches a directory recursively and hands every raw
//! event to a callback, one event per affected path. It does no batching:
//! consumers feed the callback into a [`Debouncer`](crate::debounce::Debouncer).
//!
//! # Filtering
//!
//! - Dotfiles and anything under a dot-directory are always ignored.
//! - Caller globs are matched against the path relative to the root and
//!   against each of its parent directories, on top of the dotfile rule.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::Result;

/// Kind of change observed on a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    /// A file appeared.
    Created,
    /// A file's content or metadata changed.
    Changed,
    /// A file disappeared.
    Deleted,
    /// A directory appeared.
    DirCreated,
    /// A directory disappeared.
    DirDeleted,
}

impl WatchEventKind {
    /// True for the directory variants.
    pub fn is_dir(self) -> bool {
        matches!(self, WatchEventKind::DirCreated | WatchEventKind::DirDeleted)
    }
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WatchEventKind::Created => "created",
            WatchEventKind::Changed => "changed",
            WatchEventKind::Deleted => "deleted",
            WatchEventKind::DirCreated => "dirCreated",
            WatchEventKind::DirDeleted => "dirDeleted",
        };
        f.write_str(name)
    }
}

/// One change to one absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// What happened.
    pub kind: WatchEventKind,
    /// Absolute path of the affected entry.
    pub path: PathBuf,
}

/// Decides which paths under a root are ignored.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    root: PathBuf,
    extra: GlobSet,
}

impl IgnoreFilter {
    /// Builds a filter from extra glob patterns. The dotfile rule always
    /// applies.
    pub fn new(root: impl Into<PathBuf>, patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            root: root.into(),
            extra: builder.build()?,
        })
    }

    /// Whether events for `path` should be dropped. Paths outside the root
    /// are always ignored.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return true;
        };

        let hidden = relative.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|name| name.starts_with('.') && name != "." && name != "..")
                .unwrap_or(false)
        });
        if hidden {
            return true;
        }

        if self.extra.is_empty() {
            return false;
        }
        relative
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .any(|p| self.extra.is_match(p))
    }
}

/// Recursive watcher over one root directory.
pub struct FileWatcher {
    root: PathBuf,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FileWatcher {
    /// Starts watching `root`.
    ///
    /// `on_event` runs on the notification thread for every non-ignored
    /// event and must not block.
    ///
    /// # Errors
    ///
    /// Fails when an ignore pattern is invalid or the root cannot be
    /// watched (for example, it does not exist).
    pub fn watch<F>(root: impl Into<PathBuf>, ignore: &[String], on_event: F) -> Result<Self>
    where
        F: Fn(WatchEvent) + Send + 'static,
    {
        let root = crate::paths::absolute(&root.into())?;
        let filter = IgnoreFilter::new(root.clone(), ignore)?;
        // Some platforms report events under the resolved path
        let resolved = std::fs::canonicalize(&root).unwrap_or_else(|_| root.clone());
        let report_root = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("File watcher error: {}", e);
                    return;
                }
            };

            for (kind, path) in translate(&event.kind, &event.paths) {
                let path = rebase(path, &resolved, &report_root);
                if filter.is_ignored(&path) {
                    continue;
                }
                tracing::trace!(%kind, path = %path.display(), "Watch event");
                on_event(WatchEvent { kind, path });
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        tracing::debug!(root = %root.display(), "Watching");

        Ok(Self {
            root,
            watcher: Mutex::new(Some(watcher)),
        })
    }

    /// The watched root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the watcher is still delivering events.
    pub fn is_active(&self) -> bool {
        self.watcher
            .lock()
            .map(|w| w.is_some())
            .unwrap_or(false)
    }

    /// Stops watching. Idempotent.
    pub fn close(&self) {
        let watcher = self
            .watcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut watcher) = watcher {
            if let Err(e) = watcher.unwatch(&self.root) {
                tracing::warn!(root = %self.root.display(), "Failed to unwatch: {}", e);
            }
            tracing::debug!(root = %self.root.display(), "Stopped watching");
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

fn rebase(path: PathBuf, resolved: &Path, root: &Path) -> PathBuf {
    if resolved == root || path.starts_with(root) {
        return path;
    }
    match path.strip_prefix(resolved) {
        Ok(rest) => root.join(rest),
        Err(_) => path,
    }
}

/// Maps a raw notify event onto per-path watch events.
fn translate(kind: &EventKind, paths: &[PathBuf]) -> Vec<(WatchEventKind, PathBuf)> {
    let created = |p: &PathBuf| {
        if p.is_dir() {
            (WatchEventKind::DirCreated, p.clone())
        } else {
            (WatchEventKind::Created, p.clone())
        }
    };

    match kind {
        EventKind::Create(CreateKind::Folder) => paths
            .iter()
            .map(|p| (WatchEventKind::DirCreated, p.clone()))
            .collect(),
        EventKind::Create(_) => paths.iter().map(created).collect(),
        EventKind::Remove(RemoveKind::Folder) => paths
            .iter()
            .map(|p| (WatchEventKind::DirDeleted, p.clone()))
            .collect(),
        EventKind::Remove(_) => paths
            .iter()
            .map(|p| (WatchEventKind::Deleted, p.clone()))
            .collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => paths
                .iter()
                .map(|p| (WatchEventKind::Deleted, p.clone()))
                .collect(),
            RenameMode::To => paths.iter().map(created).collect(),
            RenameMode::Both if paths.len() == 2 => {
                vec![(WatchEventKind::Deleted, paths[0].clone()), created(&paths[1])]
            }
            _ => paths
                .iter()
                .map(|p| {
                    if p.exists() {
                        created(p)
                    } else {
                        (WatchEventKind::Deleted, p.clone())
                    }
                })
                .collect(),
        },
        EventKind::Modify(_) => paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| (WatchEventKind::Changed, p.clone()))
            .collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::DataChange;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_dotfiles_always_ignored() {
        let filter = IgnoreFilter::new("/project", &[]).unwrap();
        assert!(filter.is_ignored(Path::new("/project/.env")));
        assert!(filter.is_ignored(Path::new("/project/.git/config")));
        assert!(filter.is_ignored(Path::new("/project/src/.hidden/file.ts")));
        assert!(!filter.is_ignored(Path::new("/project/src/index.ts")));
    }

    #[test]
    fn test_extra_patterns_are_additive() {
        let filter =
            IgnoreFilter::new("/project", &["node_modules".into(), "*.log".into()]).unwrap();
        assert!(filter.is_ignored(Path::new("/project/node_modules/pkg/index.js")));
        assert!(filter.is_ignored(Path::new("/project/debug.log")));
        // Default rule still applies
        assert!(filter.is_ignored(Path::new("/project/.env")));
        assert!(!filter.is_ignored(Path::new("/project/src/index.ts")));
    }

    #[test]
    fn test_paths_outside_root_ignored() {
        let filter = IgnoreFilter::new("/project", &[]).unwrap();
        assert!(filter.is_ignored(Path::new("/other/file.ts")));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = IgnoreFilter::new("/project", &["a[".into()]).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_translate_event_kinds() {
        let p = vec![PathBuf::from("/nonexistent/friday/a.ts")];

        let created = translate(&EventKind::Create(CreateKind::File), &p);
        assert_eq!(created[0].0, WatchEventKind::Created);

        let dir = translate(&EventKind::Create(CreateKind::Folder), &p);
        assert_eq!(dir[0].0, WatchEventKind::DirCreated);

        let changed = translate(
            &EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &p,
        );
        assert_eq!(changed[0].0, WatchEventKind::Changed);

        let removed = translate(&EventKind::Remove(RemoveKind::File), &p);
        assert_eq!(removed[0].0, WatchEventKind::Deleted);

        let renamed_away = translate(&EventKind::Modify(ModifyKind::Name(RenameMode::From)), &p);
        assert_eq!(renamed_away[0].0, WatchEventKind::Deleted);

        let both = vec![
            PathBuf::from("/nonexistent/friday/a.ts"),
            PathBuf::from("/nonexistent/friday/b.ts"),
        ];
        let renamed = translate(&EventKind::Modify(ModifyKind::Name(RenameMode::Both)), &both);
        assert_eq!(renamed[0], (WatchEventKind::Deleted, both[0].clone()));
        assert_eq!(renamed[1], (WatchEventKind::Created, both[1].clone()));

        assert!(translate(&EventKind::Access(notify::event::AccessKind::Any), &p).is_empty());
    }

    #[test]
    fn test_rebase_onto_requested_root() {
        let root = Path::new("/tmp/project");
        let resolved = Path::new("/private/tmp/project");
        assert_eq!(
            rebase(PathBuf::from("/private/tmp/project/src/a.ts"), resolved, root),
            PathBuf::from("/tmp/project/src/a.ts")
        );
        assert_eq!(
            rebase(PathBuf::from("/tmp/project/a.ts"), resolved, root),
            PathBuf::from("/tmp/project/a.ts")
        );
    }

    #[test]
    fn test_watcher_delivers_only_non_ignored_events() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("ignored")).unwrap();

        let (tx, rx) = mpsc::channel();
        let watcher = FileWatcher::watch(&root, &["ignored".into()], move |event| {
            let _ = tx.send(event);
        })
        .unwrap();
        assert!(watcher.is_active());
        std::thread::sleep(Duration::from_millis(100));

        std::fs::write(root.join(".secret"), "x").unwrap();
        std::fs::write(root.join("ignored/file.ts"), "x").unwrap();
        std::fs::write(root.join("watched.ts"), "x").unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(2)) {
            seen.push(event.path);
            if seen.iter().any(|p| p.ends_with("watched.ts")) {
                break;
            }
        }
        while let Ok(event) = rx.recv_timeout(Duration::from_millis(300)) {
            seen.push(event.path);
        }

        assert!(seen.iter().any(|p| p.ends_with("watched.ts")));
        assert!(!seen.iter().any(|p| p.ends_with(".secret")));
        assert!(!seen.iter().any(|p| p.ends_with("ignored/file.ts")));

        watcher.close();
        watcher.close();
        assert!(!watcher.is_active());
    }

    #[test]
    fn test_watching_missing_root_fails() {
        let dir = tempdir().unwrap();
        let result = FileWatcher::watch(dir.path().join("missing"), &[], |_| {});
        assert!(result.is_err());
    }
}
