// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Module cache shared by application instances.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Loaded file contents keyed by absolute path.
///
/// Applications load their code and assets through the cache, so a new
/// instance sees fresh content only for entries evicted before it was
/// constructed. Only the restart sequence evicts.
#[derive(Debug, Default)]
pub struct ModuleCache {
    entries: Mutex<HashMap<PathBuf, Arc<Vec<u8>>>>,
}

impl ModuleCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached contents of `path`, reading the file on a miss.
    pub async fn load(&self, path: &Path) -> std::io::Result<Arc<Vec<u8>>> {
        if let Some(hit) = self.get(path) {
            return Ok(hit);
        }

        let bytes = Arc::new(tokio::fs::read(path).await?);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        // A concurrent load may have won the race; keep the first entry
        let entry = entries
            .entry(path.to_path_buf())
            .or_insert_with(|| bytes.clone());
        Ok(entry.clone())
    }

    /// Cached contents of `path`, if any.
    pub fn get(&self, path: &Path) -> Option<Arc<Vec<u8>>> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
    }

    /// Stores contents for `path`, replacing any previous entry.
    pub fn insert(&self, path: impl Into<PathBuf>, bytes: Vec<u8>) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.into(), Arc::new(bytes));
    }

    /// Removes every entry located under one of `roots`. Returns the number
    /// of entries removed.
    pub fn evict_under(&self, roots: &[&Path]) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|path, _| !roots.iter().any(|root| path.starts_with(root)));
        before - entries.len()
    }

    /// Whether `path` is cached.
    pub fn contains(&self, path: &Path) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(path)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
