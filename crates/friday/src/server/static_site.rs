// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Built-in application: serves a directory through the module cache.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use super::{AppFactory, AppHooks, Application, ModuleCache, NoHooks};
use crate::error::{Error, Result};

/// Route reporting the instance number and cache size.
pub const STATUS_ROUTE: &str = "/__friday/status";

struct SiteState {
    root: PathBuf,
    index: String,
    cache: Arc<ModuleCache>,
    instance: u64,
}

/// Serves files from a directory. Every instance gets a new number, so a
/// restart is observable from [`STATUS_ROUTE`].
pub struct StaticSiteFactory {
    root: PathBuf,
    index: String,
    hooks: Arc<dyn AppHooks>,
    instances: AtomicU64,
}

impl StaticSiteFactory {
    /// Serves `root` with `index.html` as the directory index.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: "index.html".to_string(),
            hooks: Arc::new(NoHooks),
            instances: AtomicU64::new(0),
        }
    }

    /// Sets the directory index file name.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    /// Attaches lifecycle hooks to every instance.
    pub fn with_hooks(mut self, hooks: Arc<dyn AppHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Directory being served.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of instances constructed so far.
    pub fn instances(&self) -> u64 {
        self.instances.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AppFactory for StaticSiteFactory {
    async fn create_app(&self, cache: &Arc<ModuleCache>) -> Result<Application> {
        if !self.root.is_dir() {
            return Err(Error::App(format!(
                "application directory {} does not exist",
                self.root.display()
            )));
        }

        let instance = self.instances.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(instance, root = %self.root.display(), "Creating application");

        let state = Arc::new(SiteState {
            root: self.root.clone(),
            index: self.index.clone(),
            cache: cache.clone(),
            instance,
        });

        let router = Router::new()
            .route(STATUS_ROUTE, get(status))
            .fallback(serve_file)
            .with_state(state);

        Ok(Application::new(router).with_hooks(self.hooks.clone()))
    }
}

async fn status(State(state): State<Arc<SiteState>>) -> impl IntoResponse {
    Json(json!({
        "instance": state.instance,
        "cached": state.cache.len(),
    }))
}

async fn serve_file(State(state): State<Arc<SiteState>>, uri: Uri) -> Response {
    let Some(mut path) = resolve(&state.root, uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if uri.path().ends_with('/') || path.is_dir() {
        path.push(&state.index);
    }

    match state.cache.load(&path).await {
        Ok(bytes) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type(&path))
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from(bytes.as_ref().clone()))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to read file: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Maps a request path onto the served directory, refusing traversal.
fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(resolved)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("js") | Some("mjs") | Some("cjs") => "application/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("txt") => "text/plain; charset=utf-8",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}
