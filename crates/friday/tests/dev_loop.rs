// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Server lifecycle and dev orchestrator tests against real listeners.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{routing::get, Router};
use friday::builder::{BuildTarget, TreeBuilder};
use friday::compiler::Transformer;
use friday::dev::{DevBuild, DevOptions, DevOrchestrator};
use friday::endpoint::Endpoint;
use friday::server::{
    AppFactory, AppHooks, Application, Hook, ModuleCache, RestartTrigger, ServerManager,
    StaticSiteFactory, STATUS_ROUTE,
};
use friday::{Error, Result};
use serde_json::Value;

#[derive(Default)]
struct Recorder(Mutex<Vec<Hook>>);

impl Recorder {
    fn hooks(&self) -> Vec<Hook> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl AppHooks for Recorder {
    async fn emit(&self, hook: Hook, _app: &Application) -> Result<()> {
        self.0.lock().unwrap().push(hook);
        Ok(())
    }
}

/// Records, at construction time, whether each tracked path was cached.
struct CacheRecorder {
    paths: Vec<PathBuf>,
    seen: Mutex<Vec<Vec<bool>>>,
}

#[async_trait]
impl AppFactory for CacheRecorder {
    async fn create_app(&self, cache: &Arc<ModuleCache>) -> Result<Application> {
        let cached = self.paths.iter().map(|p| cache.contains(p)).collect();
        self.seen.lock().unwrap().push(cached);
        Ok(Application::new(Router::new().route("/", get(|| async { "ok" }))))
    }
}

struct FailingHooks;

#[async_trait]
impl AppHooks for FailingHooks {
    async fn emit(&self, hook: Hook, _app: &Application) -> Result<()> {
        if hook == Hook::BeforeRestart {
            return Err(Error::App("refusing to restart".into()));
        }
        Ok(())
    }
}

struct Passthrough;

#[async_trait]
impl Transformer for Passthrough {
    async fn transform(&self, path: &Path) -> Result<Option<String>> {
        Ok(Some(tokio::fs::read_to_string(path).await?))
    }
}

async fn status(base: &str) -> Value {
    reqwest::get(format!("{base}{STATUS_ROUTE}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn body(url: String) -> String {
    reqwest::get(url).await.unwrap().text().await.unwrap()
}

async fn wait_for<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::test]
async fn test_restart_evicts_before_constructing() {
    let dir = tempfile::tempdir().unwrap();
    let app = dir.path().join("app");
    let dist = dir.path().join("dist");
    let config = dir.path().join("config");

    let recorder = Arc::new(CacheRecorder {
        paths: vec![app.join("main.js"), dist.join("lib.js"), config.join("default.json")],
        seen: Mutex::new(Vec::new()),
    });
    let mut manager = ServerManager::new(recorder.clone(), Endpoint::tcp("127.0.0.1", 0))
        .with_app_dir(&app)
        .with_output_dir(&dist)
        .with_config_dir(&config);

    for path in &recorder.paths {
        manager.cache().insert(path.clone(), b"stale".to_vec());
    }

    // First start never evicts
    manager.start().await.unwrap();
    manager
        .restart(&RestartTrigger::application(app.join("main.js")))
        .await
        .unwrap();
    for path in &recorder.paths {
        manager.cache().insert(path.clone(), b"stale".to_vec());
    }
    manager
        .restart(&RestartTrigger::configuration(config.join("default.json")))
        .await
        .unwrap();
    manager.shutdown().await;

    assert_eq!(
        *recorder.seen.lock().unwrap(),
        vec![
            vec![true, true, true],
            vec![false, false, true],
            vec![false, false, false],
        ]
    );
}

#[tokio::test]
async fn test_failed_restart_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let factory = StaticSiteFactory::new(dir.path()).with_hooks(Arc::new(FailingHooks));
    let mut manager = ServerManager::new(Arc::new(factory), Endpoint::tcp("127.0.0.1", 0));
    manager.start().await.unwrap();

    let err = manager
        .restart(&RestartTrigger::application(dir.path().join("index.html")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Restart(_)));
    assert_eq!(err.exit_code(), 2);
    manager.shutdown().await;
}

#[tokio::test]
async fn test_dev_without_build_restarts_once_per_edit() {
    let dir = tempfile::tempdir().unwrap();
    let app = dir.path().join("app");
    std::fs::create_dir_all(&app).unwrap();
    std::fs::write(app.join("index.html"), "v1").unwrap();

    let recorder = Arc::new(Recorder::default());
    let factory = StaticSiteFactory::new(&app).with_hooks(recorder.clone());
    let mut options = DevOptions::new(Arc::new(factory), Endpoint::tcp("127.0.0.1", 0), &app);
    options.restart_debounce = Duration::from_millis(300);

    let session = DevOrchestrator::new(options).start().await.unwrap();
    let summary = session.summary().clone();
    let base = format!("http://127.0.0.1:{}", summary.used_port.unwrap());
    assert!(!summary.port_substituted());
    assert_eq!(summary.watched, vec![app.clone()]);

    assert_eq!(status(&base).await["instance"], 1);
    assert_eq!(body(format!("{base}/")).await, "v1");

    tokio::time::sleep(Duration::from_millis(300)).await;
    for content in ["v2-draft", "v2-almost", "v2"] {
        std::fs::write(app.join("index.html"), content).unwrap();
    }

    let url = &base;
    assert!(wait_for(move || async move { status(url).await["instance"] == 2 }).await);
    // Let any straggling events settle; still a single restart
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(status(&base).await["instance"], 2);
    assert_eq!(body(format!("{base}/")).await, "v2");

    assert_eq!(
        recorder.hooks(),
        vec![
            Hook::OnReady,
            Hook::BeforeClose,
            Hook::OnClose,
            Hook::BeforeRestart,
            Hook::OnReady,
            Hook::OnRestart,
        ]
    );

    session.wait(async {}).await.unwrap();
    let hooks = recorder.hooks();
    assert_eq!(&hooks[hooks.len() - 2..], &[Hook::BeforeClose, Hook::OnClose]);
    assert!(reqwest::get(format!("{base}/")).await.is_err());
}

#[tokio::test]
async fn test_dev_rebuilds_then_serves_fresh_output() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let dist = dir.path().join("dist");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("main.ts"), "one").unwrap();
    std::fs::create_dir_all(&dist).unwrap();
    std::fs::write(dist.join("stale.js"), "left over").unwrap();

    let target = BuildTarget::new(&src, &dist).unwrap();
    let mut build = DevBuild::new(target, TreeBuilder::new(Arc::new(Passthrough)));
    build.debounce = Duration::from_millis(100);

    let factory = StaticSiteFactory::new(&dist);
    let mut options = DevOptions::new(Arc::new(factory), Endpoint::tcp("127.0.0.1", 0), &dist);
    options.build = Some(build);
    options.restart_debounce = Duration::from_millis(200);

    let session = DevOrchestrator::new(options).start().await.unwrap();
    assert!(!dist.join("stale.js").exists());
    let initial = session.build_loop().unwrap().initial_result().unwrap().clone();
    assert_eq!((initial.total, initial.compiled), (1, 1));

    let base = format!("http://127.0.0.1:{}", session.summary().used_port.unwrap());
    assert_eq!(body(format!("{base}/main.js")).await, "one");

    tokio::time::sleep(Duration::from_millis(300)).await;
    std::fs::write(src.join("main.ts"), "two").unwrap();

    let url = &base;
    assert!(wait_for(move || async move { body(format!("{url}/main.js")).await == "two" }).await);
    session.wait(async {}).await.unwrap();
}

#[tokio::test]
async fn test_dev_fails_when_app_dir_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    let factory = StaticSiteFactory::new(&missing);
    let options = DevOptions::new(Arc::new(factory), Endpoint::tcp("127.0.0.1", 0), &missing);

    let err = DevOrchestrator::new(options).start().await.err().unwrap();
    assert!(matches!(err, Error::App(_)));
}

fn dev_build(src: &Path, dist: &Path) -> DevBuild {
    let target = BuildTarget::new(src, dist).unwrap();
    let mut build = DevBuild::new(target, TreeBuilder::new(Arc::new(Passthrough)));
    build.debounce = Duration::from_millis(100);
    build
}

#[tokio::test]
async fn test_dev_serves_empty_source_tree() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let dist = dir.path().join("dist");
    std::fs::create_dir_all(&src).unwrap();

    let factory = StaticSiteFactory::new(&dist);
    let mut options = DevOptions::new(Arc::new(factory), Endpoint::tcp("127.0.0.1", 0), &dist);
    options.build = Some(dev_build(&src, &dist));

    let session = DevOrchestrator::new(options).start().await.unwrap();
    assert!(dist.is_dir());
    let initial = session.build_loop().unwrap().initial_result().unwrap().clone();
    assert_eq!(initial.total, 0);

    let base = format!("http://127.0.0.1:{}", session.summary().used_port.unwrap());
    assert_eq!(status(&base).await["instance"], 1);
    session.wait(async {}).await.unwrap();
}

#[tokio::test]
async fn test_dev_skip_initial_build_starts_on_clean_output() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let dist = dir.path().join("dist");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("main.ts"), "one").unwrap();
    std::fs::create_dir_all(&dist).unwrap();
    std::fs::write(dist.join("main.js"), "previous").unwrap();

    let mut build = dev_build(&src, &dist);
    build.initial_build = false;
    let factory = StaticSiteFactory::new(&dist);
    let mut options = DevOptions::new(Arc::new(factory), Endpoint::tcp("127.0.0.1", 0), &dist);
    options.build = Some(build);
    options.restart_debounce = Duration::from_millis(200);

    let session = DevOrchestrator::new(options).start().await.unwrap();
    assert!(session.build_loop().unwrap().initial_result().is_none());
    assert!(dist.is_dir());
    assert!(!dist.join("main.js").exists());

    let base = format!("http://127.0.0.1:{}", session.summary().used_port.unwrap());
    assert_eq!(status(&base).await["instance"], 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    std::fs::write(src.join("main.ts"), "two").unwrap();
    let url = &base;
    assert!(wait_for(move || async move { body(format!("{url}/main.js")).await == "two" }).await);
    session.wait(async {}).await.unwrap();
}

#[tokio::test]
async fn test_app_and_config_restarts_never_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let app = dir.path().join("app");
    let config = dir.path().join("config");
    std::fs::create_dir_all(&app).unwrap();
    std::fs::create_dir_all(&config).unwrap();
    std::fs::write(app.join("index.html"), "v1").unwrap();
    std::fs::write(config.join("default.json"), "{}").unwrap();

    let recorder = Arc::new(Recorder::default());
    let factory = StaticSiteFactory::new(&app).with_hooks(recorder.clone());
    let mut options = DevOptions::new(Arc::new(factory), Endpoint::tcp("127.0.0.1", 0), &app);
    options.config_dir = Some(config.clone());
    options.restart_debounce = Duration::from_millis(150);

    let session = DevOrchestrator::new(options).start().await.unwrap();
    assert_eq!(session.summary().watched, vec![app.clone(), config.clone()]);
    let base = format!("http://127.0.0.1:{}", session.summary().used_port.unwrap());

    tokio::time::sleep(Duration::from_millis(300)).await;
    std::fs::write(app.join("index.html"), "v2").unwrap();
    std::fs::write(config.join("default.json"), "{\"a\":1}").unwrap();

    let url = &base;
    assert!(wait_for(move || async move { status(url).await["instance"] == 3 }).await);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(status(&base).await["instance"], 3);

    let restart = [
        Hook::BeforeClose,
        Hook::OnClose,
        Hook::BeforeRestart,
        Hook::OnReady,
        Hook::OnRestart,
    ];
    let mut expected = vec![Hook::OnReady];
    expected.extend(restart);
    expected.extend(restart);
    assert_eq!(recorder.hooks(), expected);

    session.wait(async {}).await.unwrap();
}
