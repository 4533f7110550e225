// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Server Lifecycle Manager.
//!
//! [`ServerManager`] owns the one running server. Every start and restart
//! asks an [`AppFactory`] for a brand-new [`Application`]; nothing from a
//! previous instance is reused except what the [`ModuleCache`] still holds,
//! and the restart sequence evicts the relevant cache entries before the
//! factory runs.
//!
//! # Restart sequence
//!
//! 1. Evict cache entries under the application and output directories
//!    (plus the configuration directory for configuration changes).
//! 2. `beforeClose` hook, close the listener, `onClose` hook.
//! 3. `beforeRestart` hook.
//! 4. Construct a fresh application and bind the same endpoint
//!    (`onReady` fires once listening). If that port was taken in the
//!    meantime a free one is used and becomes the endpoint from then on.
//! 5. `onRestart` hook.
//!
//! Any failure is returned as [`Error::Restart`]: the process should exit
//! rather than keep serving from a half-restarted state.
//!
//! The manager has no internal locking. Callers serialize `restart` and
//! `shutdown`; [`crate::dev`] does so with a single command channel.

mod cache;
mod static_site;

pub use cache::ModuleCache;
pub use static_site::{StaticSiteFactory, STATUS_ROUTE};

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

/// How long a closing server may take to drain connections.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle notification points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Before the listener of the outgoing instance closes.
    BeforeClose,
    /// After the listener closed.
    OnClose,
    /// Before a fresh instance is constructed.
    BeforeRestart,
    /// After the fresh instance is listening.
    OnRestart,
    /// Whenever an instance starts listening.
    OnReady,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::BeforeClose => "beforeClose",
            Hook::OnClose => "onClose",
            Hook::BeforeRestart => "beforeRestart",
            Hook::OnRestart => "onRestart",
            Hook::OnReady => "onReady",
        };
        f.write_str(name)
    }
}

/// Observer of lifecycle hooks.
#[async_trait]
pub trait AppHooks: Send + Sync {
    /// Called at each lifecycle point with the affected instance.
    async fn emit(&self, hook: Hook, app: &Application) -> Result<()>;
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

#[async_trait]
impl AppHooks for NoHooks {
    async fn emit(&self, _hook: Hook, _app: &Application) -> Result<()> {
        Ok(())
    }
}

/// One constructed application instance.
#[derive(Clone)]
pub struct Application {
    router: Router,
    hooks: Arc<dyn AppHooks>,
}

impl Application {
    /// Wraps a router with no hooks.
    pub fn new(router: Router) -> Self {
        Self {
            router,
            hooks: Arc::new(NoHooks),
        }
    }

    /// Installs lifecycle hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn AppHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Request handler for the listener.
    pub fn callback(&self) -> Router {
        self.router.clone()
    }

    /// Emits a hook, tagging failures with the hook name.
    pub async fn emit_hook(&self, hook: Hook) -> Result<()> {
        tracing::debug!(%hook, "Emitting hook");
        self.hooks.emit(hook, self).await.map_err(|e| match e {
            Error::Hook { .. } => e,
            other => Error::Hook {
                hook,
                message: other.to_string(),
            },
        })
    }
}

/// Builds application instances.
#[async_trait]
pub trait AppFactory: Send + Sync {
    /// Constructs a fresh instance. Code and assets should be loaded
    /// through `cache`.
    async fn create_app(&self, cache: &Arc<ModuleCache>) -> Result<Application>;
}

/// Lifecycle state of a served instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Being constructed or bound.
    Starting,
    /// Accepting connections.
    Listening,
    /// Draining connections.
    Closing,
    /// Stopped.
    Closed,
}

/// What changed to cause a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Application code or assets.
    Application,
    /// Configuration files.
    Configuration,
}

/// A request to restart, carrying the path that changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartTrigger {
    /// Changed path.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: ChangeKind,
}

impl RestartTrigger {
    /// An application-code change.
    pub fn application(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Application,
        }
    }

    /// A configuration change.
    pub fn configuration(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Configuration,
        }
    }
}

/// A bound, serving listener.
pub struct ServerHandle {
    endpoint: Endpoint,
    local_addr: Option<SocketAddr>,
    state: ProcessState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<io::Result<()>>>,
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandle")
            .field("endpoint", &self.endpoint)
            .field("local_addr", &self.local_addr)
            .field("state", &self.state)
            .finish()
    }
}

impl ServerHandle {
    /// The endpoint actually bound (TCP port resolved).
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Bound socket address for TCP endpoints.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Current state.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Whether the serving task has stopped on its own.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(JoinHandle::is_finished).unwrap_or(true)
    }

    /// Stops accepting connections and waits for the serving task.
    /// Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == ProcessState::Closed {
            return Ok(());
        }
        self.state = ProcessState::Closing;

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        let mut outcome = Ok(());
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => outcome = Err(Error::Io(e)),
                Ok(Err(e)) => outcome = Err(Error::Io(io::Error::other(e))),
                Err(_) => {
                    tracing::warn!("Server did not drain in time; aborting connections");
                    task.abort();
                }
            }
        }

        if let Endpoint::Unix { path } = &self.endpoint {
            remove_socket_file(path);
        }

        self.state = ProcessState::Closed;
        tracing::debug!(endpoint = %self.endpoint, "Server closed");
        outcome
    }
}

enum Bound {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(tokio::net::UnixListener),
}

/// Binds `endpoint`. An occupied TCP port is replaced by a free one on the
/// same host; the returned endpoint carries the port actually bound.
async fn bind(endpoint: &Endpoint) -> Result<(Bound, Endpoint, Option<SocketAddr>)> {
    match endpoint {
        Endpoint::Tcp { host, port } => {
            let listener = match TcpListener::bind((host.as_str(), *port)).await {
                Ok(listener) => listener,
                Err(e) if e.kind() == io::ErrorKind::AddrInUse && *port != 0 => {
                    tracing::debug!(port, "Port in use, picking a free one");
                    TcpListener::bind((host.as_str(), 0))
                        .await
                        .map_err(|source| Error::Bind {
                            endpoint: endpoint.to_string(),
                            source,
                        })?
                }
                Err(source) => {
                    return Err(Error::Bind {
                        endpoint: endpoint.to_string(),
                        source,
                    })
                }
            };
            let addr = listener.local_addr()?;
            let bound = endpoint.with_port(addr.port());
            Ok((Bound::Tcp(listener), bound, Some(addr)))
        }
        #[cfg(unix)]
        Endpoint::Unix { path } => {
            remove_stale_socket(path);
            let listener =
                tokio::net::UnixListener::bind(path).map_err(|source| Error::Bind {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
            Ok((Bound::Unix(listener), endpoint.clone(), None))
        }
        #[cfg(not(unix))]
        Endpoint::Unix { .. } => Err(Error::Config(
            "UNIX socket endpoints are not supported on this platform".into(),
        )),
    }
}

fn serve(bound: Bound, router: Router, shutdown_rx: oneshot::Receiver<()>) -> JoinHandle<io::Result<()>> {
    let router = router.layer(TraceLayer::new_for_http());
    let signal = async move {
        let _ = shutdown_rx.await;
    };
    match bound {
        Bound::Tcp(listener) => tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(signal)
                .await
        }),
        #[cfg(unix)]
        Bound::Unix(listener) => tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(signal)
                .await
        }),
    }
}

#[cfg(unix)]
fn remove_stale_socket(path: &Path) {
    use std::os::unix::fs::FileTypeExt;
    if let Ok(meta) = std::fs::symlink_metadata(path) {
        if meta.file_type().is_socket() {
            tracing::debug!(path = %path.display(), "Removing stale socket");
            remove_socket_file(path);
        }
    }
}

fn remove_socket_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "Failed to remove socket: {}", e),
    }
}

/// Owns the running server and performs start, restart and shutdown.
pub struct ServerManager {
    factory: Arc<dyn AppFactory>,
    cache: Arc<ModuleCache>,
    endpoint: Endpoint,
    requested_port: Option<u16>,
    app_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    config_dir: Option<PathBuf>,
    current: Option<(ServerHandle, Application)>,
    state: ProcessState,
}

impl ServerManager {
    /// Creates a manager that will serve `factory`'s applications on
    /// `endpoint`.
    pub fn new(factory: Arc<dyn AppFactory>, endpoint: Endpoint) -> Self {
        Self {
            factory,
            cache: Arc::new(ModuleCache::new()),
            requested_port: endpoint.port(),
            endpoint,
            app_dir: None,
            output_dir: None,
            config_dir: None,
            current: None,
            state: ProcessState::Closed,
        }
    }

    /// Shares an existing module cache.
    pub fn with_cache(mut self, cache: Arc<ModuleCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Directory of the running application; evicted on every restart.
    pub fn with_app_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.app_dir = Some(dir.into());
        self
    }

    /// Build output directory; evicted on every restart.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Configuration directory; evicted on configuration restarts.
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// The module cache.
    pub fn cache(&self) -> &Arc<ModuleCache> {
        &self.cache
    }

    /// Port originally requested, kept for display after a substitution.
    pub fn requested_port(&self) -> Option<u16> {
        self.requested_port
    }

    /// The endpoint restarts bind to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The current server, if one is running.
    pub fn handle(&self) -> Option<&ServerHandle> {
        self.current.as_ref().map(|(handle, _)| handle)
    }

    /// Lifecycle state of the manager.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Whether a running server stopped without being asked to.
    pub fn has_crashed(&self) -> bool {
        self.state == ProcessState::Listening
            && self.handle().map(ServerHandle::is_finished).unwrap_or(false)
    }

    /// Constructs the first application and starts listening. The module
    /// cache is not touched.
    pub async fn start(&mut self) -> Result<&ServerHandle> {
        if self.current.is_some() {
            return Err(Error::Config("server is already running".into()));
        }
        self.state = ProcessState::Starting;

        let app = self.factory.create_app(&self.cache).await?;
        let handle = self.listen(&app).await?;

        if let Some(requested) = self.requested_port {
            let used = handle.endpoint().port().unwrap_or(requested);
            if used != requested {
                tracing::warn!(requested, used, "Port {} is in use, using {}", requested, used);
            }
        }
        // Restarts rebind the port actually in use
        self.endpoint = handle.endpoint().clone();

        Ok(self.install(handle, app))
    }

    /// Replaces the running application with a fresh instance.
    pub async fn restart(&mut self, trigger: &RestartTrigger) -> Result<&ServerHandle> {
        tracing::debug!(path = %trigger.path.display(), kind = ?trigger.kind, "Restarting server");
        match self.restart_sequence(trigger).await {
            Ok((handle, app)) => Ok(self.install(handle, app)),
            Err(e) => {
                self.state = ProcessState::Closed;
                Err(Error::Restart(Box::new(e)))
            }
        }
    }

    async fn restart_sequence(
        &mut self,
        trigger: &RestartTrigger,
    ) -> Result<(ServerHandle, Application)> {
        let evicted = self.evict(trigger.kind);
        tracing::debug!(evicted, "Evicted module cache entries");

        if let Some((mut handle, app)) = self.current.take() {
            app.emit_hook(Hook::BeforeClose).await?;
            self.state = ProcessState::Closing;
            handle.close().await?;
            app.emit_hook(Hook::OnClose).await?;
            app.emit_hook(Hook::BeforeRestart).await?;
        }

        self.state = ProcessState::Starting;
        let app = self.factory.create_app(&self.cache).await?;
        let handle = self.listen(&app).await?;
        if handle.endpoint() != &self.endpoint {
            tracing::warn!(
                "{} is no longer available, now listening on {}",
                self.endpoint,
                handle.endpoint()
            );
            self.endpoint = handle.endpoint().clone();
        }
        app.emit_hook(Hook::OnRestart).await?;
        Ok((handle, app))
    }

    /// Closes the running server, emitting `beforeClose` and `onClose`.
    /// Failures are logged, never returned. Idempotent.
    pub async fn shutdown(&mut self) {
        let Some((mut handle, app)) = self.current.take() else {
            self.state = ProcessState::Closed;
            return;
        };

        if let Err(e) = app.emit_hook(Hook::BeforeClose).await {
            tracing::warn!("{}", e);
        }
        self.state = ProcessState::Closing;
        if let Err(e) = handle.close().await {
            tracing::warn!("Failed to close the server: {}", e);
        }
        if let Err(e) = app.emit_hook(Hook::OnClose).await {
            tracing::warn!("{}", e);
        }
        self.state = ProcessState::Closed;
    }

    fn evict(&self, kind: ChangeKind) -> usize {
        let mut roots: Vec<&Path> = Vec::new();
        roots.extend(self.app_dir.as_deref());
        roots.extend(self.output_dir.as_deref());
        if kind == ChangeKind::Configuration {
            roots.extend(self.config_dir.as_deref());
        }
        self.cache.evict_under(&roots)
    }

    async fn listen(&mut self, app: &Application) -> Result<ServerHandle> {
        let (bound, endpoint, local_addr) = bind(&self.endpoint).await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = serve(bound, app.callback(), shutdown_rx);

        let mut handle = ServerHandle {
            endpoint,
            local_addr,
            state: ProcessState::Listening,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        };
        tracing::debug!(endpoint = %handle.endpoint, "Server listening");

        if let Err(e) = app.emit_hook(Hook::OnReady).await {
            let _ = handle.close().await;
            return Err(e);
        }
        Ok(handle)
    }

    fn install(&mut self, handle: ServerHandle, app: Application) -> &ServerHandle {
        self.state = ProcessState::Listening;
        let (handle, _) = self.current.insert((handle, app));
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Hook>>);

    #[async_trait]
    impl AppHooks for Recorder {
        async fn emit(&self, hook: Hook, _app: &Application) -> Result<()> {
            self.0.lock().unwrap().push(hook);
            Ok(())
        }
    }

    struct Hello(Arc<Recorder>);

    #[async_trait]
    impl AppFactory for Hello {
        async fn create_app(&self, _cache: &Arc<ModuleCache>) -> Result<Application> {
            let router = Router::new().route("/", get(|| async { "hello" }));
            Ok(Application::new(router).with_hooks(self.0.clone()))
        }
    }

    #[test]
    fn test_hook_names() {
        assert_eq!(Hook::BeforeClose.to_string(), "beforeClose");
        assert_eq!(Hook::OnRestart.to_string(), "onRestart");
    }

    #[tokio::test]
    async fn test_busy_port_is_substituted() {
        let busy = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = busy.local_addr().unwrap().port();

        let recorder = Arc::new(Recorder::default());
        let mut manager = ServerManager::new(
            Arc::new(Hello(recorder.clone())),
            Endpoint::tcp("127.0.0.1", port),
        );
        let handle = manager.start().await.unwrap();
        let used = handle.endpoint().port().unwrap();

        assert_ne!(used, port);
        assert_eq!(manager.requested_port(), Some(port));
        assert_eq!(manager.endpoint().port(), Some(used));
        assert_eq!(*recorder.0.lock().unwrap(), vec![Hook::OnReady]);

        manager.shutdown().await;
        manager.shutdown().await;
        assert_eq!(manager.state(), ProcessState::Closed);
    }

    #[tokio::test]
    async fn test_restart_hook_order() {
        let recorder = Arc::new(Recorder::default());
        let mut manager = ServerManager::new(
            Arc::new(Hello(recorder.clone())),
            Endpoint::tcp("127.0.0.1", 0),
        );
        manager.start().await.unwrap();
        let port = manager.handle().unwrap().endpoint().port();

        manager
            .restart(&RestartTrigger::application("/tmp/app/index.html"))
            .await
            .unwrap();
        assert_eq!(manager.handle().unwrap().endpoint().port(), port);

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                Hook::OnReady,
                Hook::BeforeClose,
                Hook::OnClose,
                Hook::BeforeRestart,
                Hook::OnReady,
                Hook::OnRestart,
            ]
        );
        manager.shutdown().await;
    }

    /// Takes the listening port right before the new instance binds.
    struct PortThief {
        port: u16,
        held: Mutex<Option<std::net::TcpListener>>,
    }

    #[async_trait]
    impl AppHooks for PortThief {
        async fn emit(&self, hook: Hook, _app: &Application) -> Result<()> {
            if hook == Hook::BeforeRestart {
                let listener = std::net::TcpListener::bind(("127.0.0.1", self.port))?;
                *self.held.lock().unwrap() = Some(listener);
            }
            Ok(())
        }
    }

    struct Stolen(Arc<PortThief>);

    #[async_trait]
    impl AppFactory for Stolen {
        async fn create_app(&self, _cache: &Arc<ModuleCache>) -> Result<Application> {
            let router = Router::new().route("/", get(|| async { "hello" }));
            Ok(Application::new(router).with_hooks(self.0.clone()))
        }
    }

    #[tokio::test]
    async fn test_restart_tracks_substituted_port() {
        let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = reserved.local_addr().unwrap().port();
        drop(reserved);

        let thief = Arc::new(PortThief {
            port,
            held: Mutex::new(None),
        });
        let mut manager =
            ServerManager::new(Arc::new(Stolen(thief.clone())), Endpoint::tcp("127.0.0.1", port));
        manager.start().await.unwrap();
        assert_eq!(manager.endpoint().port(), Some(port));

        let handle = manager
            .restart(&RestartTrigger::application("/tmp/app/index.html"))
            .await
            .unwrap();
        let used = handle.endpoint().port().unwrap();

        assert_ne!(used, port);
        assert_eq!(manager.endpoint().port(), Some(used));
        assert_eq!(manager.requested_port(), Some(port));
        assert!(thief.held.lock().unwrap().is_some());
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let mut manager = ServerManager::new(
            Arc::new(Hello(Arc::new(Recorder::default()))),
            Endpoint::tcp("127.0.0.1", 0),
        );
        manager.start().await.unwrap();
        assert!(manager.start().await.is_err());
        manager.shutdown().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_socket_is_removed_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("friday.sock");

        let mut manager = ServerManager::new(
            Arc::new(Hello(Arc::new(Recorder::default()))),
            Endpoint::unix(&socket),
        );
        manager.start().await.unwrap();
        assert!(socket.exists());

        manager
            .restart(&RestartTrigger::configuration(dir.path().join("config/a.json")))
            .await
            .unwrap();
        assert!(socket.exists());

        manager.shutdown().await;
        assert!(!socket.exists());
    }
}
