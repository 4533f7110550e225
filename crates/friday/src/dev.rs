// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Dev Orchestrator.
//!
//! Start order:
//!
//! 1. Clean the previous output (buildable targets only, when enabled).
//! 2. Build loop: initial full build, then per-file rebuilds.
//! 3. Server: first application instance on the configured endpoint.
//! 4. Restart watchers over the application directory and the
//!    configuration directory.
//!
//! Restart requests from both watchers go through one command channel
//! consumed by the task that owns the [`ServerManager`], so restarts never
//! overlap. [`DevSession::wait`] tears everything down exactly once.

use std::future::Future;
use std::net::{IpAddr, UdpSocket};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::build_loop::{
    run_build_loop, BuildLoopHandle, BuildLoopOptions, LintGate, RebuildCallback,
};
use crate::builder::{clean_output, BuildTarget, TreeBuilder};
use crate::debounce::Debouncer;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::paths::display_path;
use crate::server::{AppFactory, RestartTrigger, ServerManager};
use crate::shutdown::ShutdownOnce;
use crate::watcher::FileWatcher;

/// Default quiet period before a change restarts the server.
pub const DEFAULT_RESTART_DEBOUNCE: Duration = Duration::from_millis(200);

/// Build half of a dev session.
pub struct DevBuild {
    /// Source and output roots.
    pub target: BuildTarget,
    /// Builder for the initial and incremental builds.
    pub builder: TreeBuilder,
    /// Remove the previous output first.
    pub clean: bool,
    /// Run the initial full build.
    pub initial_build: bool,
    /// Lint-before-build gate.
    pub lint_gate: Option<LintGate>,
    /// Rebuild debounce.
    pub debounce: Duration,
    /// Rebuild observer.
    pub on_rebuilt: Option<RebuildCallback>,
}

impl DevBuild {
    /// Cleans and builds everything, without a lint gate.
    pub fn new(target: BuildTarget, builder: TreeBuilder) -> Self {
        Self {
            target,
            builder,
            clean: true,
            initial_build: true,
            lint_gate: None,
            debounce: crate::build_loop::DEFAULT_REBUILD_DEBOUNCE,
            on_rebuilt: None,
        }
    }
}

/// Options for [`DevOrchestrator`].
pub struct DevOptions {
    /// Builds application instances.
    pub factory: Arc<dyn AppFactory>,
    /// Where to listen.
    pub endpoint: Endpoint,
    /// Directory of the running application; watched for restarts.
    pub app_dir: PathBuf,
    /// Configuration directory; watched when it exists.
    pub config_dir: Option<PathBuf>,
    /// Build settings; `None` serves without building.
    pub build: Option<DevBuild>,
    /// Restart the server when watched files change.
    pub restart_on_change: bool,
    /// Restart debounce.
    pub restart_debounce: Duration,
    /// Extra watch ignore globs.
    pub ignore: Vec<String>,
}

impl DevOptions {
    /// Serves `app_dir` without building, restarting on change.
    pub fn new(factory: Arc<dyn AppFactory>, endpoint: Endpoint, app_dir: impl Into<PathBuf>) -> Self {
        Self {
            factory,
            endpoint,
            app_dir: app_dir.into(),
            config_dir: None,
            build: None,
            restart_on_change: true,
            restart_debounce: DEFAULT_RESTART_DEBOUNCE,
            ignore: Vec::new(),
        }
    }
}

/// What the session ended up listening on and watching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevSummary {
    /// Endpoint actually bound.
    pub endpoint: Endpoint,
    /// Browser-friendly URL (`localhost` for wildcard hosts).
    pub local_url: String,
    /// URL reachable from other machines, when the host is not loopback.
    pub network_url: Option<String>,
    /// Port originally requested.
    pub requested_port: Option<u16>,
    /// Port actually bound.
    pub used_port: Option<u16>,
    /// Watched directories.
    pub watched: Vec<PathBuf>,
}

impl DevSummary {
    /// Whether a busy port was replaced.
    pub fn port_substituted(&self) -> bool {
        matches!((self.requested_port, self.used_port), (Some(r), Some(u)) if r != u && r != 0)
    }
}

fn network_url(endpoint: &Endpoint) -> Option<String> {
    let Endpoint::Tcp { host, port } = endpoint else {
        return None;
    };
    let ip = match host.parse::<IpAddr>() {
        Ok(ip) if ip.is_unspecified() => outbound_ip()?,
        Ok(ip) if !ip.is_loopback() => ip,
        _ => return None,
    };
    Some(Endpoint::tcp(ip.to_string(), *port).to_string())
}

/// Address of the interface that routes outbound traffic. Connecting a UDP
/// socket sends no packets.
fn outbound_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).ok()?;
    socket.connect(("8.8.8.8", 80)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified() && !ip.is_loopback()).then_some(ip)
}

fn local_url(endpoint: &Endpoint) -> String {
    match endpoint {
        Endpoint::Tcp { host, port } => {
            let host = match host.as_str() {
                "0.0.0.0" | "::" | "" => "localhost",
                other => other,
            };
            Endpoint::tcp(host, *port).to_string()
        }
        Endpoint::Unix { .. } => endpoint.to_string(),
    }
}

enum ServerCommand {
    Restart {
        trigger: RestartTrigger,
        done: oneshot::Sender<()>,
    },
    Shutdown(oneshot::Sender<()>),
}

/// Owns the server manager; restarts and shutdown are applied in arrival
/// order.
async fn serve_commands(
    mut manager: ServerManager,
    mut commands: mpsc::UnboundedReceiver<ServerCommand>,
) -> Result<()> {
    while let Some(command) = commands.recv().await {
        match command {
            ServerCommand::Restart { trigger, done } => {
                tracing::info!("Restarting server: {} changed", display_path(&trigger.path));
                let outcome = manager.restart(&trigger).await;
                let _ = done.send(());
                if let Err(e) = outcome {
                    tracing::error!("{}", e);
                    manager.shutdown().await;
                    return Err(e);
                }
                tracing::info!("Server restarted");
            }
            ServerCommand::Shutdown(ack) => {
                manager.shutdown().await;
                let _ = ack.send(());
                return Ok(());
            }
        }
    }
    manager.shutdown().await;
    Ok(())
}

struct RestartWatcher {
    watcher: FileWatcher,
    debouncer: Debouncer<RestartTrigger>,
}

impl RestartWatcher {
    fn start(
        root: &std::path::Path,
        ignore: &[String],
        delay: Duration,
        commands: mpsc::UnboundedSender<ServerCommand>,
        tag: fn(PathBuf) -> RestartTrigger,
    ) -> Result<Self> {
        let debouncer = Debouncer::new(delay, move |trigger: RestartTrigger| {
            let commands = commands.clone();
            async move {
                let (done, finished) = oneshot::channel();
                if commands.send(ServerCommand::Restart { trigger, done }).is_ok() {
                    let _ = finished.await;
                }
            }
        });
        let handle = debouncer.handle();
        let watcher = FileWatcher::watch(root, ignore, move |event| {
            handle.trigger(tag(event.path));
        })?;
        Ok(Self { watcher, debouncer })
    }

    async fn close(&self) {
        self.watcher.close();
        self.debouncer.close().await;
    }
}

/// Composes the build loop, the server and the restart watchers.
pub struct DevOrchestrator {
    options: DevOptions,
}

impl DevOrchestrator {
    /// Creates an orchestrator; nothing runs until [`start`](Self::start).
    pub fn new(options: DevOptions) -> Self {
        Self { options }
    }

    /// Starts every component in order. Any failure stops what already
    /// started and is returned.
    pub async fn start(self) -> Result<DevSession> {
        let DevOptions {
            factory,
            endpoint,
            app_dir,
            config_dir,
            build,
            restart_on_change,
            restart_debounce,
            ignore,
        } = self.options;

        let mut output_dir = None;
        let build_loop = match build {
            Some(build) if build.target.is_buildable() => {
                output_dir = Some(build.target.output_root().to_path_buf());
                if build.clean {
                    tracing::debug!("Cleaning {}", display_path(build.target.output_root()));
                    clean_output(&build.target).await?;
                }
                let options = BuildLoopOptions {
                    target: build.target,
                    builder: build.builder,
                    initial_build: build.initial_build,
                    lint_gate: build.lint_gate,
                    debounce: build.debounce,
                    ignore: ignore.clone(),
                    on_rebuilt: build.on_rebuilt,
                };
                Some(run_build_loop(options).await?)
            }
            Some(build) => {
                tracing::warn!(
                    "Source directory {} not found, skipping build",
                    display_path(build.target.source_root())
                );
                None
            }
            None => None,
        };

        let mut manager = ServerManager::new(factory, endpoint).with_app_dir(&app_dir);
        if let Some(dir) = &output_dir {
            manager = manager.with_output_dir(dir);
        }
        if let Some(dir) = &config_dir {
            manager = manager.with_config_dir(dir);
        }

        if let Err(e) = manager.start().await {
            if let Some(build_loop) = &build_loop {
                build_loop.close().await;
            }
            return Err(e);
        }

        let bound = manager.endpoint().clone();
        let requested_port = manager.requested_port();
        let (commands, receiver) = mpsc::unbounded_channel();
        let server_task = tokio::spawn(serve_commands(manager, receiver));

        let mut session = DevSession {
            summary: DevSummary {
                local_url: local_url(&bound),
                network_url: network_url(&bound),
                used_port: bound.port(),
                endpoint: bound,
                requested_port,
                watched: Vec::new(),
            },
            build_loop,
            watchers: Vec::new(),
            commands,
            server_task: Some(server_task),
            once: ShutdownOnce::new(),
        };

        if let Some(build_loop) = &session.build_loop {
            session.summary.watched.push(build_loop.watched_root().to_path_buf());
        }

        if restart_on_change {
            let watching =
                session.watch_for_restarts(&app_dir, config_dir.as_ref(), &ignore, restart_debounce);
            if let Err(e) = watching {
                session.shutdown().await?;
                return Err(e);
            }
        } else {
            tracing::debug!("Restart on change disabled");
        }

        Ok(session)
    }
}

/// A running dev session.
pub struct DevSession {
    summary: DevSummary,
    build_loop: Option<BuildLoopHandle>,
    watchers: Vec<RestartWatcher>,
    commands: mpsc::UnboundedSender<ServerCommand>,
    server_task: Option<JoinHandle<Result<()>>>,
    once: ShutdownOnce,
}

impl DevSession {
    fn watch_for_restarts(
        &mut self,
        app_dir: &std::path::Path,
        config_dir: Option<&PathBuf>,
        ignore: &[String],
        delay: Duration,
    ) -> Result<()> {
        self.watchers.push(RestartWatcher::start(
            app_dir,
            ignore,
            delay,
            self.commands.clone(),
            |path| RestartTrigger::application(path),
        )?);
        self.summary.watched.push(app_dir.to_path_buf());

        if let Some(config_dir) = config_dir.filter(|dir| dir.is_dir()) {
            self.watchers.push(RestartWatcher::start(
                config_dir,
                &[],
                delay,
                self.commands.clone(),
                |path| RestartTrigger::configuration(path),
            )?);
            self.summary.watched.push(config_dir.clone());
        }
        Ok(())
    }

    /// Listening address and watched paths.
    pub fn summary(&self) -> &DevSummary {
        &self.summary
    }

    /// The build loop, when building.
    pub fn build_loop(&self) -> Option<&BuildLoopHandle> {
        self.build_loop.as_ref()
    }

    /// Runs until `signal` resolves or the server task fails, then shuts
    /// down. A failed restart is returned after cleanup.
    pub async fn wait<F>(mut self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Some(mut task) = self.server_task.take() else {
            return self.shutdown().await;
        };

        tokio::select! {
            _ = signal => {
                tracing::info!("Shutting down");
                self.server_task = Some(task);
                self.shutdown().await
            }
            joined = &mut task => {
                let outcome = flatten(joined);
                self.shutdown().await?;
                outcome
            }
        }
    }

    /// Closes the watchers, the build loop and the server. Only the first
    /// call does anything. Close failures are logged.
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.once.begin() {
            return Ok(());
        }

        for watcher in &self.watchers {
            watcher.close().await;
        }
        if let Some(build_loop) = &self.build_loop {
            build_loop.close().await;
        }

        let Some(task) = self.server_task.take() else {
            return Ok(());
        };
        let (ack, acked) = oneshot::channel();
        if self.commands.send(ServerCommand::Shutdown(ack)).is_ok() {
            let _ = acked.await;
        }
        match flatten(task.await) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!("Server stopped with an error: {}", e);
                Err(e)
            }
        }
    }
}

fn flatten(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match joined {
        Ok(outcome) => outcome,
        Err(e) => Err(Error::Io(std::io::Error::other(e))),
    }
}
