// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Start command: serve the built application until a termination signal.
//!
//! No building and no watching. On shutdown the application sees
//! `beforeClose`, the listener closes, then `onClose`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use friday::endpoint::Endpoint;
use friday::server::{ServerManager, StaticSiteFactory};
use friday::shutdown::shutdown_signal;

use super::endpoint_for;
use crate::cli::StartArgs;
use crate::config::{self, Config};
use crate::ui;

/// Runs the production server.
pub async fn run(args: StartArgs) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let config = Config::load(&cwd)?;
    let endpoint = endpoint_for(&args.endpoint, &config, config::port_env().as_deref())?;

    let mut manager = serve(&cwd, &config, endpoint).await?;
    shutdown_signal().await;
    stop(&mut manager).await;
    Ok(())
}

/// Starts serving the application directory on `endpoint`.
pub async fn serve(cwd: &Path, config: &Config, endpoint: Endpoint) -> friday::Result<ServerManager> {
    let app_dir = app_dir(cwd, config);
    tracing::debug!("Serving {}", app_dir.display());

    let factory = StaticSiteFactory::new(&app_dir).with_index(&config.app.index);
    let mut manager = ServerManager::new(Arc::new(factory), endpoint).with_app_dir(&app_dir);
    let handle = manager.start().await?;
    println!("Server is running at {}.", handle.endpoint());
    Ok(manager)
}

/// Closes the server, running the close hooks.
pub async fn stop(manager: &mut ServerManager) {
    tracing::info!("Gracefully shutting down. Please wait...");
    manager.shutdown().await;
    ui::success("Closed successfully");
}

/// `[app] dir`, else the build output directory.
fn app_dir(cwd: &Path, config: &Config) -> PathBuf {
    match &config.app.dir {
        Some(dir) => cwd.join(dir),
        None => cwd.join(&config.build.dist_dir),
    }
}
