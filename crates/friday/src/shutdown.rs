// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Graceful shutdown.

use std::sync::atomic::{AtomicBool, Ordering};

/// Resolves on the first SIGINT (Ctrl+C) or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::debug!("Received SIGINT"),
        _ = terminate => tracing::debug!("Received SIGTERM"),
    }
}

/// Makes the shutdown sequence run exactly once, whichever path triggers
/// it first.
#[derive(Debug, Default)]
pub struct ShutdownOnce {
    started: AtomicBool,
}

impl ShutdownOnce {
    /// A guard that has not fired yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true for the first caller only.
    pub fn begin(&self) -> bool {
        !self.started.swap(true, Ordering::SeqCst)
    }

    /// Whether shutdown has begun.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}
