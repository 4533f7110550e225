// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Trailing-edge debouncing.
//!
//! A [`Debouncer`] owns a single pending slot. Every trigger replaces the
//! slot's value and restarts the timer, so a burst of raw watcher events
//! collapses into one action carrying the last value. Actions never overlap:
//! a timer that expires while an action is still running parks its value
//! until that action completes.
//!
//! ```text
//!  Idle --trigger--> Debouncing --timer--> (run action) --> Idle
//!                      ^    |
//!              trigger |    | timer, action still running
//!                      |    v
//!                      Pending --action done--> (run action)
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

enum Slot<T> {
    Idle,
    Debouncing { value: T, deadline: Instant },
    Pending(T),
}

impl<T> Slot<T> {
    fn deadline(&self) -> Option<Instant> {
        match self {
            Slot::Debouncing { deadline, .. } => Some(*deadline),
            _ => None,
        }
    }
}

/// Cloneable handle that feeds a [`Debouncer`].
#[derive(Debug)]
pub struct DebounceTrigger<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for DebounceTrigger<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> DebounceTrigger<T> {
    /// Records a trigger. Returns false once the debouncer is closed.
    pub fn trigger(&self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }
}

/// Single-slot trailing-edge debouncer running on the tokio runtime.
pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<T>,
    close_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Spawns the debouncer task. `action` runs once per quiet period of
    /// `delay` with the last value triggered during the burst.
    pub fn new<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: Fn(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel();
        let task = tokio::spawn(run(delay, rx, close_rx, action));

        Self {
            tx,
            close_tx: Mutex::new(Some(close_tx)),
            task: Mutex::new(Some(task)),
        }
    }

    /// Records a trigger.
    pub fn trigger(&self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }

    /// Returns a cloneable trigger handle, for use inside watcher callbacks.
    pub fn handle(&self) -> DebounceTrigger<T> {
        DebounceTrigger {
            tx: self.tx.clone(),
        }
    }

    /// Stops the debouncer. A value still waiting for its timer is
    /// discarded; an action already running is awaited. Idempotent.
    pub async fn close(&self) {
        let close_tx = self
            .close_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(close_tx) = close_tx {
            let _ = close_tx.send(());
        }

        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("Debounce task ended abnormally: {}", e);
            }
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.close_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }
}

async fn run<T, F, Fut>(
    delay: Duration,
    mut rx: mpsc::UnboundedReceiver<T>,
    mut close_rx: oneshot::Receiver<()>,
    action: F,
) where
    F: Fn(T) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut slot = Slot::Idle;
    let mut in_flight: Option<Pin<Box<Fut>>> = None;

    loop {
        let deadline = slot.deadline();
        tokio::select! {
            biased;

            _ = &mut close_rx => break,

            _ = finish(&mut in_flight) => {
                in_flight = None;
                if let Slot::Pending(value) = std::mem::replace(&mut slot, Slot::Idle) {
                    in_flight = Some(Box::pin(action(value)));
                }
            }

            _ = expire(deadline) => {
                if let Slot::Debouncing { value, .. } = std::mem::replace(&mut slot, Slot::Idle) {
                    if in_flight.is_some() {
                        slot = Slot::Pending(value);
                    } else {
                        in_flight = Some(Box::pin(action(value)));
                    }
                }
            }

            received = rx.recv() => match received {
                Some(value) => {
                    slot = Slot::Debouncing {
                        value,
                        deadline: Instant::now() + delay,
                    };
                }
                None => break,
            },
        }
    }

    if let Some(running) = in_flight {
        running.await;
    }
}

async fn finish<F: Future + Unpin>(in_flight: &mut Option<F>) {
    match in_flight {
        Some(running) => {
            running.await;
        }
        None => std::future::pending().await,
    }
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
