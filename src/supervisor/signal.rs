//! Relays an interrupt or termination signal to the running tunnel client.

use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::launcher::ChildSlot;

/// Background task that waits for the first shutdown signal, publishes it on
/// a watch channel and forwards SIGTERM to the current child.
///
/// Only the first signal is handled. The task is aborted when the relay is
/// dropped.
pub struct SignalRelay {
    handle: JoinHandle<()>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SignalRelay {
    /// Registers SIGINT and SIGTERM handlers and starts the relay task. Must
    /// be called from within a tokio runtime.
    #[cfg(unix)]
    pub fn install(slot: ChildSlot) -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        Ok(Self::spawn(slot, async move {
            tokio::select! {
                _ = sigint.recv() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            }
        }))
    }

    /// Registers a Ctrl-C handler and starts the relay task. Must be called
    /// from within a tokio runtime.
    #[cfg(not(unix))]
    pub fn install(slot: ChildSlot) -> std::io::Result<Self> {
        Ok(Self::spawn(slot, async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => "Ctrl-C",
                Err(_) => std::future::pending().await,
            }
        }))
    }

    /// Starts a relay that fires when `trigger` completes. The output names
    /// the signal for logging.
    pub fn spawn<F>(slot: ChildSlot, trigger: F) -> Self
    where
        F: Future<Output = &'static str> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let name = trigger.await;
            info!(signal = name, "Received shutdown signal");
            let _ = shutdown_tx.send(true);

            if slot.terminate() {
                info!("Forwarded SIGTERM to tunnel client");
            } else {
                debug!("No tunnel client running, nothing to forward");
            }
            // Keep the sender alive so receivers never observe a closed channel.
            std::future::pending::<()>().await;
        });

        Self {
            handle,
            shutdown_rx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    pub fn shutdown_requested(&self) -> bool {
        *self.shutdown_rx.borrow()
    }
}

impl Drop for SignalRelay {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
