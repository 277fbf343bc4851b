//! Supervised execution of the tunnel client.
//!
//! The supervisor runs one client attempt at a time. A clean exit ends the
//! run. A failed attempt is retried after a linear backoff (`retry × unit`)
//! until `retry_count` retries have been spent; with failover enabled the
//! resolver list is rotated before each retry so the next attempt uses a
//! different resolver.

pub mod args;
pub mod launcher;
pub mod signal;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::RunConfig;

pub use args::{build_client_args, rotate_resolvers};
pub use launcher::{AttemptError, ChildSlot, ProcessLauncher, TunnelLauncher};
pub use signal::SignalRelay;

/// Delay multiplied by the retry number before each retry.
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("dnstt-client binary not found (searched: {searched}); please ensure dnstt-client is in your PATH or current directory")]
    ClientNotFound { searched: String },

    #[error("All retry attempts exhausted ({attempts} attempts)")]
    Exhausted { attempts: u32 },

    #[error("interrupted by shutdown signal")]
    Interrupted,
}

/// Where the supervision loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running { attempt: u32 },
    Retrying { retry: u32 },
    Succeeded,
    Exhausted,
}

/// Runs the tunnel client with retries and resolver failover.
pub struct Supervisor {
    launcher: Arc<dyn TunnelLauncher>,
    slot: ChildSlot,
    shutdown_rx: watch::Receiver<bool>,
    backoff_unit: Duration,
    state_tx: watch::Sender<SupervisorState>,
}

impl Supervisor {
    pub fn new(
        launcher: Arc<dyn TunnelLauncher>,
        slot: ChildSlot,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SupervisorState::Idle);
        Self {
            launcher,
            slot,
            shutdown_rx,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            state_tx,
        }
    }

    /// Overrides the backoff unit.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Watches state transitions of the supervision loop.
    pub fn state(&self) -> watch::Receiver<SupervisorState> {
        self.state_tx.subscribe()
    }

    /// Runs the client until it exits cleanly or the retry budget is spent.
    ///
    /// At most `retry_count + 1` attempts are made. Returns the configuration
    /// as it stood after the last attempt, resolver rotation included.
    pub async fn run(&self, mut config: RunConfig) -> Result<RunConfig, SupervisorError> {
        let retry_count = config.retry_count;
        let mut args = build_client_args(&config);

        for retry in 0..=retry_count {
            if retry > 0 {
                self.state_tx.send_replace(SupervisorState::Retrying { retry });
                info!("Retry {}/{}...", retry, retry_count);
                let delay = self.backoff_unit * retry;
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_signalled(self.shutdown_rx.clone()) => {
                        return Err(SupervisorError::Interrupted);
                    }
                }

                if config.failover && config.resolvers.len() > 1 {
                    rotate_resolvers(&mut config.resolvers);
                    args = build_client_args(&config);
                    if let Some(head) = config.primary_resolver() {
                        info!("Switching to resolver: {}", head);
                    }
                }
            }

            if *self.shutdown_rx.borrow() {
                return Err(SupervisorError::Interrupted);
            }

            let attempt = retry + 1;
            self.state_tx.send_replace(SupervisorState::Running { attempt });
            metrics::counter!("tunnel_client_attempts_total").increment(1);
            info!("Starting dnstt-client with args: {:?}", args);

            match self.launcher.run(&args, &self.slot).await {
                Ok(()) => {
                    self.state_tx.send_replace(SupervisorState::Succeeded);
                    debug!(attempt, "Tunnel client finished successfully");
                    return Ok(config);
                }
                Err(e) => {
                    metrics::counter!("tunnel_client_failures_total").increment(1);
                    info!(attempt, error = %e, "Client exited with error");
                }
            }

            if *self.shutdown_rx.borrow() {
                return Err(SupervisorError::Interrupted);
            }
        }

        self.state_tx.send_replace(SupervisorState::Exhausted);
        Err(SupervisorError::Exhausted {
            attempts: retry_count + 1,
        })
    }
}

/// Resolves once shutdown has been requested. A closed channel never resolves.
async fn shutdown_signalled(mut shutdown_rx: watch::Receiver<bool>) {
    if shutdown_rx.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}
