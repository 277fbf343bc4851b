//! The main application logic, decoupled from the entry point.

use crate::{
    config::RunConfig,
    mtu::{resolve_mtu, MTU_AUTO},
    resolver::select_fastest,
    supervisor::{
        ChildSlot, ProcessLauncher, SignalRelay, Supervisor, TunnelLauncher, DEFAULT_BACKOFF_UNIT,
    },
};
use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{info, instrument};

/// A validated run, ready to select parameters and supervise the client.
pub struct App {
    config: RunConfig,
    auto_select: bool,
    launcher: Arc<dyn TunnelLauncher>,
    backoff_unit: Duration,
    skip_signal_relay: bool,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: RunConfig) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Selects resolver order and MTU, then supervises the tunnel client
    /// until it succeeds or the retry budget runs out.
    ///
    /// Returns the configuration the final attempt ran with.
    pub async fn run(self) -> Result<RunConfig> {
        let config = prepare(self.config, self.auto_select).await;

        let slot = ChildSlot::new();
        let relay = if self.skip_signal_relay {
            None
        } else {
            Some(SignalRelay::install(slot.clone()).context("failed to install signal handlers")?)
        };
        let shutdown_rx = match &relay {
            Some(relay) => relay.subscribe(),
            None => watch::channel(false).1,
        };

        let supervisor = Supervisor::new(self.launcher, slot, shutdown_rx)
            .with_backoff_unit(self.backoff_unit);
        let finished = supervisor.run(config).await?;
        Ok(finished)
    }
}

/// Orders resolvers by probe results when `auto_select` is set and more than
/// one resolver is configured, then resolves an `auto` MTU against the head.
#[instrument(skip_all, fields(resolvers = config.resolvers.len(), auto_select = auto_select))]
pub async fn prepare(mut config: RunConfig, auto_select: bool) -> RunConfig {
    if auto_select && config.resolvers.len() > 1 {
        info!("Auto-selecting fastest resolver...");
        config.resolvers = select_fastest(&config.resolvers).await;
    }

    if config.mtu == MTU_AUTO {
        info!("Auto-detecting optimal MTU...");
        if let Some(mtu) = config
            .primary_resolver()
            .map(|primary| resolve_mtu(MTU_AUTO, primary))
        {
            config.mtu = mtu;
        }
    }
    config
}

/// Builder for the application.
///
/// Validation and locating the tunnel client both happen in [`build`], so
/// configuration and environment problems surface before anything runs.
///
/// [`build`]: AppBuilder::build
pub struct AppBuilder {
    config: RunConfig,
    auto_select: bool,
    client_path: Option<PathBuf>,
    launcher_override: Option<Arc<dyn TunnelLauncher>>,
    backoff_unit: Duration,
    skip_signal_relay: bool,
}

impl AppBuilder {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            auto_select: false,
            client_path: None,
            launcher_override: None,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            skip_signal_relay: false,
        }
    }

    /// Probe and rank resolvers before the first attempt.
    pub fn auto_select(mut self, enabled: bool) -> Self {
        self.auto_select = enabled;
        self
    }

    /// Use this tunnel-client executable instead of searching for one.
    pub fn client_path(mut self, path: Option<PathBuf>) -> Self {
        self.client_path = path;
        self
    }

    /// Overrides the tunnel launcher for testing.
    pub fn launcher_override(mut self, launcher: Arc<dyn TunnelLauncher>) -> Self {
        self.launcher_override = Some(launcher);
        self
    }

    pub fn backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Skips installing OS signal handlers.
    pub fn skip_signal_relay(mut self, skip: bool) -> Self {
        self.skip_signal_relay = skip;
        self
    }

    pub fn build(self) -> Result<App> {
        self.config.validate().context("Configuration error")?;

        let launcher = match self.launcher_override {
            Some(launcher) => launcher,
            None => {
                let launcher = ProcessLauncher::locate(self.client_path.as_deref())?;
                info!(program = %launcher.program().display(), "Found tunnel client");
                Arc::new(launcher)
            }
        };

        Ok(App {
            config: self.config,
            auto_select: self.auto_select,
            launcher,
            backoff_unit: self.backoff_unit,
            skip_signal_relay: self.skip_signal_relay,
        })
    }
}
