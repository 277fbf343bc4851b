//! dnstt-helper - launcher and supervisor for dnstt-client
//!
//! Builds a run configuration from flags or a config file, optionally picks
//! the fastest resolver and an MTU, then keeps dnstt-client running with
//! retries and resolver failover.

use anyhow::{Context, Result};
use clap::Parser;
use dnstt_helper::{cli::Cli, config::RunConfig, App, VERSION};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("dnstt-helper client v{}", VERSION);
        return ExitCode::SUCCESS;
    }

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(1)
        }
    }
}

/// `RUST_LOG` wins; otherwise `--verbose` turns on info-level progress output.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = RunConfig::load(&cli).context("Error loading config")?;

    info!("-------------------- Configuration --------------------");
    info!("Domain: {}", config.domain);
    info!("Local Address: {}", config.local_addr);
    info!("Resolvers: {}", config.resolvers.len());
    info!("MTU: {}", config.mtu);
    info!("Failover: {}", config.failover);
    info!("Retry Count: {}", config.retry_count);
    info!("Timeout: {}s", config.timeout);
    info!("-------------------------------------------------------");

    let app = App::builder(config)
        .auto_select(cli.auto_select)
        .client_path(cli.client.clone())
        .build()?;

    let finished = app.run().await?;
    info!(resolver = ?finished.primary_resolver().map(ToString::to_string), "dnstt-client finished");
    Ok(())
}
