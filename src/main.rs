//! Bundle Minter - private mint submission through a Flashbots relay
//!
//! Builds and signs a single mint transaction, checks it against the next
//! block through the relay, sends it as a bundle to the next few blocks and
//! waits for it to land.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

mod bundle;
mod chain;
mod config;
mod error;
mod minter;
mod relay;
mod tx;

use chain::ChainProvider;
use config::Settings;
use error::MinterError;
use minter::{MintOutcome, MintPipeline};
use relay::FlashbotsRelay;
use tx::GasStationSource;

/// Exit status when the run is interrupted by a signal
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    // Initialize logging
    init_logging();

    info!("Starting Bundle Minter v{}", env!("CARGO_PKG_VERSION"));

    let code = tokio::select! {
        result = run() => match result {
            Ok(outcome) => {
                info!(
                    "Minted with tx {:?} at block {} ({} gwei bid, bundle {:?} sent to blocks {:?})",
                    outcome.tx_hash,
                    outcome.block_number,
                    outcome.gas_price_gwei,
                    outcome.simulation.bundle_hash,
                    outcome.broadcast.targets()
                );
                0
            }
            Err(e) => {
                error!("{:#}", e);
                exit_code(&e)
            }
        },
        _ = shutdown_signal() => {
            warn!("Interrupted; bundles already sent to the relay may still land");
            EXIT_INTERRUPTED
        }
    };

    std::process::exit(code);
}

async fn run() -> Result<MintOutcome> {
    // Load configuration
    let settings = Settings::load()?;
    info!("Using node {}", settings.node.http_provider);

    let provider = Arc::new(ChainProvider::new(&settings.node.http_provider)?);

    let relay = FlashbotsRelay::new(
        provider.http().clone(),
        provider.clone(),
        settings.relay.endpoint(),
        settings.wallet.flashbots_identity()?,
    )?;
    info!("Using relay {}", relay.relay_url());

    let fee_source = GasStationSource::new(
        &settings.gas.oracle_url,
        std::time::Duration::from_secs(settings.gas.oracle_timeout_secs),
    )?;

    let pipeline = MintPipeline::new(
        &settings,
        provider,
        Arc::new(relay),
        Arc::new(fee_source),
        settings.wallet.user_wallet()?,
    )
    .context("Failed to set up the mint pipeline")?;

    Ok(pipeline.run().await?)
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<MinterError>()
        .map(MinterError::exit_code)
        .unwrap_or(1)
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,bundle_minter=debug,hyper=warn,reqwest=warn")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
