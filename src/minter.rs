//! Mint pipeline: quote, build, simulate, broadcast, confirm
//!
//! Every step runs once and strictly in order. The first failure ends the
//! run; in particular nothing is broadcast unless the simulation passed.

use crate::bundle::{BroadcastReport, Bundle, BundleBroadcaster, BundleSimulator};
use crate::chain::{ConfirmationWatcher, NodeClient};
use crate::config::Settings;
use crate::error::MinterResult;
use crate::relay::{RelayClient, SimulationResult};
use crate::tx::{FeeSource, GasPriceOracle, MintCall, TransactionBuilder};

use ethers::signers::LocalWallet;
use ethers::types::H256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// What a confirmed mint looked like
#[derive(Debug, Clone)]
pub struct MintOutcome {
    pub tx_hash: H256,
    pub block_number: u64,
    pub gas_price_gwei: u64,
    pub simulation: SimulationResult,
    pub broadcast: BroadcastReport,
}

/// Single-shot private mint submission
pub struct MintPipeline {
    node: Arc<dyn NodeClient>,
    oracle: GasPriceOracle,
    builder: TransactionBuilder,
    simulator: BundleSimulator,
    broadcaster: BundleBroadcaster,
    watcher: ConfirmationWatcher,
    chain_id: Option<u64>,
    window_size: u64,
    max_blocks_ahead: u64,
}

impl MintPipeline {
    /// Wire the pipeline from its capabilities
    pub fn new(
        settings: &Settings,
        node: Arc<dyn NodeClient>,
        relay: Arc<dyn RelayClient>,
        fee_source: Arc<dyn FeeSource>,
        wallet: LocalWallet,
    ) -> MinterResult<Self> {
        let call = MintCall::from_settings(settings)?;

        Ok(Self {
            oracle: GasPriceOracle::new(fee_source, settings.gas.multiplier),
            builder: TransactionBuilder::new(node.clone(), wallet, call),
            simulator: BundleSimulator::new(relay.clone()),
            broadcaster: BundleBroadcaster::new(relay),
            watcher: ConfirmationWatcher::new(
                node.clone(),
                Duration::from_millis(settings.bundle.receipt_timeout_ms),
                Duration::from_millis(settings.bundle.receipt_poll_interval_ms),
            ),
            node,
            chain_id: settings.node.chain_id,
            window_size: settings.bundle.window_size,
            max_blocks_ahead: settings.bundle.max_blocks_ahead,
        })
    }

    /// Run one mint attempt end to end
    pub async fn run(&self) -> MinterResult<MintOutcome> {
        info!("connecting to RPC");
        let address = self.builder.address();
        let balance = self.node.get_balance(address).await?;
        info!("USER ACCOUNT: {:?}: {} wei", address, balance);

        let quote = self.oracle.quote().await?;
        let chain_id = match self.chain_id {
            Some(chain_id) => chain_id,
            None => self.node.chain_id().await?,
        };

        let request = self.builder.build(chain_id, quote.gas_price_wei()).await?;
        let gas_limit = self.builder.estimate_gas(&request).await?;
        let request = TransactionBuilder::finalize(request, gas_limit);

        info!("Estimated gas: {}", gas_limit);
        info!("Gas Price: {} Gwei", quote.gas_price_gwei);
        debug!(
            "Bid is floor({} / 10 * {}) gwei",
            quote.fastest, quote.multiplier
        );

        let signed = self.builder.sign(&request).await?;
        let tx_hash = signed.hash();
        let bundle = Bundle::single(signed);

        let block_number = self.node.get_block_number().await?;

        // Only the next block is simulated, whatever the broadcast window.
        let simulation = self.simulator.simulate(&bundle, block_number + 1).await?;

        let broadcast = self
            .broadcaster
            .broadcast(&bundle, block_number, self.window_size)
            .await;
        info!("broadcast started at block {}", block_number);

        let deadline = block_number.saturating_add(self.max_blocks_ahead);
        let confirmed_at = self
            .watcher
            .wait_for_confirmation(tx_hash, block_number, self.max_blocks_ahead)
            .await?
            .into_result(tx_hash, deadline)?;

        Ok(MintOutcome {
            tx_hash,
            block_number: confirmed_at,
            gas_price_gwei: quote.gas_price_gwei,
            simulation,
            broadcast,
        })
    }
}
