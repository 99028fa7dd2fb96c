//! Flashbots relay client

use super::{FailedTransaction, RelayClient, SimulationResult};
use crate::bundle::Bundle;
use crate::chain::{BlockStamp, NodeClient};
use crate::error::{MinterError, MinterResult};

use async_trait::async_trait;
use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::H256;
use ethers_flashbots::{BundleRequest, FlashbotsMiddleware, SimulatedBundle};
use std::sync::Arc;
use tracing::debug;
use url::Url;

const ENDPOINT: &str = "relay";

/// Seconds between blocks used to extrapolate simulation timestamps
const BLOCK_TIME_SECS: u64 = 12;

/// Relay client that signs requests with a searcher identity
pub struct FlashbotsRelay {
    middleware: FlashbotsMiddleware<Provider<Http>, LocalWallet>,
    node: Arc<dyn NodeClient>,
    relay_url: Url,
}

impl FlashbotsRelay {
    /// `identity` only authenticates bundles to the relay; it holds no funds
    pub fn new(
        provider: Provider<Http>,
        node: Arc<dyn NodeClient>,
        relay_url: &str,
        identity: LocalWallet,
    ) -> MinterResult<Self> {
        let relay_url: Url = relay_url
            .parse()
            .map_err(|e| MinterError::Config(format!("Invalid relay URL {:?}: {}", relay_url, e)))?;

        debug!(
            "Flashbots relay {} with identity {:?}",
            relay_url,
            identity.address()
        );

        Ok(Self {
            middleware: FlashbotsMiddleware::new(provider, relay_url.clone(), identity),
            node,
            relay_url,
        })
    }

    pub fn relay_url(&self) -> &Url {
        &self.relay_url
    }
}

/// Relay request carrying the bundle's raw transactions for one block
pub fn bundle_request(bundle: &Bundle, target_block: u64) -> BundleRequest {
    bundle
        .raw_transactions()
        .into_iter()
        .fold(BundleRequest::new(), |request, raw| request.push_transaction(raw))
        .set_block(target_block.into())
}

/// Timestamp the target block is expected to carry
pub fn extrapolate_timestamp(latest: BlockStamp, target_block: u64) -> u64 {
    let blocks_ahead = target_block.saturating_sub(latest.number);
    latest.timestamp + blocks_ahead * BLOCK_TIME_SECS
}

fn simulation_result(simulated: SimulatedBundle) -> SimulationResult {
    let failed_transactions = simulated
        .transactions
        .iter()
        .filter_map(|tx| {
            tx.error
                .clone()
                .or_else(|| tx.revert.clone())
                .map(|reason| FailedTransaction {
                    hash: tx.hash,
                    reason,
                })
        })
        .collect();

    SimulationResult {
        bundle_hash: simulated.hash,
        coinbase_diff: simulated.coinbase_diff,
        total_gas_used: simulated.gas_used,
        failed_transactions,
    }
}

#[async_trait]
impl RelayClient for FlashbotsRelay {
    async fn simulate_bundle(
        &self,
        bundle: &Bundle,
        target_block: u64,
    ) -> MinterResult<SimulationResult> {
        let latest = self.node.get_latest_block().await?;
        let request = bundle_request(bundle, target_block)
            .set_simulation_block(target_block.saturating_sub(1).into())
            .set_simulation_timestamp(extrapolate_timestamp(latest, target_block));

        let simulated = self
            .middleware
            .simulate_bundle(&request)
            .await
            .map_err(|e| MinterError::network(ENDPOINT, e))?;

        Ok(simulation_result(simulated))
    }

    async fn send_bundle(&self, bundle: &Bundle, target_block: u64) -> MinterResult<Option<H256>> {
        let request = bundle_request(bundle, target_block);
        let pending = self
            .middleware
            .send_bundle(&request)
            .await
            .map_err(|e| MinterError::network(ENDPOINT, e))?;

        Ok(pending.bundle_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::SignedTransaction;
    use ethers::types::Bytes;

    #[test]
    fn test_bundle_request_targets_block() {
        let signed = SignedTransaction::from_parts(
            Default::default(),
            Bytes::from(vec![0x02, 0xf8, 0x01]),
            H256::repeat_byte(7),
        );
        let bundle = Bundle::single(signed);

        let request = bundle_request(&bundle, 1001);
        assert_eq!(request.block(), Some(1001u64.into()));
        assert_eq!(request.transactions().len(), 1);
        assert_eq!(request.simulation_block(), None);
    }

    #[test]
    fn test_extrapolate_timestamp() {
        let latest = BlockStamp {
            number: 1000,
            timestamp: 1_700_000_000,
        };
        assert_eq!(extrapolate_timestamp(latest, 1001), 1_700_000_012);
        assert_eq!(extrapolate_timestamp(latest, 1003), 1_700_000_036);
        assert_eq!(extrapolate_timestamp(latest, 999), 1_700_000_000);
    }
}
