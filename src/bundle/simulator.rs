//! Pre-flight bundle simulation

use super::Bundle;
use crate::error::{MinterError, MinterResult};
use crate::relay::{RelayClient, SimulationResult};

use std::sync::Arc;
use tracing::{debug, error, info};

/// Dry-runs a bundle before any bid is committed
pub struct BundleSimulator {
    relay: Arc<dyn RelayClient>,
}

impl BundleSimulator {
    pub fn new(relay: Arc<dyn RelayClient>) -> Self {
        Self { relay }
    }

    /// Simulate `bundle` against `target_block`. Any relay failure or any
    /// failing transaction in the report becomes a `Simulation` error.
    pub async fn simulate(&self, bundle: &Bundle, target_block: u64) -> MinterResult<SimulationResult> {
        info!("SIMULATING TRANSACTION...");
        debug!(
            "Simulating {:?} against block {}",
            bundle.transaction_hashes(),
            target_block
        );

        let result = self
            .relay
            .simulate_bundle(bundle, target_block)
            .await
            .map_err(|e| {
                error!("Error in simulation: {}", e);
                MinterError::Simulation {
                    block_number: target_block,
                    message: e.to_string(),
                }
            })?;

        if let Some(failed) = result.failed_transactions.first() {
            error!(
                "Error in simulation: transaction {:?} failed: {}",
                failed.hash, failed.reason
            );
            return Err(MinterError::Simulation {
                block_number: target_block,
                message: format!("transaction {:?} failed: {}", failed.hash, failed.reason),
            });
        }

        info!("bundleHash: {:?}", result.bundle_hash);
        info!("coinbaseDiff: {}", result.coinbase_diff);
        info!("totalGasUsed: {}", result.total_gas_used);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{FailedTransaction, MockRelayClient};
    use crate::tx::SignedTransaction;
    use ethers::types::{Bytes, H256, U256};

    fn bundle() -> Bundle {
        Bundle::single(SignedTransaction::from_parts(
            Default::default(),
            Bytes::from(vec![0x02, 0x01]),
            H256::repeat_byte(9),
        ))
    }

    fn report(failed: Vec<FailedTransaction>) -> SimulationResult {
        SimulationResult {
            bundle_hash: H256::repeat_byte(0xbb),
            coinbase_diff: U256::from(1_500_000u64),
            total_gas_used: U256::from(51_234u64),
            failed_transactions: failed,
        }
    }

    #[tokio::test]
    async fn test_successful_simulation() {
        let mut relay = MockRelayClient::new();
        relay
            .expect_simulate_bundle()
            .withf(|_, block| *block == 1001)
            .times(1)
            .returning(|_, _| Ok(report(vec![])));

        let result = BundleSimulator::new(Arc::new(relay))
            .simulate(&bundle(), 1001)
            .await
            .unwrap();
        assert_eq!(result.total_gas_used, U256::from(51_234u64));
        assert_eq!(result.bundle_hash, H256::repeat_byte(0xbb));
    }

    #[tokio::test]
    async fn test_relay_error_wrapped() {
        let mut relay = MockRelayClient::new();
        relay
            .expect_simulate_bundle()
            .returning(|_, _| Err(MinterError::network("relay", "403 forbidden")));

        let err = BundleSimulator::new(Arc::new(relay))
            .simulate(&bundle(), 1001)
            .await
            .unwrap_err();
        match err {
            MinterError::Simulation {
                block_number,
                message,
            } => {
                assert_eq!(block_number, 1001);
                assert!(message.contains("403 forbidden"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reverted_transaction_fails_simulation() {
        let mut relay = MockRelayClient::new();
        relay.expect_simulate_bundle().returning(|_, _| {
            Ok(report(vec![FailedTransaction {
                hash: H256::repeat_byte(9),
                reason: "execution reverted: sale closed".into(),
            }]))
        });

        let err = BundleSimulator::new(Arc::new(relay))
            .simulate(&bundle(), 1001)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MinterError::Simulation { ref message, .. } if message.contains("sale closed")
        ));
    }
}
