//! Relay module - private bundle submission
//!
//! The `RelayClient` capability simulates and submits bundles for a given
//! target block. `FlashbotsRelay` implements it over `ethers-flashbots`.

mod flashbots;

pub use flashbots::FlashbotsRelay;

use crate::bundle::Bundle;
use crate::error::MinterResult;

use async_trait::async_trait;
use ethers::types::{H256, U256};

/// A transaction the relay reported as failing during simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTransaction {
    pub hash: H256,
    pub reason: String,
}

/// Relay's dry-run report for one bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationResult {
    pub bundle_hash: H256,
    pub coinbase_diff: U256,
    pub total_gas_used: U256,
    pub failed_transactions: Vec<FailedTransaction>,
}

/// Access to a block-builder relay
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Dry-run `bundle` as if it were included in `target_block`
    async fn simulate_bundle(
        &self,
        bundle: &Bundle,
        target_block: u64,
    ) -> MinterResult<SimulationResult>;

    /// Submit `bundle` for inclusion in `target_block`; returns the relay's
    /// bundle hash when it reports one
    async fn send_bundle(&self, bundle: &Bundle, target_block: u64) -> MinterResult<Option<H256>>;
}
