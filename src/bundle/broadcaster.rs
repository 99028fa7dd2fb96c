//! Multi-block bundle broadcast
//!
//! The relay lands a bundle in at most one block and promises none in
//! particular, so identical copies go to every block in the window. The bid
//! is not re-priced per block.

use super::Bundle;
use crate::relay::RelayClient;

use ethers::types::H256;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one broadcast round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Target block and relay bundle hash, when reported
    pub accepted: Vec<(u64, Option<H256>)>,
    /// Target block and failure cause
    pub failed: Vec<(u64, String)>,
}

impl BroadcastReport {
    pub fn targets(&self) -> Vec<u64> {
        let mut targets: Vec<u64> = self
            .accepted
            .iter()
            .map(|(block, _)| *block)
            .chain(self.failed.iter().map(|(block, _)| *block))
            .collect();
        targets.sort_unstable();
        targets
    }
}

/// Blocks targeted for a window starting after `starting_block`
pub fn target_blocks(starting_block: u64, window_size: u64) -> Vec<u64> {
    (1..window_size).map(|i| starting_block + i).collect()
}

/// Sends one bundle to several consecutive blocks
pub struct BundleBroadcaster {
    relay: Arc<dyn RelayClient>,
}

impl BundleBroadcaster {
    pub fn new(relay: Arc<dyn RelayClient>) -> Self {
        Self { relay }
    }

    /// Submit `bundle` to blocks `starting_block + 1 .. starting_block + window_size`.
    /// A failed submission is logged and does not affect the others.
    pub async fn broadcast(
        &self,
        bundle: &Bundle,
        starting_block: u64,
        window_size: u64,
    ) -> BroadcastReport {
        info!("SENDING bundles to flashbots");

        let submissions = target_blocks(starting_block, window_size)
            .into_iter()
            .map(|target| async move { (target, self.relay.send_bundle(bundle, target).await) });

        let mut report = BroadcastReport::default();
        for (target, result) in join_all(submissions).await {
            match result {
                Ok(bundle_hash) => {
                    info!("Bundle submitted for block {} ({:?})", target, bundle_hash);
                    report.accepted.push((target, bundle_hash));
                }
                Err(e) => {
                    warn!("Bundle submission for block {} failed: {}", target, e);
                    report.failed.push((target, e.to_string()));
                }
            }
        }

        if report.accepted.is_empty() && !report.failed.is_empty() {
            warn!("Relay rejected every submission; the bundle cannot land");
        }

        report
    }
}
