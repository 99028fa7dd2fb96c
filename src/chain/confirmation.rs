//! Block-bounded confirmation polling for a submitted bundle transaction
//!
//! A bundle only targets a handful of blocks, so waiting is bounded by block
//! height rather than wall-clock time: once every targeted block has passed
//! without a receipt the mint is abandoned.

use super::NodeClient;
use crate::error::{MinterError, MinterResult};

use ethers::types::{TransactionReceipt, H256, U64};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Where a submitted transaction stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationState {
    Pending,
    Confirmed { block_number: u64 },
    Expired { current_block: u64 },
}

/// True once `current_block` is past the last block the bundle could land in
pub fn window_expired(current_block: u64, starting_block: u64, max_blocks_ahead: u64) -> bool {
    current_block > starting_block.saturating_add(max_blocks_ahead)
}

/// Polls the node for a receipt until it appears or the block window closes
pub struct ConfirmationWatcher {
    node: Arc<dyn NodeClient>,
    /// Upper bound on one receipt poll attempt
    attempt_timeout: Duration,
    /// Delay between receipt lookups inside an attempt
    poll_interval: Duration,
}

impl ConfirmationWatcher {
    pub fn new(node: Arc<dyn NodeClient>, attempt_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            node,
            attempt_timeout,
            poll_interval,
        }
    }

    /// Wait until `tx_hash` is mined or the chain moves past
    /// `starting_block + max_blocks_ahead`. Returns a terminal state.
    pub async fn wait_for_confirmation(
        &self,
        tx_hash: H256,
        starting_block: u64,
        max_blocks_ahead: u64,
    ) -> MinterResult<ConfirmationState> {
        let mut state = ConfirmationState::Pending;
        let mut attempts: u64 = 0;

        while state == ConfirmationState::Pending {
            attempts += 1;
            state = self
                .step(tx_hash, starting_block, max_blocks_ahead)
                .await?;
        }

        debug!("Confirmation of {:?} settled after {} attempts", tx_hash, attempts);
        Ok(state)
    }

    /// One bounded attempt followed by the height check
    async fn step(
        &self,
        tx_hash: H256,
        starting_block: u64,
        max_blocks_ahead: u64,
    ) -> MinterResult<ConfirmationState> {
        if let Some(receipt) = self.poll_receipt(tx_hash).await? {
            let block_number = match receipt.block_number {
                Some(block) => block.as_u64(),
                None => self.node.get_block_number().await?,
            };
            if receipt.status == Some(U64::zero()) {
                warn!(
                    "Transaction {:?} was included at block {} but reverted",
                    tx_hash, block_number
                );
            }
            info!("transaction confirmed at block {}", block_number);
            return Ok(ConfirmationState::Confirmed { block_number });
        }

        let current_block = self.node.get_block_number().await?;
        info!("Block: {}", current_block);

        if window_expired(current_block, starting_block, max_blocks_ahead) {
            return Ok(ConfirmationState::Expired { current_block });
        }
        Ok(ConfirmationState::Pending)
    }

    /// `None` when the attempt timed out without a receipt
    async fn poll_receipt(&self, tx_hash: H256) -> MinterResult<Option<TransactionReceipt>> {
        match timeout(self.attempt_timeout, self.receipt_loop(tx_hash)).await {
            Ok(Ok(receipt)) => Ok(Some(receipt)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    async fn receipt_loop(&self, tx_hash: H256) -> MinterResult<TransactionReceipt> {
        loop {
            if let Some(receipt) = self.node.get_transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            sleep(self.poll_interval).await;
        }
    }
}

impl ConfirmationState {
    /// Turn a settled state into the pipeline's outcome
    pub fn into_result(self, tx_hash: H256, deadline: u64) -> MinterResult<u64> {
        match self {
            ConfirmationState::Confirmed { block_number } => Ok(block_number),
            ConfirmationState::Expired { current_block } => Err(MinterError::Expired {
                tx_hash,
                deadline,
                current_block,
            }),
            ConfirmationState::Pending => Err(MinterError::Internal(format!(
                "confirmation of {:?} stopped while still pending",
                tx_hash
            ))),
        }
    }
}
