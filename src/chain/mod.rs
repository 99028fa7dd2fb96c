//! Chain module - node access and transaction confirmation
//!
//! This module provides:
//! - The `NodeClient` capability the pipeline uses to read chain state
//! - An ethers HTTP implementation of it
//! - Block-bounded receipt polling

pub mod confirmation;
pub mod provider;

pub use confirmation::ConfirmationWatcher;
pub use provider::ChainProvider;

use crate::error::MinterResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionReceipt, H256, U256};

/// Latest block header fields needed to extrapolate future timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStamp {
    pub number: u64,
    pub timestamp: u64,
}

/// Read access to a node over JSON-RPC
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn chain_id(&self) -> MinterResult<u64>;

    async fn get_balance(&self, address: Address) -> MinterResult<U256>;

    /// Nonce of `address` at the latest block
    async fn get_transaction_count(&self, address: Address) -> MinterResult<U256>;

    /// Fails with `Revert` when the node refuses to execute the call
    async fn estimate_gas(&self, tx: &TypedTransaction) -> MinterResult<U256>;

    async fn get_block_number(&self) -> MinterResult<u64>;

    async fn get_latest_block(&self) -> MinterResult<BlockStamp>;

    async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> MinterResult<Option<TransactionReceipt>>;
}
