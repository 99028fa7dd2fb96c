//! Node provider backed by an ethers HTTP transport

use super::{BlockStamp, NodeClient};
use crate::error::{MinterError, MinterResult};

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, TransactionReceipt, H256, U256};
use std::time::Duration;
use tracing::debug;

const ENDPOINT: &str = "node";

/// JSON-RPC node connection
pub struct ChainProvider {
    http: Provider<Http>,
}

impl ChainProvider {
    /// Create a new provider for the given HTTP endpoint
    pub fn new(url: &str) -> MinterResult<Self> {
        let provider = Provider::<Http>::try_from(url)
            .map_err(|e| MinterError::Config(format!("Invalid node URL {:?}: {}", url, e)))?
            .interval(Duration::from_millis(100));

        debug!("Created HTTP provider for {}", url);

        Ok(Self { http: provider })
    }

    /// Get the underlying ethers provider
    pub fn http(&self) -> &Provider<Http> {
        &self.http
    }
}

fn node_error(err: ProviderError) -> MinterError {
    MinterError::network(ENDPOINT, err)
}

/// JSON-RPC error code geth uses for a reverted call
const EXECUTION_ERROR_CODE: i64 = 3;

/// Only an execution failure reported by the node is a `Revert`; rate limits,
/// unknown methods and transport failures are node errors.
fn classify_estimate_error(err: ProviderError) -> MinterError {
    let revert = RpcError::as_error_response(&err)
        .filter(|response| is_execution_failure(response.code, &response.message))
        .map(|response| response.message.clone());

    match revert {
        Some(message) => MinterError::Revert(message),
        None => node_error(err),
    }
}

fn is_execution_failure(code: i64, message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    code == EXECUTION_ERROR_CODE
        || message.contains("revert")
        || message.contains("insufficient funds")
}

#[async_trait]
impl NodeClient for ChainProvider {
    async fn chain_id(&self) -> MinterResult<u64> {
        self.http
            .get_chainid()
            .await
            .map(|id| id.as_u64())
            .map_err(node_error)
    }

    async fn get_balance(&self, address: Address) -> MinterResult<U256> {
        self.http
            .get_balance(address, None)
            .await
            .map_err(node_error)
    }

    async fn get_transaction_count(&self, address: Address) -> MinterResult<U256> {
        self.http
            .get_transaction_count(address, None)
            .await
            .map_err(node_error)
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> MinterResult<U256> {
        self.http
            .estimate_gas(tx, None)
            .await
            .map_err(classify_estimate_error)
    }

    async fn get_block_number(&self) -> MinterResult<u64> {
        self.http
            .get_block_number()
            .await
            .map(|block| block.as_u64())
            .map_err(node_error)
    }

    async fn get_latest_block(&self) -> MinterResult<BlockStamp> {
        let block = self
            .http
            .get_block(BlockNumber::Latest)
            .await
            .map_err(node_error)?
            .ok_or_else(|| MinterError::network(ENDPOINT, "node returned no latest block"))?;

        let number = block
            .number
            .ok_or_else(|| MinterError::network(ENDPOINT, "latest block has no number"))?;

        Ok(BlockStamp {
            number: number.as_u64(),
            timestamp: block.timestamp.as_u64(),
        })
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> MinterResult<Option<TransactionReceipt>> {
        self.http
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(node_error)
    }
}
