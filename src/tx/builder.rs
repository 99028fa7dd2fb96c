//! Mint transaction construction and signing

use super::gas::GWEI;
use crate::chain::NodeClient;
use crate::config::Settings;
use crate::error::{MinterError, MinterResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, H256, U256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The fixed part of the mint call: target, payment and tip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintCall {
    pub contract: Address,
    pub value: U256,
    pub selector: [u8; 4],
    pub max_priority_fee_per_gas: U256,
}

impl MintCall {
    pub fn from_settings(settings: &Settings) -> MinterResult<Self> {
        Ok(Self {
            contract: settings.mint.contract()?,
            value: settings.mint.value_wei()?,
            selector: settings.mint.selector_bytes()?,
            max_priority_fee_per_gas: U256::from(settings.gas.max_priority_fee_gwei)
                * U256::from(GWEI),
        })
    }

    /// Calldata is the bare selector; the mint entry point takes no arguments
    pub fn calldata(&self) -> Bytes {
        Bytes::from(self.selector.to_vec())
    }
}

/// A signed type-2 transaction, never modified after signing
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    request: Eip1559TransactionRequest,
    raw: Bytes,
    hash: H256,
}

impl SignedTransaction {
    pub fn from_parts(request: Eip1559TransactionRequest, raw: Bytes, hash: H256) -> Self {
        Self { request, raw, hash }
    }

    pub fn request(&self) -> &Eip1559TransactionRequest {
        &self.request
    }

    /// RLP-encoded signed transaction as sent to the relay
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn hash(&self) -> H256 {
        self.hash
    }
}

impl PartialEq for SignedTransaction {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.raw == other.raw
    }
}

impl Eq for SignedTransaction {}

/// Builds, estimates and signs the mint transaction for one account
pub struct TransactionBuilder {
    node: Arc<dyn NodeClient>,
    wallet: LocalWallet,
    call: MintCall,
}

impl TransactionBuilder {
    pub fn new(node: Arc<dyn NodeClient>, wallet: LocalWallet, call: MintCall) -> Self {
        Self { node, wallet, call }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Assemble the unsigned request. The nonce is read from the node here,
    /// once per attempt; the gas limit stays unset.
    pub async fn build(
        &self,
        chain_id: u64,
        gas_price_wei: U256,
    ) -> MinterResult<Eip1559TransactionRequest> {
        let from = self.wallet.address();
        let nonce = self.node.get_transaction_count(from).await?;

        if self.call.max_priority_fee_per_gas > gas_price_wei {
            warn!(
                "Priority fee {} wei exceeds max fee {} wei; the node may reject the call",
                self.call.max_priority_fee_per_gas, gas_price_wei
            );
        }

        debug!("Building mint tx from {:?} with nonce {}", from, nonce);

        Ok(Eip1559TransactionRequest::new()
            .chain_id(chain_id)
            .from(from)
            .to(self.call.contract)
            .value(self.call.value)
            .data(self.call.calldata())
            .max_fee_per_gas(gas_price_wei)
            .max_priority_fee_per_gas(self.call.max_priority_fee_per_gas)
            .nonce(nonce))
    }

    /// Ask the node to execute the call; a refusal is a `Revert`
    pub async fn estimate_gas(&self, request: &Eip1559TransactionRequest) -> MinterResult<U256> {
        let typed = TypedTransaction::Eip1559(request.clone());
        self.node.estimate_gas(&typed).await
    }

    pub fn finalize(
        request: Eip1559TransactionRequest,
        gas_limit: U256,
    ) -> Eip1559TransactionRequest {
        request.gas(gas_limit)
    }

    /// Sign a finalized request
    pub async fn sign(&self, request: &Eip1559TransactionRequest) -> MinterResult<SignedTransaction> {
        if request.gas.is_none() {
            return Err(MinterError::Internal(
                "refusing to sign a transaction without a gas limit".into(),
            ));
        }

        let typed = TypedTransaction::Eip1559(request.clone());
        let signature = self
            .wallet
            .sign_transaction(&typed)
            .await
            .map_err(|e| MinterError::Wallet(e.to_string()))?;

        let signed = SignedTransaction::from_parts(
            request.clone(),
            typed.rlp_signed(&signature),
            typed.hash(&signature),
        );
        info!(
            "Signed mint transaction {:?} (nonce {:?})",
            signed.hash(),
            signed.request().nonce
        );
        Ok(signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockNodeClient;
    use ethers::utils::keccak256;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn wallet() -> LocalWallet {
        KEY.parse().unwrap()
    }

    fn call() -> MintCall {
        MintCall {
            contract: "0x5FbDB2315678afecb367f032d93F642f64180aa3".parse().unwrap(),
            value: ethers::utils::parse_ether("0.03").unwrap(),
            selector: [0x12, 0x49, 0xc5, 0x8b],
            max_priority_fee_per_gas: U256::from(50u64) * U256::from(GWEI),
        }
    }

    fn builder(node: MockNodeClient) -> TransactionBuilder {
        TransactionBuilder::new(Arc::new(node), wallet(), call())
    }

    #[tokio::test]
    async fn test_build_uses_fresh_nonce_and_constants() {
        let address = wallet().address();
        let mut node = MockNodeClient::new();
        node.expect_get_transaction_count()
            .withf(move |from| *from == address)
            .times(1)
            .returning(|_| Ok(U256::from(7u64)));

        let gas_price = U256::from(120u64) * U256::from(GWEI);
        let request = builder(node).build(5, gas_price).await.unwrap();

        assert_eq!(request.nonce, Some(U256::from(7u64)));
        assert_eq!(request.gas, None);
        assert_eq!(request.max_fee_per_gas, Some(gas_price));
        assert_eq!(
            request.max_priority_fee_per_gas,
            Some(U256::from(50_000_000_000u64))
        );
        assert_eq!(request.value, Some(U256::from(30_000_000_000_000_000u64)));
        assert_eq!(request.data, Some(Bytes::from(vec![0x12, 0x49, 0xc5, 0x8b])));
        assert_eq!(request.chain_id, Some(5u64.into()));
        assert_eq!(request.from, Some(address));
    }

    #[tokio::test]
    async fn test_estimate_revert_propagates() {
        let mut node = MockNodeClient::new();
        node.expect_get_transaction_count()
            .returning(|_| Ok(U256::zero()));
        node.expect_estimate_gas()
            .times(1)
            .returning(|_| Err(MinterError::Revert("execution reverted: sale not active".into())));

        let builder = builder(node);
        let request = builder.build(5, U256::from(60u64) * U256::from(GWEI)).await.unwrap();
        let err = builder.estimate_gas(&request).await.unwrap_err();
        assert!(matches!(err, MinterError::Revert(ref m) if m.contains("sale not active")));
    }

    #[tokio::test]
    async fn test_sign_requires_gas_limit() {
        let mut node = MockNodeClient::new();
        node.expect_get_transaction_count()
            .returning(|_| Ok(U256::zero()));

        let builder = builder(node);
        let request = builder.build(5, U256::from(60u64) * U256::from(GWEI)).await.unwrap();
        assert!(matches!(
            builder.sign(&request).await,
            Err(MinterError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_signed_payload_matches_hash() {
        let mut node = MockNodeClient::new();
        node.expect_get_transaction_count()
            .returning(|_| Ok(U256::from(3u64)));
        node.expect_estimate_gas()
            .returning(|_| Ok(U256::from(51_000u64)));

        let builder = builder(node);
        let request = builder.build(5, U256::from(60u64) * U256::from(GWEI)).await.unwrap();
        let gas_limit = builder.estimate_gas(&request).await.unwrap();
        let request = TransactionBuilder::finalize(request, gas_limit);
        assert_eq!(request.gas, Some(U256::from(51_000u64)));

        let signed = builder.sign(&request).await.unwrap();
        // EIP-2718 type byte
        assert_eq!(signed.raw()[0], 0x02);
        assert_eq!(signed.hash(), H256::from(keccak256(signed.raw())));
        assert_eq!(signed.request(), &request);
    }
}
