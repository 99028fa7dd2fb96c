//! Bundle module - pre-flight simulation and multi-block broadcast

mod broadcaster;
mod simulator;

pub use broadcaster::{BroadcastReport, BundleBroadcaster};
pub use simulator::BundleSimulator;

use crate::tx::SignedTransaction;

use ethers::types::{Bytes, H256};

/// Ordered signed transactions submitted atomically for one block.
/// The same bundle is reused for every target block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    transactions: Vec<SignedTransaction>,
}

impl Bundle {
    /// Bundle carrying a single transaction
    pub fn single(transaction: SignedTransaction) -> Self {
        Self {
            transactions: vec![transaction],
        }
    }

    pub fn raw_transactions(&self) -> Vec<Bytes> {
        self.transactions.iter().map(|tx| tx.raw().clone()).collect()
    }

    pub fn transaction_hashes(&self) -> Vec<H256> {
        self.transactions.iter().map(SignedTransaction::hash).collect()
    }
}
