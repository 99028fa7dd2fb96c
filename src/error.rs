//! Error types for the bundle minter

use ethers::types::H256;
use std::fmt::Display;
use thiserror::Error;

/// Main error type for the minter
#[derive(Error, Debug)]
pub enum MinterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error ({endpoint}): {message}")]
    Network { endpoint: String, message: String },

    #[error("Transaction would revert: {0}")]
    Revert(String),

    #[error("Bundle simulation failed for block {block_number}: {message}")]
    Simulation { block_number: u64, message: String },

    #[error(
        "Transaction {tx_hash:?} was not mined by block {deadline} (current block {current_block}), \
         so you didn't mint a thing"
    )]
    Expired {
        tx_hash: H256,
        deadline: u64,
        current_block: u64,
    },

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MinterError {
    /// Build a network error for the given endpoint
    pub fn network(endpoint: impl Into<String>, err: impl Display) -> Self {
        MinterError::Network {
            endpoint: endpoint.into(),
            message: err.to_string(),
        }
    }

    /// Process exit status for this error. Nothing is retried in-process:
    /// a stale nonce, quote or simulation means re-running the whole mint.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Result type for minter operations
pub type MinterResult<T> = Result<T, MinterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_message_tells_operator_nothing_was_minted() {
        let err = MinterError::Expired {
            tx_hash: H256::zero(),
            deadline: 1003,
            current_block: 1004,
        };
        let message = err.to_string();
        assert!(message.contains("not mined by block 1003"));
        assert!(message.contains("didn't mint a thing"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_every_failure_exits_non_zero() {
        let errors = [
            MinterError::Config("missing".into()),
            MinterError::network("node", "connection refused"),
            MinterError::Revert("execution reverted".into()),
            MinterError::Simulation {
                block_number: 1,
                message: "rejected".into(),
            },
        ];
        for err in errors {
            assert_eq!(err.exit_code(), 1);
        }
    }
}
