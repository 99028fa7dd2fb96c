//! Transaction pricing, construction and signing

mod builder;
mod gas;

pub use builder::{MintCall, SignedTransaction, TransactionBuilder};
pub use gas::{FeeSource, GasPriceOracle, GasStationSource, GWEI};

#[cfg(test)]
pub use gas::MockFeeSource;
