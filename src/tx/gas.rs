//! Gas price bidding from an external fee estimate
//!
//! Bundle pricing happens through the gas price: it has to beat the
//! network-wide fastest tier by a wide margin since competing bundles bid too.

use crate::error::{MinterError, MinterResult};

use async_trait::async_trait;
use ethers::types::U256;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const GWEI: u64 = 1_000_000_000;

const ENDPOINT: &str = "gas oracle";

/// Source of the "fastest" fee figure, in tenths of a gwei
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeeSource: Send + Sync {
    async fn fastest(&self) -> MinterResult<f64>;
}

/// Body returned by the gas station endpoint; other fields are ignored
#[derive(Debug, Deserialize)]
struct GasStationResponse {
    fastest: f64,
}

/// ETH Gas Station style JSON endpoint
pub struct GasStationSource {
    client: reqwest::Client,
    url: String,
}

impl GasStationSource {
    pub fn new(url: &str, timeout: Duration) -> MinterResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MinterError::network(ENDPOINT, e))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl FeeSource for GasStationSource {
    async fn fastest(&self) -> MinterResult<f64> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MinterError::network(ENDPOINT, e))?;

        let body: GasStationResponse = response
            .json()
            .await
            .map_err(|e| MinterError::network(ENDPOINT, format!("malformed body: {}", e)))?;

        Ok(body.fastest)
    }
}

/// A priced bid, computed once per run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasQuote {
    pub fastest: f64,
    pub multiplier: u64,
    pub gas_price_gwei: u64,
}

impl GasQuote {
    pub fn gas_price_wei(&self) -> U256 {
        U256::from(self.gas_price_gwei) * U256::from(GWEI)
    }
}

/// `floor(fastest / 10 * multiplier)` gwei, or `None` when the figure cannot
/// produce a positive price
pub fn competitive_gas_price_gwei(fastest: f64, multiplier: u64) -> Option<u64> {
    if !fastest.is_finite() || fastest <= 0.0 {
        return None;
    }
    let gwei = (fastest / 10.0 * multiplier as f64).floor();
    if gwei < 1.0 || gwei >= u64::MAX as f64 {
        return None;
    }
    Some(gwei as u64)
}

/// Turns the fee source's figure into a bid
pub struct GasPriceOracle {
    source: Arc<dyn FeeSource>,
    multiplier: u64,
}

impl GasPriceOracle {
    pub fn new(source: Arc<dyn FeeSource>, multiplier: u64) -> Self {
        Self { source, multiplier }
    }

    /// Fetch a fresh estimate; there is no caching and no retry
    pub async fn quote(&self) -> MinterResult<GasQuote> {
        let fastest = self.source.fastest().await?;
        let gas_price_gwei =
            competitive_gas_price_gwei(fastest, self.multiplier).ok_or_else(|| {
                MinterError::network(
                    ENDPOINT,
                    format!("unusable fastest fee estimate {}", fastest),
                )
            })?;

        debug!(
            "Fee estimate fastest={} x{} -> {} gwei",
            fastest, self.multiplier, gas_price_gwei
        );

        Ok(GasQuote {
            fastest,
            multiplier: self.multiplier,
            gas_price_gwei,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle_returning(fastest: f64) -> GasPriceOracle {
        let mut source = MockFeeSource::new();
        source.expect_fastest().times(1).returning(move || Ok(fastest));
        GasPriceOracle::new(Arc::new(source), 3)
    }

    #[tokio::test]
    async fn test_fastest_100_bids_30_gwei() {
        let quote = oracle_returning(100.0).quote().await.unwrap();
        assert_eq!(quote.gas_price_gwei, 30);
        assert_eq!(quote.gas_price_wei(), U256::from(30_000_000_000u64));
    }

    #[test]
    fn test_price_for_reported_tiers() {
        for fastest in (10..=5_000u64).step_by(10) {
            let expected = (fastest / 10) * 3;
            assert_eq!(
                competitive_gas_price_gwei(fastest as f64, 3),
                Some(expected),
                "fastest = {fastest}"
            );
        }
    }

    #[test]
    fn test_floors_after_multiplying() {
        assert_eq!(competitive_gas_price_gwei(105.0, 3), Some(31));
        assert_eq!(competitive_gas_price_gwei(4.0, 3), Some(1));
    }

    #[test]
    fn test_unusable_estimates() {
        assert_eq!(competitive_gas_price_gwei(0.0, 3), None);
        assert_eq!(competitive_gas_price_gwei(3.0, 3), None);
        assert_eq!(competitive_gas_price_gwei(-20.0, 3), None);
        assert_eq!(competitive_gas_price_gwei(f64::NAN, 3), None);
        assert_eq!(competitive_gas_price_gwei(f64::INFINITY, 3), None);
    }

    #[tokio::test]
    async fn test_zero_estimate_is_malformed() {
        let err = oracle_returning(0.0).quote().await.unwrap_err();
        assert!(matches!(err, MinterError::Network { ref endpoint, .. } if endpoint == "gas oracle"));
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let mut source = MockFeeSource::new();
        source
            .expect_fastest()
            .times(1)
            .returning(|| Err(MinterError::network("gas oracle", "dns error")));
        let err = GasPriceOracle::new(Arc::new(source), 3)
            .quote()
            .await
            .unwrap_err();
        assert!(matches!(err, MinterError::Network { .. }));
    }

    #[test]
    fn test_gas_station_body() {
        let body: GasStationResponse =
            serde_json::from_str(r#"{"fast": 800.0, "fastest": 1230.0, "average": 420}"#).unwrap();
        assert_eq!(body.fastest, 1230.0);

        assert!(serde_json::from_str::<GasStationResponse>(r#"{"fast": 800}"#).is_err());
        assert!(serde_json::from_str::<GasStationResponse>(r#"{"fastest": "soon"}"#).is_err());
    }
}
