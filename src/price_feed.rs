// 9.0 price_feed.rs: oracle integration. the engine is agnostic to whether
// prices come from Chainlink, Pyth, or a CEX aggregator; any source implements
// the PriceOracle trait and the engine rescales its native precision to the
// canonical representation before use.

use crate::types::{OracleRef, Price, Timestamp};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Fractional digits of the engine's canonical fixed-point price unit.
pub const CANONICAL_DECIMALS: u32 = 18;

/// A single price observation in the feed's native precision: an integer
/// mantissa plus the number of fractional digits it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    pub raw: i128,
    pub decimals: u32,
    pub observed_at: Timestamp,
}

impl PriceSample {
    pub fn new(raw: i128, decimals: u32, observed_at: Timestamp) -> Self {
        Self {
            raw,
            decimals,
            observed_at,
        }
    }

    pub fn age_secs(&self, now: Timestamp) -> i64 {
        now.secs_since(self.observed_at)
    }

    /// Rescale the native mantissa to the canonical price unit. Feeds with
    /// more than canonical precision are truncated toward zero; feeds beyond
    /// what the decimal representation can hold are rejected.
    pub fn normalized(&self) -> Result<Price, PriceFeedError> {
        if self.raw <= 0 {
            return Err(PriceFeedError::NonPositivePrice { raw: self.raw });
        }

        let mut value = Decimal::try_from_i128_with_scale(self.raw, self.decimals)
            .map_err(|_| PriceFeedError::UnsupportedPrecision {
                decimals: self.decimals,
            })?;

        if self.decimals > CANONICAL_DECIMALS {
            value = value.trunc_with_scale(CANONICAL_DECIMALS);
        }
        value.rescale(CANONICAL_DECIMALS);

        Price::new(value).ok_or(PriceFeedError::NonPositivePrice { raw: self.raw })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceFeedError {
    #[error("feed {oracle_ref} unavailable: {reason}")]
    Unavailable { oracle_ref: OracleRef, reason: String },

    #[error("feed {oracle_ref} timed out")]
    Timeout { oracle_ref: OracleRef },

    #[error("sample is {age_secs}s old, maximum is {max_age_secs}s")]
    StalePrice { age_secs: i64, max_age_secs: u64 },

    #[error("feed returned non-positive mantissa {raw}")]
    NonPositivePrice { raw: i128 },

    #[error("feed precision of {decimals} fractional digits is unsupported")]
    UnsupportedPrecision { decimals: u32 },
}

/// Trait for price sources. Implementations own their transport and must
/// bound every read with a timeout, surfacing overruns as `Timeout`.
pub trait PriceOracle: Send + Sync {
    fn latest_price(&self, oracle_ref: &OracleRef) -> Result<PriceSample, PriceFeedError>;
}

/// In-memory oracle for tests and simulations. Prices are set per feed handle;
/// individual feeds can be taken offline to exercise failure paths.
#[derive(Debug)]
pub struct MockOracle {
    samples: DashMap<OracleRef, PriceSample>,
    offline: DashMap<OracleRef, ()>,
    healthy: AtomicBool,
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            samples: DashMap::new(),
            offline: DashMap::new(),
            healthy: AtomicBool::new(true),
        }
    }

    pub fn set_price(&self, oracle_ref: &OracleRef, raw: i128, decimals: u32, observed_at: Timestamp) {
        self.samples
            .insert(oracle_ref.clone(), PriceSample::new(raw, decimals, observed_at));
    }

    pub fn take_offline(&self, oracle_ref: &OracleRef) {
        self.offline.insert(oracle_ref.clone(), ());
    }

    pub fn bring_online(&self, oracle_ref: &OracleRef) {
        self.offline.remove(oracle_ref);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }
}

impl PriceOracle for MockOracle {
    fn latest_price(&self, oracle_ref: &OracleRef) -> Result<PriceSample, PriceFeedError> {
        if !self.healthy.load(Ordering::Relaxed) {
            return Err(PriceFeedError::Unavailable {
                oracle_ref: oracle_ref.clone(),
                reason: "oracle offline".to_string(),
            });
        }
        if self.offline.contains_key(oracle_ref) {
            return Err(PriceFeedError::Timeout {
                oracle_ref: oracle_ref.clone(),
            });
        }
        self.samples
            .get(oracle_ref)
            .map(|sample| *sample)
            .ok_or_else(|| PriceFeedError::Unavailable {
                oracle_ref: oracle_ref.clone(),
                reason: "no sample for feed".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn normalizes_eight_decimal_feed() {
        // Chainlink-style 8-decimal feed: 1200.00000000
        let sample = PriceSample::new(120_000_000_000, 8, Timestamp::from_secs(0));
        let price = sample.normalized().unwrap();
        assert_eq!(price.value(), dec!(1200));
    }

    #[test]
    fn normalizes_low_precision_feed() {
        // 2-decimal feed: 999.50
        let sample = PriceSample::new(99_950, 2, Timestamp::from_secs(0));
        assert_eq!(sample.normalized().unwrap().value(), dec!(999.50));
    }

    #[test]
    fn truncates_beyond_canonical_precision() {
        // 20-decimal feed: 1.00000000000000000009 -> truncated at 18 digits
        let sample = PriceSample::new(100_000_000_000_000_000_009, 20, Timestamp::from_secs(0));
        assert_eq!(sample.normalized().unwrap().value(), dec!(1));
    }

    #[test]
    fn rejects_non_positive_mantissa() {
        let zero = PriceSample::new(0, 8, Timestamp::from_secs(0));
        assert!(matches!(
            zero.normalized(),
            Err(PriceFeedError::NonPositivePrice { .. })
        ));

        let negative = PriceSample::new(-5, 8, Timestamp::from_secs(0));
        assert!(negative.normalized().is_err());
    }

    #[test]
    fn rejects_unsupported_precision() {
        let sample = PriceSample::new(1, 40, Timestamp::from_secs(0));
        assert!(matches!(
            sample.normalized(),
            Err(PriceFeedError::UnsupportedPrecision { decimals: 40 })
        ));
    }

    #[test]
    fn sample_age() {
        let sample = PriceSample::new(1, 0, Timestamp::from_secs(100));
        assert_eq!(sample.age_secs(Timestamp::from_secs(160)), 60);
    }

    #[test]
    fn mock_oracle_per_feed_control() {
        let oracle = MockOracle::new();
        let eth = OracleRef::new("ETH/USD");
        let btc = OracleRef::new("BTC/USD");

        oracle.set_price(&eth, 2_000_00000000, 8, Timestamp::from_secs(0));
        oracle.set_price(&btc, 50_000_00000000, 8, Timestamp::from_secs(0));

        assert!(oracle.latest_price(&eth).is_ok());

        oracle.take_offline(&eth);
        assert!(matches!(
            oracle.latest_price(&eth),
            Err(PriceFeedError::Timeout { .. })
        ));
        // other feeds are unaffected
        assert!(oracle.latest_price(&btc).is_ok());

        oracle.bring_online(&eth);
        assert!(oracle.latest_price(&eth).is_ok());
    }

    #[test]
    fn mock_oracle_unknown_feed() {
        let oracle = MockOracle::new();
        let result = oracle.latest_price(&OracleRef::new("SOL/USD"));
        assert!(matches!(result, Err(PriceFeedError::Unavailable { .. })));
    }
}
