//! Price resolver thresholds.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Absolute spread ceiling for quotes whose mid falls below `max_mid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadBucket {
    /// Exclusive upper bound on mid price; `None` means unbounded.
    #[serde(default)]
    pub max_mid: Option<Decimal>,
    /// Widest acceptable bid/ask spread in this price range.
    pub max_spread: Decimal,
}

/// Price resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Relative spread limit (spread / mid), e.g. 0.25 = 25%.
    #[serde(default = "default_relative_spread_limit")]
    pub relative_spread_limit: Decimal,
    /// Absolute spread limits bucketed by mid price, ascending.
    #[serde(default = "default_spread_buckets")]
    pub spread_buckets: Vec<SpreadBucket>,
    /// Continuous dividend yield used by the model stage.
    #[serde(default)]
    pub dividend_yield: f64,
    /// Solve IV from the mid when a true quote exists but the provider sent none.
    #[serde(default = "default_true")]
    pub solve_missing_iv: bool,
    /// Quotes older than this are low-confidence during entry scoring (seconds).
    #[serde(default = "default_stale_quote_secs")]
    pub stale_quote_secs: i64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            relative_spread_limit: default_relative_spread_limit(),
            spread_buckets: default_spread_buckets(),
            dividend_yield: 0.0,
            solve_missing_iv: true,
            stale_quote_secs: default_stale_quote_secs(),
        }
    }
}

impl ResolverConfig {
    /// Absolute spread limit for a mid price, if any bucket covers it.
    #[must_use]
    pub fn absolute_spread_limit(&self, mid: Decimal) -> Option<Decimal> {
        self.spread_buckets
            .iter()
            .find(|bucket| bucket.max_mid.is_none_or(|max_mid| mid < max_mid))
            .map(|bucket| bucket.max_spread)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.relative_spread_limit <= Decimal::ZERO {
            return Err("resolver.relative_spread_limit must be positive".to_string());
        }
        if self.stale_quote_secs <= 0 {
            return Err("resolver.stale_quote_secs must be positive".to_string());
        }
        let bounds: Vec<Decimal> = self
            .spread_buckets
            .iter()
            .filter_map(|bucket| bucket.max_mid)
            .collect();
        if bounds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err("resolver.spread_buckets must be in ascending max_mid order".to_string());
        }
        if self
            .spread_buckets
            .iter()
            .any(|bucket| bucket.max_spread <= Decimal::ZERO)
        {
            return Err("resolver.spread_buckets max_spread must be positive".to_string());
        }
        Ok(())
    }
}

fn default_relative_spread_limit() -> Decimal {
    Decimal::new(25, 2)
}

fn default_spread_buckets() -> Vec<SpreadBucket> {
    vec![
        SpreadBucket {
            max_mid: Some(Decimal::ONE),
            max_spread: Decimal::new(10, 2),
        },
        SpreadBucket {
            max_mid: Some(Decimal::new(5, 0)),
            max_spread: Decimal::new(25, 2),
        },
        SpreadBucket {
            max_mid: Some(Decimal::new(20, 0)),
            max_spread: Decimal::new(50, 2),
        },
        SpreadBucket {
            max_mid: None,
            max_spread: Decimal::ONE,
        },
    ]
}

const fn default_stale_quote_secs() -> i64 {
    60
}

pub(crate) const fn default_true() -> bool {
    true
}
