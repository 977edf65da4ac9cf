//! A snapshot together with its per-leg resolutions.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::black_scholes::{self, BsInputs, years_to_expiry};
use super::resolver::{PriceResolver, PriceSource, Resolution};
use super::to_f64;
use crate::chain::{ChainSnapshot, Leg};

/// Resolved view of a chain. `resolutions[i]` belongs to `snapshot.legs[i]`.
#[derive(Debug, Clone)]
pub struct PricedChain {
    snapshot: ChainSnapshot,
    resolutions: Vec<Resolution>,
}

impl PricedChain {
    /// Resolve every leg of `snapshot`.
    #[must_use]
    pub fn resolve(snapshot: ChainSnapshot, resolver: &PriceResolver) -> Self {
        let resolutions = resolver.resolve(&snapshot);
        Self {
            snapshot,
            resolutions,
        }
    }

    /// Underlying snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &ChainSnapshot {
        &self.snapshot
    }

    /// Resolutions in leg order.
    #[must_use]
    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    /// Number of legs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.legs.len()
    }

    /// Whether the chain has no legs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot.legs.is_empty()
    }

    /// Leg and resolution at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<(&Leg, &Resolution)> {
        Some((self.snapshot.legs.get(index)?, self.resolutions.get(index)?))
    }

    /// Iterate `(index, leg, resolution)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Leg, &Resolution)> {
        self.snapshot
            .legs
            .iter()
            .zip(&self.resolutions)
            .enumerate()
            .map(|(i, (leg, resolution))| (i, leg, resolution))
    }

    /// Count of resolutions per source, in [`PriceSource::ALL`] order.
    #[must_use]
    pub fn source_counts(&self) -> Vec<(PriceSource, usize)> {
        PriceSource::ALL
            .iter()
            .map(|source| {
                (
                    *source,
                    self.resolutions.iter().filter(|r| r.source == *source).count(),
                )
            })
            .collect()
    }

    /// Implied volatility of the contract nearest the money for `expiry`.
    #[must_use]
    pub fn atm_iv(&self, expiry: NaiveDate) -> Option<f64> {
        let spot = self.snapshot.spot;
        self.iter()
            .filter(|(_, leg, r)| leg.expiry == expiry && r.implied_vol.is_some_and(|iv| iv > 0.0))
            .min_by_key(|(_, leg, _)| (leg.strike - spot).abs())
            .and_then(|(_, _, r)| r.implied_vol)
    }

    /// ATM IV of the nearest expiry after `expiry`, for term-structure checks.
    #[must_use]
    pub fn next_expiry_atm_iv(&self, expiry: NaiveDate) -> Option<f64> {
        self.snapshot
            .expiries()
            .into_iter()
            .filter(|e| *e > expiry)
            .find_map(|e| self.atm_iv(e))
    }

    /// Lognormal inputs for a strike at this chain's spot and rate.
    #[must_use]
    pub fn bs_inputs(&self, strike: Decimal, days_to_expiry: i64, dividend: f64) -> BsInputs {
        BsInputs {
            spot: to_f64(self.snapshot.spot),
            strike: to_f64(strike),
            t: years_to_expiry(days_to_expiry),
            rate: self.snapshot.interest_rate,
            dividend,
        }
    }

    /// Probability the underlying finishes above `level` at `days_to_expiry`.
    #[must_use]
    pub fn prob_above(&self, level: Decimal, days_to_expiry: i64, sigma: f64) -> f64 {
        let inputs = self.bs_inputs(level, days_to_expiry, 0.0);
        black_scholes::prob_above(&inputs, to_f64(level), sigma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::OptionRight;
    use crate::config::ResolverConfig;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn chain() -> PricedChain {
        let near = NaiveDate::from_ymd_opt(2026, 1, 30).unwrap();
        let far = NaiveDate::from_ymd_opt(2026, 2, 27).unwrap();
        let legs = vec![
            Leg::new("SPY", near, dec!(95), OptionRight::Put).with_iv(0.30),
            Leg::new("SPY", near, dec!(100), OptionRight::Put).with_iv(0.25),
            Leg::new("SPY", far, dec!(100), OptionRight::Put).with_iv(0.22),
            Leg::new("SPY", far, dec!(105), OptionRight::Call),
        ];
        let snapshot = ChainSnapshot::new(
            "SPY",
            dec!(100.40),
            0.04,
            Utc.with_ymd_and_hms(2026, 1, 2, 15, 0, 0).unwrap(),
            legs,
        );
        PricedChain::resolve(snapshot, &PriceResolver::new(ResolverConfig::default()))
    }

    #[test]
    fn atm_iv_picks_nearest_strike() {
        let chain = chain();
        let near = NaiveDate::from_ymd_opt(2026, 1, 30).unwrap();
        assert_eq!(chain.atm_iv(near), Some(0.25));
        assert_eq!(chain.next_expiry_atm_iv(near), Some(0.22));
    }

    #[test]
    fn source_counts_cover_every_leg() {
        let chain = chain();
        let total: usize = chain.source_counts().iter().map(|(_, n)| n).sum();
        assert_eq!(total, chain.len());
    }
}
