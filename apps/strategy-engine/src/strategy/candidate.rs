//! Strategy candidates.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{Direction, LegDirection, StrategyType};
use crate::chain::Leg;
use crate::options::{Greeks, aggregate_greeks};
use crate::pricing::Resolution;

/// What a leg does within its strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegRole {
    /// Selected by the strike filter.
    Anchor,
    /// Required partner of an anchor (second short, debit spread short).
    Complement,
    /// Long protection.
    Wing,
}

/// A leg within a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateLeg {
    /// Index into the chain.
    pub index: usize,
    /// Contract.
    pub leg: Leg,
    /// Resolved price and analytics.
    pub resolution: Resolution,
    /// Long or short.
    pub direction: LegDirection,
    /// Ratio quantity.
    pub quantity: u32,
    /// Role within the strategy.
    pub role: LegRole,
}

impl CandidateLeg {
    /// Signed quantity (positive long, negative short).
    #[must_use]
    pub fn signed_quantity(&self) -> i64 {
        self.direction.sign() * i64::from(self.quantity)
    }

    /// Resolved premium per share; unpriced legs count zero.
    #[must_use]
    pub fn premium(&self) -> Decimal {
        self.resolution.mid.unwrap_or(Decimal::ZERO)
    }

    /// Short label such as `-95P` or `+110C`.
    #[must_use]
    pub fn short_label(&self) -> String {
        let sign = match self.direction {
            LegDirection::Long => '+',
            LegDirection::Short => '-',
        };
        let quantity = if self.quantity > 1 {
            self.quantity.to_string()
        } else {
            String::new()
        };
        format!(
            "{sign}{quantity}{}{}",
            self.leg.strike.normalize(),
            self.leg.right.code()
        )
    }
}

/// A multi-leg strategy proposal before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyCandidate {
    /// Strategy type.
    pub strategy: StrategyType,
    /// Underlying symbol.
    pub underlying: String,
    /// Common expiry.
    pub expiry: NaiveDate,
    /// Credit or debit.
    pub direction: Direction,
    /// Legs in construction order.
    pub legs: Vec<CandidateLeg>,
    /// Net premium per share (positive = credit received).
    pub net_premium: Decimal,
}

impl StrategyCandidate {
    /// Assemble a candidate and compute its net premium.
    #[must_use]
    pub fn new(
        strategy: StrategyType,
        underlying: impl Into<String>,
        expiry: NaiveDate,
        legs: Vec<CandidateLeg>,
    ) -> Self {
        let net_premium = legs
            .iter()
            .map(|leg| leg.premium() * Decimal::from(-leg.signed_quantity()))
            .sum();
        Self {
            strategy,
            underlying: underlying.into(),
            expiry,
            direction: strategy.direction(),
            legs,
            net_premium,
        }
    }

    /// Human-readable description, e.g. `iron_condor SPY 2026-01-30 -95P +90P -105C +110C`.
    #[must_use]
    pub fn describe(&self) -> String {
        let legs: Vec<String> = self.legs.iter().map(CandidateLeg::short_label).collect();
        format!(
            "{} {} {} {}",
            self.strategy,
            self.underlying,
            self.expiry,
            legs.join(" ")
        )
    }

    /// Contract multiplier (taken from the first leg).
    #[must_use]
    pub fn multiplier(&self) -> u32 {
        self.legs.first().map_or(100, |leg| leg.leg.multiplier)
    }

    /// Legs priced from fallback sources.
    #[must_use]
    pub fn fallback_count(&self) -> usize {
        self.legs
            .iter()
            .filter(|leg| leg.resolution.source.is_fallback())
            .count()
    }

    /// Legs whose quote is older than `threshold_secs`.
    #[must_use]
    pub fn stale_count(&self, threshold_secs: i64) -> usize {
        self.legs
            .iter()
            .filter(|leg| leg.resolution.is_stale(threshold_secs))
            .count()
    }

    /// Aggregate position greeks; legs without greeks contribute nothing.
    #[must_use]
    pub fn aggregate_greeks(&self) -> Greeks {
        aggregate_greeks(self.legs.iter().filter_map(|leg| {
            leg.resolution
                .greeks
                .as_ref()
                .map(|greeks| (greeks, leg.signed_quantity(), leg.leg.multiplier))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::OptionRight;
    use crate::pricing::{PriceSource, SpreadFlag};
    use rust_decimal_macros::dec;

    fn candidate_leg(
        strike: Decimal,
        right: OptionRight,
        direction: LegDirection,
        mid: Option<Decimal>,
        source: PriceSource,
    ) -> CandidateLeg {
        let expiry = NaiveDate::from_ymd_opt(2026, 1, 30).unwrap();
        let leg = Leg::new("SPY", expiry, strike, right);
        CandidateLeg {
            index: 0,
            resolution: Resolution {
                key: leg.key(),
                mid,
                source,
                reason: String::new(),
                spread_flag: SpreadFlag::Ok,
                quote_age_secs: None,
                days_to_expiry: 28,
                model_price: None,
                implied_vol: Some(0.2),
                greeks: Some(Greeks::new(
                    if right == OptionRight::Put { -0.2 } else { 0.2 },
                    0.01,
                    -0.02,
                    0.05,
                )),
            },
            leg,
            direction,
            quantity: 1,
            role: LegRole::Anchor,
        }
    }

    #[test]
    fn net_premium_is_positive_for_credit() {
        let legs = vec![
            candidate_leg(dec!(95), OptionRight::Put, LegDirection::Short, Some(dec!(1.20)), PriceSource::True),
            candidate_leg(dec!(90), OptionRight::Put, LegDirection::Long, Some(dec!(0.40)), PriceSource::Close),
        ];
        let candidate = StrategyCandidate::new(
            StrategyType::BullPutSpread,
            "SPY",
            NaiveDate::from_ymd_opt(2026, 1, 30).unwrap(),
            legs,
        );
        assert_eq!(candidate.net_premium, dec!(0.80));
        assert_eq!(candidate.fallback_count(), 1);
        assert_eq!(candidate.describe(), "bull_put_spread SPY 2026-01-30 -95P +90P");
    }

    #[test]
    fn aggregate_greeks_scale_by_signed_quantity_and_multiplier() {
        let legs = vec![
            candidate_leg(dec!(95), OptionRight::Put, LegDirection::Short, Some(dec!(1.20)), PriceSource::True),
            candidate_leg(dec!(90), OptionRight::Put, LegDirection::Long, Some(dec!(0.40)), PriceSource::True),
        ];
        let candidate = StrategyCandidate::new(
            StrategyType::BullPutSpread,
            "SPY",
            NaiveDate::from_ymd_opt(2026, 1, 30).unwrap(),
            legs,
        );
        // Equal per-contract greeks on opposite sides cancel.
        let greeks = candidate.aggregate_greeks();
        assert!(greeks.delta.abs() < 1e-12);
        assert!(greeks.vega.abs() < 1e-12);
    }
}
