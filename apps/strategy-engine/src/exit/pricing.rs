//! Stage limit prices.
//!
//! Net prices are signed: buy-to-close legs add, sell-to-close legs subtract,
//! so a positive net is a debit paid to close. Raising the net is always the
//! more aggressive direction.

use rust_decimal::Decimal;

use super::attempt::{ExcludedLeg, ExitStage};
use super::intent::ExitIntent;
use crate::application::ports::ExitSide;
use crate::chain::{ChainSnapshot, Leg};
use crate::error::{MissingDataError, QuoteStaleError};
use crate::pricing::{PriceResolver, PriceSource};

/// Cents.
const LIMIT_SCALE: u32 = 2;

/// Live pricing of an intent for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePricing {
    /// Signed net at resolved mids.
    pub mid_net: Decimal,
    /// Signed net at the natural side (ask to buy, bid to sell).
    pub natural_net: Decimal,
    /// Legs that contributed a price.
    pub priced_legs: usize,
    /// Legs left out, with reasons.
    pub excluded: Vec<ExcludedLeg>,
    /// Excluded buy-to-close legs. Netting without them understates the debit.
    pub unpriced_buys: usize,
}

impl StagePricing {
    /// Price the intent's legs from a live snapshot.
    ///
    /// Legs missing from the snapshot, older than the policy threshold, or
    /// unresolvable are excluded and contribute nothing. Excluding a
    /// buy-to-close leg makes the whole stage unpriceable.
    #[must_use]
    pub fn from_snapshot(
        intent: &ExitIntent,
        snapshot: &ChainSnapshot,
        resolver: &PriceResolver,
    ) -> Self {
        let threshold = intent.policy.quote_age_threshold_secs;
        let mut excluded = Vec::new();
        let mut unpriced_buys = 0;
        let mut fresh: Vec<(&Leg, ExitSide, u32)> = Vec::with_capacity(intent.legs.len());

        for order_leg in &intent.legs {
            let is_buy = order_leg.side == ExitSide::BuyToClose;
            let Some(live) = snapshot.legs.iter().find(|l| l.key() == order_leg.key) else {
                excluded.push(ExcludedLeg {
                    key: order_leg.key,
                    reason: MissingDataError::new(order_leg.key.to_string(), "no live quote")
                        .to_string(),
                });
                unpriced_buys += usize::from(is_buy);
                continue;
            };
            if let Some(age_secs) = live.quote_age_secs(snapshot.as_of)
                && age_secs > threshold
            {
                excluded.push(ExcludedLeg {
                    key: order_leg.key,
                    reason: QuoteStaleError {
                        subject: live.label(),
                        age_secs,
                        threshold_secs: threshold,
                    }
                    .to_string(),
                });
                unpriced_buys += usize::from(is_buy);
                continue;
            }
            fresh.push((live, order_leg.side, order_leg.quantity));
        }

        let legs: Vec<Leg> = fresh.iter().map(|(leg, _, _)| (*leg).clone()).collect();
        let resolutions =
            resolver.resolve_legs(&legs, snapshot.spot, snapshot.interest_rate, snapshot.as_of);

        let mut mid_net = Decimal::ZERO;
        let mut natural_net = Decimal::ZERO;
        let mut priced_legs = 0;
        for ((leg, side, quantity), resolution) in fresh.iter().zip(&resolutions) {
            let Some(mid) = resolution.mid else {
                excluded.push(ExcludedLeg {
                    key: leg.key(),
                    reason: MissingDataError::new(leg.label(), resolution.reason.clone())
                        .to_string(),
                });
                unpriced_buys += usize::from(*side == ExitSide::BuyToClose);
                continue;
            };
            let natural = if resolution.source == PriceSource::True {
                match side {
                    ExitSide::BuyToClose => leg.ask.unwrap_or(mid),
                    ExitSide::SellToClose => leg.bid.unwrap_or(mid),
                }
            } else {
                mid
            };
            let weight = Decimal::from(side.sign() * i64::from(*quantity));
            mid_net += mid * weight;
            natural_net += natural * weight;
            priced_legs += 1;
        }

        Self {
            mid_net,
            natural_net,
            priced_legs,
            excluded,
            unpriced_buys,
        }
    }

    /// Whether the net covers every leg that costs money to close.
    #[must_use]
    pub const fn is_priceable(&self) -> bool {
        self.priced_legs > 0 && self.unpriced_buys == 0
    }

    /// Why a stage cannot be priced.
    #[must_use]
    pub fn skip_reason(&self) -> String {
        if self.unpriced_buys > 0 {
            format!("{} buy-to-close leg(s) unpriced", self.unpriced_buys)
        } else {
            "no priceable legs".to_string()
        }
    }

    /// Limit for a priced stage; `None` for force.
    #[must_use]
    pub fn limit_for(&self, stage: ExitStage, intent: &ExitIntent) -> Option<Decimal> {
        let policy = &intent.policy;
        let limit = match stage {
            ExitStage::Primary => self.mid_net,
            ExitStage::Ladder(step) => self.mid_net + policy.ladder_step * Decimal::from(step),
            ExitStage::Fallback => {
                let past_ladder = self.mid_net
                    + policy.ladder_step * Decimal::from(policy.effective_ladder_steps() + 1);
                (self.natural_net + policy.fallback_slippage).max(past_ladder)
            }
            ExitStage::Force => return None,
        };
        Some(limit.round_dp(LIMIT_SCALE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ContractKey, OptionRight};
    use crate::config::ExitPolicy;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 30).unwrap()
    }

    fn key(strike: Decimal) -> ContractKey {
        ContractKey::new(expiry(), strike, OptionRight::Put)
    }

    fn intent() -> ExitIntent {
        ExitIntent::new("pos-1", "SPY", ExitPolicy::default())
            .with_leg(key(dec!(95)), ExitSide::BuyToClose, 1)
            .with_leg(key(dec!(90)), ExitSide::SellToClose, 1)
    }

    fn snapshot(age_secs: i64) -> ChainSnapshot {
        snapshot_aged(age_secs, age_secs)
    }

    fn snapshot_aged(short_age_secs: i64, long_age_secs: i64) -> ChainSnapshot {
        let as_of = Utc.with_ymd_and_hms(2026, 1, 2, 15, 0, 0).unwrap();
        ChainSnapshot::new(
            "SPY",
            dec!(100),
            0.04,
            as_of,
            vec![
                Leg::new("SPY", expiry(), dec!(95), OptionRight::Put)
                    .with_quote(dec!(1.00), dec!(1.10))
                    .with_quoted_at(as_of - Duration::seconds(short_age_secs)),
                Leg::new("SPY", expiry(), dec!(90), OptionRight::Put)
                    .with_quote(dec!(0.30), dec!(0.40))
                    .with_quoted_at(as_of - Duration::seconds(long_age_secs)),
            ],
        )
    }

    #[test]
    fn nets_buys_against_sells() {
        let pricing = StagePricing::from_snapshot(&intent(), &snapshot(1), &PriceResolver::default());
        assert_eq!(pricing.mid_net, dec!(0.70));
        assert_eq!(pricing.natural_net, dec!(0.80));
        assert_eq!(pricing.priced_legs, 2);
        assert!(pricing.excluded.is_empty());
    }

    #[test]
    fn stale_legs_are_excluded() {
        let pricing =
            StagePricing::from_snapshot(&intent(), &snapshot(10), &PriceResolver::default());
        assert!(!pricing.is_priceable());
        assert_eq!(pricing.excluded.len(), 2);
        assert!(pricing.excluded[0].reason.contains("Stale quote"));
    }

    #[test]
    fn stale_short_leg_makes_stage_unpriceable() {
        // only the long 90P would be netted, flipping the close into a credit
        let pricing =
            StagePricing::from_snapshot(&intent(), &snapshot_aged(10, 1), &PriceResolver::default());
        assert_eq!(pricing.priced_legs, 1);
        assert_eq!(pricing.unpriced_buys, 1);
        assert!(pricing.mid_net < Decimal::ZERO);
        assert!(!pricing.is_priceable());
        assert_eq!(pricing.skip_reason(), "1 buy-to-close leg(s) unpriced");
    }

    #[test]
    fn stale_long_leg_only_raises_the_debit() {
        let pricing =
            StagePricing::from_snapshot(&intent(), &snapshot_aged(1, 10), &PriceResolver::default());
        assert!(pricing.is_priceable());
        assert_eq!(pricing.mid_net, dec!(1.05));
        assert_eq!(pricing.excluded.len(), 1);
    }

    #[test]
    fn stage_limits_escalate() {
        let intent = intent();
        let pricing = StagePricing::from_snapshot(&intent, &snapshot(1), &PriceResolver::default());
        let primary = pricing.limit_for(ExitStage::Primary, &intent).unwrap();
        let ladder = pricing.limit_for(ExitStage::Ladder(2), &intent).unwrap();
        let fallback = pricing.limit_for(ExitStage::Fallback, &intent).unwrap();
        assert_eq!(primary, dec!(0.70));
        assert_eq!(ladder, dec!(0.80));
        // natural 0.80 + 0.10 slippage, and mid + 4 steps, both 0.90
        assert_eq!(fallback, dec!(0.90));
        assert!(primary < ladder && ladder < fallback);
        assert_eq!(pricing.limit_for(ExitStage::Force, &intent), None);
    }
}
