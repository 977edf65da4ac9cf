//! Candidate generation.
//!
//! Each strategy type maps to one generator in a static registry. Generators
//! start from the filter's accepted anchors and pull complements and wings
//! from the full resolved chain at the anchor's expiry.

use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use tracing::debug;

use super::candidate::{CandidateLeg, LegRole, StrategyCandidate};
use super::types::{LegDirection, StrategyType};
use crate::chain::{ContractKey, OptionRight};
use crate::config::StrategyConfig;
use crate::pricing::PricedChain;
use crate::rejection::{RejectionCategory, RejectionRecord, RejectionStage};

/// Candidates and construction failures for one strategy.
#[derive(Debug, Clone, Default)]
pub struct BuildOutcome {
    /// Generated candidates, capped at `max_candidates`.
    pub candidates: Vec<StrategyCandidate>,
    /// Anchors that could not be completed.
    pub rejections: Vec<RejectionRecord>,
}

/// Shared view handed to generators.
struct BuildContext<'a> {
    strategy: StrategyType,
    chain: &'a PricedChain,
    config: &'a StrategyConfig,
    index: HashMap<ContractKey, usize>,
}

type Generator = fn(&BuildContext<'_>, &[usize], &mut BuildOutcome);

const REGISTRY: [(StrategyType, Generator); 8] = [
    (StrategyType::BullPutSpread, credit_vertical),
    (StrategyType::BearCallSpread, credit_vertical),
    (StrategyType::BullCallSpread, debit_vertical),
    (StrategyType::BearPutSpread, debit_vertical),
    (StrategyType::IronCondor, iron_condor),
    (StrategyType::IronButterfly, iron_butterfly),
    (StrategyType::ShortStrangle, short_strangle),
    (StrategyType::ShortStraddle, short_straddle),
];

fn generator(strategy: StrategyType) -> Option<Generator> {
    REGISTRY
        .iter()
        .find(|(registered, _)| *registered == strategy)
        .map(|(_, generator)| *generator)
}

/// Builds candidates for any registered strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateBuilder;

impl CandidateBuilder {
    /// Generate candidates from accepted anchor indices.
    #[must_use]
    pub fn build(
        strategy: StrategyType,
        chain: &PricedChain,
        config: &StrategyConfig,
        anchors: &[usize],
    ) -> BuildOutcome {
        let mut outcome = BuildOutcome::default();
        let Some(generate) = generator(strategy) else {
            return outcome;
        };
        let context = BuildContext {
            strategy,
            chain,
            config,
            index: chain.snapshot().index_by_key(),
        };
        generate(&context, anchors, &mut outcome);

        if outcome.candidates.len() > config.max_candidates {
            debug!(
                strategy = %strategy,
                generated = outcome.candidates.len(),
                cap = config.max_candidates,
                "Capping candidates"
            );
            outcome.candidates.truncate(config.max_candidates);
        }
        outcome
    }
}

impl BuildContext<'_> {
    fn leg(&self, index: usize, direction: LegDirection, role: LegRole) -> Option<CandidateLeg> {
        let (leg, resolution) = self.chain.get(index)?;
        Some(CandidateLeg {
            index,
            leg: leg.clone(),
            resolution: resolution.clone(),
            direction,
            quantity: 1,
            role,
        })
    }

    fn key(&self, index: usize) -> Option<ContractKey> {
        self.chain.get(index).map(|(leg, _)| leg.key())
    }

    fn lookup(&self, key: &ContractKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    fn delta(&self, index: usize) -> Option<f64> {
        self.chain.get(index).and_then(|(_, r)| r.delta())
    }

    /// Find `key` in the chain or record why the anchor could not be completed.
    fn require(
        &self,
        key: ContractKey,
        anchor: usize,
        what: &str,
        outcome: &mut BuildOutcome,
    ) -> Option<usize> {
        let found = self.lookup(&key);
        if found.is_none() {
            let subject = self
                .chain
                .get(anchor)
                .map_or_else(String::new, |(leg, _)| leg.label());
            outcome.rejections.push(
                RejectionRecord::new(
                    self.strategy,
                    RejectionStage::Build,
                    RejectionCategory::MissingData,
                    format!("no {what} {key} in chain"),
                )
                .with_subject(subject),
            );
        }
        found
    }

    fn push(&self, legs: Vec<Option<CandidateLeg>>, outcome: &mut BuildOutcome) {
        let Some(legs) = legs.into_iter().collect::<Option<Vec<_>>>() else {
            return;
        };
        let Some(first) = legs.first() else {
            return;
        };
        let candidate = StrategyCandidate::new(
            self.strategy,
            first.leg.underlying.clone(),
            first.leg.expiry,
            legs,
        );
        outcome.candidates.push(candidate);
    }

    fn anchors_of(&self, anchors: &[usize], right: OptionRight) -> Vec<usize> {
        anchors
            .iter()
            .copied()
            .filter(|i| self.key(*i).is_some_and(|k| k.right == right))
            .collect()
    }

    /// Accepted call with the closest |delta| above `put`'s strike.
    fn matched_call(&self, put: usize, calls: &[usize]) -> Option<(usize, f64)> {
        let put_key = self.key(put)?;
        let put_delta = self.delta(put)?.abs();
        calls
            .iter()
            .copied()
            .filter_map(|call| {
                let key = self.key(call)?;
                let gap = (self.delta(call)?.abs() - put_delta).abs();
                (key.expiry == put_key.expiry && key.strike > put_key.strike).then_some((call, gap))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

fn offset(key: ContractKey, right: OptionRight, strike: Decimal) -> ContractKey {
    ContractKey::new(key.expiry, strike, right)
}

/// Bull put: short anchor put, long put `width` below.
/// Bear call: short anchor call, long call `width` above.
fn credit_vertical(ctx: &BuildContext<'_>, anchors: &[usize], outcome: &mut BuildOutcome) {
    for &anchor in anchors {
        let Some(key) = ctx.key(anchor) else { continue };
        for &width in &ctx.config.widths {
            let wing_strike = match key.right {
                OptionRight::Put => key.strike - width,
                OptionRight::Call => key.strike + width,
            };
            let Some(wing) = ctx.require(offset(key, key.right, wing_strike), anchor, "wing", outcome)
            else {
                continue;
            };
            ctx.push(
                vec![
                    ctx.leg(anchor, LegDirection::Short, LegRole::Anchor),
                    ctx.leg(wing, LegDirection::Long, LegRole::Wing),
                ],
                outcome,
            );
        }
    }
}

/// Bull call: long anchor call, short call `width` above.
/// Bear put: long anchor put, short put `width` below.
fn debit_vertical(ctx: &BuildContext<'_>, anchors: &[usize], outcome: &mut BuildOutcome) {
    for &anchor in anchors {
        let Some(key) = ctx.key(anchor) else { continue };
        for &width in &ctx.config.widths {
            let short_strike = match key.right {
                OptionRight::Call => key.strike + width,
                OptionRight::Put => key.strike - width,
            };
            let Some(short) =
                ctx.require(offset(key, key.right, short_strike), anchor, "short leg", outcome)
            else {
                continue;
            };
            ctx.push(
                vec![
                    ctx.leg(anchor, LegDirection::Long, LegRole::Anchor),
                    ctx.leg(short, LegDirection::Short, LegRole::Complement),
                ],
                outcome,
            );
        }
    }
}

/// Short put anchor paired with the closest-delta short call anchor; both
/// wings `width` away.
fn iron_condor(ctx: &BuildContext<'_>, anchors: &[usize], outcome: &mut BuildOutcome) {
    let calls = ctx.anchors_of(anchors, OptionRight::Call);
    for put in ctx.anchors_of(anchors, OptionRight::Put) {
        let Some((call, _)) = ctx.matched_call(put, &calls) else {
            invalid_shape(ctx, put, "no short call above the short put", outcome);
            continue;
        };
        let (Some(put_key), Some(call_key)) = (ctx.key(put), ctx.key(call)) else {
            continue;
        };
        for &width in &ctx.config.widths {
            let long_put = ctx.require(
                offset(put_key, OptionRight::Put, put_key.strike - width),
                put,
                "long put",
                outcome,
            );
            let long_call = ctx.require(
                offset(call_key, OptionRight::Call, call_key.strike + width),
                call,
                "long call",
                outcome,
            );
            let (Some(long_put), Some(long_call)) = (long_put, long_call) else {
                continue;
            };
            ctx.push(
                vec![
                    ctx.leg(put, LegDirection::Short, LegRole::Anchor),
                    ctx.leg(long_put, LegDirection::Long, LegRole::Wing),
                    ctx.leg(call, LegDirection::Short, LegRole::Anchor),
                    ctx.leg(long_call, LegDirection::Long, LegRole::Wing),
                ],
                outcome,
            );
        }
    }
}

/// Short put and call at each anchor strike, wings `width` away.
fn iron_butterfly(ctx: &BuildContext<'_>, anchors: &[usize], outcome: &mut BuildOutcome) {
    for (anchor, center) in anchor_strikes(ctx, anchors) {
        let Some((short_put, short_call)) = straddle_pair(ctx, anchor, center, outcome) else {
            continue;
        };
        for &width in &ctx.config.widths {
            let long_put = ctx.require(
                offset(center, OptionRight::Put, center.strike - width),
                anchor,
                "long put",
                outcome,
            );
            let long_call = ctx.require(
                offset(center, OptionRight::Call, center.strike + width),
                anchor,
                "long call",
                outcome,
            );
            let (Some(long_put), Some(long_call)) = (long_put, long_call) else {
                continue;
            };
            ctx.push(
                vec![
                    ctx.leg(short_put, LegDirection::Short, role_of(short_put, anchor)),
                    ctx.leg(long_put, LegDirection::Long, LegRole::Wing),
                    ctx.leg(short_call, LegDirection::Short, role_of(short_call, anchor)),
                    ctx.leg(long_call, LegDirection::Long, LegRole::Wing),
                ],
                outcome,
            );
        }
    }
}

/// Short put anchor with the accepted call whose delta matches within `max_delta_gap`.
fn short_strangle(ctx: &BuildContext<'_>, anchors: &[usize], outcome: &mut BuildOutcome) {
    let calls = ctx.anchors_of(anchors, OptionRight::Call);
    for put in ctx.anchors_of(anchors, OptionRight::Put) {
        match ctx.matched_call(put, &calls) {
            Some((call, gap)) if gap <= ctx.config.max_delta_gap => ctx.push(
                vec![
                    ctx.leg(put, LegDirection::Short, LegRole::Anchor),
                    ctx.leg(call, LegDirection::Short, LegRole::Anchor),
                ],
                outcome,
            ),
            Some((_, gap)) => invalid_shape(
                ctx,
                put,
                &format!(
                    "closest call delta gap {gap:.3} exceeds {}",
                    ctx.config.max_delta_gap
                ),
                outcome,
            ),
            None => invalid_shape(ctx, put, "no short call above the short put", outcome),
        }
    }
}

/// Short put and call at each anchor strike.
fn short_straddle(ctx: &BuildContext<'_>, anchors: &[usize], outcome: &mut BuildOutcome) {
    for (anchor, center) in anchor_strikes(ctx, anchors) {
        let Some((put, call)) = straddle_pair(ctx, anchor, center, outcome) else {
            continue;
        };
        ctx.push(
            vec![
                ctx.leg(put, LegDirection::Short, role_of(put, anchor)),
                ctx.leg(call, LegDirection::Short, role_of(call, anchor)),
            ],
            outcome,
        );
    }
}

/// First anchor index for each distinct (expiry, strike).
fn anchor_strikes(ctx: &BuildContext<'_>, anchors: &[usize]) -> Vec<(usize, ContractKey)> {
    let mut seen = BTreeSet::new();
    anchors
        .iter()
        .filter_map(|&i| ctx.key(i).map(|k| (i, k)))
        .filter(|(_, k)| seen.insert((k.expiry, k.strike)))
        .collect()
}

fn straddle_pair(
    ctx: &BuildContext<'_>,
    anchor: usize,
    center: ContractKey,
    outcome: &mut BuildOutcome,
) -> Option<(usize, usize)> {
    let (put, call) = match center.right {
        OptionRight::Put => (
            anchor,
            ctx.require(center.counterpart(), anchor, "short call", outcome)?,
        ),
        OptionRight::Call => (
            ctx.require(center.counterpart(), anchor, "short put", outcome)?,
            anchor,
        ),
    };
    Some((put, call))
}

fn role_of(index: usize, anchor: usize) -> LegRole {
    if index == anchor {
        LegRole::Anchor
    } else {
        LegRole::Complement
    }
}

fn invalid_shape(ctx: &BuildContext<'_>, anchor: usize, reason: &str, outcome: &mut BuildOutcome) {
    let subject = ctx
        .chain
        .get(anchor)
        .map_or_else(String::new, |(leg, _)| leg.label());
    outcome.rejections.push(
        RejectionRecord::new(
            ctx.strategy,
            RejectionStage::Build,
            RejectionCategory::InvalidShape,
            reason,
        )
        .with_subject(subject),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainSnapshot, Leg};
    use crate::config::ResolverConfig;
    use crate::options::Greeks;
    use crate::pricing::PriceResolver;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 30).unwrap()
    }

    fn leg(strike: Decimal, right: OptionRight, delta: f64) -> Leg {
        Leg::new("SPY", expiry(), strike, right)
            .with_quote(dec!(1.00), dec!(1.10))
            .with_greeks(Greeks::new(delta, 0.02, -0.03, 0.07))
    }

    /// Puts 85..100 and calls 100..115 in $5 steps.
    fn chain() -> PricedChain {
        let legs = vec![
            leg(dec!(85), OptionRight::Put, -0.05),
            leg(dec!(90), OptionRight::Put, -0.12),
            leg(dec!(95), OptionRight::Put, -0.22),
            leg(dec!(100), OptionRight::Put, -0.48),
            leg(dec!(100), OptionRight::Call, 0.52),
            leg(dec!(105), OptionRight::Call, 0.21),
            leg(dec!(110), OptionRight::Call, 0.10),
            leg(dec!(115), OptionRight::Call, 0.04),
        ];
        let snapshot = ChainSnapshot::new(
            "SPY",
            dec!(100),
            0.04,
            Utc.with_ymd_and_hms(2026, 1, 2, 15, 0, 0).unwrap(),
            legs,
        );
        PricedChain::resolve(snapshot, &PriceResolver::new(ResolverConfig::default()))
    }

    fn build(strategy: StrategyType, anchors: &[usize]) -> BuildOutcome {
        CandidateBuilder::build(strategy, &chain(), &StrategyConfig::default(), anchors)
    }

    #[test]
    fn registry_covers_every_strategy() {
        for strategy in StrategyType::ALL {
            assert!(generator(strategy).is_some(), "{strategy} not registered");
        }
    }

    #[test]
    fn bull_put_spread_adds_lower_wing() {
        let outcome = build(StrategyType::BullPutSpread, &[2]);
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(
            outcome.candidates[0].describe(),
            "bull_put_spread SPY 2026-01-30 -95P +90P"
        );
    }

    #[test]
    fn missing_wing_is_recorded() {
        let outcome = build(StrategyType::BullPutSpread, &[0]);
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.rejections[0].stage, RejectionStage::Build);
        assert_eq!(outcome.rejections[0].category, RejectionCategory::MissingData);
    }

    #[test]
    fn bull_call_spread_sells_higher_strike() {
        let outcome = build(StrategyType::BullCallSpread, &[4]);
        assert_eq!(
            outcome.candidates[0].describe(),
            "bull_call_spread SPY 2026-01-30 +100C -105C"
        );
    }

    #[test]
    fn iron_condor_pairs_matched_deltas_with_symmetric_wings() {
        let outcome = build(StrategyType::IronCondor, &[2, 5, 6]);
        assert_eq!(outcome.candidates.len(), 1);
        let condor = &outcome.candidates[0];
        assert_eq!(
            condor.describe(),
            "iron_condor SPY 2026-01-30 -95P +90P -105C +110C"
        );
        assert_eq!(condor.legs.iter().filter(|l| l.role == LegRole::Wing).count(), 2);
    }

    #[test]
    fn iron_butterfly_shares_center_strike() {
        let outcome = build(StrategyType::IronButterfly, &[3, 4]);
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(
            outcome.candidates[0].describe(),
            "iron_butterfly SPY 2026-01-30 -100P +95P -100C +105C"
        );
    }

    #[test]
    fn strangle_requires_matched_delta() {
        let matched = build(StrategyType::ShortStrangle, &[2, 5]);
        assert_eq!(matched.candidates.len(), 1);

        let unmatched = build(StrategyType::ShortStrangle, &[1, 5]);
        assert!(unmatched.candidates.is_empty());
        assert_eq!(unmatched.rejections[0].category, RejectionCategory::InvalidShape);
    }

    #[test]
    fn straddle_uses_counterpart_at_same_strike() {
        let outcome = build(StrategyType::ShortStraddle, &[4]);
        assert_eq!(
            outcome.candidates[0].describe(),
            "short_straddle SPY 2026-01-30 -100P -100C"
        );
        assert_eq!(outcome.candidates[0].legs[0].role, LegRole::Complement);
    }

    #[test]
    fn generation_is_capped() {
        let config = StrategyConfig {
            widths: vec![dec!(5), dec!(10)],
            max_candidates: 1,
            ..StrategyConfig::default()
        };
        let outcome =
            CandidateBuilder::build(StrategyType::BullPutSpread, &chain(), &config, &[2, 3]);
        assert_eq!(outcome.candidates.len(), 1);
    }
}
