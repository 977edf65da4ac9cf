//! Ordered, short-circuiting strike filter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::metrics::LegMetrics;
use super::stage::FilterStage;
use crate::chain::Leg;
use crate::config::FilterConfig;
use crate::error::MissingDataError;
use crate::pricing::{PricedChain, Resolution};
use crate::rejection::{RejectionCategory, RejectionRecord, RejectionStage};
use crate::rules::{Rule, RuleError};
use crate::strategy::StrategyType;

/// Why a strategy had no surviving strikes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeroSurvivorReport {
    /// Strategy evaluated.
    pub strategy: StrategyType,
    /// Legs of an eligible right that entered the filter.
    pub evaluated: usize,
    /// Active thresholds as `(name, value)`.
    pub thresholds: Vec<(String, String)>,
    /// Rejections per stage.
    pub stage_counts: BTreeMap<String, usize>,
}

/// Result of one filter pass.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Chain indices of accepted anchor legs, in chain order.
    pub accepted: Vec<usize>,
    /// One record per rejected leg.
    pub rejections: Vec<RejectionRecord>,
    /// Legs that entered the filter.
    pub evaluated: usize,
    /// Present when nothing was accepted.
    pub zero_survivors: Option<ZeroSurvivorReport>,
}

type StageResult = Result<(), (FilterStage, RejectionCategory, String)>;

/// Strike filter for one strategy.
#[derive(Debug, Clone, Copy)]
pub struct StrikeFilter<'a> {
    strategy: StrategyType,
    config: &'a FilterConfig,
}

impl<'a> StrikeFilter<'a> {
    /// Create a filter.
    #[must_use]
    pub const fn new(strategy: StrategyType, config: &'a FilterConfig) -> Self {
        Self { strategy, config }
    }

    /// Select anchor legs from `chain`.
    #[must_use]
    pub fn select(&self, chain: &PricedChain) -> FilterOutcome {
        let rights = self.strategy.anchor_rights();
        let mut outcome = FilterOutcome::default();

        for (index, leg, resolution) in chain.iter() {
            if !rights.contains(&leg.right) {
                continue;
            }
            outcome.evaluated += 1;

            match self.check(chain, leg, resolution) {
                Ok(()) => outcome.accepted.push(index),
                Err((stage, category, reason)) => outcome.rejections.push(
                    RejectionRecord::new(
                        self.strategy,
                        RejectionStage::Filter(stage),
                        category,
                        reason,
                    )
                    .with_subject(leg.label()),
                ),
            }
        }

        if outcome.accepted.is_empty() {
            let report = self.zero_survivor_report(&outcome);
            warn!(
                strategy = %self.strategy,
                evaluated = report.evaluated,
                thresholds = ?report.thresholds,
                stage_counts = ?report.stage_counts,
                "No strikes survived filtering"
            );
            outcome.zero_survivors = Some(report);
        } else {
            debug!(
                strategy = %self.strategy,
                evaluated = outcome.evaluated,
                accepted = outcome.accepted.len(),
                "Strike filter complete"
            );
        }

        outcome
    }

    fn check(&self, chain: &PricedChain, leg: &Leg, resolution: &Resolution) -> StageResult {
        let config = self.config;

        let dte = resolution.days_to_expiry;
        if dte < config.min_dte || dte > config.max_dte {
            return Err((
                FilterStage::Dte,
                RejectionCategory::OutOfRange,
                format!("dte {dte} outside {}..={}", config.min_dte, config.max_dte),
            ));
        }
        if !resolution.is_priced() {
            return Err(missing(
                FilterStage::Priced,
                leg,
                format!("unpriced ({})", resolution.reason),
            ));
        }

        let metrics = LegMetrics::compute(
            chain,
            leg,
            resolution,
            self.strategy.anchor_direction(),
            config.stop_loss_multiple,
        );

        let abs_delta = metrics
            .delta
            .map(f64::abs)
            .ok_or_else(|| missing(FilterStage::Delta, leg, "no delta"))?;
        if abs_delta < config.delta_min || abs_delta > config.delta_max {
            return Err((
                FilterStage::Delta,
                RejectionCategory::Delta,
                format!(
                    "|delta| {abs_delta:.3} outside {}..={}",
                    config.delta_min, config.delta_max
                ),
            ));
        }

        floor(FilterStage::Rom, RejectionCategory::Rom, leg, "rom", metrics.rom, config.min_rom)?;
        floor(FilterStage::Edge, RejectionCategory::Edge, leg, "edge", metrics.edge, config.min_edge)?;
        floor(FilterStage::Pos, RejectionCategory::Pos, leg, "pos", metrics.pos, config.min_pos)?;
        floor(FilterStage::Ev, RejectionCategory::Ev, leg, "ev", metrics.ev, config.min_ev)?;

        if let Some(max_skew) = config.max_skew {
            let skew = metrics
                .skew
                .ok_or_else(|| missing(FilterStage::Skew, leg, "no iv for skew"))?;
            if skew > max_skew {
                return Err((
                    FilterStage::Skew,
                    RejectionCategory::Skew,
                    format!("skew {skew:.4} above {max_skew}"),
                ));
            }
        }

        // Unavailable term-structure data passes.
        if let Some(rule) = &config.term_structure {
            match rule.evaluate(&metrics) {
                Ok(true) | Err(RuleError::MissingMetric { .. }) => {}
                Ok(false) => {
                    return Err((
                        FilterStage::TermStructure,
                        RejectionCategory::TermStructure,
                        format!("term structure condition '{rule}' failed"),
                    ));
                }
                Err(err) => return Err(rule_error(FilterStage::TermStructure, rule, &err)),
            }
        }

        cap(FilterStage::Gamma, leg, "gamma", metrics.gamma, config.max_gamma)?;
        cap(FilterStage::Vega, leg, "vega", metrics.vega, config.max_vega)?;
        cap(FilterStage::Theta, leg, "theta", metrics.theta, config.max_theta)?;

        if let Some(rule) = &config.custom {
            match rule.evaluate(&metrics) {
                Ok(true) => {}
                Ok(false) => {
                    return Err((
                        FilterStage::Custom,
                        RejectionCategory::CustomRule,
                        format!("custom rule '{rule}' failed"),
                    ));
                }
                Err(RuleError::MissingMetric { metric }) => {
                    return Err(missing(
                        FilterStage::Custom,
                        leg,
                        format!("{metric} unavailable for custom rule"),
                    ));
                }
                Err(err) => return Err(rule_error(FilterStage::Custom, rule, &err)),
            }
        }

        Ok(())
    }

    fn zero_survivor_report(&self, outcome: &FilterOutcome) -> ZeroSurvivorReport {
        let mut stage_counts = BTreeMap::new();
        for record in &outcome.rejections {
            if let RejectionStage::Filter(stage) = record.stage {
                *stage_counts.entry(stage.as_str().to_string()).or_default() += 1;
            }
        }
        ZeroSurvivorReport {
            strategy: self.strategy,
            evaluated: outcome.evaluated,
            thresholds: self.config.active_thresholds(),
            stage_counts,
        }
    }
}

fn missing(
    stage: FilterStage,
    leg: &Leg,
    detail: impl Into<String>,
) -> (FilterStage, RejectionCategory, String) {
    let err = MissingDataError::new(leg.label(), detail);
    (stage, RejectionCategory::MissingData, err.to_string())
}

fn rule_error(
    stage: FilterStage,
    rule: &Rule,
    err: &RuleError,
) -> (FilterStage, RejectionCategory, String) {
    let category = match stage {
        FilterStage::TermStructure => RejectionCategory::TermStructure,
        _ => RejectionCategory::CustomRule,
    };
    (stage, category, format!("rule '{rule}': {err}"))
}

fn floor(
    stage: FilterStage,
    category: RejectionCategory,
    leg: &Leg,
    name: &str,
    value: Option<f64>,
    min: Option<f64>,
) -> StageResult {
    let Some(min) = min else {
        return Ok(());
    };
    let value = value.ok_or_else(|| missing(stage, leg, format!("{name} unavailable")))?;
    if value < min {
        return Err((stage, category, format!("{name} {value:.4} below {min}")));
    }
    Ok(())
}

fn cap(stage: FilterStage, leg: &Leg, name: &str, value: Option<f64>, max: Option<f64>) -> StageResult {
    let Some(max) = max else {
        return Ok(());
    };
    let value = value
        .map(f64::abs)
        .ok_or_else(|| missing(stage, leg, format!("{name} unavailable")))?;
    if value > max {
        return Err((
            stage,
            RejectionCategory::GreekLimit,
            format!("|{name}| {value:.4} above {max}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainSnapshot, OptionRight};
    use crate::config::ResolverConfig;
    use crate::options::Greeks;
    use crate::pricing::PriceResolver;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn near() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 30).unwrap()
    }

    fn put(strike: Decimal, delta: f64) -> Leg {
        Leg::new("SPY", near(), strike, OptionRight::Put)
            .with_quote(dec!(1.00), dec!(1.10))
            .with_model_price(dec!(1.00))
            .with_iv(0.25)
            .with_greeks(Greeks::new(delta, 0.02, -0.03, 0.07))
            .with_liquidity(100, 500)
    }

    fn chain(legs: Vec<Leg>) -> PricedChain {
        let snapshot = ChainSnapshot::new(
            "SPY",
            dec!(100),
            0.04,
            Utc.with_ymd_and_hms(2026, 1, 2, 15, 0, 0).unwrap(),
            legs,
        );
        PricedChain::resolve(snapshot, &PriceResolver::new(ResolverConfig::default()))
    }

    #[test]
    fn delta_band_selects_anchors() {
        let chain = chain(vec![
            put(dec!(90), -0.05),
            put(dec!(95), -0.20),
            put(dec!(100), -0.50),
        ]);
        let config = FilterConfig::default();
        let outcome = StrikeFilter::new(StrategyType::BullPutSpread, &config).select(&chain);

        assert_eq!(outcome.accepted, vec![1]);
        assert_eq!(outcome.rejections.len(), 2);
        assert!(
            outcome
                .rejections
                .iter()
                .all(|r| r.category == RejectionCategory::Delta)
        );
        assert!(outcome.zero_survivors.is_none());
    }

    #[test]
    fn wrong_right_is_not_evaluated() {
        let call = Leg::new("SPY", near(), dec!(105), OptionRight::Call)
            .with_quote(dec!(1.00), dec!(1.10))
            .with_greeks(Greeks::new(0.2, 0.02, -0.03, 0.07));
        let chain = chain(vec![put(dec!(95), -0.20), call]);
        let config = FilterConfig::default();
        let outcome = StrikeFilter::new(StrategyType::BullPutSpread, &config).select(&chain);
        assert_eq!(outcome.evaluated, 1);
        assert_eq!(outcome.accepted, vec![0]);
    }

    #[test]
    fn first_failing_stage_wins() {
        // Fails the delta band and the ROM floor; delta comes first.
        let chain = chain(vec![put(dec!(90), -0.05)]);
        let config = FilterConfig {
            min_rom: Some(50.0),
            ..FilterConfig::default()
        };
        let outcome = StrikeFilter::new(StrategyType::BullPutSpread, &config).select(&chain);
        assert_eq!(
            outcome.rejections[0].stage,
            RejectionStage::Filter(FilterStage::Delta)
        );
    }

    #[test]
    fn unpriced_legs_are_missing_data() {
        let unpriced = Leg::new("SPY", near(), dec!(95), OptionRight::Put);
        let chain = chain(vec![unpriced]);
        let config = FilterConfig::default();
        let outcome = StrikeFilter::new(StrategyType::BullPutSpread, &config).select(&chain);
        assert_eq!(outcome.rejections[0].category, RejectionCategory::MissingData);
        assert_eq!(
            outcome.rejections[0].stage,
            RejectionStage::Filter(FilterStage::Priced)
        );
    }

    #[test]
    fn dte_window_rejects_out_of_range() {
        let chain = chain(vec![put(dec!(95), -0.20)]);
        let config = FilterConfig::default().with_dte(45, 60);
        let outcome = StrikeFilter::new(StrategyType::BullPutSpread, &config).select(&chain);
        assert_eq!(outcome.rejections[0].category, RejectionCategory::OutOfRange);
    }

    #[test]
    fn term_structure_passes_without_data_and_custom_rule_applies() {
        let chain = chain(vec![put(dec!(95), -0.20), put(dec!(96), -0.22)]);
        let config = FilterConfig {
            term_structure: Some("term_slope >= 0".parse().unwrap()),
            custom: Some("moneyness < 0.955".parse().unwrap()),
            ..FilterConfig::default()
        };
        let outcome = StrikeFilter::new(StrategyType::BullPutSpread, &config).select(&chain);
        assert_eq!(outcome.accepted, vec![0]);
        assert_eq!(outcome.rejections[0].category, RejectionCategory::CustomRule);
    }

    #[test]
    fn greek_caps_compare_absolute_values() {
        let chain = chain(vec![put(dec!(95), -0.20)]);
        let config = FilterConfig {
            max_theta: Some(0.01),
            ..FilterConfig::default()
        };
        let outcome = StrikeFilter::new(StrategyType::BullPutSpread, &config).select(&chain);
        assert_eq!(outcome.rejections[0].category, RejectionCategory::GreekLimit);
        assert_eq!(
            outcome.rejections[0].stage,
            RejectionStage::Filter(FilterStage::Theta)
        );
    }

    #[test]
    fn zero_survivors_report_thresholds_and_counts() {
        let chain = chain(vec![put(dec!(90), -0.05), put(dec!(85), -0.02)]);
        let config = FilterConfig {
            min_pos: Some(0.6),
            ..FilterConfig::default()
        };
        let outcome = StrikeFilter::new(StrategyType::BullPutSpread, &config).select(&chain);
        let report = outcome.zero_survivors.unwrap();
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.stage_counts["delta"], 2);
        assert!(report.thresholds.iter().any(|(name, _)| name == "min_pos"));
    }
}
