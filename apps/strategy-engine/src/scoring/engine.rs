//! Scoring engine.
//!
//! Gates run in [`ScoringGate::ORDER`]; the first failure rejects the
//! candidate. Survivors get dollar-denominated metrics and a ranking score
//! (expected value per dollar of margin, in percent).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::gate::ScoringGate;
use super::risk::{ProfitZone, RiskProfile};
use crate::config::StrategyConfig;
use crate::error::{MissingDataError, ValidationError};
use crate::options::Greeks;
use crate::pricing::{PricedChain, to_f64};
use crate::rejection::{RejectionCategory, RejectionRecord, RejectionStage};
use crate::strategy::{CandidateLeg, Direction, LegDirection, LegRole, StrategyCandidate};

/// Metrics of an accepted candidate, in dollars per strategy unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMetrics {
    /// Net premium (positive = credit).
    pub net_premium: Decimal,
    /// Margin basis.
    pub margin: Decimal,
    /// Best-case profit.
    pub max_profit: Decimal,
    /// Worst-case loss.
    pub max_loss: Decimal,
    /// Breakeven prices.
    pub breakevens: Vec<Decimal>,
    /// Return on margin, percent.
    pub rom: f64,
    /// Probability of finishing in the profit zone.
    pub pos: f64,
    /// Expected value.
    pub ev: f64,
    /// max_profit / |max_loss|.
    pub risk_reward: f64,
    /// Volatility used for the PoS estimate.
    pub sigma: f64,
    /// Position greeks.
    pub greeks: Greeks,
    /// Legs priced from fallback sources.
    pub fallback_legs: usize,
    /// Legs with stale quotes.
    pub stale_legs: usize,
    /// Stale quotes present.
    pub low_confidence: bool,
}

/// A candidate that passed every gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// The candidate.
    pub candidate: StrategyCandidate,
    /// Computed metrics.
    pub metrics: ScoredMetrics,
    /// Ranking score (EV / margin * 100).
    pub score: f64,
}

/// Scores candidates drawn from one resolved chain.
#[derive(Debug, Clone, Copy)]
pub struct ScoringEngine<'a> {
    chain: &'a PricedChain,
    stale_quote_secs: i64,
}

type GateResult<T> = Result<T, RejectionRecord>;

impl<'a> ScoringEngine<'a> {
    /// Create an engine over `chain`; quotes older than `stale_quote_secs` lower confidence.
    #[must_use]
    pub const fn new(chain: &'a PricedChain, stale_quote_secs: i64) -> Self {
        Self {
            chain,
            stale_quote_secs,
        }
    }

    /// Score a candidate or explain why it was rejected.
    pub fn score(
        &self,
        candidate: &StrategyCandidate,
        config: &StrategyConfig,
    ) -> GateResult<ScoredCandidate> {
        let strategy = candidate.strategy;
        let subject = candidate.describe();
        let reject = |gate: ScoringGate, err: ValidationError| {
            RejectionRecord::validation(strategy, gate, &err, subject.clone())
        };

        // Ahead of completeness: close-sourced legs carry no model price.
        let fallback_legs = candidate.fallback_count();
        let cap = config.fallback_cap(candidate.legs.len());
        if fallback_legs > cap {
            return Err(reject(
                ScoringGate::FallbackQuota,
                ValidationError::FallbackQuota {
                    count: fallback_legs,
                    cap,
                },
            ));
        }

        self.check_completeness(candidate, config)?;

        if let Some(err) = candidate
            .legs
            .iter()
            .find_map(|leg| liquidity(leg, config))
        {
            return Err(reject(ScoringGate::Liquidity, err));
        }

        if candidate.direction == Direction::Credit && candidate.net_premium <= Decimal::ZERO {
            return Err(reject(
                ScoringGate::CreditSign,
                ValidationError::NonPositiveCredit {
                    net: candidate.net_premium.to_string(),
                },
            ));
        }

        let profile = RiskProfile::for_candidate(candidate, self.chain.snapshot().spot)
            .map_err(|err| self.missing(candidate, ScoringGate::RiskMetrics, &err))?;
        if profile.margin <= Decimal::ZERO || profile.max_loss <= Decimal::ZERO {
            return Err(RejectionRecord::new(
                strategy,
                RejectionStage::Scoring(ScoringGate::RiskMetrics),
                RejectionCategory::InvalidShape,
                format!(
                    "non-positive margin basis {} (max loss {})",
                    profile.margin, profile.max_loss
                ),
            )
            .with_subject(subject.clone()));
        }
        let sigma = self.sigma(candidate).ok_or_else(|| {
            self.missing(
                candidate,
                ScoringGate::RiskMetrics,
                &MissingDataError::new(subject.clone(), "no implied volatility for PoS"),
            )
        })?;

        let multiplier = Decimal::from(candidate.multiplier());
        let dte = candidate
            .legs
            .first()
            .map_or(0, |leg| leg.resolution.days_to_expiry);
        let pos = self.probability(profile.zone, dte, sigma);
        let max_profit = to_f64(profile.max_profit * multiplier);
        let max_loss = to_f64(profile.max_loss * multiplier);
        let margin = to_f64(profile.margin * multiplier);
        let ev = pos * max_profit - (1.0 - pos) * max_loss.abs();
        let rom = max_profit / margin * 100.0;
        let risk_reward = profile.risk_reward().map_or(0.0, to_f64);

        if risk_reward < config.min_risk_reward {
            return Err(reject(
                ScoringGate::RiskReward,
                ValidationError::RiskReward {
                    ratio: risk_reward,
                    min: config.min_risk_reward,
                },
            ));
        }
        for (gate, metric, value, min) in [
            (ScoringGate::MinRom, "rom", rom, config.min_rom),
            (ScoringGate::MinPos, "pos", pos, config.min_pos),
            (ScoringGate::MinEv, "ev", ev, config.min_ev),
        ] {
            if let Some(min) = min
                && value < min
            {
                return Err(reject(
                    gate,
                    ValidationError::BelowFloor { metric, value, min },
                ));
            }
        }

        let stale_legs = candidate.stale_count(self.stale_quote_secs);
        let metrics = ScoredMetrics {
            net_premium: candidate.net_premium * multiplier,
            margin: profile.margin * multiplier,
            max_profit: profile.max_profit * multiplier,
            max_loss: profile.max_loss * multiplier,
            breakevens: profile.breakevens,
            rom,
            pos,
            ev,
            risk_reward,
            sigma,
            greeks: candidate.aggregate_greeks(),
            fallback_legs,
            stale_legs,
            low_confidence: stale_legs > 0,
        };

        Ok(ScoredCandidate {
            candidate: candidate.clone(),
            score: ev / margin * 100.0,
            metrics,
        })
    }

    fn check_completeness(
        &self,
        candidate: &StrategyCandidate,
        config: &StrategyConfig,
    ) -> GateResult<()> {
        for leg in &candidate.legs {
            if leg.role == LegRole::Wing
                && leg.direction == LegDirection::Long
                && config.allow_unpriced_wings
            {
                continue;
            }
            let resolution = &leg.resolution;
            let detail = if resolution.mid.is_none() {
                Some(format!("no resolved mid ({})", resolution.reason))
            } else if resolution.model_price.is_none() {
                Some("no model price".to_string())
            } else if resolution.delta().is_none() {
                Some("no delta".to_string())
            } else {
                None
            };
            if let Some(detail) = detail {
                return Err(self.missing(
                    candidate,
                    ScoringGate::Completeness,
                    &MissingDataError::new(leg.leg.label(), detail),
                ));
            }
        }
        Ok(())
    }

    fn missing(
        &self,
        candidate: &StrategyCandidate,
        gate: ScoringGate,
        err: &MissingDataError,
    ) -> RejectionRecord {
        RejectionRecord::missing_data(candidate.strategy, RejectionStage::Scoring(gate), err)
    }

    /// Mean IV of the anchor legs, else the expiry's ATM IV.
    fn sigma(&self, candidate: &StrategyCandidate) -> Option<f64> {
        let ivs: Vec<f64> = candidate
            .legs
            .iter()
            .filter(|leg| leg.role == LegRole::Anchor)
            .filter_map(|leg| leg.resolution.implied_vol)
            .filter(|iv| *iv > 0.0)
            .collect();
        if ivs.is_empty() {
            self.chain.atm_iv(candidate.expiry)
        } else {
            Some(ivs.iter().sum::<f64>() / ivs.len() as f64)
        }
    }

    fn probability(&self, zone: ProfitZone, dte: i64, sigma: f64) -> f64 {
        let above = |level| self.chain.prob_above(level, dte, sigma);
        match zone {
            ProfitZone::Above(level) => above(level),
            ProfitZone::Below(level) => 1.0 - above(level),
            ProfitZone::Between(low, high) => (above(low) - above(high)).clamp(0.0, 1.0),
        }
    }
}

fn liquidity(leg: &CandidateLeg, config: &StrategyConfig) -> Option<ValidationError> {
    let contract = &leg.leg;
    (contract.volume < config.min_volume || contract.open_interest < config.min_open_interest)
        .then(|| ValidationError::Liquidity {
            leg: contract.label(),
            volume: contract.volume,
            min_volume: config.min_volume,
            open_interest: contract.open_interest,
            min_open_interest: config.min_open_interest,
        })
}
