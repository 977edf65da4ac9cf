//! Per-leg price resolution.
//!
//! Strict waterfall; each stage only sees legs that are still unresolved:
//!
//! 1. true quote (bid/ask within spread limits)
//! 2. put-call parity from the opposite-right counterpart
//! 3. model price (provider, else Black-Scholes from IV)
//! 4. last close
//! 5. missing
//!
//! Resolution never fails; unpriceable legs come back tagged `missing` and
//! the caller decides whether that blocks a strategy.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::black_scholes::{self, BsInputs, years_to_expiry};
use super::iv::IvSolver;
use super::parity::implied_by_counterpart;
use super::{from_f64, to_f64};
use crate::chain::{ChainSnapshot, ContractKey, Leg};
use crate::config::ResolverConfig;
use crate::options::Greeks;

/// Where a resolved mid came from, best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceSource {
    /// Two-sided quote within spread limits.
    True,
    /// Parity from a counterpart with a true quote.
    ParityTrue,
    /// Parity from a counterpart's last close.
    ParityClose,
    /// Provider or Black-Scholes model price.
    Model,
    /// Last traded close.
    Close,
    /// No stage produced a price.
    Missing,
}

impl PriceSource {
    /// All sources, best first.
    pub const ALL: [Self; 6] = [
        Self::True,
        Self::ParityTrue,
        Self::ParityClose,
        Self::Model,
        Self::Close,
        Self::Missing,
    ];

    /// Stable tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::True => "true",
            Self::ParityTrue => "parity-true",
            Self::ParityClose => "parity-close",
            Self::Model => "model",
            Self::Close => "close",
            Self::Missing => "missing",
        }
    }

    /// Lower-confidence source that counts against a strategy's fallback quota.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::ParityClose | Self::Model | Self::Close)
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bid/ask quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadFlag {
    /// Two-sided, within limits.
    Ok,
    /// Two-sided but wider than both the relative and absolute limits.
    TooWide,
    /// One-sided or inverted.
    Invalid,
    /// No bid and no ask.
    Missing,
}

/// Resolved price and analytics for one leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Contract this resolution belongs to.
    pub key: ContractKey,
    /// Resolved mid; absent iff `source` is `Missing`.
    pub mid: Option<Decimal>,
    /// Stage that produced the mid.
    pub source: PriceSource,
    /// Human-readable account of how the mid was obtained.
    pub reason: String,
    /// Bid/ask quality.
    pub spread_flag: SpreadFlag,
    /// Seconds since the last quote update.
    pub quote_age_secs: Option<i64>,
    /// Calendar days to expiry.
    pub days_to_expiry: i64,
    /// Provider or Black-Scholes theoretical price.
    pub model_price: Option<Decimal>,
    /// Provider IV, or IV solved from a true mid.
    pub implied_vol: Option<f64>,
    /// Provider or Black-Scholes greeks.
    pub greeks: Option<Greeks>,
}

impl Resolution {
    /// Whether a mid was resolved.
    #[must_use]
    pub const fn is_priced(&self) -> bool {
        self.mid.is_some()
    }

    /// Delta, if known.
    #[must_use]
    pub fn delta(&self) -> Option<f64> {
        self.greeks.map(|g| g.delta)
    }

    /// Whether the quote is older than `threshold_secs`.
    #[must_use]
    pub fn is_stale(&self, threshold_secs: i64) -> bool {
        self.quote_age_secs.is_some_and(|age| age > threshold_secs)
    }

    fn settle(&mut self, mid: Decimal, source: PriceSource, reason: String) {
        self.mid = Some(mid);
        self.source = source;
        self.reason = if self.reason.is_empty() {
            reason
        } else {
            format!("{}; {reason}", self.reason)
        };
    }
}

enum QuoteCheck {
    Valid { mid: Decimal, spread: Decimal },
    TooWide { mid: Decimal, spread: Decimal, limit: Option<Decimal> },
    Invalid(&'static str),
    Missing,
}

/// Multi-tier price resolver.
#[derive(Debug, Clone, Default)]
pub struct PriceResolver {
    config: ResolverConfig,
    iv_solver: IvSolver,
}

impl PriceResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            iv_solver: IvSolver::default(),
        }
    }

    /// Resolver configuration.
    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve every leg of a snapshot; output order matches `snapshot.legs`.
    #[must_use]
    pub fn resolve(&self, snapshot: &ChainSnapshot) -> Vec<Resolution> {
        self.resolve_legs(
            &snapshot.legs,
            snapshot.spot,
            snapshot.interest_rate,
            snapshot.as_of,
        )
    }

    /// Resolve a set of legs against a spot and rate.
    #[must_use]
    pub fn resolve_legs(
        &self,
        legs: &[Leg],
        spot: Decimal,
        rate: f64,
        as_of: DateTime<Utc>,
    ) -> Vec<Resolution> {
        let spot = to_f64(spot);
        let mut resolutions: Vec<Resolution> = legs
            .iter()
            .map(|leg| self.quote_stage(leg, spot, rate, as_of))
            .collect();

        // Parity reads only stage-1 outcomes, so evaluation order cannot matter.
        let index: HashMap<ContractKey, usize> =
            legs.iter().enumerate().map(|(i, leg)| (leg.key(), i)).collect();
        let parity: Vec<Option<(Decimal, PriceSource, String)>> = legs
            .iter()
            .zip(&resolutions)
            .map(|(leg, resolution)| {
                if resolution.is_priced() {
                    return None;
                }
                let &counterpart = index.get(&leg.key().counterpart())?;
                self.parity_stage(
                    leg,
                    &legs[counterpart],
                    &resolutions[counterpart],
                    spot,
                    rate,
                    resolution.days_to_expiry,
                )
            })
            .collect();

        for ((leg, resolution), parity) in legs.iter().zip(resolutions.iter_mut()).zip(parity) {
            if let Some((mid, source, reason)) = parity {
                resolution.settle(mid, source, reason);
                continue;
            }
            if resolution.is_priced() {
                continue;
            }
            if let Some(model) = resolution.model_price.filter(|p| *p > Decimal::ZERO) {
                let origin = if leg.model_price.is_some_and(|p| p > Decimal::ZERO) {
                    "provider model price".to_string()
                } else {
                    format!(
                        "black-scholes from iv {:.1}%",
                        resolution.implied_vol.unwrap_or_default() * 100.0
                    )
                };
                resolution.settle(model, PriceSource::Model, origin);
                continue;
            }
            if let Some(close) = leg.close.filter(|c| *c > Decimal::ZERO) {
                resolution.settle(close, PriceSource::Close, format!("last close {close}"));
                continue;
            }
            let note = "no quote, counterpart, model inputs or close";
            resolution.reason = if resolution.reason.is_empty() {
                note.to_string()
            } else {
                format!("{}; {note}", resolution.reason)
            };
        }

        debug!(
            legs = legs.len(),
            true_quotes = count(&resolutions, PriceSource::True),
            parity = count(&resolutions, PriceSource::ParityTrue)
                + count(&resolutions, PriceSource::ParityClose),
            model = count(&resolutions, PriceSource::Model),
            close = count(&resolutions, PriceSource::Close),
            missing = count(&resolutions, PriceSource::Missing),
            "Resolved leg prices"
        );

        resolutions
    }

    /// Stage 1 plus the analytics every later stage depends on.
    fn quote_stage(&self, leg: &Leg, spot: f64, rate: f64, as_of: DateTime<Utc>) -> Resolution {
        let days_to_expiry = leg.days_to_expiry(as_of.date_naive());
        let mut resolution = Resolution {
            key: leg.key(),
            mid: None,
            source: PriceSource::Missing,
            reason: String::new(),
            spread_flag: SpreadFlag::Missing,
            quote_age_secs: leg.quote_age_secs(as_of),
            days_to_expiry,
            model_price: None,
            implied_vol: leg.implied_vol,
            greeks: leg.greeks,
        };

        match self.check_quote(leg.bid, leg.ask) {
            QuoteCheck::Valid { mid, spread } => {
                resolution.spread_flag = SpreadFlag::Ok;
                resolution.settle(
                    mid,
                    PriceSource::True,
                    format!("bid/ask mid, spread {spread}"),
                );
            }
            QuoteCheck::TooWide { mid, spread, limit } => {
                resolution.spread_flag = SpreadFlag::TooWide;
                resolution.reason = format!(
                    "spread {spread} too wide at mid {mid} (relative limit {}, absolute limit {})",
                    self.config.relative_spread_limit,
                    limit.map_or_else(|| "none".to_string(), |l| l.to_string())
                );
            }
            QuoteCheck::Invalid(why) => {
                resolution.spread_flag = SpreadFlag::Invalid;
                resolution.reason = format!("invalid quote: {why}");
            }
            QuoteCheck::Missing => {
                resolution.spread_flag = SpreadFlag::Missing;
                resolution.reason = "no bid/ask".to_string();
            }
        }

        let inputs = BsInputs {
            spot,
            strike: to_f64(leg.strike),
            t: years_to_expiry(days_to_expiry),
            rate,
            dividend: self.config.dividend_yield,
        };

        if resolution.implied_vol.is_none()
            && self.config.solve_missing_iv
            && inputs.is_valid()
            && let Some(mid) = resolution.mid
        {
            resolution.implied_vol = self.iv_solver.solve(to_f64(mid), &inputs, leg.right).ok();
        }

        let sigma = resolution.implied_vol.filter(|iv| *iv > 0.0);
        resolution.model_price = leg
            .model_price
            .filter(|p| *p > Decimal::ZERO)
            .or_else(|| {
                sigma
                    .filter(|_| inputs.is_valid())
                    .and_then(|iv| from_f64(black_scholes::price(&inputs, iv, leg.right)))
                    .filter(|p| *p > Decimal::ZERO)
            });
        if resolution.greeks.is_none()
            && let Some(iv) = sigma
            && inputs.is_valid()
        {
            resolution.greeks = Some(black_scholes::greeks(&inputs, iv, leg.right));
        }

        resolution
    }

    fn check_quote(&self, bid: Option<Decimal>, ask: Option<Decimal>) -> QuoteCheck {
        let bid = bid.unwrap_or(Decimal::ZERO);
        let ask = ask.unwrap_or(Decimal::ZERO);

        if bid <= Decimal::ZERO && ask <= Decimal::ZERO {
            return QuoteCheck::Missing;
        }
        if bid <= Decimal::ZERO || ask <= Decimal::ZERO {
            return QuoteCheck::Invalid("one-sided quote");
        }
        if ask < bid {
            return QuoteCheck::Invalid("inverted spread");
        }

        let mid = (bid + ask) / Decimal::TWO;
        let spread = ask - bid;
        let limit = self.config.absolute_spread_limit(mid);

        if spread / mid <= self.config.relative_spread_limit || limit.is_some_and(|l| spread <= l) {
            QuoteCheck::Valid { mid, spread }
        } else {
            QuoteCheck::TooWide { mid, spread, limit }
        }
    }

    fn parity_stage(
        &self,
        leg: &Leg,
        counterpart: &Leg,
        counterpart_resolution: &Resolution,
        spot: f64,
        rate: f64,
        days_to_expiry: i64,
    ) -> Option<(Decimal, PriceSource, String)> {
        if spot <= 0.0 {
            return None;
        }

        let (basis, source, label) = if counterpart_resolution.source == PriceSource::True {
            (counterpart_resolution.mid?, PriceSource::ParityTrue, "mid")
        } else {
            let close = counterpart.close.filter(|c| *c > Decimal::ZERO)?;
            (close, PriceSource::ParityClose, "close")
        };

        let inputs = BsInputs {
            spot,
            strike: to_f64(leg.strike),
            t: years_to_expiry(days_to_expiry),
            rate,
            dividend: self.config.dividend_yield,
        };
        let derived = implied_by_counterpart(to_f64(basis), counterpart.right, &inputs);
        let mid = from_f64(derived).filter(|m| *m > Decimal::ZERO)?;

        Some((
            mid,
            source,
            format!(
                "put-call parity from {} {label} {basis}",
                counterpart.right
            ),
        ))
    }
}

fn count(resolutions: &[Resolution], source: PriceSource) -> usize {
    resolutions.iter().filter(|r| r.source == source).count()
}
