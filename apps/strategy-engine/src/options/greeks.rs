//! Greeks and their aggregation across strategy legs.
//!
//! Aggregation convention: every greek, delta included, is scaled by the
//! signed quantity times the contract multiplier. Aggregate delta therefore
//! reads in share-equivalents, like the other greeks read in dollars.

use serde::{Deserialize, Serialize};

/// Option sensitivities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    /// Delta - change in option price per $1 move in the underlying.
    pub delta: f64,
    /// Gamma - change in delta per $1 move in the underlying.
    pub gamma: f64,
    /// Theta - change in option price per calendar day.
    pub theta: f64,
    /// Vega - change in option price per 1 vol point.
    pub vega: f64,
}

impl Greeks {
    /// Create greeks.
    #[must_use]
    pub const fn new(delta: f64, gamma: f64, theta: f64, vega: f64) -> Self {
        Self {
            delta,
            gamma,
            theta,
            vega,
        }
    }

    /// Scale every greek by a factor (negative for short exposure).
    #[must_use]
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            delta: self.delta * factor,
            gamma: self.gamma * factor,
            theta: self.theta * factor,
            vega: self.vega * factor,
        }
    }

    /// Sum with another set of greeks.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self {
            delta: self.delta + other.delta,
            gamma: self.gamma + other.gamma,
            theta: self.theta + other.theta,
            vega: self.vega + other.vega,
        }
    }

    /// Zero greeks.
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

/// Aggregate per-contract greeks over `(greeks, signed_quantity, multiplier)` triples.
#[must_use]
pub fn aggregate_greeks<'a, I>(legs: I) -> Greeks
where
    I: IntoIterator<Item = (&'a Greeks, i64, u32)>,
{
    legs.into_iter()
        .fold(Greeks::zero(), |acc, (greeks, quantity, multiplier)| {
            acc.add(&greeks.scale(quantity as f64 * f64::from(multiplier)))
        })
}
