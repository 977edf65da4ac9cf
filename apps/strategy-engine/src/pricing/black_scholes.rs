//! Black-Scholes closed-form pricing, greeks and lognormal probabilities.

// Black-Scholes uses standard mathematical notation (s, k, t, r, q, sigma)
#![allow(clippy::many_single_char_names)]
#![allow(clippy::suboptimal_flops)]

use std::f64::consts::{PI, SQRT_2};

use crate::chain::OptionRight;
use crate::options::Greeks;

/// Calendar days per year used for time-to-expiry.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Inputs to the Black-Scholes model, minus volatility.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BsInputs {
    /// Underlying spot.
    pub spot: f64,
    /// Strike.
    pub strike: f64,
    /// Time to expiry in years.
    pub t: f64,
    /// Risk-free rate (continuous).
    pub rate: f64,
    /// Dividend yield (continuous).
    pub dividend: f64,
}

impl BsInputs {
    /// Whether the inputs admit a model price.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.spot > 0.0
            && self.strike > 0.0
            && self.t > 0.0
            && self.spot.is_finite()
            && self.strike.is_finite()
            && self.t.is_finite()
            && self.rate.is_finite()
    }

    fn d1(&self, sigma: f64) -> f64 {
        ((self.spot / self.strike).ln() + (self.rate - self.dividend + 0.5 * sigma * sigma) * self.t)
            / (sigma * self.t.sqrt())
    }

    fn d2(&self, sigma: f64) -> f64 {
        self.d1(sigma) - sigma * self.t.sqrt()
    }
}

/// Time to expiry in years for a given DTE. Same-day expiries count as one day.
#[must_use]
pub fn years_to_expiry(days_to_expiry: i64) -> f64 {
    days_to_expiry.max(1) as f64 / DAYS_PER_YEAR
}

/// Standard normal CDF.
#[must_use]
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + libm::erf(x / SQRT_2))
}

/// Standard normal PDF.
#[must_use]
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Model price for a call or put.
#[must_use]
pub fn price(inputs: &BsInputs, sigma: f64, right: OptionRight) -> f64 {
    let BsInputs {
        spot: s,
        strike: k,
        t,
        rate: r,
        dividend: q,
    } = *inputs;
    let d1 = inputs.d1(sigma);
    let d2 = inputs.d2(sigma);
    match right {
        OptionRight::Call => s * (-q * t).exp() * norm_cdf(d1) - k * (-r * t).exp() * norm_cdf(d2),
        OptionRight::Put => k * (-r * t).exp() * norm_cdf(-d2) - s * (-q * t).exp() * norm_cdf(-d1),
    }
}

/// Vega per unit of volatility (not per vol point).
#[must_use]
pub fn raw_vega(inputs: &BsInputs, sigma: f64) -> f64 {
    inputs.spot * (-inputs.dividend * inputs.t).exp() * norm_pdf(inputs.d1(sigma)) * inputs.t.sqrt()
}

/// Greeks in trading units: theta per calendar day, vega per vol point.
#[must_use]
pub fn greeks(inputs: &BsInputs, sigma: f64, right: OptionRight) -> Greeks {
    let BsInputs {
        spot: s,
        strike: k,
        t,
        rate: r,
        dividend: q,
    } = *inputs;
    let d1 = inputs.d1(sigma);
    let d2 = inputs.d2(sigma);
    let carry = (-q * t).exp();
    let discount = (-r * t).exp();
    let decay = -s * carry * norm_pdf(d1) * sigma / (2.0 * t.sqrt());

    let (delta, theta_year) = match right {
        OptionRight::Call => (
            carry * norm_cdf(d1),
            decay - r * k * discount * norm_cdf(d2) + q * s * carry * norm_cdf(d1),
        ),
        OptionRight::Put => (
            carry * (norm_cdf(d1) - 1.0),
            decay + r * k * discount * norm_cdf(-d2) - q * s * carry * norm_cdf(-d1),
        ),
    };

    Greeks {
        delta,
        gamma: carry * norm_pdf(d1) / (s * sigma * t.sqrt()),
        theta: theta_year / DAYS_PER_YEAR,
        vega: raw_vega(inputs, sigma) / 100.0,
    }
}

/// Risk-neutral probability that the underlying finishes above `level`.
#[must_use]
pub fn prob_above(inputs: &BsInputs, level: f64, sigma: f64) -> f64 {
    if level <= 0.0 {
        return 1.0;
    }
    if sigma <= 0.0 || inputs.t <= 0.0 {
        return if inputs.spot > level { 1.0 } else { 0.0 };
    }
    let at_level = BsInputs {
        strike: level,
        ..*inputs
    };
    norm_cdf(at_level.d2(sigma))
}

/// Risk-neutral probability that the underlying finishes between `low` and `high`.
#[must_use]
pub fn prob_between(inputs: &BsInputs, low: f64, high: f64, sigma: f64) -> f64 {
    if high <= low {
        return 0.0;
    }
    (prob_above(inputs, low, sigma) - prob_above(inputs, high, sigma)).clamp(0.0, 1.0)
}
