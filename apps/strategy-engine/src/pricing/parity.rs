//! Put-call parity reconstruction.
//!
//! `C - P = S * e^(-qT) - K * e^(-rT)` for European-style pricing with a
//! continuous dividend yield `q`.

use super::black_scholes::BsInputs;
use crate::chain::OptionRight;

/// Price of the opposite-right option implied by a counterpart's price.
///
/// `counterpart_right` is the right of the option whose price is known.
/// The result may be non-positive when the inputs are inconsistent; callers
/// must reject such values.
#[must_use]
pub fn implied_by_counterpart(
    counterpart_price: f64,
    counterpart_right: OptionRight,
    inputs: &BsInputs,
) -> f64 {
    let BsInputs {
        spot,
        strike,
        t,
        rate,
        dividend,
    } = *inputs;
    let forward_gap = spot * (-dividend * t).exp() - strike * (-rate * t).exp();
    match counterpart_right {
        // Known call, solve for the put.
        OptionRight::Call => counterpart_price - forward_gap,
        // Known put, solve for the call.
        OptionRight::Put => counterpart_price + forward_gap,
    }
}
