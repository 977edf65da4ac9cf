//! Pricing: Black-Scholes analytics, IV solving, parity and the leg price resolver.

pub mod black_scholes;
mod iv;
mod parity;
mod priced_chain;
mod resolver;

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

pub use iv::{IvError, IvSolver, IvSolverConfig};
pub use parity::implied_by_counterpart;
pub use priced_chain::PricedChain;
pub use resolver::{PriceResolver, PriceSource, Resolution, SpreadFlag};

/// Decimal places kept when converting model output back to prices.
pub const PRICE_SCALE: u32 = 4;

/// Lossy conversion for model inputs.
#[must_use]
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Convert model output to a price rounded to [`PRICE_SCALE`] places.
///
/// Returns `None` for NaN or infinite input.
#[must_use]
pub fn from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value).map(|d| d.round_dp(PRICE_SCALE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn from_f64_rounds_to_price_scale() {
        assert_eq!(from_f64(1.234_567), Some(dec!(1.2346)));
        assert_eq!(from_f64(f64::NAN), None);
        assert_eq!(from_f64(f64::INFINITY), None);
    }
}
