//! Option analytics shared across the pricing, scoring and exit stages.

mod greeks;

pub use greeks::{Greeks, aggregate_greeks};
