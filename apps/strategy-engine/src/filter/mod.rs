//! Strike filter: selects anchor legs for a strategy.

mod metrics;
mod stage;
mod strike_filter;

pub use metrics::LegMetrics;
pub use stage::FilterStage;
pub use strike_filter::{FilterOutcome, StrikeFilter, ZeroSurvivorReport};
