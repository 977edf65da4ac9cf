//! Strategy types, candidates and candidate generation.

mod builder;
mod candidate;
mod types;

pub use builder::{BuildOutcome, CandidateBuilder};
pub use candidate::{CandidateLeg, LegRole, StrategyCandidate};
pub use types::{Direction, LegDirection, StrategyType, UnknownStrategyError};
