//! Candidate scoring: policy gates, margin, payoff and ranking.

mod engine;
mod gate;
mod risk;

pub use engine::{ScoredCandidate, ScoredMetrics, ScoringEngine};
pub use gate::ScoringGate;
pub use risk::{RiskProfile, naked_margin_per_share};
