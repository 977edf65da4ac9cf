//! Scoring gates in evaluation order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One gate of the scoring engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringGate {
    /// Fallback-sourced leg cap.
    FallbackQuota,
    /// Every required leg carries mid, model price and delta.
    Completeness,
    /// Volume and open interest minimums.
    Liquidity,
    /// Positive credit for credit strategies.
    CreditSign,
    /// Margin, payoff and probability computation.
    RiskMetrics,
    /// max_profit / |max_loss| floor.
    RiskReward,
    /// Candidate ROM floor.
    MinRom,
    /// Candidate PoS floor.
    MinPos,
    /// Candidate EV floor.
    MinEv,
}

impl ScoringGate {
    /// Gates in evaluation order.
    pub const ORDER: [Self; 9] = [
        Self::FallbackQuota,
        Self::Completeness,
        Self::Liquidity,
        Self::CreditSign,
        Self::RiskMetrics,
        Self::RiskReward,
        Self::MinRom,
        Self::MinPos,
        Self::MinEv,
    ];

    /// Stable tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completeness => "completeness",
            Self::Liquidity => "liquidity",
            Self::FallbackQuota => "fallback_quota",
            Self::CreditSign => "credit_sign",
            Self::RiskMetrics => "risk_metrics",
            Self::RiskReward => "risk_reward",
            Self::MinRom => "min_rom",
            Self::MinPos => "min_pos",
            Self::MinEv => "min_ev",
        }
    }
}

impl fmt::Display for ScoringGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
