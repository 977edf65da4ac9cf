//! Exit stages, attempts and flow results.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::chain::ContractKey;

/// A stage of the exit state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExitStage {
    /// Limit at the current mid.
    Primary,
    /// Ladder step `n`, starting at 1.
    Ladder(u32),
    /// Wide limit beyond the aggressive side.
    Fallback,
    /// Market order.
    Force,
}

impl ExitStage {
    /// Stage family without the ladder index.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Ladder(_) => "ladder",
            Self::Fallback => "fallback",
            Self::Force => "force",
        }
    }

    /// Whether the stage submits a limit order.
    #[must_use]
    pub const fn is_priced(&self) -> bool {
        !matches!(self, Self::Force)
    }
}

impl fmt::Display for ExitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ladder(step) => write!(f, "ladder:{step}"),
            other => f.write_str(other.kind()),
        }
    }
}

impl FromStr for ExitStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(Self::Primary),
            "fallback" => Ok(Self::Fallback),
            "force" => Ok(Self::Force),
            other => other
                .strip_prefix("ladder:")
                .and_then(|n| n.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .map(Self::Ladder)
                .ok_or_else(|| format!("unknown exit stage '{other}'")),
        }
    }
}

impl TryFrom<String> for ExitStage {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExitStage> for String {
    fn from(stage: ExitStage) -> Self {
        stage.to_string()
    }
}

/// Result of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Fully filled.
    Filled,
    /// Partially filled; remainder cancelled.
    PartiallyFilled,
    /// Nothing filled within the wait.
    NotFilled,
    /// No priceable legs; nothing submitted.
    Skipped,
    /// Broker refused the order.
    Rejected,
    /// Interrupted by cancellation.
    Incomplete,
}

impl AttemptOutcome {
    /// Stable tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Filled => "filled",
            Self::PartiallyFilled => "partially_filled",
            Self::NotFilled => "not_filled",
            Self::Skipped => "skipped",
            Self::Rejected => "rejected",
            Self::Incomplete => "incomplete",
        }
    }

    /// Whether any quantity filled.
    #[must_use]
    pub const fn has_fill(&self) -> bool {
        matches!(self, Self::Filled | Self::PartiallyFilled)
    }
}

/// A leg left out of an attempt's pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedLeg {
    /// Contract.
    pub key: ContractKey,
    /// Why it was excluded.
    pub reason: String,
}

/// One stage attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitAttempt {
    /// Stage.
    pub stage: ExitStage,
    /// Net limit; `None` for market orders and skipped stages.
    pub limit_price: Option<Decimal>,
    /// Broker order IDs of filled orders; empty when nothing filled.
    pub order_ids: Vec<String>,
    /// Outcome.
    pub outcome: AttemptOutcome,
    /// Legs excluded from pricing.
    pub excluded_legs: Vec<ExcludedLeg>,
    /// Units filled.
    pub filled_qty: u32,
    /// Average net fill price.
    pub fill_price: Option<Decimal>,
    /// Explanation.
    pub reason: String,
    /// When the attempt finished.
    pub timestamp: DateTime<Utc>,
}

impl ExitAttempt {
    pub(crate) fn new(stage: ExitStage, outcome: AttemptOutcome, reason: impl Into<String>) -> Self {
        Self {
            stage,
            limit_price: None,
            order_ids: Vec::new(),
            outcome,
            excluded_legs: Vec::new(),
            filled_qty: 0,
            fill_price: None,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Terminal status of an exit flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Position closed.
    Filled,
    /// Part of the position closed.
    PartiallyFilled,
    /// Nothing closed.
    Failed,
}

impl ExitStatus {
    /// Stable tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Filled => "filled",
            Self::PartiallyFilled => "partially_filled",
            Self::Failed => "failed",
        }
    }
}

/// Full trail of an exit flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitFlowResult {
    /// Intent ID.
    pub intent_id: String,
    /// Terminal status.
    pub status: ExitStatus,
    /// Attempts in order.
    pub attempts: Vec<ExitAttempt>,
    /// Final explanation.
    pub reason: String,
}

impl ExitFlowResult {
    /// Stages attempted, in order.
    #[must_use]
    pub fn stages(&self) -> Vec<ExitStage> {
        self.attempts.iter().map(|a| a.stage).collect()
    }

    /// The attempt that filled, if any.
    #[must_use]
    pub fn fill(&self) -> Option<&ExitAttempt> {
        self.attempts.iter().find(|a| a.outcome.has_fill())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ExitStage::Primary, "primary")]
    #[test_case(ExitStage::Ladder(2), "ladder:2")]
    #[test_case(ExitStage::Fallback, "fallback")]
    #[test_case(ExitStage::Force, "force")]
    fn stage_labels(stage: ExitStage, label: &str) {
        assert_eq!(stage.to_string(), label);
        assert_eq!(label.parse::<ExitStage>().unwrap(), stage);
    }

    #[test]
    fn stages_order_forward() {
        assert!(ExitStage::Primary < ExitStage::Ladder(1));
        assert!(ExitStage::Ladder(1) < ExitStage::Ladder(2));
        assert!(ExitStage::Ladder(9) < ExitStage::Fallback);
        assert!(ExitStage::Fallback < ExitStage::Force);
    }

    #[test]
    fn rejects_bad_labels() {
        assert!("ladder:0".parse::<ExitStage>().is_err());
        assert!("retry".parse::<ExitStage>().is_err());
    }

    #[test]
    fn stage_serializes_as_label() {
        let json = serde_json::to_string(&ExitStage::Ladder(3)).unwrap();
        assert_eq!(json, "\"ladder:3\"");
    }
}
