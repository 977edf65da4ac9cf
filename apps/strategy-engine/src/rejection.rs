//! Rejection records and their aggregation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MissingDataError, ValidationError};
use crate::filter::FilterStage;
use crate::scoring::ScoringGate;
use crate::strategy::StrategyType;

/// Normalized reason category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCategory {
    /// Unpriced leg or missing analytics.
    MissingData,
    /// Outside the DTE window.
    OutOfRange,
    /// Outside the delta band.
    Delta,
    /// Return on margin below floor.
    Rom,
    /// Edge versus model below floor.
    Edge,
    /// Probability of success below floor.
    Pos,
    /// Expected value below floor.
    Ev,
    /// IV skew above ceiling.
    Skew,
    /// Term-structure condition failed.
    TermStructure,
    /// Gamma, vega or theta above cap.
    GreekLimit,
    /// Custom rule failed.
    CustomRule,
    /// Volume or open interest below minimum.
    Liquidity,
    /// Too many fallback-priced legs.
    FallbackQuotaExceeded,
    /// Credit strategy without positive credit.
    NonPositiveCredit,
    /// Risk/reward below minimum.
    RiskReward,
    /// No valid leg combination for the strategy shape.
    InvalidShape,
}

impl RejectionCategory {
    /// Stable tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingData => "missing_data",
            Self::OutOfRange => "out_of_range",
            Self::Delta => "delta",
            Self::Rom => "rom",
            Self::Edge => "edge",
            Self::Pos => "pos",
            Self::Ev => "ev",
            Self::Skew => "skew",
            Self::TermStructure => "term_structure",
            Self::GreekLimit => "greek_limit",
            Self::CustomRule => "custom_rule",
            Self::Liquidity => "liquidity",
            Self::FallbackQuotaExceeded => "fallback_quota_exceeded",
            Self::NonPositiveCredit => "non_positive_credit",
            Self::RiskReward => "risk_reward",
            Self::InvalidShape => "invalid_shape",
        }
    }
}

impl fmt::Display for RejectionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ValidationError> for RejectionCategory {
    fn from(err: &ValidationError) -> Self {
        match err {
            ValidationError::Liquidity { .. } => Self::Liquidity,
            ValidationError::FallbackQuota { .. } => Self::FallbackQuotaExceeded,
            ValidationError::NonPositiveCredit { .. } => Self::NonPositiveCredit,
            ValidationError::RiskReward { .. } => Self::RiskReward,
            ValidationError::BelowFloor { metric, .. } => match *metric {
                "rom" => Self::Rom,
                "pos" => Self::Pos,
                _ => Self::Ev,
            },
        }
    }
}

/// Where in the pipeline a rejection happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionStage {
    /// Strike filter stage.
    Filter(FilterStage),
    /// Candidate construction.
    Build,
    /// Scoring gate.
    Scoring(ScoringGate),
}

impl RejectionStage {
    /// Label such as `filter:delta` or `scoring:liquidity`.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Filter(stage) => format!("filter:{}", stage.as_str()),
            Self::Build => "build".to_string(),
            Self::Scoring(gate) => format!("scoring:{}", gate.as_str()),
        }
    }
}

impl fmt::Display for RejectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A discarded strike or candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionRecord {
    /// Strategy being evaluated.
    pub strategy: StrategyType,
    /// Failing stage.
    pub stage: RejectionStage,
    /// Normalized category.
    pub category: RejectionCategory,
    /// Raw reason.
    pub reason: String,
    /// Leg or candidate description.
    pub subject: Option<String>,
}

impl RejectionRecord {
    /// Create a record.
    #[must_use]
    pub fn new(
        strategy: StrategyType,
        stage: RejectionStage,
        category: RejectionCategory,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            strategy,
            stage,
            category,
            reason: reason.into(),
            subject: None,
        }
    }

    /// Attach a leg or candidate description.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Record for a missing-data failure.
    #[must_use]
    pub fn missing_data(strategy: StrategyType, stage: RejectionStage, err: &MissingDataError) -> Self {
        Self::new(strategy, stage, RejectionCategory::MissingData, err.to_string())
            .with_subject(err.subject.clone())
    }

    /// Record for a failed policy gate.
    #[must_use]
    pub fn validation(
        strategy: StrategyType,
        gate: ScoringGate,
        err: &ValidationError,
        subject: impl Into<String>,
    ) -> Self {
        Self::new(
            strategy,
            RejectionStage::Scoring(gate),
            RejectionCategory::from(err),
            err.to_string(),
        )
        .with_subject(subject)
    }
}

/// Rejection counts grouped three ways.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionSummary {
    /// Total records.
    pub total: usize,
    /// By strategy name.
    pub by_strategy: BTreeMap<String, usize>,
    /// By stage label.
    pub by_stage: BTreeMap<String, usize>,
    /// By category.
    pub by_category: BTreeMap<RejectionCategory, usize>,
}

impl RejectionSummary {
    /// Summarize a set of records.
    #[must_use]
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a RejectionRecord>) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.add(record);
        }
        summary
    }

    /// Count one record.
    pub fn add(&mut self, record: &RejectionRecord) {
        self.total += 1;
        *self
            .by_strategy
            .entry(record.strategy.as_str().to_string())
            .or_default() += 1;
        *self.by_stage.entry(record.stage.label()).or_default() += 1;
        *self.by_category.entry(record.category).or_default() += 1;
    }

    /// Fold another summary into this one.
    pub fn merge(&mut self, other: &Self) {
        self.total += other.total;
        for (key, count) in &other.by_strategy {
            *self.by_strategy.entry(key.clone()).or_default() += count;
        }
        for (key, count) in &other.by_stage {
            *self.by_stage.entry(key.clone()).or_default() += count;
        }
        for (key, count) in &other.by_category {
            *self.by_category.entry(*key).or_default() += count;
        }
    }

    /// Count for a category.
    #[must_use]
    pub fn category_count(&self, category: RejectionCategory) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(strategy: StrategyType, stage: RejectionStage, category: RejectionCategory) -> RejectionRecord {
        RejectionRecord::new(strategy, stage, category, "test")
    }

    #[test]
    fn summary_groups_three_ways() {
        let records = vec![
            record(
                StrategyType::IronCondor,
                RejectionStage::Filter(FilterStage::Delta),
                RejectionCategory::Delta,
            ),
            record(
                StrategyType::IronCondor,
                RejectionStage::Scoring(ScoringGate::FallbackQuota),
                RejectionCategory::FallbackQuotaExceeded,
            ),
            record(
                StrategyType::BullPutSpread,
                RejectionStage::Filter(FilterStage::Delta),
                RejectionCategory::Delta,
            ),
        ];
        let summary = RejectionSummary::from_records(&records);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_strategy["iron_condor"], 2);
        assert_eq!(summary.by_stage["filter:delta"], 2);
        assert_eq!(summary.category_count(RejectionCategory::FallbackQuotaExceeded), 1);
    }

    #[test]
    fn merge_adds_counts() {
        let a = RejectionSummary::from_records(&[record(
            StrategyType::IronCondor,
            RejectionStage::Build,
            RejectionCategory::InvalidShape,
        )]);
        let mut b = a.clone();
        b.merge(&a);
        assert_eq!(b.total, 2);
        assert_eq!(b.by_stage["build"], 2);
    }

    #[test]
    fn validation_errors_map_to_categories() {
        let err = ValidationError::FallbackQuota { count: 3, cap: 2 };
        let record = RejectionRecord::validation(
            StrategyType::IronCondor,
            ScoringGate::FallbackQuota,
            &err,
            "condor",
        );
        assert_eq!(record.category, RejectionCategory::FallbackQuotaExceeded);
        assert_eq!(record.category.to_string(), "fallback_quota_exceeded");
        assert_eq!(record.stage.label(), "scoring:fallback_quota");
    }
}
