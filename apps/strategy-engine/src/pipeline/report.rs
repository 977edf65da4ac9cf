//! Pipeline output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::filter::ZeroSurvivorReport;
use crate::rejection::{RejectionRecord, RejectionSummary};
use crate::scoring::ScoredCandidate;
use crate::strategy::StrategyType;

/// Per-strategy counts for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyStats {
    /// Strategy evaluated.
    pub strategy: StrategyType,
    /// Legs that entered the strike filter.
    pub evaluated_strikes: usize,
    /// Anchors accepted by the filter.
    pub accepted_strikes: usize,
    /// Candidates generated.
    pub candidates: usize,
    /// Candidates that passed scoring.
    pub proposals: usize,
    /// Rejection records produced.
    pub rejections: usize,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Underlying symbol.
    pub underlying: String,
    /// Spot at evaluation.
    pub spot: Decimal,
    /// Evaluation timestamp.
    pub as_of: DateTime<Utc>,
    /// Ranked proposals, best first.
    pub proposals: Vec<ScoredCandidate>,
    /// Every rejection, in strategy order.
    pub rejections: Vec<RejectionRecord>,
    /// Rejection counts by strategy, stage and category.
    pub summary: RejectionSummary,
    /// Strategies whose filter accepted nothing.
    pub zero_survivors: Vec<ZeroSurvivorReport>,
    /// Resolved legs per price source.
    pub source_counts: BTreeMap<String, usize>,
    /// Per-strategy counts.
    pub strategies: Vec<StrategyStats>,
}

impl PipelineReport {
    /// Best proposal, if any.
    #[must_use]
    pub fn best(&self) -> Option<&ScoredCandidate> {
        self.proposals.first()
    }

    /// Proposals for one strategy, in rank order.
    pub fn proposals_for(&self, strategy: StrategyType) -> impl Iterator<Item = &ScoredCandidate> {
        self.proposals
            .iter()
            .filter(move |p| p.candidate.strategy == strategy)
    }
}
