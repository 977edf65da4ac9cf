//! Pipeline orchestration.
//!
//! Resolves the chain once, then runs filter, build and scoring for each
//! enabled strategy. Strategies share nothing mutable; each worker returns
//! its own outcome and the orchestrator merges them once all are done.

use std::cmp::Ordering;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use super::report::{PipelineReport, StrategyStats};
use crate::chain::ChainSnapshot;
use crate::config::{EngineConfig, StrategyConfig};
use crate::filter::{StrikeFilter, ZeroSurvivorReport};
use crate::observability;
use crate::pricing::{PriceResolver, PricedChain};
use crate::rejection::{RejectionRecord, RejectionSummary};
use crate::scoring::{ScoredCandidate, ScoringEngine};
use crate::strategy::{CandidateBuilder, StrategyType, UnknownStrategyError};

/// Outcome of one strategy worker.
struct StrategyOutcome {
    stats: StrategyStats,
    proposals: Vec<ScoredCandidate>,
    rejections: Vec<RejectionRecord>,
    zero_survivors: Option<ZeroSurvivorReport>,
}

/// Runs the entry pipeline for a configured set of strategies.
#[derive(Debug, Clone)]
pub struct PipelineOrchestrator {
    config: EngineConfig,
    resolver: PriceResolver,
    strategies: Vec<(StrategyType, StrategyConfig)>,
}

impl PipelineOrchestrator {
    /// Create an orchestrator; unknown strategy names fail here.
    pub fn new(config: EngineConfig) -> Result<Self, UnknownStrategyError> {
        let strategies = config.enabled_strategies()?;
        let resolver = PriceResolver::new(config.resolver.clone());
        Ok(Self {
            config,
            resolver,
            strategies,
        })
    }

    /// Strategies this orchestrator evaluates.
    pub fn strategies(&self) -> impl Iterator<Item = StrategyType> + '_ {
        self.strategies.iter().map(|(strategy, _)| *strategy)
    }

    /// Evaluate a snapshot. Safe to call repeatedly; nothing is retained.
    #[must_use]
    pub fn run(&self, snapshot: ChainSnapshot) -> PipelineReport {
        let started = Instant::now();
        let chain = PricedChain::resolve(snapshot, &self.resolver);
        let stale_quote_secs = self.config.resolver.stale_quote_secs;

        info!(
            underlying = %chain.snapshot().underlying,
            legs = chain.len(),
            strategies = self.strategies.len(),
            parallel = self.config.pipeline.parallel,
            "Starting strategy pipeline"
        );

        let evaluate = |(strategy, config): &(StrategyType, StrategyConfig)| {
            evaluate_strategy(*strategy, config, &chain, stale_quote_secs)
        };
        let outcomes: Vec<StrategyOutcome> = if self.config.pipeline.parallel {
            self.strategies.par_iter().map(evaluate).collect()
        } else {
            self.strategies.iter().map(evaluate).collect()
        };

        let mut proposals = Vec::new();
        let mut rejections = Vec::new();
        let mut zero_survivors = Vec::new();
        let mut strategies = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            proposals.extend(outcome.proposals);
            rejections.extend(outcome.rejections);
            zero_survivors.extend(outcome.zero_survivors);
            strategies.push(outcome.stats);
        }

        let demote = self.config.pipeline.demote_low_confidence;
        proposals.sort_by(|a, b| rank(a, b, demote));
        proposals.truncate(self.config.pipeline.max_proposals);

        let summary = RejectionSummary::from_records(&rejections);
        for record in &rejections {
            observability::record_rejections(record.strategy.as_str(), record.category.as_str(), 1);
        }

        let snapshot = chain.snapshot();
        let source_counts = chain
            .source_counts()
            .into_iter()
            .map(|(source, count)| (source.as_str().to_string(), count))
            .collect();

        let elapsed = started.elapsed();
        observability::record_pipeline_run(
            &snapshot.underlying,
            proposals.len(),
            rejections.len(),
            elapsed.as_secs_f64(),
        );
        info!(
            underlying = %snapshot.underlying,
            proposals = proposals.len(),
            rejections = summary.total,
            zero_survivor_strategies = zero_survivors.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Strategy pipeline complete"
        );

        PipelineReport {
            underlying: snapshot.underlying.clone(),
            spot: snapshot.spot,
            as_of: snapshot.as_of,
            proposals,
            rejections,
            summary,
            zero_survivors,
            source_counts,
            strategies,
        }
    }
}

fn evaluate_strategy(
    strategy: StrategyType,
    config: &StrategyConfig,
    chain: &PricedChain,
    stale_quote_secs: i64,
) -> StrategyOutcome {
    let filtered = StrikeFilter::new(strategy, &config.filter).select(chain);
    let built = CandidateBuilder::build(strategy, chain, config, &filtered.accepted);

    let mut rejections = filtered.rejections;
    rejections.extend(built.rejections);

    let engine = ScoringEngine::new(chain, stale_quote_secs);
    let mut proposals = Vec::new();
    for candidate in &built.candidates {
        match engine.score(candidate, config) {
            Ok(scored) => proposals.push(scored),
            Err(record) => rejections.push(record),
        }
    }

    debug!(
        strategy = %strategy,
        accepted_strikes = filtered.accepted.len(),
        candidates = built.candidates.len(),
        proposals = proposals.len(),
        rejections = rejections.len(),
        "Strategy evaluated"
    );

    StrategyOutcome {
        stats: StrategyStats {
            strategy,
            evaluated_strikes: filtered.evaluated,
            accepted_strikes: filtered.accepted.len(),
            candidates: built.candidates.len(),
            proposals: proposals.len(),
            rejections: rejections.len(),
        },
        proposals,
        rejections,
        zero_survivors: filtered.zero_survivors,
    }
}

/// Higher score first; low-confidence proposals sink below the rest when `demote` is set.
fn rank(a: &ScoredCandidate, b: &ScoredCandidate, demote: bool) -> Ordering {
    let confidence = if demote {
        a.metrics.low_confidence.cmp(&b.metrics.low_confidence)
    } else {
        Ordering::Equal
    };
    confidence
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| a.candidate.describe().cmp(&b.candidate.describe()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Leg, OptionRight};
    use crate::config::PipelineConfig;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn leg(strike: Decimal, right: OptionRight, bid: Decimal, ask: Decimal) -> Leg {
        Leg::new("SPY", NaiveDate::from_ymd_opt(2026, 1, 30).unwrap(), strike, right)
            .with_quote(bid, ask)
            .with_iv(0.22)
            .with_liquidity(200, 1_500)
    }

    fn snapshot() -> ChainSnapshot {
        ChainSnapshot::new(
            "SPY",
            dec!(100),
            0.04,
            Utc.with_ymd_and_hms(2026, 1, 2, 15, 0, 0).unwrap(),
            vec![
                leg(dec!(85), OptionRight::Put, dec!(0.10), dec!(0.15)),
                leg(dec!(90), OptionRight::Put, dec!(0.35), dec!(0.45)),
                leg(dec!(95), OptionRight::Put, dec!(1.10), dec!(1.20)),
                leg(dec!(105), OptionRight::Call, dec!(0.90), dec!(1.00)),
                leg(dec!(110), OptionRight::Call, dec!(0.20), dec!(0.30)),
                leg(dec!(115), OptionRight::Call, dec!(0.05), dec!(0.10)),
            ],
        )
    }

    fn config(parallel: bool) -> EngineConfig {
        let mut config = EngineConfig {
            pipeline: PipelineConfig {
                parallel,
                ..PipelineConfig::default()
            },
            ..EngineConfig::default()
        };
        config
            .strategies
            .retain(|name, _| name == "bull_put_spread" || name == "iron_condor");
        config
    }

    #[test]
    fn parallel_and_sequential_runs_agree() {
        let parallel = PipelineOrchestrator::new(config(true)).unwrap().run(snapshot());
        let sequential = PipelineOrchestrator::new(config(false)).unwrap().run(snapshot());

        let describe = |report: &PipelineReport| {
            report
                .proposals
                .iter()
                .map(|p| p.candidate.describe())
                .collect::<Vec<_>>()
        };
        assert_eq!(describe(&parallel), describe(&sequential));
        assert_eq!(parallel.summary, sequential.summary);
    }

    #[test]
    fn proposals_are_sorted_and_capped() {
        let mut config = config(true);
        config.pipeline.max_proposals = 1;
        let report = PipelineOrchestrator::new(config).unwrap().run(snapshot());
        assert!(report.proposals.len() <= 1);
        assert_eq!(report.strategies.len(), 2);
        assert_eq!(report.source_counts["true"], 6);
    }

    #[test]
    fn ranking_demotes_low_confidence() {
        let report = PipelineOrchestrator::new(config(false)).unwrap().run(snapshot());
        let Some(best) = report.best().cloned() else {
            return;
        };
        let mut stale = best.clone();
        stale.metrics.low_confidence = true;
        stale.score = best.score + 100.0;
        assert_eq!(rank(&best, &stale, true), Ordering::Less);
        assert_eq!(rank(&best, &stale, false), Ordering::Greater);
    }

    #[test]
    fn unknown_strategy_fails_at_construction() {
        let mut config = EngineConfig::default();
        config
            .strategies
            .insert("jade_lizard".to_string(), StrategyConfig::default());
        assert!(PipelineOrchestrator::new(config).is_err());
    }
}
