//! Integration tests for the entry pipeline.
//!
//! Run the full chain: ingest a fixture snapshot, resolve prices, filter,
//! build and score every enabled strategy, then check report invariants.

use std::collections::BTreeMap;

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use strategy_engine::chain::{Leg, OptionRight};
use strategy_engine::config::PipelineConfig;
use strategy_engine::{
    ChainSnapshot, EngineConfig, PipelineOrchestrator, PriceResolver, PriceSource, RawChain,
    StrategyType, load_config_from_string,
};

const FIXTURE: &str = include_str!("fixtures/spy_chain.json");

fn fixture() -> ChainSnapshot {
    let raw: RawChain = serde_json::from_str(FIXTURE).unwrap();
    ChainSnapshot::ingest(raw).unwrap()
}

#[test]
fn test_fixture_ingests_every_leg() {
    let snapshot = fixture();
    assert_eq!(snapshot.underlying, "SPY");
    assert_eq!(snapshot.legs.len(), 18);
    assert_eq!(snapshot.expiries().len(), 1);
}

#[test]
fn test_report_accounts_for_every_strategy() {
    let orchestrator = PipelineOrchestrator::new(EngineConfig::default()).unwrap();
    let report = orchestrator.run(fixture());

    assert_eq!(report.strategies.len(), StrategyType::ALL.len());
    assert_eq!(report.summary.total, report.rejections.len());

    let proposals: usize = report.strategies.iter().map(|s| s.proposals).sum();
    assert!(report.proposals.len() <= proposals);
    let rejections: usize = report.strategies.iter().map(|s| s.rejections).sum();
    assert_eq!(rejections, report.rejections.len());

    let resolved: usize = report.source_counts.values().sum();
    assert_eq!(resolved, 18);
}

#[test]
fn test_proposals_respect_gates_and_ranking() {
    let config = EngineConfig::default();
    let orchestrator = PipelineOrchestrator::new(config.clone()).unwrap();
    let report = orchestrator.run(fixture());

    for proposal in &report.proposals {
        let strategy = proposal.candidate.strategy;
        let floor = config.strategies[strategy.as_str()].min_risk_reward;
        assert!(proposal.metrics.margin > Decimal::ZERO, "{}", proposal.candidate.describe());
        assert!(proposal.metrics.risk_reward >= floor);
        assert!((0.0..=1.0).contains(&proposal.metrics.pos));
        assert!(proposal.candidate.legs.iter().all(|leg| leg.resolution.is_priced()));
    }

    for pair in report.proposals.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.metrics.low_confidence == b.metrics.low_confidence {
            assert!(a.score >= b.score);
        } else {
            assert!(!a.metrics.low_confidence);
        }
    }
}

#[test]
fn test_runs_are_deterministic() {
    let orchestrator = PipelineOrchestrator::new(EngineConfig::default()).unwrap();
    let first = orchestrator.run(fixture());
    let second = orchestrator.run(fixture());

    let describe = |report: &strategy_engine::PipelineReport| {
        report
            .proposals
            .iter()
            .map(|p| (p.candidate.describe(), p.score))
            .collect::<Vec<_>>()
    };
    assert_eq!(describe(&first), describe(&second));
    assert_eq!(first.summary, second.summary);
}

#[test]
fn test_yaml_config_selects_strategies() {
    let yaml = r"
strategies:
  bull_put_spread:
    widths: ['5']
  iron_condor:
    enabled: false
pipeline:
  parallel: false
  max_proposals: 3
";
    let config = load_config_from_string(yaml).unwrap();
    let orchestrator = PipelineOrchestrator::new(config).unwrap();
    assert_eq!(
        orchestrator.strategies().collect::<Vec<_>>(),
        vec![StrategyType::BullPutSpread]
    );

    let report = orchestrator.run(fixture());
    assert!(report.proposals.len() <= 3);
    assert!(
        report
            .proposals
            .iter()
            .all(|p| p.candidate.strategy == StrategyType::BullPutSpread)
    );
}

#[test]
fn test_single_proposal_cap() {
    let config = EngineConfig {
        pipeline: PipelineConfig {
            max_proposals: 1,
            ..PipelineConfig::default()
        },
        ..EngineConfig::default()
    };
    let report = PipelineOrchestrator::new(config).unwrap().run(fixture());
    assert!(report.proposals.len() <= 1);
}

#[test]
fn test_unknown_strategy_in_yaml_fails() {
    let yaml = "strategies:\n  jade_lizard: {}\n";
    assert!(load_config_from_string(yaml).is_err());
}

fn leg_strategy() -> impl Strategy<Value = (u32, bool, Option<(u32, u32)>, Option<u32>)> {
    (
        80u32..=120,
        any::<bool>(),
        proptest::option::of((1u32..500, 1u32..100)),
        proptest::option::of(1u32..2_000),
    )
}

proptest! {
    #[test]
    fn resolution_is_idempotent(specs in proptest::collection::vec(leg_strategy(), 1..12)) {
        let expiry = chrono::NaiveDate::from_ymd_opt(2026, 1, 30).unwrap();
        let mut seen = BTreeMap::new();
        for (strike, is_call, quote, close) in specs {
            let right = if is_call { OptionRight::Call } else { OptionRight::Put };
            let mut leg = Leg::new("SPY", expiry, Decimal::from(strike), right);
            if let Some((bid_cents, width_cents)) = quote {
                let bid = Decimal::new(i64::from(bid_cents), 2);
                leg = leg.with_quote(bid, bid + Decimal::new(i64::from(width_cents), 2));
            }
            if let Some(close_cents) = close {
                leg = leg.with_close(Decimal::new(i64::from(close_cents), 2));
            }
            seen.insert(leg.key(), leg);
        }
        let snapshot = ChainSnapshot::new(
            "SPY",
            dec!(100),
            0.04,
            chrono::DateTime::parse_from_rfc3339("2026-01-02T15:00:00Z").unwrap().to_utc(),
            seen.into_values().collect(),
        );

        let resolver = PriceResolver::default();
        let summarize = |snapshot: &ChainSnapshot| {
            resolver
                .resolve(snapshot)
                .into_iter()
                .map(|r| (r.key, r.mid, r.source))
                .collect::<Vec<_>>()
        };
        let first = summarize(&snapshot);
        let second = summarize(&snapshot);
        prop_assert_eq!(&first, &second);

        for (_, mid, source) in &first {
            prop_assert_eq!(mid.is_none(), *source == PriceSource::Missing);
            if let Some(mid) = mid {
                prop_assert!(*mid > Decimal::ZERO);
            }
        }
    }
}
