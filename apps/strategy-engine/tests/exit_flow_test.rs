//! Integration tests for the staged exit flow.
//!
//! Drive `ExitOrchestrator` against the simulated broker and static quote
//! source with short stage waits.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use strategy_engine::application::ports::{ExitSide, OrderType, QuoteSourceError};
use strategy_engine::exit::{AttemptOutcome, ExitStage, stage_plan};
use strategy_engine::infrastructure::SimulatedFill;
use strategy_engine::{
    ChainSnapshot, ContractKey, EngineConfig, ExitError, ExitIntent, ExitOrchestrator, ExitPolicy,
    ExitStatus, Leg, OptionRight, PipelineOrchestrator, PriceResolver, RawChain, SimulatedBroker,
    StaticQuoteSource,
};
use tokio_util::sync::CancellationToken;

fn expiry() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 30).unwrap()
}

fn put(strike: Decimal) -> ContractKey {
    ContractKey::new(expiry(), strike, OptionRight::Put)
}

fn policy() -> ExitPolicy {
    ExitPolicy {
        stage_wait_ms: 30,
        poll_interval_ms: 5,
        ..ExitPolicy::default()
    }
}

/// Short 95/90 put spread: mid net 0.70, natural net 0.80.
fn intent() -> ExitIntent {
    ExitIntent::new("pos-1", "SPY", policy())
        .with_leg(put(dec!(95)), ExitSide::BuyToClose, 1)
        .with_leg(put(dec!(90)), ExitSide::SellToClose, 1)
}

fn quotes(age_secs: i64) -> StaticQuoteSource {
    let as_of = Utc.with_ymd_and_hms(2026, 1, 2, 15, 0, 0).unwrap();
    let quoted_at = as_of - chrono::Duration::seconds(age_secs);
    StaticQuoteSource::new(ChainSnapshot::new(
        "SPY",
        dec!(100),
        0.04,
        as_of,
        vec![
            Leg::new("SPY", expiry(), dec!(95), OptionRight::Put)
                .with_quote(dec!(1.00), dec!(1.10))
                .with_quoted_at(quoted_at),
            Leg::new("SPY", expiry(), dec!(90), OptionRight::Put)
                .with_quote(dec!(0.30), dec!(0.40))
                .with_quoted_at(quoted_at),
        ],
    ))
}

fn orchestrator(
    broker: SimulatedBroker,
    quotes: StaticQuoteSource,
) -> (
    ExitOrchestrator<SimulatedBroker, StaticQuoteSource>,
    Arc<SimulatedBroker>,
    Arc<StaticQuoteSource>,
) {
    let broker = Arc::new(broker);
    let quotes = Arc::new(quotes);
    let orchestrator =
        ExitOrchestrator::new(Arc::clone(&broker), Arc::clone(&quotes), PriceResolver::default());
    (orchestrator, broker, quotes)
}

#[tokio::test]
async fn test_ladder_escalates_until_fill() {
    let (exit, broker, _) = orchestrator(SimulatedBroker::new().marketable_at(dec!(0.80)), quotes(1));
    let result = exit.execute(&intent(), &CancellationToken::new()).await.unwrap();

    assert_eq!(result.status, ExitStatus::Filled);
    assert_eq!(
        result.stages(),
        vec![ExitStage::Primary, ExitStage::Ladder(1), ExitStage::Ladder(2)]
    );
    let limits: Vec<Decimal> = result.attempts.iter().filter_map(|a| a.limit_price).collect();
    assert_eq!(limits, vec![dec!(0.70), dec!(0.75), dec!(0.80)]);
    assert!(limits.windows(2).all(|w| w[0] < w[1]));

    // Every unfilled order was cancelled before the next stage.
    assert_eq!(broker.cancelled().len(), 2);
    assert_eq!(result.fill().map(|a| a.stage), Some(ExitStage::Ladder(2)));
    let order_counts: Vec<usize> = result.attempts.iter().map(|a| a.order_ids.len()).collect();
    assert_eq!(order_counts, vec![0, 0, 1]);
}

#[tokio::test]
async fn test_primary_fill_stops_the_flow() {
    let (exit, broker, _) = orchestrator(SimulatedBroker::new().marketable_at(dec!(0.50)), quotes(1));
    let result = exit.execute(&intent(), &CancellationToken::new()).await.unwrap();

    assert_eq!(result.status, ExitStatus::Filled);
    assert_eq!(result.attempts.len(), 1);
    assert_eq!(broker.submitted().len(), 1);
    assert_eq!(result.attempts[0].fill_price, Some(dec!(0.70)));
}

#[tokio::test]
async fn test_stale_quotes_skip_to_force_exit() {
    let (exit, broker, _) = orchestrator(SimulatedBroker::new(), quotes(10));
    let result = exit.execute(&intent(), &CancellationToken::new()).await.unwrap();

    assert_eq!(
        result.stages(),
        vec![ExitStage::Primary, ExitStage::Fallback, ExitStage::Force]
    );
    let outcomes: Vec<AttemptOutcome> = result.attempts.iter().map(|a| a.outcome).collect();
    assert_eq!(
        outcomes,
        vec![AttemptOutcome::Skipped, AttemptOutcome::Skipped, AttemptOutcome::Filled]
    );
    assert_eq!(result.attempts[0].excluded_legs.len(), 2);
    assert!(result.attempts[0].excluded_legs[0].reason.contains("Stale quote"));

    let submitted = broker.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].order_type, OrderType::Market);
    assert_eq!(result.status, ExitStatus::Filled);
}

#[tokio::test]
async fn test_unavailable_quotes_still_force_exit() {
    let source = quotes(1);
    source.set_failure(Some(QuoteSourceError::Unavailable {
        message: "feed down".to_string(),
    }));
    let (exit, _, quotes) = orchestrator(SimulatedBroker::new(), source);
    let result = exit.execute(&intent(), &CancellationToken::new()).await.unwrap();

    assert_eq!(result.status, ExitStatus::Filled);
    assert_eq!(result.attempts.last().map(|a| a.stage), Some(ExitStage::Force));
    assert_eq!(quotes.requests(), 2);
}

#[tokio::test]
async fn test_refused_force_exit_is_an_error() {
    let (exit, broker, _) = orchestrator(SimulatedBroker::new().rejecting_market_orders(), quotes(1));
    let intent = intent();
    let err = exit.execute(&intent, &CancellationToken::new()).await.unwrap_err();

    let result = match err {
        ExitError::ForceExitFailed { result, .. } => result,
        other => panic!("expected ForceExitFailed, got {other:?}"),
    };
    assert_eq!(result.status, ExitStatus::Failed);
    assert_eq!(result.stages(), stage_plan(&intent.policy));
    assert_eq!(result.attempts.last().map(|a| a.outcome), Some(AttemptOutcome::Rejected));
    assert_eq!(broker.submitted().len(), 6);
}

#[tokio::test]
async fn test_partial_fill_ends_the_flow() {
    let broker = SimulatedBroker::new().with_script([SimulatedFill::Partial(1)]);
    let intent = ExitIntent::new("pos-2", "SPY", policy())
        .with_leg(put(dec!(95)), ExitSide::BuyToClose, 2)
        .with_leg(put(dec!(90)), ExitSide::SellToClose, 2);
    let (exit, _, _) = orchestrator(broker, quotes(1));
    let result = exit.execute(&intent, &CancellationToken::new()).await.unwrap();

    assert_eq!(result.status, ExitStatus::PartiallyFilled);
    assert_eq!(result.attempts.len(), 1);
    assert_eq!(result.attempts[0].filled_qty, 1);
}

#[tokio::test]
async fn test_cancelled_before_start_sends_nothing() {
    let (exit, broker, _) = orchestrator(SimulatedBroker::new(), quotes(1));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = exit.execute(&intent(), &cancel).await.unwrap();

    assert_eq!(result.status, ExitStatus::Failed);
    assert!(result.attempts.is_empty());
    assert!(broker.submitted().is_empty());
}

#[tokio::test]
async fn test_cancel_during_wait_marks_attempt_incomplete() {
    let intent = ExitIntent {
        policy: ExitPolicy {
            stage_wait_ms: 5_000,
            poll_interval_ms: 10,
            ..ExitPolicy::default()
        },
        ..intent()
    };
    let (exit, broker, _) = orchestrator(SimulatedBroker::new(), quotes(1));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let result = exit.execute(&intent, &cancel).await.unwrap();
    assert_eq!(result.status, ExitStatus::Failed);
    assert_eq!(result.attempts.len(), 1);
    assert_eq!(result.attempts[0].outcome, AttemptOutcome::Incomplete);
    assert_eq!(broker.cancelled().len(), 1);
}

#[tokio::test]
async fn test_invalid_intent_is_refused_upfront() {
    let (exit, broker, _) = orchestrator(SimulatedBroker::new(), quotes(1));
    let empty = ExitIntent::new("pos-3", "SPY", policy());
    let err = exit.execute(&empty, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ExitError::InvalidIntent { .. }));
    assert!(broker.submitted().is_empty());
}

#[tokio::test]
async fn test_intents_run_concurrently_and_independently() {
    let (exit, _, _) = orchestrator(SimulatedBroker::new().marketable_at(Decimal::ZERO), quotes(1));
    let second = ExitIntent {
        id: "pos-4".to_string(),
        ..intent()
    };
    let results = exit
        .execute_all(&[intent(), second], &CancellationToken::new())
        .await;

    assert_eq!(results.len(), 2);
    let ids: Vec<String> = results
        .into_iter()
        .map(|r| {
            let result = r.unwrap();
            assert_eq!(result.status, ExitStatus::Filled);
            result.intent_id
        })
        .collect();
    assert_eq!(ids, vec!["pos-1".to_string(), "pos-4".to_string()]);
}

#[tokio::test]
async fn test_closing_a_pipeline_proposal() {
    let raw: RawChain = serde_json::from_str(include_str!("fixtures/spy_chain.json")).unwrap();
    let snapshot = ChainSnapshot::ingest(raw).unwrap();
    let report = PipelineOrchestrator::new(EngineConfig::default())
        .unwrap()
        .run(snapshot.clone());
    let Some(best) = report.best() else {
        return;
    };

    let intent = ExitIntent::closing("pos-5", &best.candidate, 2, policy());
    assert_eq!(intent.legs.len(), best.candidate.legs.len());
    assert!(intent.legs.iter().all(|leg| leg.quantity >= 2));

    let (exit, broker, _) = orchestrator(
        SimulatedBroker::new().marketable_at(dec!(-1000)),
        StaticQuoteSource::new(snapshot),
    );
    let result = exit.execute(&intent, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.status, ExitStatus::Filled);
    assert_eq!(broker.submitted()[0].legs, intent.legs);
}
