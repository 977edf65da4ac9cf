//! Metrics for pipeline runs and exit flows.
//!
//! Recorded through the `metrics` facade; the host process installs the
//! exporter. Without one, every call is a no-op.

use metrics::{counter, histogram};

/// Record a completed pipeline run.
///
/// # Arguments
///
/// * `underlying` - Underlying symbol
/// * `proposals` - Ranked proposals returned
/// * `rejections` - Rejection records produced
/// * `duration_seconds` - Wall time of the run
pub fn record_pipeline_run(
    underlying: &str,
    proposals: usize,
    rejections: usize,
    duration_seconds: f64,
) {
    counter!("strategy_pipeline_runs_total", "underlying" => underlying.to_string()).increment(1);
    counter!("strategy_proposals_total", "underlying" => underlying.to_string())
        .increment(proposals as u64);
    counter!("strategy_rejections_total", "underlying" => underlying.to_string())
        .increment(rejections as u64);
    histogram!("strategy_pipeline_duration_seconds").record(duration_seconds);
}

/// Record rejections for one strategy and category.
pub fn record_rejections(strategy: &str, category: &str, count: usize) {
    counter!(
        "strategy_rejections_by_category_total",
        "strategy" => strategy.to_string(),
        "category" => category.to_string()
    )
    .increment(count as u64);
}

/// Record one exit attempt.
///
/// # Arguments
///
/// * `stage` - Stage kind (`primary`, `ladder`, `fallback`, `force`)
/// * `outcome` - Attempt outcome tag
pub fn record_exit_attempt(stage: &str, outcome: &str) {
    counter!(
        "exit_attempts_total",
        "stage" => stage.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a finished exit flow.
pub fn record_exit_flow(status: &str, attempts: usize, duration_seconds: f64) {
    counter!("exit_flows_total", "status" => status.to_string()).increment(1);
    histogram!("exit_flow_attempts").record(attempts as f64);
    histogram!("exit_flow_duration_seconds").record(duration_seconds);
}
