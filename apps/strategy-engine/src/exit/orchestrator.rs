//! Exit state machine.
//!
//! ```text
//! primary -> ladder:1..N -> fallback -> force -> terminal
//! ```
//!
//! Transitions only move forward and each one appends an [`ExitAttempt`].
//! Any fill ends the flow. A priced stage without a usable net is skipped;
//! from primary or a ladder step the machine then jumps to fallback. Force
//! exit always runs before the flow is declared failed.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::attempt::{AttemptOutcome, ExitAttempt, ExitFlowResult, ExitStage, ExitStatus};
use super::error::ExitError;
use super::intent::ExitIntent;
use super::pricing::StagePricing;
use crate::application::ports::{
    ExitBrokerPort, ExitOrderRequest, OrderAck, OrderStatus, QuoteSourcePort,
};
use crate::config::ExitPolicy;
use crate::observability;
use crate::pricing::PriceResolver;

/// Stage sequence for a policy.
#[must_use]
pub fn stage_plan(policy: &ExitPolicy) -> Vec<ExitStage> {
    let mut stages = vec![ExitStage::Primary];
    stages.extend((1..=policy.effective_ladder_steps()).map(ExitStage::Ladder));
    stages.push(ExitStage::Fallback);
    stages.push(ExitStage::Force);
    stages
}

/// How a submitted order ended.
enum Wait {
    /// Reached a terminal status.
    Done(OrderAck),
    /// Still working when the stage wait ran out.
    TimedOut(OrderAck),
    /// The caller cancelled the flow.
    Cancelled(OrderAck),
}

/// Drives exit intents through the staged state machine.
pub struct ExitOrchestrator<B, Q> {
    broker: Arc<B>,
    quotes: Arc<Q>,
    resolver: PriceResolver,
}

impl<B, Q> ExitOrchestrator<B, Q>
where
    B: ExitBrokerPort,
    Q: QuoteSourcePort,
{
    /// Create an orchestrator.
    #[must_use]
    pub const fn new(broker: Arc<B>, quotes: Arc<Q>, resolver: PriceResolver) -> Self {
        Self {
            broker,
            quotes,
            resolver,
        }
    }

    /// Run several intents concurrently; each stays strictly sequential.
    pub async fn execute_all(
        &self,
        intents: &[ExitIntent],
        cancel: &CancellationToken,
    ) -> Vec<Result<ExitFlowResult, ExitError>> {
        join_all(intents.iter().map(|intent| self.execute(intent, cancel))).await
    }

    /// Run one intent to a terminal state.
    ///
    /// # Errors
    ///
    /// `InvalidIntent` before any order is sent; `ForceExitFailed` when the
    /// final market order is refused, carrying the full attempt trail.
    pub async fn execute(
        &self,
        intent: &ExitIntent,
        cancel: &CancellationToken,
    ) -> Result<ExitFlowResult, ExitError> {
        intent.validate()?;
        let started = Instant::now();
        let stages = stage_plan(&intent.policy);
        let fallback_at = stages.len().saturating_sub(2);
        let mut attempts: Vec<ExitAttempt> = Vec::with_capacity(stages.len());

        info!(
            intent_id = %intent.id,
            underlying = %intent.underlying,
            legs = intent.legs.len(),
            stages = stages.len(),
            "Starting exit flow"
        );

        let mut index = 0;
        let (status, reason) = loop {
            let Some(&stage) = stages.get(index) else {
                break (ExitStatus::Failed, "stages exhausted".to_string());
            };
            if cancel.is_cancelled() {
                break (ExitStatus::Failed, format!("cancelled before {stage}"));
            }

            let attempt = if stage.is_priced() {
                self.priced_attempt(intent, stage, cancel).await
            } else {
                self.force_attempt(intent, cancel).await
            };
            debug!(
                intent_id = %intent.id,
                stage = %stage,
                outcome = attempt.outcome.as_str(),
                limit = ?attempt.limit_price,
                excluded = attempt.excluded_legs.len(),
                "Exit attempt finished"
            );
            observability::record_exit_attempt(stage.kind(), attempt.outcome.as_str());
            let outcome = attempt.outcome;
            let attempt_reason = attempt.reason.clone();
            attempts.push(attempt);

            match outcome {
                AttemptOutcome::Filled => break (ExitStatus::Filled, format!("filled at {stage}")),
                AttemptOutcome::PartiallyFilled => {
                    break (ExitStatus::PartiallyFilled, format!("partially filled at {stage}"));
                }
                AttemptOutcome::Incomplete => {
                    break (ExitStatus::Failed, format!("cancelled during {stage}"));
                }
                AttemptOutcome::Rejected if stage == ExitStage::Force => {
                    let result = self.finish(
                        intent,
                        ExitStatus::Failed,
                        attempt_reason.clone(),
                        attempts,
                        started,
                    );
                    warn!(intent_id = %intent.id, reason = %attempt_reason, "Force exit failed");
                    return Err(ExitError::ForceExitFailed {
                        reason: attempt_reason,
                        result: Box::new(result),
                    });
                }
                AttemptOutcome::NotFilled if stage == ExitStage::Force => {
                    break (ExitStatus::Failed, "force exit not filled".to_string());
                }
                AttemptOutcome::Skipped if index < fallback_at => index = fallback_at,
                AttemptOutcome::Skipped | AttemptOutcome::NotFilled | AttemptOutcome::Rejected => {
                    index += 1;
                }
            }
        };

        Ok(self.finish(intent, status, reason, attempts, started))
    }

    fn finish(
        &self,
        intent: &ExitIntent,
        status: ExitStatus,
        reason: String,
        attempts: Vec<ExitAttempt>,
        started: Instant,
    ) -> ExitFlowResult {
        observability::record_exit_flow(
            status.as_str(),
            attempts.len(),
            started.elapsed().as_secs_f64(),
        );
        info!(
            intent_id = %intent.id,
            status = status.as_str(),
            attempts = attempts.len(),
            reason = %reason,
            "Exit flow finished"
        );
        ExitFlowResult {
            intent_id: intent.id.clone(),
            status,
            attempts,
            reason,
        }
    }

    async fn priced_attempt(
        &self,
        intent: &ExitIntent,
        stage: ExitStage,
        cancel: &CancellationToken,
    ) -> ExitAttempt {
        let snapshot = match self.quotes.snapshot(&intent.underlying, &intent.keys()).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                return ExitAttempt::new(
                    stage,
                    AttemptOutcome::Skipped,
                    format!("no live quotes: {err}"),
                );
            }
        };
        let pricing = StagePricing::from_snapshot(intent, &snapshot, &self.resolver);
        let limit = match pricing.limit_for(stage, intent) {
            Some(limit) if pricing.is_priceable() => limit,
            _ => {
                let mut attempt =
                    ExitAttempt::new(stage, AttemptOutcome::Skipped, pricing.skip_reason());
                attempt.excluded_legs = pricing.excluded;
                return attempt;
            }
        };

        let request = ExitOrderRequest::limit(
            Uuid::new_v4().to_string(),
            intent.underlying.clone(),
            intent.legs.clone(),
            limit,
        );
        let mut attempt = self.submit(stage, request, &intent.policy, cancel).await;
        attempt.limit_price = Some(limit);
        attempt.excluded_legs = pricing.excluded;
        attempt
    }

    async fn force_attempt(&self, intent: &ExitIntent, cancel: &CancellationToken) -> ExitAttempt {
        let request = ExitOrderRequest::market(
            Uuid::new_v4().to_string(),
            intent.underlying.clone(),
            intent.legs.clone(),
        );
        self.submit(ExitStage::Force, request, &intent.policy, cancel)
            .await
    }

    async fn submit(
        &self,
        stage: ExitStage,
        request: ExitOrderRequest,
        policy: &ExitPolicy,
        cancel: &CancellationToken,
    ) -> ExitAttempt {
        let ack = match self.broker.submit_order(request).await {
            Ok(ack) => ack,
            Err(err) => return ExitAttempt::new(stage, AttemptOutcome::Rejected, err.to_string()),
        };
        let order_id = ack.broker_order_id.clone();

        let (outcome, last, reason) = match self.wait(ack, policy, cancel).await {
            Wait::Done(ack) => match ack.status {
                OrderStatus::Filled => (AttemptOutcome::Filled, ack, "filled".to_string()),
                OrderStatus::Rejected => {
                    (AttemptOutcome::Rejected, ack, "rejected by broker".to_string())
                }
                _ => {
                    let outcome = partial_or_none(&ack);
                    (outcome, ack, "cancelled by broker".to_string())
                }
            },
            Wait::TimedOut(ack) => {
                let ack = self.cancel_working(ack).await;
                let outcome = if ack.status == OrderStatus::Filled {
                    AttemptOutcome::Filled
                } else {
                    partial_or_none(&ack)
                };
                let reason = format!("no fill within {}ms", policy.stage_wait_ms);
                (outcome, ack, reason)
            }
            Wait::Cancelled(ack) => {
                let ack = self.cancel_working(ack).await;
                (AttemptOutcome::Incomplete, ack, "cancelled by caller".to_string())
            }
        };

        let mut attempt = ExitAttempt::new(stage, outcome, reason);
        if outcome.has_fill() {
            attempt.order_ids = vec![order_id];
        } else {
            debug!(order_id = %order_id, stage = %stage, "Order closed without fill");
        }
        attempt.filled_qty = last.filled_qty;
        attempt.fill_price = last.avg_fill_price;
        attempt
    }

    /// Poll until terminal, timeout or cancellation.
    async fn wait(&self, ack: OrderAck, policy: &ExitPolicy, cancel: &CancellationToken) -> Wait {
        let deadline = tokio::time::Instant::now() + policy.stage_wait();
        let mut last = ack;
        loop {
            if last.status.is_terminal() {
                return Wait::Done(last);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Wait::TimedOut(last);
            }
            let nap = policy.poll_interval().min(deadline - now);
            tokio::select! {
                () = cancel.cancelled() => return Wait::Cancelled(last),
                () = tokio::time::sleep(nap) => {}
            }
            match self.broker.order_status(&last.broker_order_id).await {
                Ok(ack) => last = ack,
                Err(err) => warn!(
                    order_id = %last.broker_order_id,
                    error = %err,
                    "Order status poll failed"
                ),
            }
        }
    }

    /// Cancel a working order and return its final known state.
    async fn cancel_working(&self, ack: OrderAck) -> OrderAck {
        if let Err(err) = self.broker.cancel_order(&ack.broker_order_id).await {
            warn!(order_id = %ack.broker_order_id, error = %err, "Order cancel failed");
        }
        match self.broker.order_status(&ack.broker_order_id).await {
            Ok(latest) => latest,
            Err(_) => ack,
        }
    }
}

fn partial_or_none(ack: &OrderAck) -> AttemptOutcome {
    if ack.filled_qty > 0 {
        AttemptOutcome::PartiallyFilled
    } else {
        AttemptOutcome::NotFilled
    }
}
