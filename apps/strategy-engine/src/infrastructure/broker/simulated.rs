//! Simulated broker for dry runs and tests.
//!
//! Each submitted order takes the next scripted [`SimulatedFill`]. Once the
//! script runs out, a limit order fills when its net price reaches
//! `marketable_at` and market orders fill unless `reject_market` is set.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::application::ports::{
    ExitBrokerPort, ExitOrderRequest, OrderAck, OrderStatus, OrderSubmissionError, OrderType,
};

/// Scripted broker reaction to one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatedFill {
    /// Fill on submission.
    Immediate,
    /// Fill after this many status polls.
    AfterPolls(u32),
    /// Rest until cancelled.
    Rest,
    /// Fill this many units, then rest.
    Partial(u32),
    /// Refuse the order at submission.
    Reject(String),
}

#[derive(Debug)]
struct SimulatedOrder {
    ack: OrderAck,
    polls_until_fill: Option<u32>,
    fill_price: Option<Decimal>,
}

#[derive(Debug, Default)]
struct BrokerState {
    script: VecDeque<SimulatedFill>,
    orders: HashMap<String, SimulatedOrder>,
    submitted: Vec<ExitOrderRequest>,
    cancelled: Vec<String>,
    next_id: u64,
}

/// In-process broker with scripted behavior.
#[derive(Debug, Default)]
pub struct SimulatedBroker {
    state: Mutex<BrokerState>,
    marketable_at: Option<Decimal>,
    reject_market: bool,
}

impl SimulatedBroker {
    /// Broker that lets every order rest until cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill limit orders whose net price is at or above `limit`.
    #[must_use]
    pub const fn marketable_at(mut self, limit: Decimal) -> Self {
        self.marketable_at = Some(limit);
        self
    }

    /// Refuse market orders.
    #[must_use]
    pub const fn rejecting_market_orders(mut self) -> Self {
        self.reject_market = true;
        self
    }

    /// Queue scripted reactions, consumed one per submitted order.
    #[must_use]
    pub fn with_script(self, script: impl IntoIterator<Item = SimulatedFill>) -> Self {
        self.lock().script.extend(script);
        self
    }

    /// Orders received so far, in submission order.
    #[must_use]
    pub fn submitted(&self) -> Vec<ExitOrderRequest> {
        self.lock().submitted.clone()
    }

    /// Broker ids of cancelled orders.
    #[must_use]
    pub fn cancelled(&self) -> Vec<String> {
        self.lock().cancelled.clone()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn default_reaction(&self, request: &ExitOrderRequest) -> SimulatedFill {
        match request.order_type {
            OrderType::Market if self.reject_market => {
                SimulatedFill::Reject("market orders disabled".to_string())
            }
            OrderType::Market => SimulatedFill::Immediate,
            OrderType::Limit => match (self.marketable_at, request.limit_price) {
                (Some(threshold), Some(limit)) if limit >= threshold => SimulatedFill::Immediate,
                _ => SimulatedFill::Rest,
            },
        }
    }
}

fn total_units(request: &ExitOrderRequest) -> u32 {
    request.legs.iter().map(|leg| leg.quantity).max().unwrap_or(0)
}

#[async_trait]
impl ExitBrokerPort for SimulatedBroker {
    async fn submit_order(
        &self,
        request: ExitOrderRequest,
    ) -> Result<OrderAck, OrderSubmissionError> {
        let reaction = {
            let mut state = self.lock();
            state.submitted.push(request.clone());
            state.script.pop_front()
        }
        .unwrap_or_else(|| self.default_reaction(&request));

        if let SimulatedFill::Reject(reason) = reaction {
            return Err(OrderSubmissionError::OrderRejected { reason });
        }

        let mut state = self.lock();
        state.next_id += 1;
        let broker_order_id = format!("sim-{}", state.next_id);
        let units = total_units(&request);
        let fill_price = request.limit_price;

        let mut ack = OrderAck {
            broker_order_id: broker_order_id.clone(),
            client_order_id: request.client_order_id,
            status: OrderStatus::Accepted,
            filled_qty: 0,
            avg_fill_price: None,
        };
        let mut polls_until_fill = None;
        match reaction {
            SimulatedFill::Immediate => {
                ack.status = OrderStatus::Filled;
                ack.filled_qty = units;
                ack.avg_fill_price = fill_price;
            }
            SimulatedFill::AfterPolls(polls) => polls_until_fill = Some(polls),
            SimulatedFill::Partial(qty) => {
                ack.status = OrderStatus::PartiallyFilled;
                ack.filled_qty = qty.min(units);
                ack.avg_fill_price = fill_price;
            }
            SimulatedFill::Rest | SimulatedFill::Reject(_) => {}
        }

        state.orders.insert(
            broker_order_id,
            SimulatedOrder {
                ack: ack.clone(),
                polls_until_fill,
                fill_price,
            },
        );
        Ok(ack)
    }

    async fn order_status(&self, broker_order_id: &str) -> Result<OrderAck, OrderSubmissionError> {
        let mut state = self.lock();
        let order =
            state
                .orders
                .get_mut(broker_order_id)
                .ok_or_else(|| OrderSubmissionError::OrderNotFound {
                    order_id: broker_order_id.to_string(),
                })?;

        if !order.ack.status.is_terminal() {
            match order.polls_until_fill {
                Some(0) => {
                    order.ack.status = OrderStatus::Filled;
                    order.ack.avg_fill_price = order.fill_price;
                    order.polls_until_fill = None;
                }
                Some(remaining) => {
                    order.ack.status = OrderStatus::Working;
                    order.polls_until_fill = Some(remaining - 1);
                }
                None => {}
            }
        }
        Ok(order.ack.clone())
    }

    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), OrderSubmissionError> {
        let mut state = self.lock();
        let order =
            state
                .orders
                .get_mut(broker_order_id)
                .ok_or_else(|| OrderSubmissionError::OrderNotFound {
                    order_id: broker_order_id.to_string(),
                })?;
        if !order.ack.status.is_terminal() {
            order.ack.status = OrderStatus::Cancelled;
            order.polls_until_fill = None;
        }
        state.cancelled.push(broker_order_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ExitSide, OrderLeg};
    use crate::chain::{ContractKey, OptionRight};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn legs() -> Vec<OrderLeg> {
        let expiry = NaiveDate::from_ymd_opt(2026, 1, 30).unwrap();
        vec![OrderLeg {
            key: ContractKey::new(expiry, dec!(95), OptionRight::Put),
            side: ExitSide::BuyToClose,
            quantity: 2,
        }]
    }

    fn limit(price: Decimal) -> ExitOrderRequest {
        ExitOrderRequest::limit("c-1".to_string(), "SPY".to_string(), legs(), price)
    }

    #[tokio::test]
    async fn marketable_limit_fills_immediately() {
        let broker = SimulatedBroker::new().marketable_at(dec!(1.00));

        let resting = broker.submit_order(limit(dec!(0.90))).await.unwrap();
        assert_eq!(resting.status, OrderStatus::Accepted);

        let filled = broker.submit_order(limit(dec!(1.05))).await.unwrap();
        assert_eq!(filled.status, OrderStatus::Filled);
        assert_eq!(filled.filled_qty, 2);
        assert_eq!(filled.avg_fill_price, Some(dec!(1.05)));
        assert_eq!(broker.submitted().len(), 2);
    }

    #[tokio::test]
    async fn fills_after_scripted_polls() {
        let broker = SimulatedBroker::new().with_script([SimulatedFill::AfterPolls(1)]);
        let ack = broker.submit_order(limit(dec!(0.50))).await.unwrap();

        let first = broker.order_status(&ack.broker_order_id).await.unwrap();
        assert_eq!(first.status, OrderStatus::Working);
        let second = broker.order_status(&ack.broker_order_id).await.unwrap();
        assert_eq!(second.status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn cancel_keeps_partial_quantity() {
        let broker = SimulatedBroker::new().with_script([SimulatedFill::Partial(1)]);
        let ack = broker.submit_order(limit(dec!(0.50))).await.unwrap();
        broker.cancel_order(&ack.broker_order_id).await.unwrap();

        let last = broker.order_status(&ack.broker_order_id).await.unwrap();
        assert_eq!(last.status, OrderStatus::Cancelled);
        assert_eq!(last.filled_qty, 1);
        assert_eq!(broker.cancelled(), vec![ack.broker_order_id]);
    }

    #[tokio::test]
    async fn market_orders_can_be_refused() {
        let broker = SimulatedBroker::new().rejecting_market_orders();
        let request = ExitOrderRequest::market("c-2".to_string(), "SPY".to_string(), legs());
        let err = broker.submit_order(request).await.unwrap_err();
        assert!(matches!(err, OrderSubmissionError::OrderRejected { .. }));
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let broker = SimulatedBroker::new();
        assert!(matches!(
            broker.order_status("sim-99").await,
            Err(OrderSubmissionError::OrderNotFound { .. })
        ));
    }
}
