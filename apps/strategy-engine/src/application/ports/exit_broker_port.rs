//! Exit Broker Port (Driven Port)
//!
//! Interface for submitting, polling and cancelling multi-leg closing orders.

use std::fmt;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::chain::ContractKey;

/// Closing side for one leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitSide {
    /// Close a short position.
    BuyToClose,
    /// Close a long position.
    SellToClose,
}

impl ExitSide {
    /// +1 when closing costs premium, -1 when it collects premium.
    #[must_use]
    pub const fn sign(self) -> i64 {
        match self {
            Self::BuyToClose => 1,
            Self::SellToClose => -1,
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Limit on the net combo price.
    Limit,
    /// Market.
    Market,
}

/// One leg of a closing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLeg {
    /// Contract.
    pub key: ContractKey,
    /// Closing side.
    pub side: ExitSide,
    /// Contracts.
    pub quantity: u32,
}

/// Request to submit a closing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitOrderRequest {
    /// Client order ID.
    pub client_order_id: String,
    /// Underlying symbol.
    pub underlying: String,
    /// Legs.
    pub legs: Vec<OrderLeg>,
    /// Order type.
    pub order_type: OrderType,
    /// Net limit per unit (positive = net debit paid); `None` for market orders.
    pub limit_price: Option<Decimal>,
}

impl ExitOrderRequest {
    /// Create a limit order request.
    #[must_use]
    pub const fn limit(
        client_order_id: String,
        underlying: String,
        legs: Vec<OrderLeg>,
        limit_price: Decimal,
    ) -> Self {
        Self {
            client_order_id,
            underlying,
            legs,
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
        }
    }

    /// Create a market order request.
    #[must_use]
    pub const fn market(client_order_id: String, underlying: String, legs: Vec<OrderLeg>) -> Self {
        Self {
            client_order_id,
            underlying,
            legs,
            order_type: OrderType::Market,
            limit_price: None,
        }
    }
}

/// Broker-side order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Accepted, not yet working.
    Accepted,
    /// Working at the exchange.
    Working,
    /// Some quantity filled, remainder working.
    PartiallyFilled,
    /// Completely filled.
    Filled,
    /// Cancelled.
    Cancelled,
    /// Rejected.
    Rejected,
}

impl OrderStatus {
    /// Whether the order can no longer change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Accepted => "accepted",
            Self::Working => "working",
            Self::PartiallyFilled => "partially_filled",
            Self::Filled => "filled",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Acknowledgment or status report from the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Broker-assigned order ID.
    pub broker_order_id: String,
    /// Client order ID echoed back.
    pub client_order_id: String,
    /// Current status.
    pub status: OrderStatus,
    /// Units filled.
    pub filled_qty: u32,
    /// Average net fill price.
    pub avg_fill_price: Option<Decimal>,
}

/// Broker port error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderSubmissionError {
    /// Connection error.
    #[error("Broker connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Order rejected by broker.
    #[error("Order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason.
        reason: String,
    },

    /// Order not found.
    #[error("Order not found: {order_id}")]
    OrderNotFound {
        /// The missing order ID.
        order_id: String,
    },

    /// Rate limited.
    #[error("Rate limited by broker")]
    RateLimited,
}

/// Port for closing-order interactions.
#[async_trait]
pub trait ExitBrokerPort: Send + Sync {
    /// Submit an order.
    async fn submit_order(&self, request: ExitOrderRequest)
    -> Result<OrderAck, OrderSubmissionError>;

    /// Current status of an order.
    async fn order_status(&self, broker_order_id: &str) -> Result<OrderAck, OrderSubmissionError>;

    /// Cancel a working order.
    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), OrderSubmissionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::OptionRight;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn legs() -> Vec<OrderLeg> {
        vec![OrderLeg {
            key: ContractKey::new(
                NaiveDate::from_ymd_opt(2026, 1, 30).unwrap(),
                dec!(95),
                OptionRight::Put,
            ),
            side: ExitSide::BuyToClose,
            quantity: 1,
        }]
    }

    #[test]
    fn limit_request_carries_price() {
        let request =
            ExitOrderRequest::limit("c-1".to_string(), "SPY".to_string(), legs(), dec!(0.45));
        assert_eq!(request.order_type, OrderType::Limit);
        assert_eq!(request.limit_price, Some(dec!(0.45)));
    }

    #[test]
    fn market_request_has_no_price() {
        let request = ExitOrderRequest::market("c-1".to_string(), "SPY".to_string(), legs());
        assert_eq!(request.order_type, OrderType::Market);
        assert!(request.limit_price.is_none());
    }

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
    }
}
