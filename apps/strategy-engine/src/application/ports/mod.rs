//! Driven ports.
//!
//! The engine talks to a broker and a live quote source only through these
//! traits. Adapters live in `infrastructure`.

mod exit_broker_port;
mod quote_source_port;

pub use exit_broker_port::{
    ExitBrokerPort, ExitOrderRequest, ExitSide, OrderAck, OrderLeg, OrderStatus,
    OrderSubmissionError, OrderType,
};
pub use quote_source_port::{QuoteSourceError, QuoteSourcePort};
