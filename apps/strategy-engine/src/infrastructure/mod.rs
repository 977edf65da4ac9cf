//! Adapters for the application ports.

pub mod broker;
pub mod quotes;

pub use broker::{SimulatedBroker, SimulatedFill};
pub use quotes::StaticQuoteSource;
