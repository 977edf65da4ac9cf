//! Broker adapters.

mod simulated;

pub use simulated::{SimulatedBroker, SimulatedFill};
