//! Option chain snapshots.
//!
//! Raw leg records arrive from the chain-normalization collaborator with a
//! single canonical naming scheme. They are validated here, once, and turned
//! into immutable [`Leg`] values; nothing downstream tolerates missing or
//! renamed fields.

mod error;
mod leg;
mod snapshot;

pub use error::IngestError;
pub use leg::{ContractKey, Leg, OptionRight, RawLeg};
pub use snapshot::{ChainSnapshot, RawChain};
