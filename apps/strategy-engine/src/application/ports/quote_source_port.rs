//! Quote Source Port
//!
//! Live quotes for the legs of an open position. The exit flow re-prices
//! every stage from a fresh snapshot.

use async_trait::async_trait;

use crate::chain::{ChainSnapshot, ContractKey};

/// Quote source error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteSourceError {
    /// The source is not reachable.
    #[error("Quote source unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// Unknown underlying.
    #[error("No quotes for underlying {underlying}")]
    UnknownUnderlying {
        /// Requested symbol.
        underlying: String,
    },
}

/// Port for live quotes.
#[async_trait]
pub trait QuoteSourcePort: Send + Sync {
    /// Snapshot containing the requested contracts that the source knows about.
    async fn snapshot(
        &self,
        underlying: &str,
        keys: &[ContractKey],
    ) -> Result<ChainSnapshot, QuoteSourceError>;
}
