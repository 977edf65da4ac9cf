//! Chain ingestion errors.

use thiserror::Error;

/// Errors raised while ingesting a raw chain snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// A leg field failed validation.
    #[error("Leg {index}: invalid {field}: {message}")]
    InvalidField {
        /// Position of the leg in the raw snapshot.
        index: usize,
        /// Canonical field name.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// Greeks were only partially supplied.
    #[error("Leg {index}: greeks must be supplied together (missing {missing})")]
    PartialGreeks {
        /// Position of the leg in the raw snapshot.
        index: usize,
        /// Names of the missing greeks.
        missing: String,
    },

    /// Two legs share the same strike/expiry/right.
    #[error("Leg {index}: duplicate contract {contract}")]
    DuplicateContract {
        /// Position of the duplicate leg.
        index: usize,
        /// Contract label.
        contract: String,
    },

    /// Snapshot-level field failed validation.
    #[error("Snapshot: invalid {field}: {message}")]
    InvalidSnapshot {
        /// Canonical field name.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },
}
