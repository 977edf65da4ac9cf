//! Error taxonomy for the strategy engine.
//!
//! Evaluation errors (`MissingDataError`, `QuoteStaleError`, `ValidationError`)
//! never abort a run; they are turned into rejection records or excluded-leg
//! notes. Boundary errors (ingestion, configuration, exit execution) are
//! unified by [`EngineError`] and carry a stable [`ErrorCode`].
//!
//! | Code | Raised by |
//! |------|-----------|
//! | `INVALID_CHAIN` | snapshot ingestion |
//! | `INVALID_CONFIG` | config loading and validation |
//! | `UNKNOWN_STRATEGY` | strategy name lookup |
//! | `INVALID_RULE` | rule parsing |
//! | `ORDER_SUBMISSION_FAILED` | broker port |
//! | `QUOTES_UNAVAILABLE` | quote source port |
//! | `FORCE_EXIT_FAILED` | exit state machine |
//! | `IO_ERROR` | binary input/output |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ports::{OrderSubmissionError, QuoteSourceError};
use crate::chain::IngestError;
use crate::config::ConfigError;
use crate::exit::ExitError;
use crate::rules::RuleError;
use crate::strategy::UnknownStrategyError;

/// A leg or candidate lacks data needed to price or score it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing data for {subject}: {detail}")]
pub struct MissingDataError {
    /// Leg or candidate description.
    pub subject: String,
    /// What is missing.
    pub detail: String,
}

impl MissingDataError {
    /// Create a missing-data error.
    #[must_use]
    pub fn new(subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            detail: detail.into(),
        }
    }
}

/// A quote is older than the configured threshold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Stale quote for {subject}: {age_secs}s old (threshold {threshold_secs}s)")]
pub struct QuoteStaleError {
    /// Leg description.
    pub subject: String,
    /// Quote age.
    pub age_secs: i64,
    /// Configured threshold.
    pub threshold_secs: i64,
}

/// A candidate failed a policy gate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A leg is below the liquidity minimums.
    #[error("Illiquid leg {leg}: volume {volume} (min {min_volume}), open interest {open_interest} (min {min_open_interest})")]
    Liquidity {
        /// Leg description.
        leg: String,
        /// Leg volume.
        volume: u64,
        /// Required volume.
        min_volume: u64,
        /// Leg open interest.
        open_interest: u64,
        /// Required open interest.
        min_open_interest: u64,
    },

    /// Too many legs priced from fallback sources.
    #[error("Fallback quota exceeded: {count} fallback-priced legs, cap {cap}")]
    FallbackQuota {
        /// Fallback-priced legs.
        count: usize,
        /// Allowed for this leg count.
        cap: usize,
    },

    /// Credit strategy without a positive net credit.
    #[error("Net credit {net} is not positive")]
    NonPositiveCredit {
        /// Net premium per share.
        net: String,
    },

    /// Reward too small relative to risk.
    #[error("Risk/reward {ratio:.3} below minimum {min:.3}")]
    RiskReward {
        /// max_profit / |max_loss|.
        ratio: f64,
        /// Configured floor.
        min: f64,
    },

    /// A metric is below its configured floor.
    #[error("{metric} {value:.4} below minimum {min:.4}")]
    BelowFloor {
        /// Metric name.
        metric: &'static str,
        /// Observed value.
        value: f64,
        /// Configured floor.
        min: f64,
    },
}

/// Stable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed chain snapshot.
    InvalidChain,
    /// Invalid configuration.
    InvalidConfig,
    /// Strategy name outside the closed set.
    UnknownStrategy,
    /// Rule text did not parse.
    InvalidRule,
    /// Exit intent failed validation; nothing was sent.
    InvalidIntent,
    /// Broker refused or failed an order.
    OrderSubmissionFailed,
    /// Live quotes could not be fetched.
    QuotesUnavailable,
    /// Force-exit failed; position may still be open.
    ForceExitFailed,
    /// Input/output failure.
    IoError,
}

impl ErrorCode {
    /// Reason string.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidChain => "INVALID_CHAIN",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::UnknownStrategy => "UNKNOWN_STRATEGY",
            Self::InvalidRule => "INVALID_RULE",
            Self::InvalidIntent => "INVALID_INTENT",
            Self::OrderSubmissionFailed => "ORDER_SUBMISSION_FAILED",
            Self::QuotesUnavailable => "QUOTES_UNAVAILABLE",
            Self::ForceExitFailed => "FORCE_EXIT_FAILED",
            Self::IoError => "IO_ERROR",
        }
    }

    /// Process exit code for the binary.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidChain
            | Self::InvalidConfig
            | Self::UnknownStrategy
            | Self::InvalidRule
            | Self::InvalidIntent => 2,
            Self::OrderSubmissionFailed | Self::QuotesUnavailable | Self::ForceExitFailed => 3,
            Self::IoError => 1,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// Boundary error for library callers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Snapshot ingestion failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unknown strategy name.
    #[error(transparent)]
    UnknownStrategy(#[from] UnknownStrategyError),

    /// Rule text did not parse.
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// Broker error outside the exit state machine.
    #[error(transparent)]
    OrderSubmission(#[from] OrderSubmissionError),

    /// Quote source error outside the exit state machine.
    #[error(transparent)]
    QuoteSource(#[from] QuoteSourceError),

    /// Exit state machine failure.
    #[error(transparent)]
    Exit(#[from] ExitError),

    /// Input/output failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON input could not be decoded.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Stable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Ingest(_) | Self::Json(_) => ErrorCode::InvalidChain,
            Self::Config(ConfigError::UnknownStrategy(_)) | Self::UnknownStrategy(_) => {
                ErrorCode::UnknownStrategy
            }
            Self::Config(_) => ErrorCode::InvalidConfig,
            Self::Rule(_) => ErrorCode::InvalidRule,
            Self::OrderSubmission(_) => ErrorCode::OrderSubmissionFailed,
            Self::QuoteSource(_) => ErrorCode::QuotesUnavailable,
            Self::Exit(ExitError::InvalidIntent { .. }) => ErrorCode::InvalidIntent,
            Self::Exit(ExitError::ForceExitFailed { .. }) => ErrorCode::ForceExitFailed,
            Self::Io(_) => ErrorCode::IoError,
        }
    }
}
