// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Strategy Engine - Rust Core Library
//!
//! Deterministic pricing, strategy construction, scoring and exit engine for
//! listed options.
//!
//! # Flow
//!
//! ```text
//! ChainSnapshot -> PriceResolver -> StrikeFilter -> CandidateBuilder
//!               -> ScoringEngine -> PipelineReport
//!
//! ExitIntent -> ExitOrchestrator (primary -> ladder -> fallback -> force)
//! ```
//!
//! ## Layers
//!
//! - **Domain**: `chain`, `pricing`, `options`, `rules`, `filter`,
//!   `strategy`, `scoring`, `exit`
//! - **Application**: `pipeline` orchestration and the `ports` used by the
//!   exit flow (`ExitBrokerPort`, `QuoteSourcePort`)
//! - **Infrastructure**: in-process adapters (`SimulatedBroker`,
//!   `StaticQuoteSource`)
//!
//! Every price is resolved exactly once per snapshot. Everything downstream
//! reads the resolved value and its source; nothing re-derives a mid.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Application layer - port definitions.
pub mod application;

/// Option chain snapshots and leg records.
pub mod chain;

/// Configuration loading and defaults.
pub mod config;

/// Error types and stable error codes.
pub mod error;

/// Staged exit state machine.
pub mod exit;

/// Strike filtering.
pub mod filter;

/// Infrastructure layer - port adapters.
pub mod infrastructure;

/// Metrics recording.
pub mod observability;

/// Greeks and aggregation.
pub mod options;

/// Pipeline orchestration.
pub mod pipeline;

/// Price resolution, Black-Scholes and implied volatility.
pub mod pricing;

/// Rejection records and summaries.
pub mod rejection;

/// Filter rule language.
pub mod rules;

/// Candidate scoring.
pub mod scoring;

/// Strategy types and candidate construction.
pub mod strategy;

/// Tracing setup.
pub mod telemetry;

pub use chain::{ChainSnapshot, ContractKey, Leg, OptionRight, RawChain};
pub use config::{EngineConfig, ExitPolicy, load_config, load_config_from_string};
pub use error::{EngineError, ErrorCode};
pub use exit::{ExitError, ExitFlowResult, ExitIntent, ExitOrchestrator, ExitStatus};
pub use pipeline::{PipelineOrchestrator, PipelineReport};
pub use pricing::{PriceResolver, PriceSource, PricedChain};
pub use rejection::{RejectionCategory, RejectionRecord, RejectionSummary};
pub use scoring::{ScoredCandidate, ScoringEngine};
pub use strategy::{CandidateBuilder, StrategyCandidate, StrategyType};

pub use application::ports::{ExitBrokerPort, QuoteSourcePort};
pub use infrastructure::{SimulatedBroker, StaticQuoteSource};
