//! Tracing setup.
//!
//! # Configuration
//!
//! - `RUST_LOG`: filter directives (default: `strategy_engine=info`)
//! - `NODE_ENV`: `development` switches to ANSI output without targets
//!
//! # Usage
//!
//! ```rust,ignore
//! use strategy_engine::telemetry::init_tracing;
//!
//! fn main() {
//!     init_tracing();
//!     // ... application code
//! }
//! ```

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "strategy_engine=info";

/// Install the console subscriber. Later calls are ignored.
pub fn init_tracing() {
    let is_development = std::env::var("NODE_ENV")
        .map(|v| v == "development")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // Output goes to stderr; stdout carries the report.
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(!is_development)
        .with_ansi(is_development)
        .try_init();

    if installed.is_ok() {
        tracing::debug!(filter = DEFAULT_FILTER, "Tracing initialized");
    }
}
