//! Leg condition rules.
//!
//! A closed grammar of metric comparisons joined by `and` / `or` / `not`,
//! written as text in configuration and parsed once at load time:
//!
//! ```text
//! term_slope >= 0 and (iv < 0.8 or not abs_delta > 0.3)
//! ```

mod ast;
mod error;
mod parser;

pub use ast::{CmpOp, Metric, MetricSource, Rule};
pub use error::RuleError;
