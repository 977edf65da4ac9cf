//! Rule errors.

use thiserror::Error;

use super::ast::Metric;

/// Errors from parsing or evaluating a rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// Text could not be parsed.
    #[error("Rule parse error at offset {position}: {message}")]
    Parse {
        /// Byte offset of the offending token.
        position: usize,
        /// What went wrong.
        message: String,
    },

    /// Unknown metric name.
    #[error("Unknown rule metric '{name}'")]
    UnknownMetric {
        /// Name as written.
        name: String,
    },

    /// A metric the rule reads is unavailable for this leg.
    #[error("Metric '{metric}' unavailable")]
    MissingMetric {
        /// The missing metric.
        metric: Metric,
    },
}
