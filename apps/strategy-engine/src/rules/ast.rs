//! Rule syntax tree and evaluator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::RuleError;

/// Quantities a rule can compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Signed delta.
    Delta,
    /// Absolute delta.
    AbsDelta,
    /// Gamma.
    Gamma,
    /// Vega per vol point.
    Vega,
    /// Theta per day.
    Theta,
    /// Implied volatility of the leg.
    Iv,
    /// Resolved mid.
    Mid,
    /// Mid minus model price, from the anchor side.
    Edge,
    /// Return on margin, percent.
    Rom,
    /// Probability of success.
    Pos,
    /// Expected value per contract.
    Ev,
    /// Days to expiry.
    Dte,
    /// Leg IV minus ATM IV of the same expiry.
    Skew,
    /// Next-expiry ATM IV minus this expiry's ATM IV.
    TermSlope,
    /// ATM IV of the leg's expiry.
    FrontIv,
    /// ATM IV of the next expiry.
    BackIv,
    /// Daily volume.
    Volume,
    /// Open interest.
    OpenInterest,
    /// Strike / spot.
    Moneyness,
}

impl Metric {
    const NAMES: [(&'static str, Self); 19] = [
        ("delta", Self::Delta),
        ("abs_delta", Self::AbsDelta),
        ("gamma", Self::Gamma),
        ("vega", Self::Vega),
        ("theta", Self::Theta),
        ("iv", Self::Iv),
        ("mid", Self::Mid),
        ("edge", Self::Edge),
        ("rom", Self::Rom),
        ("pos", Self::Pos),
        ("ev", Self::Ev),
        ("dte", Self::Dte),
        ("skew", Self::Skew),
        ("term_slope", Self::TermSlope),
        ("front_iv", Self::FrontIv),
        ("back_iv", Self::BackIv),
        ("volume", Self::Volume),
        ("open_interest", Self::OpenInterest),
        ("moneyness", Self::Moneyness),
    ];

    /// Name as written in rules.
    #[must_use]
    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(_, metric)| *metric == self)
            .map_or("?", |(name, _)| name)
    }
}

impl FromStr for Metric {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, metric)| *metric)
            .ok_or_else(|| RuleError::UnknownMetric {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl CmpOp {
    /// Apply the comparison.
    #[must_use]
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Eq => (lhs - rhs).abs() < f64::EPSILON,
            Self::Ne => (lhs - rhs).abs() >= f64::EPSILON,
        }
    }

    /// Operator symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

/// Supplies metric values for one leg.
pub trait MetricSource {
    /// Value of `metric`, or `None` if it cannot be computed.
    fn metric(&self, metric: Metric) -> Option<f64>;
}

/// A parsed rule.
///
/// Serialized as its canonical text form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Rule {
    /// `metric op value`
    Compare {
        /// Left-hand metric.
        metric: Metric,
        /// Operator.
        op: CmpOp,
        /// Right-hand constant.
        value: f64,
    },
    /// Every sub-rule holds.
    All(Vec<Rule>),
    /// At least one sub-rule holds.
    Any(Vec<Rule>),
    /// Negation.
    Not(Box<Rule>),
}

impl Rule {
    /// Shorthand for a comparison.
    #[must_use]
    pub const fn compare(metric: Metric, op: CmpOp, value: f64) -> Self {
        Self::Compare { metric, op, value }
    }

    /// Evaluate against a metric source.
    ///
    /// `and`/`or` short-circuit, so a metric that is never reached does not
    /// need to be available.
    pub fn evaluate<S: MetricSource + ?Sized>(&self, source: &S) -> Result<bool, RuleError> {
        match self {
            Self::Compare { metric, op, value } => {
                let lhs = source
                    .metric(*metric)
                    .ok_or(RuleError::MissingMetric { metric: *metric })?;
                Ok(op.apply(lhs, *value))
            }
            Self::All(rules) => {
                for rule in rules {
                    if !rule.evaluate(source)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Any(rules) => {
                for rule in rules {
                    if rule.evaluate(source)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not(rule) => Ok(!rule.evaluate(source)?),
        }
    }

    /// Metrics referenced anywhere in the rule.
    #[must_use]
    pub fn metrics(&self) -> Vec<Metric> {
        let mut out = Vec::new();
        self.collect_metrics(&mut out);
        out
    }

    fn collect_metrics(&self, out: &mut Vec<Metric>) {
        match self {
            Self::Compare { metric, .. } => {
                if !out.contains(metric) {
                    out.push(*metric);
                }
            }
            Self::All(rules) | Self::Any(rules) => {
                for rule in rules {
                    rule.collect_metrics(out);
                }
            }
            Self::Not(rule) => rule.collect_metrics(out),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { metric, op, value } => write!(f, "{metric} {} {value}", op.symbol()),
            Self::All(rules) | Self::Any(rules) => {
                let joiner = if matches!(self, Self::All(_)) { " and " } else { " or " };
                let parts: Vec<String> = rules
                    .iter()
                    .map(|rule| match rule {
                        Self::All(_) | Self::Any(_) => format!("({rule})"),
                        _ => rule.to_string(),
                    })
                    .collect();
                f.write_str(&parts.join(joiner))
            }
            Self::Not(rule) => match rule.as_ref() {
                Self::Compare { .. } | Self::Not(_) => write!(f, "not {rule}"),
                _ => write!(f, "not ({rule})"),
            },
        }
    }
}

impl FromStr for Rule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        super::parser::parse(s)
    }
}

impl TryFrom<String> for Rule {
    type Error = RuleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rule> for String {
    fn from(rule: Rule) -> Self {
        rule.to_string()
    }
}
