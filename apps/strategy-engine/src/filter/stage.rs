//! Filter stages in evaluation order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One stage of the strike filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    /// DTE window (pre-filter).
    Dte,
    /// Priced-leg requirement (pre-filter).
    Priced,
    /// Absolute delta band.
    Delta,
    /// Return-on-margin floor.
    Rom,
    /// Edge floor.
    Edge,
    /// Probability-of-success floor.
    Pos,
    /// Expected-value floor.
    Ev,
    /// Skew ceiling.
    Skew,
    /// Term-structure condition.
    TermStructure,
    /// Gamma cap.
    Gamma,
    /// Vega cap.
    Vega,
    /// Theta cap.
    Theta,
    /// Custom rule.
    Custom,
}

impl FilterStage {
    /// Stages in evaluation order.
    pub const ORDER: [Self; 13] = [
        Self::Dte,
        Self::Priced,
        Self::Delta,
        Self::Rom,
        Self::Edge,
        Self::Pos,
        Self::Ev,
        Self::Skew,
        Self::TermStructure,
        Self::Gamma,
        Self::Vega,
        Self::Theta,
        Self::Custom,
    ];

    /// Stable tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Dte => "dte",
            Self::Priced => "priced",
            Self::Delta => "delta",
            Self::Rom => "rom",
            Self::Edge => "edge",
            Self::Pos => "pos",
            Self::Ev => "ev",
            Self::Skew => "skew",
            Self::TermStructure => "term_structure",
            Self::Gamma => "gamma",
            Self::Vega => "vega",
            Self::Theta => "theta",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
