//! Strategy type definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::OptionRight;

/// Strategy name not in the closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown strategy '{name}' (expected one of: {expected})")]
pub struct UnknownStrategyError {
    /// Name as configured.
    pub name: String,
    /// Comma-separated list of known names.
    pub expected: String,
}

/// Type of options strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    /// Short put + long lower put (bullish credit).
    BullPutSpread,
    /// Short call + long higher call (bearish credit).
    BearCallSpread,
    /// Long call + short higher call (bullish debit).
    BullCallSpread,
    /// Long put + short lower put (bearish debit).
    BearPutSpread,
    /// Bull put spread + bear call spread with equal wings.
    IronCondor,
    /// Short straddle with long wings.
    IronButterfly,
    /// Short OTM put + short OTM call with matched deltas.
    ShortStrangle,
    /// Short put + short call at the same strike.
    ShortStraddle,
}

/// Whether a strategy opens for a credit or a debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Premium received.
    Credit,
    /// Premium paid.
    Debit,
}

/// Position direction for a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegDirection {
    /// Long position (bought).
    Long,
    /// Short position (sold/written).
    Short,
}

impl LegDirection {
    /// +1 for long, -1 for short.
    #[must_use]
    pub const fn sign(self) -> i64 {
        match self {
            Self::Long => 1,
            Self::Short => -1,
        }
    }
}

impl StrategyType {
    /// Every supported strategy.
    pub const ALL: [Self; 8] = [
        Self::BullPutSpread,
        Self::BearCallSpread,
        Self::BullCallSpread,
        Self::BearPutSpread,
        Self::IronCondor,
        Self::IronButterfly,
        Self::ShortStrangle,
        Self::ShortStraddle,
    ];

    /// Configuration name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BullPutSpread => "bull_put_spread",
            Self::BearCallSpread => "bear_call_spread",
            Self::BullCallSpread => "bull_call_spread",
            Self::BearPutSpread => "bear_put_spread",
            Self::IronCondor => "iron_condor",
            Self::IronButterfly => "iron_butterfly",
            Self::ShortStrangle => "short_strangle",
            Self::ShortStraddle => "short_straddle",
        }
    }

    /// Credit or debit.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        match self {
            Self::BullCallSpread | Self::BearPutSpread => Direction::Debit,
            _ => Direction::Credit,
        }
    }

    /// Side of the anchor legs the strike filter selects.
    #[must_use]
    pub const fn anchor_direction(&self) -> LegDirection {
        match self.direction() {
            Direction::Credit => LegDirection::Short,
            Direction::Debit => LegDirection::Long,
        }
    }

    /// Rights eligible as anchors.
    #[must_use]
    pub const fn anchor_rights(&self) -> &'static [OptionRight] {
        match self {
            Self::BullPutSpread | Self::BearPutSpread => &[OptionRight::Put],
            Self::BearCallSpread | Self::BullCallSpread => &[OptionRight::Call],
            Self::IronCondor | Self::IronButterfly | Self::ShortStrangle | Self::ShortStraddle => {
                &[OptionRight::Put, OptionRight::Call]
            }
        }
    }

    /// Number of legs in one unit of the strategy.
    #[must_use]
    pub const fn leg_count(&self) -> usize {
        match self {
            Self::IronCondor | Self::IronButterfly => 4,
            _ => 2,
        }
    }

    /// Whether losses are capped by long protection.
    #[must_use]
    pub const fn is_defined_risk(&self) -> bool {
        !matches!(self, Self::ShortStrangle | Self::ShortStraddle)
    }

    fn expected_names() -> String {
        Self::ALL
            .iter()
            .map(Self::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyType {
    type Err = UnknownStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .find(|strategy| strategy.as_str() == normalized)
            .copied()
            .ok_or_else(|| UnknownStrategyError {
                name: s.to_string(),
                expected: Self::expected_names(),
            })
    }
}
