//! Option leg records.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::IngestError;
use crate::options::Greeks;

/// Default equity option contract multiplier.
pub const DEFAULT_MULTIPLIER: u32 = 100;

/// Option right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    /// Call option.
    Call,
    /// Put option.
    Put,
}

impl OptionRight {
    /// The opposite right at the same strike (used for parity).
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Call => Self::Put,
            Self::Put => Self::Call,
        }
    }

    /// Single-letter OCC code.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Call => 'C',
            Self::Put => 'P',
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "call" | "c" => Some(Self::Call),
            "put" | "p" => Some(Self::Put),
            _ => None,
        }
    }
}

impl fmt::Display for OptionRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

/// Identity of a contract within one underlying's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractKey {
    /// Expiration date.
    pub expiry: NaiveDate,
    /// Strike price.
    pub strike: Decimal,
    /// Call or put.
    pub right: OptionRight,
}

impl ContractKey {
    /// Create a contract key.
    #[must_use]
    pub const fn new(expiry: NaiveDate, strike: Decimal, right: OptionRight) -> Self {
        Self {
            expiry,
            strike,
            right,
        }
    }

    /// Key of the opposite-right contract at the same strike and expiry.
    #[must_use]
    pub const fn counterpart(&self) -> Self {
        Self {
            expiry: self.expiry,
            strike: self.strike,
            right: self.right.opposite(),
        }
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{}",
            self.expiry.format("%Y-%m-%d"),
            self.strike.normalize(),
            self.right.code()
        )
    }
}

/// One option contract quote, immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    /// Underlying symbol.
    pub underlying: String,
    /// Provider contract identifier (OCC symbol or broker id).
    pub contract_id: Option<String>,
    /// Strike price.
    pub strike: Decimal,
    /// Expiration date.
    pub expiry: NaiveDate,
    /// Call or put.
    pub right: OptionRight,
    /// Best bid.
    pub bid: Option<Decimal>,
    /// Best ask.
    pub ask: Option<Decimal>,
    /// Last traded close.
    pub close: Option<Decimal>,
    /// Provider theoretical price.
    pub model_price: Option<Decimal>,
    /// Implied volatility (annualized, 0.25 = 25%).
    pub implied_vol: Option<f64>,
    /// Provider greeks.
    pub greeks: Option<Greeks>,
    /// Session volume.
    pub volume: u64,
    /// Open interest.
    pub open_interest: u64,
    /// Contract multiplier.
    pub multiplier: u32,
    /// Time of the last quote update.
    pub quoted_at: Option<DateTime<Utc>>,
}

impl Leg {
    /// Create a leg with no quote data; fill fields with the `with_*` helpers.
    #[must_use]
    pub fn new(
        underlying: impl Into<String>,
        expiry: NaiveDate,
        strike: Decimal,
        right: OptionRight,
    ) -> Self {
        Self {
            underlying: underlying.into(),
            contract_id: None,
            strike,
            expiry,
            right,
            bid: None,
            ask: None,
            close: None,
            model_price: None,
            implied_vol: None,
            greeks: None,
            volume: 0,
            open_interest: 0,
            multiplier: DEFAULT_MULTIPLIER,
            quoted_at: None,
        }
    }

    /// Set bid and ask.
    #[must_use]
    pub const fn with_quote(mut self, bid: Decimal, ask: Decimal) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self
    }

    /// Set the last close.
    #[must_use]
    pub const fn with_close(mut self, close: Decimal) -> Self {
        self.close = Some(close);
        self
    }

    /// Set the provider model price.
    #[must_use]
    pub const fn with_model_price(mut self, price: Decimal) -> Self {
        self.model_price = Some(price);
        self
    }

    /// Set implied volatility.
    #[must_use]
    pub const fn with_iv(mut self, iv: f64) -> Self {
        self.implied_vol = Some(iv);
        self
    }

    /// Set greeks.
    #[must_use]
    pub const fn with_greeks(mut self, greeks: Greeks) -> Self {
        self.greeks = Some(greeks);
        self
    }

    /// Set volume and open interest.
    #[must_use]
    pub const fn with_liquidity(mut self, volume: u64, open_interest: u64) -> Self {
        self.volume = volume;
        self.open_interest = open_interest;
        self
    }

    /// Set the quote timestamp.
    #[must_use]
    pub const fn with_quoted_at(mut self, quoted_at: DateTime<Utc>) -> Self {
        self.quoted_at = Some(quoted_at);
        self
    }

    /// Contract identity.
    #[must_use]
    pub const fn key(&self) -> ContractKey {
        ContractKey::new(self.expiry, self.strike, self.right)
    }

    /// Calendar days from `as_of` to expiry (negative once expired).
    #[must_use]
    pub fn days_to_expiry(&self, as_of: NaiveDate) -> i64 {
        (self.expiry - as_of).num_days()
    }

    /// Seconds since the last quote update, if the quote is timestamped.
    #[must_use]
    pub fn quote_age_secs(&self, as_of: DateTime<Utc>) -> Option<i64> {
        self.quoted_at
            .map(|quoted_at| (as_of - quoted_at).num_seconds().max(0))
    }

    /// Human-readable label, e.g. `SPY 2026-01-16 450P`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.underlying, self.key())
    }
}

/// A leg as delivered by the chain-normalization collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawLeg {
    /// Provider contract identifier.
    #[serde(default)]
    pub contract_id: Option<String>,
    /// Strike price.
    pub strike: Decimal,
    /// Expiration date (`YYYY-MM-DD`).
    pub expiry: String,
    /// `call`/`put` (or `c`/`p`).
    pub right: String,
    /// Best bid.
    #[serde(default)]
    pub bid: Option<Decimal>,
    /// Best ask.
    #[serde(default)]
    pub ask: Option<Decimal>,
    /// Last traded close.
    #[serde(default)]
    pub close: Option<Decimal>,
    /// Provider theoretical price.
    #[serde(default)]
    pub model_price: Option<Decimal>,
    /// Implied volatility.
    #[serde(default)]
    pub implied_vol: Option<f64>,
    /// Delta.
    #[serde(default)]
    pub delta: Option<f64>,
    /// Gamma.
    #[serde(default)]
    pub gamma: Option<f64>,
    /// Vega.
    #[serde(default)]
    pub vega: Option<f64>,
    /// Theta.
    #[serde(default)]
    pub theta: Option<f64>,
    /// Session volume.
    #[serde(default)]
    pub volume: Option<u64>,
    /// Open interest.
    #[serde(default)]
    pub open_interest: Option<u64>,
    /// Contract multiplier.
    #[serde(default)]
    pub multiplier: Option<u32>,
    /// Time of the last quote update.
    #[serde(default)]
    pub quoted_at: Option<DateTime<Utc>>,
}

impl RawLeg {
    /// Validate and convert into a canonical [`Leg`].
    pub fn into_leg(self, underlying: &str, index: usize) -> Result<Leg, IngestError> {
        let invalid = |field: &'static str, message: String| IngestError::InvalidField {
            index,
            field,
            message,
        };

        if self.strike <= Decimal::ZERO {
            return Err(invalid("strike", format!("must be positive, got {}", self.strike)));
        }

        let expiry = NaiveDate::parse_from_str(self.expiry.trim(), "%Y-%m-%d")
            .map_err(|e| invalid("expiry", format!("'{}': {e}", self.expiry)))?;

        let right = OptionRight::parse(&self.right)
            .ok_or_else(|| invalid("right", format!("expected call/put, got '{}'", self.right)))?;

        for (field, value) in [
            ("bid", self.bid),
            ("ask", self.ask),
            ("close", self.close),
            ("model_price", self.model_price),
        ] {
            if let Some(v) = value
                && v < Decimal::ZERO
            {
                return Err(invalid(field, format!("must not be negative, got {v}")));
            }
        }

        if let Some(iv) = self.implied_vol
            && (!iv.is_finite() || iv < 0.0)
        {
            return Err(invalid("implied_vol", format!("must be finite and >= 0, got {iv}")));
        }

        if self.multiplier == Some(0) {
            return Err(invalid("multiplier", "must be positive".to_string()));
        }

        let greeks = Self::greeks(index, self.delta, self.gamma, self.vega, self.theta)?;

        Ok(Leg {
            underlying: underlying.to_string(),
            contract_id: self.contract_id,
            strike: self.strike,
            expiry,
            right,
            bid: self.bid,
            ask: self.ask,
            close: self.close,
            model_price: self.model_price,
            // A zero IV carries no information.
            implied_vol: self.implied_vol.filter(|iv| *iv > 0.0),
            greeks,
            volume: self.volume.unwrap_or(0),
            open_interest: self.open_interest.unwrap_or(0),
            multiplier: self.multiplier.unwrap_or(DEFAULT_MULTIPLIER),
            quoted_at: self.quoted_at,
        })
    }

    fn greeks(
        index: usize,
        delta: Option<f64>,
        gamma: Option<f64>,
        vega: Option<f64>,
        theta: Option<f64>,
    ) -> Result<Option<Greeks>, IngestError> {
        match (delta, gamma, vega, theta) {
            (None, None, None, None) => Ok(None),
            (Some(delta), Some(gamma), Some(vega), Some(theta)) => {
                if [delta, gamma, vega, theta].iter().any(|g| !g.is_finite()) {
                    return Err(IngestError::InvalidField {
                        index,
                        field: "greeks",
                        message: "greeks must be finite".to_string(),
                    });
                }
                Ok(Some(Greeks::new(delta, gamma, theta, vega)))
            }
            _ => {
                let missing: Vec<&str> = [
                    ("delta", delta),
                    ("gamma", gamma),
                    ("vega", vega),
                    ("theta", theta),
                ]
                .iter()
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| *name)
                .collect();
                Err(IngestError::PartialGreeks {
                    index,
                    missing: missing.join(", "),
                })
            }
        }
    }
}
