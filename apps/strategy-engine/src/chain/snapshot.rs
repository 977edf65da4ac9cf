//! Chain snapshot: the unit of one evaluation pass.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::IngestError;
use super::leg::{ContractKey, Leg, RawLeg};

/// Raw snapshot as delivered by the chain-normalization collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawChain {
    /// Underlying symbol.
    pub underlying: String,
    /// Underlying spot price.
    pub spot: Decimal,
    /// Annualized risk-free rate (0.05 = 5%).
    pub interest_rate: f64,
    /// Evaluation timestamp.
    pub as_of: DateTime<Utc>,
    /// Contract quotes.
    pub legs: Vec<RawLeg>,
}

/// An immutable, validated option chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSnapshot {
    /// Underlying symbol.
    pub underlying: String,
    /// Underlying spot price.
    pub spot: Decimal,
    /// Annualized risk-free rate.
    pub interest_rate: f64,
    /// Evaluation timestamp; quote ages and DTE are measured from here.
    pub as_of: DateTime<Utc>,
    /// Contract quotes, in ingestion order.
    pub legs: Vec<Leg>,
}

impl ChainSnapshot {
    /// Build a snapshot from already-canonical legs.
    #[must_use]
    pub fn new(
        underlying: impl Into<String>,
        spot: Decimal,
        interest_rate: f64,
        as_of: DateTime<Utc>,
        legs: Vec<Leg>,
    ) -> Self {
        Self {
            underlying: underlying.into(),
            spot,
            interest_rate,
            as_of,
            legs,
        }
    }

    /// Validate a raw snapshot at the ingestion boundary.
    pub fn ingest(raw: RawChain) -> Result<Self, IngestError> {
        if raw.underlying.trim().is_empty() {
            return Err(IngestError::InvalidSnapshot {
                field: "underlying",
                message: "must not be empty".to_string(),
            });
        }
        if raw.spot <= Decimal::ZERO {
            return Err(IngestError::InvalidSnapshot {
                field: "spot",
                message: format!("must be positive, got {}", raw.spot),
            });
        }
        if !raw.interest_rate.is_finite() {
            return Err(IngestError::InvalidSnapshot {
                field: "interest_rate",
                message: "must be finite".to_string(),
            });
        }

        let underlying = raw.underlying.trim().to_uppercase();
        let mut seen = HashMap::with_capacity(raw.legs.len());
        let mut legs = Vec::with_capacity(raw.legs.len());

        for (index, raw_leg) in raw.legs.into_iter().enumerate() {
            let leg = raw_leg.into_leg(&underlying, index)?;
            if seen.insert(leg.key(), index).is_some() {
                return Err(IngestError::DuplicateContract {
                    index,
                    contract: leg.label(),
                });
            }
            legs.push(leg);
        }

        tracing::debug!(
            underlying = %underlying,
            legs = legs.len(),
            "Ingested chain snapshot"
        );

        Ok(Self {
            underlying,
            spot: raw.spot,
            interest_rate: raw.interest_rate,
            as_of: raw.as_of,
            legs,
        })
    }

    /// Distinct expiries, ascending.
    #[must_use]
    pub fn expiries(&self) -> Vec<NaiveDate> {
        self.legs
            .iter()
            .map(|leg| leg.expiry)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Map from contract key to leg index.
    #[must_use]
    pub fn index_by_key(&self) -> HashMap<ContractKey, usize> {
        self.legs
            .iter()
            .enumerate()
            .map(|(i, leg)| (leg.key(), i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw_chain(json_legs: &str) -> RawChain {
        let json = format!(
            r#"{{
                "underlying": "spy",
                "spot": 100,
                "interest_rate": 0.05,
                "as_of": "2026-01-02T15:00:00Z",
                "legs": {json_legs}
            }}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn ingest_normalizes_underlying() {
        let chain = raw_chain(
            r#"[{"strike": 100, "expiry": "2026-01-16", "right": "call", "bid": 1.0, "ask": 1.1}]"#,
        );
        let snapshot = ChainSnapshot::ingest(chain).unwrap();
        assert_eq!(snapshot.underlying, "SPY");
        assert_eq!(snapshot.legs.len(), 1);
        assert_eq!(snapshot.legs[0].bid, Some(dec!(1.0)));
    }

    #[test]
    fn ingest_rejects_duplicates() {
        let chain = raw_chain(
            r#"[
                {"strike": 100, "expiry": "2026-01-16", "right": "call"},
                {"strike": 100, "expiry": "2026-01-16", "right": "c"}
            ]"#,
        );
        let err = ChainSnapshot::ingest(chain).unwrap_err();
        assert!(matches!(err, IngestError::DuplicateContract { index: 1, .. }));
    }

    #[test]
    fn ingest_rejects_non_positive_spot() {
        let mut chain = raw_chain("[]");
        chain.spot = Decimal::ZERO;
        assert!(matches!(
            ChainSnapshot::ingest(chain),
            Err(IngestError::InvalidSnapshot { field: "spot", .. })
        ));
    }

    #[test]
    fn expiries_are_sorted_and_unique() {
        let chain = raw_chain(
            r#"[
                {"strike": 100, "expiry": "2026-02-20", "right": "call"},
                {"strike": 100, "expiry": "2026-01-16", "right": "call"},
                {"strike": 105, "expiry": "2026-01-16", "right": "call"}
            ]"#,
        );
        let snapshot = ChainSnapshot::ingest(chain).unwrap();
        let expiries = snapshot.expiries();
        assert_eq!(expiries.len(), 2);
        assert!(expiries[0] < expiries[1]);
    }
}
