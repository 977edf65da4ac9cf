//! Exit intents.

use serde::{Deserialize, Serialize};

use super::error::ExitError;
use crate::application::ports::{ExitSide, OrderLeg};
use crate::chain::ContractKey;
use crate::config::ExitPolicy;
use crate::strategy::{LegDirection, StrategyCandidate};

/// A request to close an open position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitIntent {
    /// Position ID.
    pub id: String,
    /// Underlying symbol.
    pub underlying: String,
    /// Legs to close.
    pub legs: Vec<OrderLeg>,
    /// Exit policy.
    pub policy: ExitPolicy,
}

impl ExitIntent {
    /// Intent with no legs yet.
    #[must_use]
    pub fn new(id: impl Into<String>, underlying: impl Into<String>, policy: ExitPolicy) -> Self {
        Self {
            id: id.into(),
            underlying: underlying.into(),
            legs: Vec::new(),
            policy,
        }
    }

    /// Add a leg.
    #[must_use]
    pub fn with_leg(mut self, key: ContractKey, side: ExitSide, quantity: u32) -> Self {
        self.legs.push(OrderLeg {
            key,
            side,
            quantity,
        });
        self
    }

    /// Intent that closes every leg of an opened candidate, `units` times over.
    #[must_use]
    pub fn closing(
        id: impl Into<String>,
        candidate: &StrategyCandidate,
        units: u32,
        policy: ExitPolicy,
    ) -> Self {
        candidate.legs.iter().fold(
            Self::new(id, candidate.underlying.clone(), policy),
            |intent, leg| {
                let side = match leg.direction {
                    LegDirection::Short => ExitSide::BuyToClose,
                    LegDirection::Long => ExitSide::SellToClose,
                };
                intent.with_leg(leg.leg.key(), side, leg.quantity * units)
            },
        )
    }

    /// Contract keys, in leg order.
    #[must_use]
    pub fn keys(&self) -> Vec<ContractKey> {
        self.legs.iter().map(|leg| leg.key).collect()
    }

    /// Check the intent can run.
    pub fn validate(&self) -> Result<(), ExitError> {
        let invalid = |reason: String| ExitError::InvalidIntent {
            intent_id: self.id.clone(),
            reason,
        };
        if self.legs.is_empty() {
            return Err(invalid("no legs".to_string()));
        }
        if let Some(leg) = self.legs.iter().find(|leg| leg.quantity == 0) {
            return Err(invalid(format!("zero quantity for {}", leg.key)));
        }
        self.policy.validate().map_err(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::OptionRight;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn key(strike: rust_decimal::Decimal, right: OptionRight) -> ContractKey {
        ContractKey::new(NaiveDate::from_ymd_opt(2026, 1, 30).unwrap(), strike, right)
    }

    #[test]
    fn empty_intent_is_invalid() {
        let intent = ExitIntent::new("pos-1", "SPY", ExitPolicy::default());
        assert!(matches!(
            intent.validate(),
            Err(ExitError::InvalidIntent { .. })
        ));
    }

    #[test]
    fn zero_quantity_is_invalid() {
        let intent = ExitIntent::new("pos-1", "SPY", ExitPolicy::default()).with_leg(
            key(dec!(95), OptionRight::Put),
            ExitSide::BuyToClose,
            0,
        );
        assert!(intent.validate().is_err());
    }

    #[test]
    fn valid_intent() {
        let intent = ExitIntent::new("pos-1", "SPY", ExitPolicy::default())
            .with_leg(key(dec!(95), OptionRight::Put), ExitSide::BuyToClose, 1)
            .with_leg(key(dec!(90), OptionRight::Put), ExitSide::SellToClose, 1);
        assert!(intent.validate().is_ok());
        assert_eq!(intent.keys().len(), 2);
    }
}
