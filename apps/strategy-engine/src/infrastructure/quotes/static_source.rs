//! Quote source backed by in-memory snapshots.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::application::ports::{QuoteSourceError, QuoteSourcePort};
use crate::chain::{ChainSnapshot, ContractKey};

#[derive(Debug, Default)]
struct SourceState {
    snapshots: VecDeque<ChainSnapshot>,
    failure: Option<QuoteSourceError>,
    requests: usize,
}

/// Serves queued snapshots, one per request; the last one repeats.
#[derive(Debug, Default)]
pub struct StaticQuoteSource {
    state: Mutex<SourceState>,
}

impl StaticQuoteSource {
    /// Source that always serves `snapshot`.
    #[must_use]
    pub fn new(snapshot: ChainSnapshot) -> Self {
        Self::sequence([snapshot])
    }

    /// Source that serves `snapshots` in order.
    #[must_use]
    pub fn sequence(snapshots: impl IntoIterator<Item = ChainSnapshot>) -> Self {
        Self {
            state: Mutex::new(SourceState {
                snapshots: snapshots.into_iter().collect(),
                ..SourceState::default()
            }),
        }
    }

    /// Fail every request with `error` until cleared with `None`.
    pub fn set_failure(&self, error: Option<QuoteSourceError>) {
        self.lock().failure = error;
    }

    /// Requests served or refused so far.
    #[must_use]
    pub fn requests(&self) -> usize {
        self.lock().requests
    }

    fn lock(&self) -> MutexGuard<'_, SourceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl QuoteSourcePort for StaticQuoteSource {
    async fn snapshot(
        &self,
        underlying: &str,
        keys: &[ContractKey],
    ) -> Result<ChainSnapshot, QuoteSourceError> {
        let mut state = self.lock();
        state.requests += 1;
        if let Some(error) = &state.failure {
            return Err(error.clone());
        }

        let current = if state.snapshots.len() > 1 {
            state.snapshots.pop_front()
        } else {
            state.snapshots.front().cloned()
        };
        let Some(snapshot) = current.filter(|s| s.underlying == underlying) else {
            return Err(QuoteSourceError::UnknownUnderlying {
                underlying: underlying.to_string(),
            });
        };

        let legs = snapshot
            .legs
            .iter()
            .filter(|leg| keys.contains(&leg.key()))
            .cloned()
            .collect();
        Ok(ChainSnapshot::new(
            snapshot.underlying.clone(),
            snapshot.spot,
            snapshot.interest_rate,
            snapshot.as_of,
            legs,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Leg, OptionRight};
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn snapshot(spot: Decimal) -> ChainSnapshot {
        let expiry = NaiveDate::from_ymd_opt(2026, 1, 30).unwrap();
        ChainSnapshot::new(
            "SPY",
            spot,
            0.04,
            Utc.with_ymd_and_hms(2026, 1, 2, 15, 0, 0).unwrap(),
            vec![
                Leg::new("SPY", expiry, dec!(95), OptionRight::Put).with_quote(dec!(1.0), dec!(1.1)),
                Leg::new("SPY", expiry, dec!(90), OptionRight::Put).with_quote(dec!(0.3), dec!(0.4)),
            ],
        )
    }

    fn key(strike: Decimal) -> ContractKey {
        ContractKey::new(
            NaiveDate::from_ymd_opt(2026, 1, 30).unwrap(),
            strike,
            OptionRight::Put,
        )
    }

    #[tokio::test]
    async fn returns_only_requested_contracts() {
        let source = StaticQuoteSource::new(snapshot(dec!(100)));
        let served = source.snapshot("SPY", &[key(dec!(95))]).await.unwrap();
        assert_eq!(served.legs.len(), 1);
        assert_eq!(served.legs[0].strike, dec!(95));
    }

    #[tokio::test]
    async fn sequence_advances_then_repeats() {
        let source = StaticQuoteSource::sequence([snapshot(dec!(100)), snapshot(dec!(101))]);
        let spots = [
            source.snapshot("SPY", &[]).await.unwrap().spot,
            source.snapshot("SPY", &[]).await.unwrap().spot,
            source.snapshot("SPY", &[]).await.unwrap().spot,
        ];
        assert_eq!(spots, [dec!(100), dec!(101), dec!(101)]);
        assert_eq!(source.requests(), 3);
    }

    #[tokio::test]
    async fn failures_and_unknown_underlyings() {
        let source = StaticQuoteSource::new(snapshot(dec!(100)));
        assert!(matches!(
            source.snapshot("QQQ", &[]).await,
            Err(QuoteSourceError::UnknownUnderlying { .. })
        ));

        source.set_failure(Some(QuoteSourceError::Unavailable {
            message: "feed down".to_string(),
        }));
        assert!(source.snapshot("SPY", &[]).await.is_err());
        source.set_failure(None);
        assert!(source.snapshot("SPY", &[]).await.is_ok());
    }
}
