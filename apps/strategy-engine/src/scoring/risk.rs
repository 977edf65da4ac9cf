//! Payoff and margin per strategy shape.
//!
//! All values are per share; multiply by the contract multiplier for dollars.
//!
//! | Shape | Max profit | Max loss | Margin basis |
//! |-------|-----------|----------|--------------|
//! | Credit vertical | credit | width - credit | max loss |
//! | Debit vertical | width - debit | debit | debit |
//! | Iron condor / butterfly | credit | widest wing - credit | max loss |
//! | Strangle / straddle | credit | naked margin | naked margin |

use rust_decimal::Decimal;

use crate::chain::OptionRight;
use crate::error::MissingDataError;
use crate::strategy::{CandidateLeg, LegDirection, StrategyCandidate, StrategyType};

/// Naked short margin per share: the greater of 20% of spot less the
/// out-of-the-money amount, or 10% of strike (puts) / spot (calls), plus premium.
#[must_use]
pub fn naked_margin_per_share(
    spot: Decimal,
    strike: Decimal,
    right: OptionRight,
    premium: Decimal,
) -> Decimal {
    let twenty = Decimal::new(20, 2);
    let ten = Decimal::new(10, 2);
    let (otm, floor) = match right {
        OptionRight::Put => ((spot - strike).max(Decimal::ZERO), strike * ten),
        OptionRight::Call => ((strike - spot).max(Decimal::ZERO), spot * ten),
    };
    (spot * twenty - otm).max(floor) + premium
}

/// Where the underlying must finish for the position to profit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfitZone {
    /// Above a breakeven.
    Above(Decimal),
    /// Below a breakeven.
    Below(Decimal),
    /// Between two breakevens.
    Between(Decimal, Decimal),
}

/// Payoff profile of a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskProfile {
    /// Capital held against the position.
    pub margin: Decimal,
    /// Best-case profit.
    pub max_profit: Decimal,
    /// Worst-case loss (positive number).
    pub max_loss: Decimal,
    /// Breakeven prices at expiry, ascending.
    pub breakevens: Vec<Decimal>,
    /// Profit region at expiry.
    pub zone: ProfitZone,
}

impl RiskProfile {
    /// Compute the profile for `candidate` at `spot`.
    pub fn for_candidate(
        candidate: &StrategyCandidate,
        spot: Decimal,
    ) -> Result<Self, MissingDataError> {
        let net = candidate.net_premium;
        let legs = Legs {
            candidate,
            subject: candidate.describe(),
        };

        let profile = match candidate.strategy {
            StrategyType::BullPutSpread => {
                let short = legs.find(OptionRight::Put, LegDirection::Short)?;
                let long = legs.find(OptionRight::Put, LegDirection::Long)?;
                let width = short.leg.strike - long.leg.strike;
                let breakeven = short.leg.strike - net;
                Self::capped_credit(net, width, vec![breakeven], ProfitZone::Above(breakeven))
            }
            StrategyType::BearCallSpread => {
                let short = legs.find(OptionRight::Call, LegDirection::Short)?;
                let long = legs.find(OptionRight::Call, LegDirection::Long)?;
                let width = long.leg.strike - short.leg.strike;
                let breakeven = short.leg.strike + net;
                Self::capped_credit(net, width, vec![breakeven], ProfitZone::Below(breakeven))
            }
            StrategyType::BullCallSpread => {
                let long = legs.find(OptionRight::Call, LegDirection::Long)?;
                let short = legs.find(OptionRight::Call, LegDirection::Short)?;
                let debit = -net;
                let breakeven = long.leg.strike + debit;
                Self::debit(
                    debit,
                    short.leg.strike - long.leg.strike,
                    breakeven,
                    ProfitZone::Above(breakeven),
                )
            }
            StrategyType::BearPutSpread => {
                let long = legs.find(OptionRight::Put, LegDirection::Long)?;
                let short = legs.find(OptionRight::Put, LegDirection::Short)?;
                let debit = -net;
                let breakeven = long.leg.strike - debit;
                Self::debit(
                    debit,
                    long.leg.strike - short.leg.strike,
                    breakeven,
                    ProfitZone::Below(breakeven),
                )
            }
            StrategyType::IronCondor | StrategyType::IronButterfly => {
                let short_put = legs.find(OptionRight::Put, LegDirection::Short)?;
                let long_put = legs.find(OptionRight::Put, LegDirection::Long)?;
                let short_call = legs.find(OptionRight::Call, LegDirection::Short)?;
                let long_call = legs.find(OptionRight::Call, LegDirection::Long)?;
                let width = (short_put.leg.strike - long_put.leg.strike)
                    .max(long_call.leg.strike - short_call.leg.strike);
                let low = short_put.leg.strike - net;
                let high = short_call.leg.strike + net;
                Self::capped_credit(net, width, vec![low, high], ProfitZone::Between(low, high))
            }
            StrategyType::ShortStrangle | StrategyType::ShortStraddle => {
                let put = legs.find(OptionRight::Put, LegDirection::Short)?;
                let call = legs.find(OptionRight::Call, LegDirection::Short)?;
                let put_margin =
                    naked_margin_per_share(spot, put.leg.strike, OptionRight::Put, put.premium());
                let call_margin = naked_margin_per_share(
                    spot,
                    call.leg.strike,
                    OptionRight::Call,
                    call.premium(),
                );
                let margin = if put_margin >= call_margin {
                    put_margin + call.premium()
                } else {
                    call_margin + put.premium()
                };
                let low = put.leg.strike - net;
                let high = call.leg.strike + net;
                Self {
                    margin,
                    max_profit: net,
                    max_loss: margin,
                    breakevens: vec![low, high],
                    zone: ProfitZone::Between(low, high),
                }
            }
        };
        Ok(profile)
    }

    fn capped_credit(
        credit: Decimal,
        width: Decimal,
        breakevens: Vec<Decimal>,
        zone: ProfitZone,
    ) -> Self {
        let max_loss = width - credit;
        Self {
            margin: max_loss,
            max_profit: credit,
            max_loss,
            breakevens,
            zone,
        }
    }

    fn debit(debit: Decimal, width: Decimal, breakeven: Decimal, zone: ProfitZone) -> Self {
        Self {
            margin: debit,
            max_profit: width - debit,
            max_loss: debit,
            breakevens: vec![breakeven],
            zone,
        }
    }

    /// max_profit / |max_loss|; `None` when the loss is zero.
    #[must_use]
    pub fn risk_reward(&self) -> Option<Decimal> {
        let loss = self.max_loss.abs();
        (!loss.is_zero()).then(|| self.max_profit / loss)
    }
}

struct Legs<'a> {
    candidate: &'a StrategyCandidate,
    subject: String,
}

impl<'a> Legs<'a> {
    fn find(
        &self,
        right: OptionRight,
        direction: LegDirection,
    ) -> Result<&'a CandidateLeg, MissingDataError> {
        self.candidate
            .legs
            .iter()
            .find(|leg| leg.leg.right == right && leg.direction == direction)
            .ok_or_else(|| {
                MissingDataError::new(
                    self.subject.clone(),
                    format!(
                        "no {} {} leg",
                        match direction {
                            LegDirection::Long => "long",
                            LegDirection::Short => "short",
                        },
                        right
                    ),
                )
            })
    }
}
