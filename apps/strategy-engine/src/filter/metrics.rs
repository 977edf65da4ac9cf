//! Per-leg metrics seen from the anchor side.
//!
//! Short anchors (credit strategies):
//! - PoS = 1 - |delta|
//! - edge = mid - model
//! - ROM = mid / naked margin * 100
//! - EV = PoS * mid - (1 - PoS) * mid * stop_loss_multiple
//!
//! Long anchors (debit strategies):
//! - PoS = |delta|
//! - edge = model - mid
//! - ROM is undefined
//! - EV = edge

use crate::chain::Leg;
use crate::pricing::{PricedChain, Resolution, to_f64};
use crate::rules::{Metric, MetricSource};
use crate::scoring::naked_margin_per_share;
use crate::strategy::LegDirection;

/// Metric values for one leg.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegMetrics {
    /// Signed delta.
    pub delta: Option<f64>,
    /// Gamma.
    pub gamma: Option<f64>,
    /// Vega.
    pub vega: Option<f64>,
    /// Theta.
    pub theta: Option<f64>,
    /// Implied volatility.
    pub iv: Option<f64>,
    /// Resolved mid.
    pub mid: Option<f64>,
    /// Edge versus model.
    pub edge: Option<f64>,
    /// Return on margin, percent.
    pub rom: Option<f64>,
    /// Probability of success.
    pub pos: Option<f64>,
    /// Expected value per share.
    pub ev: Option<f64>,
    /// Days to expiry.
    pub dte: f64,
    /// Leg IV minus ATM IV.
    pub skew: Option<f64>,
    /// ATM IV of this expiry.
    pub front_iv: Option<f64>,
    /// ATM IV of the next expiry.
    pub back_iv: Option<f64>,
    /// Volume.
    pub volume: f64,
    /// Open interest.
    pub open_interest: f64,
    /// Strike / spot.
    pub moneyness: Option<f64>,
}

impl LegMetrics {
    /// Compute metrics for a leg of `chain`.
    #[must_use]
    pub fn compute(
        chain: &PricedChain,
        leg: &Leg,
        resolution: &Resolution,
        side: LegDirection,
        stop_loss_multiple: f64,
    ) -> Self {
        let spot = chain.snapshot().spot;
        let greeks = resolution.greeks;
        let delta = greeks.map(|g| g.delta);
        let abs_delta = delta.map(f64::abs);
        let mid = resolution.mid.map(to_f64);
        let model = resolution.model_price.map(to_f64);
        let front_iv = chain.atm_iv(leg.expiry);

        let (pos, edge, rom, ev) = match side {
            LegDirection::Short => {
                let pos = abs_delta.map(|d| 1.0 - d);
                let edge = mid.zip(model).map(|(m, t)| m - t);
                let rom = resolution.mid.and_then(|premium| {
                    let margin = to_f64(naked_margin_per_share(spot, leg.strike, leg.right, premium));
                    (margin > 0.0).then(|| to_f64(premium) / margin * 100.0)
                });
                let ev = pos
                    .zip(mid)
                    .map(|(p, m)| p * m - (1.0 - p) * m * stop_loss_multiple);
                (pos, edge, rom, ev)
            }
            LegDirection::Long => {
                let edge = mid.zip(model).map(|(m, t)| t - m);
                (abs_delta, edge, None, edge)
            }
        };

        let spot_f = to_f64(spot);
        Self {
            delta,
            gamma: greeks.map(|g| g.gamma),
            vega: greeks.map(|g| g.vega),
            theta: greeks.map(|g| g.theta),
            iv: resolution.implied_vol,
            mid,
            edge,
            rom,
            pos,
            ev,
            dte: resolution.days_to_expiry as f64,
            skew: resolution.implied_vol.zip(front_iv).map(|(iv, atm)| iv - atm),
            front_iv,
            back_iv: chain.next_expiry_atm_iv(leg.expiry),
            volume: leg.volume as f64,
            open_interest: leg.open_interest as f64,
            moneyness: (spot_f > 0.0).then(|| to_f64(leg.strike) / spot_f),
        }
    }
}

impl MetricSource for LegMetrics {
    fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Delta => self.delta,
            Metric::AbsDelta => self.delta.map(f64::abs),
            Metric::Gamma => self.gamma,
            Metric::Vega => self.vega,
            Metric::Theta => self.theta,
            Metric::Iv => self.iv,
            Metric::Mid => self.mid,
            Metric::Edge => self.edge,
            Metric::Rom => self.rom,
            Metric::Pos => self.pos,
            Metric::Ev => self.ev,
            Metric::Dte => Some(self.dte),
            Metric::Skew => self.skew,
            Metric::TermSlope => self.back_iv.zip(self.front_iv).map(|(b, f)| b - f),
            Metric::FrontIv => self.front_iv,
            Metric::BackIv => self.back_iv,
            Metric::Volume => Some(self.volume),
            Metric::OpenInterest => Some(self.open_interest),
            Metric::Moneyness => self.moneyness,
        }
    }
}
