//! Per-strategy thresholds.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::filters::FilterConfig;
use super::resolver::default_true;
use crate::strategy::{LegDirection, StrategyType};

/// Configuration for one strategy type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Whether the strategy runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Strike filter thresholds for anchor legs.
    #[serde(default)]
    pub filter: FilterConfig,
    /// Minimum daily volume per leg.
    #[serde(default)]
    pub min_volume: u64,
    /// Minimum open interest per leg.
    #[serde(default = "default_min_open_interest")]
    pub min_open_interest: u64,
    /// Fallback-sourced legs allowed per four legs.
    #[serde(default = "default_max_fallback_legs_per_four")]
    pub max_fallback_legs_per_four: u32,
    /// Minimum max_profit / |max_loss|.
    #[serde(default = "default_min_risk_reward")]
    pub min_risk_reward: f64,
    /// Candidate-level return-on-margin floor, percent.
    #[serde(default)]
    pub min_rom: Option<f64>,
    /// Candidate-level probability-of-success floor.
    #[serde(default)]
    pub min_pos: Option<f64>,
    /// Candidate-level expected value floor, dollars per unit.
    #[serde(default)]
    pub min_ev: Option<f64>,
    /// Allow long protective legs without a resolved price.
    #[serde(default)]
    pub allow_unpriced_wings: bool,
    /// Strike widths to try for wings and verticals.
    #[serde(default = "default_widths")]
    pub widths: Vec<Decimal>,
    /// Largest delta gap tolerated between strangle legs.
    #[serde(default = "default_max_delta_gap")]
    pub max_delta_gap: f64,
    /// Candidates generated per run, at most.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: FilterConfig::default(),
            min_volume: 0,
            min_open_interest: default_min_open_interest(),
            max_fallback_legs_per_four: default_max_fallback_legs_per_four(),
            min_risk_reward: default_min_risk_reward(),
            min_rom: None,
            min_pos: None,
            min_ev: None,
            allow_unpriced_wings: false,
            widths: default_widths(),
            max_delta_gap: default_max_delta_gap(),
            max_candidates: default_max_candidates(),
        }
    }
}

impl StrategyConfig {
    /// Defaults tuned to a strategy's anchor.
    #[must_use]
    pub fn for_strategy(strategy: StrategyType) -> Self {
        let filter = match strategy {
            StrategyType::BullCallSpread | StrategyType::BearPutSpread => {
                FilterConfig::default().with_delta_band(0.40, 0.70)
            }
            StrategyType::IronButterfly | StrategyType::ShortStraddle => {
                FilterConfig::default().with_delta_band(0.40, 0.60)
            }
            _ => FilterConfig::default(),
        };
        let min_risk_reward = match strategy {
            StrategyType::BullCallSpread | StrategyType::BearPutSpread => 0.5,
            _ => default_min_risk_reward(),
        };
        Self {
            filter,
            min_risk_reward,
            ..Self::default()
        }
    }

    /// Apply a partial section on top of these values.
    ///
    /// Keys present in `section` win; nested mappings merge key by key.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the merged section does not fit the schema.
    pub fn overlay(&self, section: Value) -> Result<Self, serde_json::Error> {
        let mut merged = serde_json::to_value(self)?;
        if !section.is_null() {
            merge(&mut merged, section);
        }
        serde_json::from_value(merged)
    }

    /// Fallback-sourced legs allowed for a candidate with `legs` legs.
    #[must_use]
    pub fn fallback_cap(&self, legs: usize) -> usize {
        // floor(cap_per_four * legs / 4)
        (self.max_fallback_legs_per_four as usize * legs) / 4
    }

    /// Check ranges and thresholds that `strategy` can actually evaluate.
    pub fn validate(&self, strategy: StrategyType) -> Result<(), String> {
        let name = strategy.as_str();
        self.filter.validate(name)?;
        // Per-leg ROM exists only for short anchors.
        if strategy.anchor_direction() == LegDirection::Long && self.filter.min_rom.is_some() {
            return Err(format!(
                "{name}: filter.min_rom needs short anchor legs; use min_rom on the candidate instead"
            ));
        }
        if self.widths.is_empty() || self.widths.iter().any(|w| *w <= Decimal::ZERO) {
            return Err(format!("{name}: widths must be non-empty and positive"));
        }
        if self.min_risk_reward < 0.0 {
            return Err(format!("{name}: min_risk_reward must not be negative"));
        }
        if self.min_pos.is_some_and(|p| !(0.0..=1.0).contains(&p)) {
            return Err(format!("{name}: min_pos must be within 0..1"));
        }
        if self.max_delta_gap < 0.0 {
            return Err(format!("{name}: max_delta_gap must not be negative"));
        }
        if self.max_candidates == 0 {
            return Err(format!("{name}: max_candidates must be positive"));
        }
        Ok(())
    }
}

fn merge(base: &mut Value, section: Value) {
    match (base, section) {
        (Value::Object(base), Value::Object(section)) => {
            for (key, value) in section {
                merge(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, section) => *base = section,
    }
}

const fn default_min_open_interest() -> u64 {
    10
}
const fn default_max_fallback_legs_per_four() -> u32 {
    2
}
const fn default_min_risk_reward() -> f64 {
    0.15
}
fn default_widths() -> Vec<Decimal> {
    vec![Decimal::new(5, 0)]
}
const fn default_max_delta_gap() -> f64 {
    0.05
}
const fn default_max_candidates() -> usize {
    50
}
