//! Strike filter thresholds.

use serde::{Deserialize, Serialize};

use crate::rules::Rule;

/// Per-strategy strike filter configuration.
///
/// Optional thresholds are skipped when unset. Deltas are compared as
/// absolute values; greek caps compare absolute per-contract greeks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Minimum days to expiry (inclusive).
    #[serde(default = "default_min_dte")]
    pub min_dte: i64,
    /// Maximum days to expiry (inclusive).
    #[serde(default = "default_max_dte")]
    pub max_dte: i64,
    /// Lower bound of the absolute delta band.
    #[serde(default = "default_delta_min")]
    pub delta_min: f64,
    /// Upper bound of the absolute delta band.
    #[serde(default = "default_delta_max")]
    pub delta_max: f64,
    /// Minimum return on margin, percent.
    #[serde(default)]
    pub min_rom: Option<f64>,
    /// Minimum edge versus model, price units.
    #[serde(default)]
    pub min_edge: Option<f64>,
    /// Minimum probability of success (0..1).
    #[serde(default)]
    pub min_pos: Option<f64>,
    /// Minimum expected value per share.
    #[serde(default)]
    pub min_ev: Option<f64>,
    /// Maximum IV skew versus ATM, vol units.
    #[serde(default)]
    pub max_skew: Option<f64>,
    /// Term-structure condition, e.g. `term_slope >= 0`.
    #[serde(default)]
    pub term_structure: Option<Rule>,
    /// Maximum absolute gamma.
    #[serde(default)]
    pub max_gamma: Option<f64>,
    /// Maximum absolute vega.
    #[serde(default)]
    pub max_vega: Option<f64>,
    /// Maximum absolute theta.
    #[serde(default)]
    pub max_theta: Option<f64>,
    /// Extra condition evaluated last.
    #[serde(default)]
    pub custom: Option<Rule>,
    /// Loss multiple of premium assumed for short-leg EV.
    #[serde(default = "default_stop_loss_multiple")]
    pub stop_loss_multiple: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_dte: default_min_dte(),
            max_dte: default_max_dte(),
            delta_min: default_delta_min(),
            delta_max: default_delta_max(),
            min_rom: None,
            min_edge: None,
            min_pos: None,
            min_ev: None,
            max_skew: None,
            term_structure: None,
            max_gamma: None,
            max_vega: None,
            max_theta: None,
            custom: None,
            stop_loss_multiple: default_stop_loss_multiple(),
        }
    }
}

impl FilterConfig {
    /// Set the delta band.
    #[must_use]
    pub const fn with_delta_band(mut self, min: f64, max: f64) -> Self {
        self.delta_min = min;
        self.delta_max = max;
        self
    }

    /// Set the DTE window.
    #[must_use]
    pub const fn with_dte(mut self, min: i64, max: i64) -> Self {
        self.min_dte = min;
        self.max_dte = max;
        self
    }

    /// Active thresholds as `(name, value)` pairs, for diagnostics.
    #[must_use]
    pub fn active_thresholds(&self) -> Vec<(String, String)> {
        let mut out = vec![
            ("dte".to_string(), format!("{}..={}", self.min_dte, self.max_dte)),
            (
                "delta".to_string(),
                format!("{}..={}", self.delta_min, self.delta_max),
            ),
        ];
        let optional = [
            ("min_rom", self.min_rom),
            ("min_edge", self.min_edge),
            ("min_pos", self.min_pos),
            ("min_ev", self.min_ev),
            ("max_skew", self.max_skew),
            ("max_gamma", self.max_gamma),
            ("max_vega", self.max_vega),
            ("max_theta", self.max_theta),
        ];
        out.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name.to_string(), v.to_string()))),
        );
        if let Some(rule) = &self.term_structure {
            out.push(("term_structure".to_string(), rule.to_string()));
        }
        if let Some(rule) = &self.custom {
            out.push(("custom".to_string(), rule.to_string()));
        }
        out
    }

    /// Check ranges and band ordering.
    pub fn validate(&self, scope: &str) -> Result<(), String> {
        if self.min_dte < 0 || self.min_dte > self.max_dte {
            return Err(format!(
                "{scope}: dte window {}..{} is invalid",
                self.min_dte, self.max_dte
            ));
        }
        if !(0.0..=1.0).contains(&self.delta_min)
            || !(0.0..=1.0).contains(&self.delta_max)
            || self.delta_min > self.delta_max
        {
            return Err(format!(
                "{scope}: delta band {}..{} must be ascending within 0..1",
                self.delta_min, self.delta_max
            ));
        }
        if self.min_pos.is_some_and(|p| !(0.0..=1.0).contains(&p)) {
            return Err(format!("{scope}: min_pos must be within 0..1"));
        }
        if self.stop_loss_multiple <= 0.0 {
            return Err(format!("{scope}: stop_loss_multiple must be positive"));
        }
        let caps = [
            ("max_gamma", self.max_gamma),
            ("max_vega", self.max_vega),
            ("max_theta", self.max_theta),
        ];
        if let Some((name, _)) = caps.iter().find(|(_, cap)| cap.is_some_and(|c| c < 0.0)) {
            return Err(format!("{scope}: {name} must not be negative"));
        }
        Ok(())
    }
}

const fn default_min_dte() -> i64 {
    7
}
const fn default_max_dte() -> i64 {
    60
}
const fn default_delta_min() -> f64 {
    0.10
}
const fn default_delta_max() -> f64 {
    0.35
}
const fn default_stop_loss_multiple() -> f64 {
    2.0
}
