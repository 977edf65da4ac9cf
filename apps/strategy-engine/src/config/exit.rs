//! Exit policy defaults.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stages that always run besides the ladder: primary, fallback, force.
const FIXED_STAGES: u32 = 3;

/// Staged exit policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitPolicy {
    /// Legs whose quote is older than this are excluded from priced attempts (seconds).
    #[serde(default = "default_quote_age_threshold_secs")]
    pub quote_age_threshold_secs: i64,
    /// Price increment per ladder step, per share.
    #[serde(default = "default_ladder_step")]
    pub ladder_step: Decimal,
    /// Ladder steps requested.
    #[serde(default = "default_ladder_steps")]
    pub ladder_steps: u32,
    /// Total attempts allowed, force-exit included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Time to wait for a fill at each stage (milliseconds).
    #[serde(default = "default_stage_wait_ms")]
    pub stage_wait_ms: u64,
    /// Order status poll interval while waiting (milliseconds).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Slippage beyond the aggressive side for the fallback attempt, per share.
    #[serde(default = "default_fallback_slippage")]
    pub fallback_slippage: Decimal,
}

impl Default for ExitPolicy {
    fn default() -> Self {
        Self {
            quote_age_threshold_secs: default_quote_age_threshold_secs(),
            ladder_step: default_ladder_step(),
            ladder_steps: default_ladder_steps(),
            max_attempts: default_max_attempts(),
            stage_wait_ms: default_stage_wait_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            fallback_slippage: default_fallback_slippage(),
        }
    }
}

impl ExitPolicy {
    /// Ladder steps that fit within `max_attempts`.
    #[must_use]
    pub fn effective_ladder_steps(&self) -> u32 {
        self.ladder_steps
            .min(self.max_attempts.saturating_sub(FIXED_STAGES))
    }

    /// Per-stage wait.
    #[must_use]
    pub const fn stage_wait(&self) -> Duration {
        Duration::from_millis(self.stage_wait_ms)
    }

    /// Poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check ranges.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts < FIXED_STAGES {
            return Err(format!(
                "exit.max_attempts must be at least {FIXED_STAGES} (primary, fallback, force)"
            ));
        }
        if self.quote_age_threshold_secs < 0 {
            return Err("exit.quote_age_threshold_secs must not be negative".to_string());
        }
        if self.ladder_step <= Decimal::ZERO {
            return Err("exit.ladder_step must be positive".to_string());
        }
        if self.fallback_slippage < Decimal::ZERO {
            return Err("exit.fallback_slippage must not be negative".to_string());
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > self.stage_wait_ms {
            return Err("exit.poll_interval_ms must be within 1..=stage_wait_ms".to_string());
        }
        Ok(())
    }
}

const fn default_quote_age_threshold_secs() -> i64 {
    5
}
fn default_ladder_step() -> Decimal {
    Decimal::new(5, 2)
}
const fn default_ladder_steps() -> u32 {
    3
}
const fn default_max_attempts() -> u32 {
    6
}
const fn default_stage_wait_ms() -> u64 {
    2_000
}
const fn default_poll_interval_ms() -> u64 {
    250
}
fn default_fallback_slippage() -> Decimal {
    Decimal::new(10, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_is_capped_by_max_attempts() {
        let policy = ExitPolicy {
            ladder_steps: 5,
            max_attempts: 6,
            ..ExitPolicy::default()
        };
        assert_eq!(policy.effective_ladder_steps(), 3);

        let tight = ExitPolicy {
            max_attempts: 3,
            ..policy
        };
        assert_eq!(tight.effective_ladder_steps(), 0);
    }

    #[test]
    fn validate_rejects_too_few_attempts() {
        let policy = ExitPolicy {
            max_attempts: 2,
            ..ExitPolicy::default()
        };
        assert!(policy.validate().is_err());
        assert!(ExitPolicy::default().validate().is_ok());
    }
}
