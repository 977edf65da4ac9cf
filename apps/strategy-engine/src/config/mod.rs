//! Engine configuration.
//!
//! YAML with `${VAR}` / `${VAR:-default}` environment interpolation. Every
//! section has defaults, so an empty document is a valid configuration.
//!
//! ```yaml
//! resolver:
//!   relative_spread_limit: 0.25
//! strategies:
//!   iron_condor:
//!     max_fallback_legs_per_four: 2
//!     widths: [5, 10]
//!     filter:
//!       delta_min: 0.10
//!       delta_max: 0.30
//!       term_structure: "term_slope >= 0"
//! exit:
//!   quote_age_threshold_secs: ${EXIT_QUOTE_AGE:-5}
//! ```

mod exit;
mod filters;
mod pipeline;
mod resolver;
mod strategies;

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::strategy::{StrategyType, UnknownStrategyError};

pub use exit::ExitPolicy;
pub use filters::FilterConfig;
pub use pipeline::PipelineConfig;
pub use resolver::{ResolverConfig, SpreadBucket};
pub use strategies::StrategyConfig;

/// Default configuration path.
pub const DEFAULT_CONFIG_PATH: &str = "strategy-engine.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),

    /// A strategy key is not a known strategy.
    #[error(transparent)]
    UnknownStrategy(#[from] UnknownStrategyError),
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Price resolver thresholds.
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Strategy name to configuration. Each YAML section overrides the
    /// strategy's own defaults.
    #[serde(default = "default_strategies", deserialize_with = "strategy_sections")]
    pub strategies: BTreeMap<String, StrategyConfig>,
    /// Default exit policy.
    #[serde(default)]
    pub exit: ExitPolicy,
    /// Pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            strategies: default_strategies(),
            exit: ExitPolicy::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Enabled strategies, resolved to their types, in type order.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStrategyError` for a name outside the closed set.
    pub fn enabled_strategies(
        &self,
    ) -> Result<Vec<(StrategyType, StrategyConfig)>, UnknownStrategyError> {
        let mut out = Vec::with_capacity(self.strategies.len());
        for (name, config) in &self.strategies {
            let strategy = name.parse::<StrategyType>()?;
            if config.enabled {
                out.push((strategy, config.clone()));
            }
        }
        out.sort_by_key(|(strategy, _)| *strategy);
        Ok(out)
    }
}

fn default_strategies() -> BTreeMap<String, StrategyConfig> {
    StrategyType::ALL
        .iter()
        .map(|strategy| {
            (
                strategy.as_str().to_string(),
                StrategyConfig::for_strategy(*strategy),
            )
        })
        .collect()
}

fn strategy_sections<'de, D>(deserializer: D) -> Result<BTreeMap<String, StrategyConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let sections = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    sections
        .into_iter()
        .map(|(name, section)| {
            // Unknown names are reported by validation.
            let base = name
                .parse::<StrategyType>()
                .map_or_else(|_| StrategyConfig::default(), StrategyConfig::for_strategy);
            let config = base.overlay(section).map_err(|e| {
                <D::Error as serde::de::Error>::custom(format!("strategies.{name}: {e}"))
            })?;
            Ok((name, config))
        })
        .collect()
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<EngineConfig, ConfigError> {
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string.
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<EngineConfig, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: EngineConfig = if interpolated.trim().is_empty() {
        EngineConfig::default()
    } else {
        serde_yaml_bw::from_str(&interpolated)?
    };
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant
fn interpolate_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map(|m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    config
        .resolver
        .validate()
        .map_err(ConfigError::ValidationError)?;
    config.exit.validate().map_err(ConfigError::ValidationError)?;

    let mut seen = HashSet::new();
    for (name, strategy_config) in &config.strategies {
        let strategy = name.parse::<StrategyType>()?;
        if !seen.insert(strategy) {
            return Err(ConfigError::ValidationError(format!(
                "strategy '{strategy}' is configured more than once"
            )));
        }
        strategy_config
            .validate(strategy)
            .map_err(ConfigError::ValidationError)?;
    }

    Ok(())
}
