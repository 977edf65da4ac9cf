//! Strategy Engine Binary
//!
//! Evaluates one option chain snapshot and prints the ranked report as JSON.
//!
//! # Usage
//!
//! ```bash
//! CHAIN_SNAPSHOT=chain.json cargo run --bin strategy-engine
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `CHAIN_SNAPSHOT`: Path to a chain snapshot JSON file
//!
//! ## Optional
//! - `STRATEGY_ENGINE_CONFIG`: YAML config path (default: `strategy-engine.yaml`
//!   when present, built-in defaults otherwise)
//! - `RUST_LOG`: Log level (default: `strategy_engine=info`)
//!
//! # Exit Codes
//!
//! `2` for rejected input or configuration, `3` for broker or quote failures,
//! `1` otherwise.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use strategy_engine::config::{DEFAULT_CONFIG_PATH, EngineConfig, load_config};
use strategy_engine::telemetry::init_tracing;
use strategy_engine::{ChainSnapshot, EngineError, PipelineOrchestrator, RawChain};
use tracing::{error, info};

fn main() -> ExitCode {
    // Load .env file if present (ignore errors if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = exit_code(&err);
            error!(exit_code = code, "Strategy engine failed: {err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::from(code)
        }
    }
}

/// Exit status for a failed run, taken from the engine error under any context.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<EngineError>()
        .map_or(1, |engine| engine.code().exit_code())
}

fn run() -> Result<()> {
    let config = engine_config()?;
    let chain_path = std::env::var("CHAIN_SNAPSHOT").context("CHAIN_SNAPSHOT is not set")?;
    let raw = std::fs::read_to_string(&chain_path)
        .map_err(EngineError::from)
        .with_context(|| format!("failed to read chain snapshot '{chain_path}'"))?;
    let raw: RawChain = serde_json::from_str(&raw)
        .map_err(EngineError::from)
        .with_context(|| format!("failed to decode chain snapshot '{chain_path}'"))?;
    let snapshot = ChainSnapshot::ingest(raw)
        .map_err(EngineError::from)
        .context("chain snapshot rejected")?;

    let orchestrator = PipelineOrchestrator::new(config)
        .map_err(EngineError::from)
        .context("invalid strategy set")?;
    info!(
        underlying = %snapshot.underlying,
        strategies = orchestrator.strategies().count(),
        "Evaluating chain snapshot"
    );

    let report = orchestrator.run(snapshot);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn engine_config() -> Result<EngineConfig> {
    match std::env::var("STRATEGY_ENGINE_CONFIG") {
        Ok(path) => load_config(Some(&path))
            .map_err(EngineError::from)
            .with_context(|| format!("loading config '{path}'")),
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config(None)
            .map_err(EngineError::from)
            .context("loading default config"),
        Err(_) => Ok(EngineConfig::default()),
    }
}
