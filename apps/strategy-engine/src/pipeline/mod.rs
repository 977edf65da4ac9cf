//! End-to-end evaluation of a chain snapshot.

mod orchestrator;
mod report;

pub use orchestrator::PipelineOrchestrator;
pub use report::{PipelineReport, StrategyStats};
