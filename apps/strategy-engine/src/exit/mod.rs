//! Staged exit of open positions.

mod attempt;
mod error;
mod intent;
mod orchestrator;
mod pricing;

pub use attempt::{AttemptOutcome, ExcludedLeg, ExitAttempt, ExitFlowResult, ExitStage, ExitStatus};
pub use error::ExitError;
pub use intent::ExitIntent;
pub use orchestrator::{ExitOrchestrator, stage_plan};
pub use pricing::StagePricing;
