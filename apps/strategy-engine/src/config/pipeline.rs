//! Pipeline run settings.

use serde::{Deserialize, Serialize};

use super::resolver::default_true;

/// Pipeline orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Evaluate strategy types on the rayon pool.
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Proposals kept in the report after ranking (0 = all).
    #[serde(default = "default_max_proposals")]
    pub max_proposals: usize,
    /// Record low-confidence candidates but rank them after confident ones.
    #[serde(default = "default_true")]
    pub demote_low_confidence: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_proposals: default_max_proposals(),
            demote_low_confidence: true,
        }
    }
}

const fn default_max_proposals() -> usize {
    20
}
