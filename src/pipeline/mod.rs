//! The analysis pipeline: discovery plus the phase coordinator.
pub mod coordinator;
pub mod discovery;

use serde::{Deserialize, Serialize};

pub use coordinator::{Baseline, PipelineCoordinator, order_analyzers};
pub use discovery::{Discovery, discover, file_hashes, is_test_path};

/// Counters reported by one analysis or update run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Files that went through content analysis (fresh or revisited).
    pub files_indexed: usize,
    /// Files kept from the previous snapshot because their hash was unchanged.
    pub files_reused: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub nodes_extracted: usize,
    pub patterns: usize,
    pub relationships: usize,
    pub concepts: usize,
    pub elapsed_ms: u64,
    pub peak_memory_bytes: usize,
    pub warnings: Vec<String>,
}
