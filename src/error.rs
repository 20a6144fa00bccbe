/// Error types for the analysis pipeline and the understanding store.
use std::path::PathBuf;

use thiserror::Error;

use crate::context::Phase;

/// Errors that abort an analysis run or reject an invalid setup.
///
/// File-level problems never surface as `AnalysisError`; the coordinator logs
/// them and records a warning in the run statistics instead.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file system error at {path}: {message}")]
    FileSystem { path: PathBuf, message: String },

    #[error("invalid pattern definition {name}: {message}")]
    Pattern { name: String, message: String },

    #[error("analyzer dependency error: {0}")]
    Dependency(String),

    #[error("phase transition {from:?} -> {to:?} is not allowed")]
    PhaseOrder { from: Phase, to: Phase },

    #[error("analyzer {analyzer} failed during {phase:?}: {message}")]
    Analyzer {
        analyzer: String,
        phase: Phase,
        message: String,
    },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised while saving or loading a persisted understanding.
///
/// `NotFound` and `Corrupt` are kept apart so callers can fall back to a full
/// re-analysis when no usable store exists.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("understanding store not found: {0}")]
    NotFound(PathBuf),

    #[error("understanding store unreadable at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("understanding store io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize understanding: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl StoreError {
    /// Whether a caller should fall back to a fresh analysis.
    #[must_use]
    pub fn is_missing_or_corrupt(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::Corrupt { .. })
    }
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
