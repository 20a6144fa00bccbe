//! Caller-facing entry points.
use std::path::Path;

use tracing::info;

use crate::analyzer::default_analyzers;
use crate::config::{AnalysisOptions, ClusterOptions, FlowOptions};
use crate::error::{AnalysisError, Result, StoreError};
use crate::fs::LocalFileSystem;
use crate::model::{CodeCluster, CodebaseUnderstanding, DataFlowGraph};
use crate::pipeline::{AnalysisStats, Baseline, PipelineCoordinator, file_hashes};

fn coordinator(options: &AnalysisOptions) -> Result<PipelineCoordinator<LocalFileSystem>> {
    PipelineCoordinator::new(LocalFileSystem::new(), default_analyzers(options)?)
}

fn check_root(root: &Path) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(AnalysisError::FileSystem {
            path: root.to_path_buf(),
            message: "analysis root is not a directory".to_string(),
        })
    }
}

/// Runs a full analysis of the tree at `root`.
pub fn analyze(
    root: &Path,
    options: &AnalysisOptions,
) -> Result<(CodebaseUnderstanding, AnalysisStats)> {
    check_root(root)?;
    let understanding = CodebaseUnderstanding::new(root);
    coordinator(options)?.run(root, understanding, options, None)
}

/// Re-analyzes `root` on top of `existing`. Files whose content hash is
/// unchanged keep their nodes and relationships; everything statistical is
/// recomputed over the merged result. The understanding keeps its id and
/// creation time.
pub fn update(
    root: &Path,
    mut existing: CodebaseUnderstanding,
    options: &AnalysisOptions,
) -> Result<(CodebaseUnderstanding, AnalysisStats)> {
    check_root(root)?;
    let baseline = Baseline {
        hashes: file_hashes(&existing.tree),
        relationships: std::mem::take(&mut existing.relationships),
    };
    info!(
        "Updating understanding {} ({} known files)",
        existing.id,
        baseline.hashes.len()
    );
    existing.root_path = root.to_path_buf();
    coordinator(options)?.run(root, existing, options, Some(baseline))
}

/// Clusters the code nodes of an understanding.
pub fn cluster(understanding: &CodebaseUnderstanding, options: &ClusterOptions) -> Vec<CodeCluster> {
    crate::cluster::cluster(understanding, options)
}

pub fn analyze_data_flows(
    understanding: &CodebaseUnderstanding,
    options: &FlowOptions,
) -> DataFlowGraph {
    crate::dataflow::analyze_data_flows(understanding, options)
}

pub fn save(understanding: &CodebaseUnderstanding, path: &Path) -> std::result::Result<(), StoreError> {
    crate::store::save(understanding, path)
}

pub fn load(path: &Path) -> std::result::Result<CodebaseUnderstanding, StoreError> {
    crate::store::load(path)
}
