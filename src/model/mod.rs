//! The aggregate codebase-understanding model and its collections.
//!
//! Everything here is plain data: analyzers fill it in through the shared
//! context, the store persists it, and callers query it.

pub mod code;
pub mod flow;
pub mod insight;
pub mod language;
pub mod pairs;
pub mod relationship;
pub mod tree;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use code::{CallFact, CodeNode, HandlerFact, NodeFacts, NodeKind, RoleHints, Span};
pub use flow::{DataFlow, DataFlowGraph, DataFlowNode, DataFlowPath, FlowKind, FlowRole};
pub use insight::{
    CodeCluster, CodePattern, Concept, PatternCategory, PatternInstance, SemanticProperties,
    SemanticUnit, UnitKind,
};
pub use language::LanguageDetails;
pub use relationship::{Evidence, Relationship, RelationshipKind, RelationshipTarget};
pub use tree::{DirectoryNode, FileMetadata, FileNode, FileSystemTree, TreeEntry};

/// Id of the directory at `path` (relative, `/`-separated). The root is `dir:.`.
#[must_use]
pub fn directory_id(path: &str) -> String {
    if path.is_empty() || path == "." {
        "dir:.".to_string()
    } else {
        format!("dir:{path}")
    }
}

#[must_use]
pub fn file_id(path: &str) -> String {
    format!("file:{path}")
}

#[must_use]
pub fn node_id(path: &str, qualified_name: &str, start_line: usize) -> String {
    format!("node:{path}#{qualified_name}@{start_line}")
}

/// SHA-256 hex digest used for file and node content hashes.
#[must_use]
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Parent directory of a relative path; `""` for top-level entries.
#[must_use]
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |idx| &path[..idx])
}

/// The complete model produced for one codebase snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodebaseUnderstanding {
    pub id: String,
    pub root_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tree: FileSystemTree,
    #[serde(with = "pairs")]
    pub languages: BTreeMap<String, LanguageDetails>,
    #[serde(with = "pairs")]
    pub nodes: BTreeMap<String, CodeNode>,
    pub relationships: Vec<Relationship>,
    pub patterns: Vec<CodePattern>,
    pub concepts: Vec<Concept>,
    pub semantic_units: Vec<SemanticUnit>,
    pub clusters: Vec<CodeCluster>,
    pub data_flow: DataFlowGraph,
}

impl CodebaseUnderstanding {
    pub fn new(root_path: &Path) -> Self {
        let now = Utc::now();
        let root_name = root_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            root_path: root_path.to_path_buf(),
            created_at: now,
            updated_at: now,
            tree: FileSystemTree::new(&root_name),
            languages: BTreeMap::new(),
            nodes: BTreeMap::new(),
            relationships: Vec::new(),
            patterns: Vec::new(),
            concepts: Vec::new(),
            semantic_units: Vec::new(),
            clusters: Vec::new(),
            data_flow: DataFlowGraph::default(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&CodeNode> {
        self.nodes.get(id)
    }

    /// Code nodes extracted from the file at `path`, in id order.
    pub fn nodes_in_file<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a CodeNode> + 'a {
        self.nodes.values().filter(move |n| n.path == path)
    }

    pub fn relationships_of_kind(
        &self,
        kind: RelationshipKind,
    ) -> impl Iterator<Item = &Relationship> + '_ {
        self.relationships.iter().filter(move |r| r.kind == kind)
    }

    /// Drops the nodes owned by `path`. Returns how many were removed.
    pub fn remove_file_nodes(&mut self, path: &str) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|_, n| n.path != path);
        before - self.nodes.len()
    }

    /// Clears everything derived from statistics over the whole tree.
    ///
    /// Incremental runs recompute these from the merged node set.
    pub fn clear_derived(&mut self) {
        self.patterns.clear();
        self.concepts.clear();
        self.semantic_units.clear();
        self.clusters.clear();
        self.data_flow = DataFlowGraph::default();
    }

    pub fn dominant_language(&self) -> Option<&str> {
        self.languages
            .iter()
            .find(|(_, d)| d.dominant)
            .map(|(name, _)| name.as_str())
    }
}
