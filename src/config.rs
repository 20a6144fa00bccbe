/// Configuration module for codelens.
///
/// Handles loading, validating, and providing default analysis options.
/// Every significance threshold used by the analyzers lives in [`Thresholds`]
/// so a caller can tune the policy without touching analyzer code.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Default value functions ──────────────────────────────────────────

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/dist/**".to_string(),
        "**/build/**".to_string(),
        "**/__pycache__/**".to_string(),
        "**/.codelens/**".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    1024 * 1024
}

fn default_min_confidence() -> f64 {
    0.3
}

fn default_min_similarity() -> f64 {
    0.5
}

fn default_max_clusters() -> usize {
    20
}

fn default_max_cluster_nodes() -> usize {
    2000
}

fn default_metrics() -> Vec<SimilarityMetric> {
    vec![
        SimilarityMetric::NamingPattern,
        SimilarityMetric::StructuralSimilarity,
        SimilarityMetric::RelationshipGraph,
        SimilarityMetric::SemanticSimilarity,
    ]
}

// ── Config structs ───────────────────────────────────────────────────

/// Options for one `analyze` / `update` run.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AnalysisOptions {
    /// Maximum directory depth below the root; `None` walks everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(default = "default_true")]
    pub semantic_analysis: bool,

    #[serde(default = "default_true")]
    pub include_tests: bool,

    #[serde(default = "default_true")]
    pub respect_gitignore: bool,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Keep file contents cached after their last reader releases them, until
    /// the coordinator relieves memory at the end of content analysis.
    #[serde(default)]
    pub retain_content: bool,

    #[serde(default)]
    pub flow: FlowOptions,

    #[serde(default)]
    pub cluster: ClusterOptions,

    #[serde(default)]
    pub thresholds: Thresholds,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FlowOptions {
    #[serde(default = "default_true")]
    pub include_async_flows: bool,

    #[serde(default = "default_true")]
    pub include_conditional_flows: bool,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterAlgorithm {
    Hierarchical,
    Dbscan,
    Kmeans,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimilarityMetric {
    NamingPattern,
    StructuralSimilarity,
    RelationshipGraph,
    SemanticSimilarity,
    ContentSimilarity,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClusterOptions {
    #[serde(default = "default_algorithm")]
    pub algorithm: ClusterAlgorithm,

    #[serde(default = "default_metrics")]
    pub metrics: Vec<SimilarityMetric>,

    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,

    #[serde(default = "default_max_clusters")]
    pub max_clusters: usize,

    /// Upper bound on nodes fed into the pairwise similarity matrix.
    #[serde(default = "default_max_cluster_nodes")]
    pub max_nodes: usize,
}

fn default_algorithm() -> ClusterAlgorithm {
    ClusterAlgorithm::Hierarchical
}

/// Significance thresholds and discount factors.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    /// Confidence multiplier when an import/inheritance/call has several targets.
    pub ambiguity_discount: f64,
    /// Confidence multiplier for edges that resolved to nothing.
    pub unresolved_discount: f64,
    /// Minimum instances for a structural (node type) pattern.
    pub structural_min_instances: usize,
    /// Share a casing style must strictly exceed to become a naming pattern.
    pub naming_share: f64,
    /// Share of identifiers an affix must exceed (with `affix_floor`).
    pub affix_share: f64,
    pub affix_floor: usize,
    /// Share of nodes a word must appear in to become a concept (with `concept_floor`).
    pub concept_share: f64,
    pub concept_floor: usize,
    /// Jaccard similarity above which two concepts are related.
    pub concept_relatedness: f64,
    /// Overlap (of the smaller group) above which two unit seeds merge.
    pub unit_overlap: f64,
    /// Minimum nodes for a concept to seed a semantic unit.
    pub unit_seed_min: usize,
    /// Optional cap on similarity group size; larger groups are not linked
    /// pairwise. Unbounded by default.
    pub max_similarity_group: Option<usize>,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            exclude_patterns: default_exclude_patterns(),
            semantic_analysis: default_true(),
            include_tests: default_true(),
            respect_gitignore: default_true(),
            max_file_size: default_max_file_size(),
            retain_content: false,
            flow: FlowOptions::default(),
            cluster: ClusterOptions::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            include_async_flows: default_true(),
            include_conditional_flows: default_true(),
            min_confidence: default_min_confidence(),
        }
    }
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            metrics: default_metrics(),
            min_similarity: default_min_similarity(),
            max_clusters: default_max_clusters(),
            max_nodes: default_max_cluster_nodes(),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            ambiguity_discount: 0.9,
            unresolved_discount: 0.5,
            structural_min_instances: 3,
            naming_share: 0.30,
            affix_share: 0.10,
            affix_floor: 3,
            concept_share: 0.05,
            concept_floor: 3,
            concept_relatedness: 0.3,
            unit_overlap: 0.5,
            unit_seed_min: 3,
            max_similarity_group: None,
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Thresholds {
    /// Minimum distinct-node count for a word to become a concept.
    #[must_use]
    pub fn concept_min_occurrences(&self, node_count: usize) -> usize {
        let floor = self.concept_floor as f64;
        floor.max(self.concept_share * node_count as f64).ceil() as usize
    }

    /// Count an affix must strictly exceed to become a pattern.
    #[must_use]
    pub fn affix_min_count(&self, identifier_count: usize) -> f64 {
        (self.affix_floor as f64).max(self.affix_share * identifier_count as f64)
    }
}

impl AnalysisOptions {
    /// Load options from a JSON file.
    ///
    /// A missing file yields the defaults; invalid JSON is reported and also
    /// falls back to the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("{} not found, using default analysis options", path.display());
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read options: {}", path.display()))?;

        let options: AnalysisOptions = match serde_json::from_str(&data) {
            Ok(o) => o,
            Err(e) => {
                warn!("Invalid JSON in {}: {e}", path.display());
                warn!("Using default analysis options");
                return Ok(Self::default());
            }
        };

        info!("Loaded analysis options from {}", path.display());
        Ok(options)
    }

    /// Save options to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal options")?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write options: {}", path.display()))?;
        Ok(())
    }

    /// Validate option values.
    pub fn validate(&self) -> Result<()> {
        for pattern in &self.exclude_patterns {
            globset::Glob::new(pattern)
                .with_context(|| format!("invalid exclude pattern: {pattern}"))?;
        }
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.flow.min_confidence),
            "flow.min_confidence must be within [0, 1]"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.cluster.min_similarity),
            "cluster.min_similarity must be within [0, 1]"
        );
        anyhow::ensure!(self.cluster.max_clusters > 0, "cluster.max_clusters must be positive");
        anyhow::ensure!(
            !self.cluster.metrics.is_empty(),
            "at least one similarity metric must be selected"
        );
        anyhow::ensure!(self.max_file_size > 0, "max_file_size must be positive");
        let t = &self.thresholds;
        anyhow::ensure!(
            t.max_similarity_group.is_none_or(|cap| cap >= 2),
            "thresholds.max_similarity_group must be at least 2"
        );
        for (name, value) in [
            ("ambiguity_discount", t.ambiguity_discount),
            ("unresolved_discount", t.unresolved_discount),
            ("naming_share", t.naming_share),
            ("affix_share", t.affix_share),
            ("concept_share", t.concept_share),
            ("concept_relatedness", t.concept_relatedness),
            ("unit_overlap", t.unit_overlap),
        ] {
            anyhow::ensure!(
                (0.0..=1.0).contains(&value),
                "thresholds.{name} must be within [0, 1]"
            );
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
