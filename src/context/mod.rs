//! The shared analysis context: the blackboard every analyzer reads and writes.
//!
//! One context exists per analysis run (or per incremental delta). It is
//! handed to one analyzer at a time by `&mut`, and only the pipeline
//! coordinator may move it from one phase to the next.
pub mod cache;
pub mod registry;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::AnalysisOptions;
use crate::error::{AnalysisError, Result};
use crate::model::{CodeNode, CodebaseUnderstanding, Relationship};

pub use cache::{ContentCache, ContentLease};
pub use registry::{DefinitionCategory, PatternDefinition, PatternRegistry};

/// Pipeline phases, in the only order they may be visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Initialization,
    Discovery,
    ContentAnalysis,
    RelationshipMapping,
    PatternDiscovery,
    Integration,
    Cleanup,
}

pub struct SharedAnalysisContext {
    phase: Phase,
    pub understanding: CodebaseUnderstanding,
    pub options: AnalysisOptions,
    pub registry: PatternRegistry,
    cache: ContentCache,
    file_languages: BTreeMap<String, String>,
    relationship_ids: HashSet<String>,
    /// Relationships produced by unchanged files on an incremental run, keyed
    /// by the file that produced them.
    carried: BTreeMap<String, Vec<Relationship>>,
    warnings: Vec<String>,
}

impl SharedAnalysisContext {
    pub fn new(understanding: CodebaseUnderstanding, options: AnalysisOptions) -> Self {
        let cache = if options.retain_content {
            ContentCache::with_retention()
        } else {
            ContentCache::new()
        };
        let relationship_ids = understanding
            .relationships
            .iter()
            .map(|r| r.id.clone())
            .collect();
        Self {
            phase: Phase::Initialization,
            understanding,
            options,
            registry: PatternRegistry::new(),
            cache,
            file_languages: BTreeMap::new(),
            relationship_ids,
            carried: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn current_phase(&self) -> Phase {
        self.phase
    }

    /// Moves to `next`. Phases only move forward and are never re-entered.
    pub(crate) fn advance_to(&mut self, next: Phase) -> Result<()> {
        if next <= self.phase {
            return Err(AnalysisError::PhaseOrder {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Records the detected language for a file, on the tree node as well.
    pub fn set_file_language(&mut self, path: &str, language: &str) {
        self.file_languages
            .insert(path.to_string(), language.to_string());
        if let Some(file) = self.understanding.tree.file_mut(path) {
            file.language = Some(language.to_string());
        }
    }

    pub fn file_language(&self, path: &str) -> Option<&str> {
        self.file_languages.get(path).map(String::as_str)
    }

    /// Adds a code node and links it into its parent's child list.
    pub fn add_node(&mut self, node: CodeNode) {
        if let Some(parent_id) = node.parent.clone() {
            if let Some(parent) = self.understanding.nodes.get_mut(&parent_id) {
                if !parent.children.contains(&node.id) {
                    parent.children.push(node.id.clone());
                }
            }
        }
        self.understanding.nodes.insert(node.id.clone(), node);
    }

    /// Merges relationships into the context, skipping ids already present.
    /// Returns how many were added.
    pub fn add_relationships<I>(&mut self, relationships: I) -> usize
    where
        I: IntoIterator<Item = Relationship>,
    {
        let mut added = 0;
        for rel in relationships {
            if self.relationship_ids.insert(rel.id.clone()) {
                self.understanding.relationships.push(rel);
                added += 1;
            }
        }
        added
    }

    pub(crate) fn carry_relationship(&mut self, relationship: Relationship) {
        self.carried
            .entry(relationship.origin.clone())
            .or_default()
            .push(relationship);
    }

    /// Takes the relationships carried over for `path` from a previous run.
    pub fn take_carried(&mut self, path: &str) -> Vec<Relationship> {
        self.carried.remove(path).unwrap_or_default()
    }

    /// Records a recovered, file-level problem.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub(crate) fn into_parts(self) -> (CodebaseUnderstanding, Vec<String>, ContentCache) {
        (self.understanding, self.warnings, self.cache)
    }
}
