//! Statistical findings: patterns, concepts, semantic units and clusters.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Structural,
    Naming,
    Organization,
}

impl PatternCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::Structural => "structural",
            PatternCategory::Naming => "naming",
            PatternCategory::Organization => "organization",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternInstance {
    pub node_id: String,
    pub score: f64,
}

/// A discovered regularity in the codebase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodePattern {
    pub id: String,
    pub name: String,
    pub category: PatternCategory,
    pub description: String,
    pub instances: Vec<PatternInstance>,
    pub confidence: f64,
    pub frequency: usize,
    pub importance: f64,
}

impl CodePattern {
    pub fn new(category: PatternCategory, name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        let slug: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        Self {
            id: format!("pattern:{}:{slug}", category.as_str()),
            name,
            category,
            description: description.into(),
            instances: Vec::new(),
            confidence: 0.0,
            frequency: 0,
            importance: 0.0,
        }
    }
}

/// Sorts patterns for presentation: frequency, then confidence, descending.
pub fn sort_for_presentation(patterns: &mut [CodePattern]) {
    patterns.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then(
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.id.cmp(&b.id))
    });
}

/// A word recurring across identifiers, linking the nodes that contain it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: String,
    pub name: String,
    pub node_ids: Vec<String>,
    pub importance: f64,
    pub confidence: f64,
    pub related: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Mostly types (classes, interfaces, structs).
    DomainModel,
    /// Mostly functions and methods.
    Behavior,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SemanticProperties {
    pub cohesion: f64,
    pub coverage: f64,
    pub concept_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticUnit {
    pub id: String,
    pub name: String,
    pub kind: UnitKind,
    pub node_ids: Vec<String>,
    pub dominant_concepts: Vec<String>,
    pub properties: SemanticProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeCluster {
    pub id: String,
    pub node_ids: Vec<String>,
    pub dominant_type: String,
    pub naming_patterns: Vec<String>,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_id_slug() {
        let p = CodePattern::new(PatternCategory::Naming, "*Service* suffix convention", "");
        assert_eq!(p.id, "pattern:naming:service-suffix-convention");
    }

    #[test]
    fn test_sort_for_presentation() {
        let mut a = CodePattern::new(PatternCategory::Structural, "a", "");
        a.frequency = 3;
        a.confidence = 0.9;
        let mut b = CodePattern::new(PatternCategory::Structural, "b", "");
        b.frequency = 5;
        b.confidence = 0.1;
        let mut c = CodePattern::new(PatternCategory::Structural, "c", "");
        c.frequency = 3;
        c.confidence = 0.95;

        let mut patterns = vec![a, b, c];
        sort_for_presentation(&mut patterns);
        let names: Vec<&str> = patterns.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }
}
