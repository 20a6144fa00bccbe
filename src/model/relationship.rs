use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    Contains,
    Imports,
    Extends,
    Implements,
    Calls,
    SimilarTo,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Contains => "contains",
            RelationshipKind::Imports => "imports",
            RelationshipKind::Extends => "extends",
            RelationshipKind::Implements => "implements",
            RelationshipKind::Calls => "calls",
            RelationshipKind::SimilarTo => "similar_to",
        }
    }
}

/// Endpoint of a relationship: either a concrete entity id or a name that
/// did not match anything in the index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum RelationshipTarget {
    Resolved(String),
    Unresolved(String),
}

impl RelationshipTarget {
    /// Entity id of the target; unresolved names render as `unresolved:<name>`.
    pub fn id(&self) -> String {
        match self {
            RelationshipTarget::Resolved(id) => id.clone(),
            RelationshipTarget::Unresolved(name) => format!("unresolved:{name}"),
        }
    }

    pub fn resolved_id(&self) -> Option<&str> {
        match self {
            RelationshipTarget::Resolved(id) => Some(id),
            RelationshipTarget::Unresolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, RelationshipTarget::Resolved(_))
    }
}

/// Why a relationship exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Evidence {
    Containment,
    Import { specifier: String },
    Inheritance { name: String },
    Call { name: String },
    NamingPattern { key: String },
    SharedDirectory { directory: String, extension: String },
}

impl Evidence {
    pub fn tag(&self) -> &'static str {
        match self {
            Evidence::Containment => "containment",
            Evidence::Import { .. } => "import",
            Evidence::Inheritance { .. } => "inheritance",
            Evidence::Call { .. } => "call",
            Evidence::NamingPattern { .. } => "naming",
            Evidence::SharedDirectory { .. } => "directory",
        }
    }

    /// The raw reference text a resolvable relationship was derived from.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Evidence::Import { specifier } => Some(specifier),
            Evidence::Inheritance { name } | Evidence::Call { name } => Some(name),
            _ => None,
        }
    }
}

/// Typed, directed, weighted edge between two entity ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub kind: RelationshipKind,
    pub source: String,
    pub target: RelationshipTarget,
    pub weight: f64,
    pub confidence: f64,
    #[serde(default)]
    pub ambiguous: bool,
    /// Relative path of the file whose analysis produced this edge.
    pub origin: String,
    pub evidence: Evidence,
}

impl Relationship {
    pub fn new(
        kind: RelationshipKind,
        source: impl Into<String>,
        target: RelationshipTarget,
        weight: f64,
        confidence: f64,
        origin: impl Into<String>,
        evidence: Evidence,
    ) -> Self {
        let source = source.into();
        let id = format!(
            "{}|{}|{}|{}",
            kind.as_str(),
            source,
            target.id(),
            evidence.tag()
        );
        Self {
            id,
            kind,
            source,
            target,
            weight,
            confidence: confidence.clamp(0.0, 1.0),
            ambiguous: false,
            origin: origin.into(),
            evidence,
        }
    }

    pub fn containment(source: &str, target: &str, origin: &str) -> Self {
        Self::new(
            RelationshipKind::Contains,
            source,
            RelationshipTarget::Resolved(target.to_string()),
            1.0,
            1.0,
            origin,
            Evidence::Containment,
        )
    }

    #[must_use]
    pub fn with_ambiguity(mut self, ambiguous: bool) -> Self {
        self.ambiguous = ambiguous;
        self
    }

    pub fn target_id(&self) -> String {
        self.target.id()
    }
}
