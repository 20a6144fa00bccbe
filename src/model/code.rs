use serde::{Deserialize, Serialize};

/// Kind of syntactic element a code node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Namespace,
    Class,
    Interface,
    Struct,
    Enum,
    Trait,
    Function,
    Method,
    Property,
    Variable,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Namespace => "namespace",
            NodeKind::Class => "class",
            NodeKind::Interface => "interface",
            NodeKind::Struct => "struct",
            NodeKind::Enum => "enum",
            NodeKind::Trait => "trait",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Property => "property",
            NodeKind::Variable => "variable",
        }
    }

    /// Kinds that can be the target of `extends` / `implements`.
    pub fn is_type_like(&self) -> bool {
        matches!(
            self,
            NodeKind::Class | NodeKind::Interface | NodeKind::Struct | NodeKind::Trait
        )
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, NodeKind::Function | NodeKind::Method)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
}

impl Span {
    pub fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// A syntactic element extracted from one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeNode {
    pub id: String,
    pub name: String,
    pub qualified_name: String,
    pub kind: NodeKind,
    pub path: String,
    pub span: Span,
    pub content_hash: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub confidence: f64,
    pub signature: String,
    pub language: String,
    #[serde(default)]
    pub facts: NodeFacts,
}

/// Heuristic facts gathered from a node's source text.
///
/// Typed replacement for a free-form metadata bag; every analyzer that needs
/// a fact about a node reads it from here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeFacts {
    pub is_async: bool,
    pub is_exported: bool,
    pub has_conditional: bool,
    pub parameters: Vec<String>,
    pub calls: Vec<CallFact>,
    pub emits: Vec<String>,
    pub handles: Vec<HandlerFact>,
    pub reads_fields: Vec<String>,
    pub writes_fields: Vec<String>,
    pub roles: RoleHints,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFact {
    pub name: String,
    pub line: usize,
    pub has_args: bool,
    pub awaited: bool,
    pub assigned: bool,
    pub returned: bool,
    pub conditional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerFact {
    pub event: String,
    pub handler: Option<String>,
}

/// Structural hints used to assign data-flow roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleHints {
    pub data_source: bool,
    pub data_sink: bool,
    pub store: bool,
    pub transformer: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_groups() {
        assert!(NodeKind::Interface.is_type_like());
        assert!(!NodeKind::Function.is_type_like());
        assert!(NodeKind::Method.is_callable());
        assert_eq!(NodeKind::Property.as_str(), "property");
    }

    #[test]
    fn test_span() {
        let span = Span { start_line: 3, end_line: 7 };
        assert!(span.contains_line(3));
        assert!(span.contains_line(7));
        assert!(!span.contains_line(8));
        assert_eq!(span.line_count(), 5);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&NodeKind::Namespace).unwrap();
        assert_eq!(json, "\"namespace\"");
    }
}
