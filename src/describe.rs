//! Plain-text descriptions of symbols and relationships, ready to embed.
use serde::{Deserialize, Serialize};

use crate::model::{
    CodeNode, CodebaseUnderstanding, Evidence, Relationship, RelationshipKind, RelationshipTarget,
};

/// Text describing one entity, keyed by that entity's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Description {
    pub id: String,
    pub text: String,
}

pub fn describe_node(node: &CodeNode, understanding: &CodebaseUnderstanding) -> String {
    let mut text = format!("{} {}", node.kind.as_str(), node.qualified_name);
    if !node.facts.parameters.is_empty() {
        text.push_str(&format!("({})", node.facts.parameters.join(", ")));
    }
    text.push_str(&format!(
        " in {} (lines {}-{}, {})",
        node.path, node.span.start_line, node.span.end_line, node.language
    ));

    let mut traits = Vec::new();
    if node.facts.is_exported {
        traits.push("exported");
    }
    if node.facts.is_async {
        traits.push("async");
    }
    if node.facts.roles.store {
        traits.push("holds state");
    }
    if !traits.is_empty() {
        text.push_str(&format!("; {}", traits.join(", ")));
    }

    if let Some(parent) = node.parent.as_deref().and_then(|id| understanding.node(id)) {
        text.push_str(&format!("; member of {} {}", parent.kind.as_str(), parent.name));
    }
    let calls: Vec<&str> = node.facts.calls.iter().map(|c| c.name.as_str()).collect();
    if !calls.is_empty() {
        text.push_str(&format!("; calls {}", calls.join(", ")));
    }
    if !node.signature.is_empty() {
        text.push_str(&format!("\n{}", node.signature));
    }
    text
}

fn label(id: &str, understanding: &CodebaseUnderstanding) -> String {
    if let Some(node) = understanding.node(id) {
        return node.qualified_name.clone();
    }
    id.split_once(':').map_or(id, |(_, rest)| rest).to_string()
}

fn verb(kind: RelationshipKind) -> &'static str {
    match kind {
        RelationshipKind::Contains => "contains",
        RelationshipKind::Imports => "imports",
        RelationshipKind::Extends => "extends",
        RelationshipKind::Implements => "implements",
        RelationshipKind::Calls => "calls",
        RelationshipKind::SimilarTo => "is similar to",
    }
}

pub fn describe_relationship(rel: &Relationship, understanding: &CodebaseUnderstanding) -> String {
    let target = match &rel.target {
        RelationshipTarget::Resolved(id) => label(id, understanding),
        RelationshipTarget::Unresolved(name) => format!("{name} (unresolved)"),
    };
    let mut text = format!(
        "{} {} {target}",
        label(&rel.source, understanding),
        verb(rel.kind)
    );
    match &rel.evidence {
        Evidence::NamingPattern { key } => text.push_str(&format!(" by naming pattern {key}")),
        Evidence::SharedDirectory { directory, extension } => {
            let directory = if directory.is_empty() { "." } else { directory.as_str() };
            text.push_str(&format!(" (both .{extension} in {directory})"));
        }
        _ => {}
    }
    if rel.ambiguous {
        text.push_str(", ambiguous");
    }
    text.push_str(&format!(" [confidence {:.2}]", rel.confidence));
    text
}

/// Descriptions of every code node and every non-containment relationship.
pub fn describe_understanding(understanding: &CodebaseUnderstanding) -> Vec<Description> {
    let nodes = understanding.nodes.values().map(|node| Description {
        id: node.id.clone(),
        text: describe_node(node, understanding),
    });
    let relationships = understanding
        .relationships
        .iter()
        .filter(|r| r.kind != RelationshipKind::Contains)
        .map(|rel| Description {
            id: rel.id.clone(),
            text: describe_relationship(rel, understanding),
        });
    nodes.chain(relationships).collect()
}
