use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::Analyzer;
use super::naming::{capitalize, split_words};
use crate::config::Thresholds;
use crate::context::SharedAnalysisContext;
use crate::error::Result;
use crate::model::{CodeNode, Concept, SemanticProperties, SemanticUnit, UnitKind};

const STOP_WORDS: &[&str] = &[
    "get", "set", "handle", "handler", "service", "model", "data", "value", "util", "utils",
    "helper", "manager", "the", "and", "for", "with", "from", "into", "new", "create", "update",
    "delete", "init", "test", "impl", "this", "self", "class", "function", "main", "index",
    "default",
];

/// Kind share above which a unit is classified by that kind.
const KIND_MAJORITY: f64 = 0.6;
const MAX_DOMINANT_CONCEPTS: usize = 5;

/// Meaningful words of an identifier.
pub fn concept_words(name: &str) -> BTreeSet<String> {
    split_words(name)
        .into_iter()
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Promotes recurring identifier words to concepts and groups them into
/// semantic units.
#[derive(Default)]
pub struct SemanticAnalyzer;

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

fn jaccard(a: &[String], b: &[String]) -> f64 {
    let a: BTreeSet<&String> = a.iter().collect();
    let b: BTreeSet<&String> = b.iter().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

pub fn extract_concepts<'a>(
    nodes: impl IntoIterator<Item = &'a CodeNode>,
    thresholds: &Thresholds,
) -> Vec<Concept> {
    let mut occurrences: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut total = 0usize;
    for node in nodes {
        total += 1;
        for word in concept_words(&node.name) {
            occurrences.entry(word).or_default().insert(node.id.clone());
        }
    }
    if total == 0 {
        return Vec::new();
    }

    let min = thresholds.concept_min_occurrences(total);
    let mut concepts: Vec<Concept> = occurrences
        .into_iter()
        .filter(|(_, ids)| ids.len() >= min)
        .map(|(word, ids)| {
            let share = ids.len() as f64 / total as f64;
            Concept {
                id: format!("concept:{word}"),
                name: word,
                node_ids: ids.into_iter().collect(),
                importance: share,
                confidence: share.min(0.9),
                related: Vec::new(),
            }
        })
        .collect();
    concepts.sort_by(|a, b| b.node_ids.len().cmp(&a.node_ids.len()).then(a.name.cmp(&b.name)));

    let mut links: Vec<(usize, usize)> = Vec::new();
    for i in 0..concepts.len() {
        for j in i + 1..concepts.len() {
            if jaccard(&concepts[i].node_ids, &concepts[j].node_ids) > thresholds.concept_relatedness {
                links.push((i, j));
            }
        }
    }
    for (i, j) in links {
        let (a, b) = (concepts[i].id.clone(), concepts[j].id.clone());
        concepts[i].related.push(b);
        concepts[j].related.push(a);
    }
    concepts
}

struct Group {
    concepts: Vec<String>,
    nodes: BTreeSet<String>,
}

pub fn build_units(
    concepts: &[Concept],
    nodes: &BTreeMap<String, CodeNode>,
    thresholds: &Thresholds,
) -> Vec<SemanticUnit> {
    let mut groups: Vec<Group> = concepts
        .iter()
        .filter(|c| c.node_ids.len() >= thresholds.unit_seed_min)
        .map(|c| Group {
            concepts: vec![c.name.clone()],
            nodes: c.node_ids.iter().cloned().collect(),
        })
        .collect();

    // Merge until no pair overlaps by more than the threshold.
    'merge: loop {
        for i in 0..groups.len() {
            for j in i + 1..groups.len() {
                let shared = groups[i].nodes.intersection(&groups[j].nodes).count();
                let smaller = groups[i].nodes.len().min(groups[j].nodes.len());
                if smaller > 0 && shared as f64 / smaller as f64 > thresholds.unit_overlap {
                    let absorbed = groups.remove(j);
                    groups[i].concepts.extend(absorbed.concepts);
                    groups[i].nodes.extend(absorbed.nodes);
                    continue 'merge;
                }
            }
        }
        break;
    }
    groups.retain(|g| g.nodes.len() >= 2);

    let by_name: BTreeMap<&str, &Concept> = concepts.iter().map(|c| (c.name.as_str(), c)).collect();
    let total = nodes.len().max(1);
    let mut units: Vec<SemanticUnit> = groups
        .into_iter()
        .map(|group| {
            // Concepts ranked by how many of the group's nodes carry them.
            let mut ranked: Vec<(&str, usize)> = group
                .concepts
                .iter()
                .filter_map(|name| by_name.get(name.as_str()))
                .map(|c| {
                    let members = c.node_ids.iter().filter(|id| group.nodes.contains(*id)).count();
                    (c.name.as_str(), members)
                })
                .collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
            let (lead, lead_members) = ranked.first().copied().unwrap_or(("unit", 0));

            let size = group.nodes.len();
            let kinds = group.nodes.iter().filter_map(|id| nodes.get(id)).map(|n| n.kind);
            let (mut types, mut callables) = (0usize, 0usize);
            for kind in kinds {
                if kind.is_type_like() {
                    types += 1;
                } else if kind.is_callable() {
                    callables += 1;
                }
            }
            let kind = if types as f64 / size as f64 > KIND_MAJORITY {
                UnitKind::DomainModel
            } else if callables as f64 / size as f64 > KIND_MAJORITY {
                UnitKind::Behavior
            } else {
                UnitKind::Mixed
            };

            SemanticUnit {
                id: String::new(),
                name: format!("{}Module", capitalize(lead)),
                kind,
                dominant_concepts: ranked
                    .iter()
                    .take(MAX_DOMINANT_CONCEPTS)
                    .map(|(name, _)| name.to_string())
                    .collect(),
                properties: SemanticProperties {
                    cohesion: lead_members as f64 / size as f64,
                    coverage: size as f64 / total as f64,
                    concept_count: group.concepts.len(),
                },
                node_ids: group.nodes.into_iter().collect(),
            }
        })
        .collect();

    units.sort_by(|a, b| b.node_ids.len().cmp(&a.node_ids.len()).then(a.name.cmp(&b.name)));
    for (idx, unit) in units.iter_mut().enumerate() {
        unit.id = format!("unit:{}", idx + 1);
    }
    units
}

impl Analyzer for SemanticAnalyzer {
    fn id(&self) -> &'static str {
        "semantic"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["language"]
    }

    fn discover_patterns(&mut self, ctx: &mut SharedAnalysisContext) -> Result<()> {
        let concepts = extract_concepts(ctx.understanding.nodes.values(), &ctx.options.thresholds);
        debug!("{} concepts", concepts.len());
        ctx.understanding.concepts = concepts;
        Ok(())
    }

    fn integrate_analysis(&mut self, ctx: &mut SharedAnalysisContext) -> Result<()> {
        let units = build_units(
            &ctx.understanding.concepts,
            &ctx.understanding.nodes,
            &ctx.options.thresholds,
        );
        debug!("{} semantic units", units.len());
        ctx.understanding.semantic_units = units;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeFacts, NodeKind, Span, node_id};

    fn node(name: &str, kind: NodeKind, line: usize) -> CodeNode {
        CodeNode {
            id: node_id("src/a.ts", name, line),
            name: name.to_string(),
            qualified_name: name.to_string(),
            kind,
            path: "src/a.ts".to_string(),
            span: Span { start_line: line, end_line: line },
            content_hash: String::new(),
            parent: None,
            children: Vec::new(),
            confidence: 0.9,
            signature: String::new(),
            language: "typescript".to_string(),
            facts: NodeFacts::default(),
        }
    }

    fn nodes(specs: &[(&str, NodeKind)]) -> BTreeMap<String, CodeNode> {
        specs
            .iter()
            .enumerate()
            .map(|(i, (name, kind))| {
                let n = node(name, *kind, i + 1);
                (n.id.clone(), n)
            })
            .collect()
    }

    #[test]
    fn test_concept_words_drop_stop_words() {
        let words: Vec<String> = concept_words("getPaymentServiceId").into_iter().collect();
        assert_eq!(words, vec!["payment"]);
    }

    #[test]
    fn test_concept_promotion_boundary() {
        // 10 nodes: threshold is ceil(max(3, 0.5)) = 3.
        let mut specs = vec![
            ("chargePayment", NodeKind::Function),
            ("refundPayment", NodeKind::Function),
            ("PaymentGateway", NodeKind::Class),
            ("loadInvoice", NodeKind::Function),
            ("InvoiceRecord", NodeKind::Class),
        ];
        specs.extend(
            ["alpha", "bravo", "charlie", "delta", "echo"]
                .iter()
                .map(|n| (*n, NodeKind::Function)),
        );
        let map = nodes(&specs);
        let concepts = extract_concepts(map.values(), &Thresholds::default());
        let names: Vec<&str> = concepts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["payment"]);
        assert!((concepts[0].importance - 0.3).abs() < 1e-9);
        assert!((concepts[0].confidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_related_concepts_are_bidirectional() {
        let map = nodes(&[
            ("PaymentOrder", NodeKind::Class),
            ("savePaymentOrder", NodeKind::Function),
            ("loadPaymentOrder", NodeKind::Function),
        ]);
        let concepts = extract_concepts(map.values(), &Thresholds::default());
        let order = concepts.iter().find(|c| c.name == "order").unwrap();
        let payment = concepts.iter().find(|c| c.name == "payment").unwrap();
        assert_eq!(order.related, vec!["concept:payment"]);
        assert_eq!(payment.related, vec!["concept:order"]);
    }

    #[test]
    fn test_units_merge_and_classify() {
        let map = nodes(&[
            ("chargePayment", NodeKind::Function),
            ("refundPayment", NodeKind::Function),
            ("payPaymentInvoice", NodeKind::Function),
            ("sendPaymentInvoice", NodeKind::Function),
            ("voidPaymentInvoice", NodeKind::Function),
            ("UserAccount", NodeKind::Class),
            ("AdminAccount", NodeKind::Class),
            ("GuestAccount", NodeKind::Class),
        ]);
        let thresholds = Thresholds::default();
        let concepts = extract_concepts(map.values(), &thresholds);
        let units = build_units(&concepts, &map, &thresholds);

        assert_eq!(units.len(), 2);
        let payment = &units[0];
        assert_eq!(payment.id, "unit:1");
        assert_eq!(payment.name, "PaymentModule");
        assert_eq!(payment.kind, UnitKind::Behavior);
        assert_eq!(payment.node_ids.len(), 5);
        assert_eq!(payment.dominant_concepts, vec!["payment", "invoice"]);
        assert_eq!(payment.properties.concept_count, 2);
        assert!((payment.properties.cohesion - 1.0).abs() < 1e-9);

        let account = &units[1];
        assert_eq!(account.name, "AccountModule");
        assert_eq!(account.kind, UnitKind::DomainModel);
        assert!((account.properties.coverage - 3.0 / 8.0).abs() < 1e-9);
    }
}
