//! Clustering of code nodes by combined similarity.
//!
//! Pairwise similarity is the mean of the selected metric scores, each in
//! `[0, 1]`. Three algorithms run over the resulting matrix: average-linkage
//! agglomeration, DBSCAN and deterministic k-medoids.
use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::analyzer::naming::{casing_style, register_casing_styles, split_words};
use crate::analyzer::pattern::STRUCTURAL_SUFFIXES;
use crate::analyzer::relationship::EXTRA_SUFFIXES;
use crate::config::{ClusterAlgorithm, ClusterOptions, SimilarityMetric};
use crate::context::{DefinitionCategory, PatternRegistry};
use crate::error::Result;
use crate::model::{CodeCluster, CodeNode, CodebaseUnderstanding};

const DBSCAN_MIN_POINTS: usize = 2;
const KMEDOIDS_MAX_ROUNDS: usize = 20;

/// Per-node inputs to the similarity metrics.
struct Features<'a> {
    node: &'a CodeNode,
    naming: Option<String>,
    neighbours: BTreeSet<String>,
    concepts: BTreeSet<&'a str>,
    tokens: BTreeSet<String>,
}

fn naming_registry() -> Result<PatternRegistry> {
    let mut registry = PatternRegistry::new();
    register_casing_styles(&mut registry)?;
    for suffix in STRUCTURAL_SUFFIXES.iter().chain(EXTRA_SUFFIXES) {
        registry.register(
            &format!("suffix:{suffix}"),
            DefinitionCategory::StructuralSuffix,
            &format!("(?i){suffix}$"),
            &format!("*{suffix} types"),
        )?;
    }
    Ok(registry)
}

fn naming_key(registry: &PatternRegistry, name: &str) -> Option<String> {
    if let Some(def) = registry.first_match(DefinitionCategory::StructuralSuffix, name) {
        return Some(def.name.clone());
    }
    casing_style(registry, name).map(|style| format!("naming:{style}"))
}

fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Pairwise similarity of the selected nodes.
struct SimilarityMatrix {
    size: usize,
    values: Vec<f64>,
}

impl SimilarityMatrix {
    fn build(features: &[Features<'_>], metrics: &[SimilarityMetric]) -> Self {
        let size = features.len();
        let mut values = vec![0.0; size * size];
        for i in 0..size {
            values[i * size + i] = 1.0;
            for j in i + 1..size {
                let score = similarity(&features[i], &features[j], metrics);
                values[i * size + j] = score;
                values[j * size + i] = score;
            }
        }
        Self { size, values }
    }

    fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size + j]
    }

    fn mean_within(&self, members: &[usize]) -> f64 {
        let mut total = 0.0;
        let mut pairs = 0usize;
        for (k, &a) in members.iter().enumerate() {
            for &b in &members[k + 1..] {
                total += self.get(a, b);
                pairs += 1;
            }
        }
        if pairs == 0 { 0.0 } else { total / pairs as f64 }
    }
}

fn similarity(a: &Features<'_>, b: &Features<'_>, metrics: &[SimilarityMetric]) -> f64 {
    if metrics.is_empty() {
        return 0.0;
    }
    let total: f64 = metrics
        .iter()
        .map(|metric| match metric {
            SimilarityMetric::NamingPattern => match (&a.naming, &b.naming) {
                (Some(x), Some(y)) if x == y => 1.0,
                _ => 0.0,
            },
            SimilarityMetric::StructuralSimilarity => {
                if a.node.kind == b.node.kind { 1.0 } else { 0.0 }
            }
            SimilarityMetric::RelationshipGraph => {
                if a.neighbours.contains(&b.node.id) {
                    1.0
                } else {
                    jaccard(&a.neighbours, &b.neighbours)
                }
            }
            SimilarityMetric::SemanticSimilarity => jaccard(&a.concepts, &b.concepts),
            SimilarityMetric::ContentSimilarity => jaccard(&a.tokens, &b.tokens),
        })
        .sum();
    total / metrics.len() as f64
}

/// Selects at most `max_nodes` nodes, most connected first, and gathers
/// their features in id order.
fn collect_features<'a>(
    understanding: &'a CodebaseUnderstanding,
    options: &ClusterOptions,
    registry: Option<&PatternRegistry>,
) -> Vec<Features<'a>> {
    let mut neighbours: HashMap<&str, BTreeSet<String>> = HashMap::new();
    for rel in &understanding.relationships {
        let Some(target) = rel.target.resolved_id() else {
            continue;
        };
        neighbours
            .entry(rel.source.as_str())
            .or_default()
            .insert(target.to_string());
        neighbours
            .entry(target)
            .or_default()
            .insert(rel.source.clone());
    }

    let mut selected: Vec<&CodeNode> = understanding.nodes.values().collect();
    if selected.len() > options.max_nodes {
        selected.sort_by(|a, b| {
            let da = neighbours.get(a.id.as_str()).map_or(0, BTreeSet::len);
            let db = neighbours.get(b.id.as_str()).map_or(0, BTreeSet::len);
            db.cmp(&da).then(a.id.cmp(&b.id))
        });
        debug!(
            "clustering the {} most connected of {} nodes",
            options.max_nodes,
            selected.len()
        );
        selected.truncate(options.max_nodes);
        selected.sort_by(|a, b| a.id.cmp(&b.id));
    }

    let mut concepts_by_node: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for concept in &understanding.concepts {
        for id in &concept.node_ids {
            concepts_by_node
                .entry(id.as_str())
                .or_default()
                .insert(concept.name.as_str());
        }
    }

    selected
        .into_iter()
        .map(|node| {
            let mut tokens: BTreeSet<String> = split_words(&node.name).into_iter().collect();
            tokens.extend(split_words(&node.signature));
            Features {
                node,
                naming: registry.and_then(|r| naming_key(r, &node.name)),
                neighbours: neighbours.remove(node.id.as_str()).unwrap_or_default(),
                concepts: concepts_by_node.remove(node.id.as_str()).unwrap_or_default(),
                tokens,
            }
        })
        .collect()
}

/// Folds cluster `b` into cluster `a` (or the reverse) and refreshes the
/// average linkage. Returns (kept, absorbed).
fn merge_clusters(
    members: &mut [Option<Vec<usize>>],
    linkage: &mut [Vec<f64>],
    a: usize,
    b: usize,
) -> (usize, usize) {
    let (keep, gone) = (a.min(b), a.max(b));
    let absorbed = members[gone].take().unwrap_or_default();
    let size_keep = members[keep].as_ref().map_or(0, Vec::len) as f64;
    let size_gone = absorbed.len() as f64;
    if let Some(kept) = members[keep].as_mut() {
        kept.extend(absorbed);
    }
    for k in 0..members.len() {
        if k == keep || members[k].is_none() {
            continue;
        }
        let merged =
            (size_keep * linkage[keep][k] + size_gone * linkage[gone][k]) / (size_keep + size_gone);
        linkage[keep][k] = merged;
        linkage[k][keep] = merged;
    }
    (keep, gone)
}

/// Average-linkage agglomeration while the best pair reaches `threshold`,
/// then on down until at most `max_clusters` multi-member clusters remain.
fn hierarchical(matrix: &SimilarityMatrix, threshold: f64, max_clusters: usize) -> Vec<Vec<usize>> {
    let n = matrix.size;
    let mut members: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();
    let mut linkage: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| matrix.get(i, j)).collect())
        .collect();

    // Best partner per active cluster.
    let best_of = |i: usize, linkage: &[Vec<f64>], members: &[Option<Vec<usize>>]| {
        let mut best: Option<(f64, usize)> = None;
        for j in 0..n {
            if j == i || members[j].is_none() {
                continue;
            }
            if best.is_none_or(|(s, _)| linkage[i][j] > s) {
                best = Some((linkage[i][j], j));
            }
        }
        best
    };
    let mut best: Vec<Option<(f64, usize)>> =
        (0..n).map(|i| best_of(i, &linkage, &members)).collect();

    loop {
        let mut pick: Option<(f64, usize, usize)> = None;
        for (i, entry) in best.iter().enumerate() {
            if members[i].is_none() {
                continue;
            }
            if let Some((score, j)) = *entry {
                if pick.is_none_or(|(s, _, _)| score > s) {
                    pick = Some((score, i, j));
                }
            }
        }
        let Some((score, a, b)) = pick else { break };
        if score < threshold {
            break;
        }

        let (keep, gone) = merge_clusters(&mut members, &mut linkage, a, b);
        best[gone] = None;
        for k in 0..n {
            if members[k].is_none() {
                continue;
            }
            let stale = k == keep || best[k].is_some_and(|(_, j)| j == keep || j == gone);
            if stale {
                best[k] = best_of(k, &linkage, &members);
            } else if best[k].is_none_or(|(s, _)| linkage[k][keep] > s) {
                best[k] = Some((linkage[k][keep], keep));
            }
        }
    }

    // Too many groups: keep joining the closest pair of multi-member
    // clusters so no member is lost to truncation.
    loop {
        let multi: Vec<usize> = (0..n)
            .filter(|&i| members[i].as_ref().is_some_and(|m| m.len() >= 2))
            .collect();
        if multi.len() <= max_clusters {
            break;
        }
        let mut pick: Option<(f64, usize, usize)> = None;
        for (x, &i) in multi.iter().enumerate() {
            for &j in &multi[x + 1..] {
                if pick.is_none_or(|(s, _, _)| linkage[i][j] > s) {
                    pick = Some((linkage[i][j], i, j));
                }
            }
        }
        let Some((_, a, b)) = pick else { break };
        merge_clusters(&mut members, &mut linkage, a, b);
    }

    members.into_iter().flatten().collect()
}

/// DBSCAN with `eps` as a similarity floor.
fn dbscan(matrix: &SimilarityMatrix, eps: f64, min_points: usize) -> Vec<Vec<usize>> {
    let n = matrix.size;
    let neighbourhood = |i: usize| -> Vec<usize> {
        (0..n)
            .filter(|&j| j != i && matrix.get(i, j) >= eps)
            .collect()
    };

    let mut label: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let seeds = neighbourhood(i);
        if seeds.len() + 1 < min_points {
            continue;
        }
        let cluster = clusters.len();
        clusters.push(vec![i]);
        label[i] = Some(cluster);

        let mut queue = seeds;
        while let Some(j) = queue.pop() {
            if label[j].is_none() {
                label[j] = Some(cluster);
                clusters[cluster].push(j);
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;
            let reach = neighbourhood(j);
            if reach.len() + 1 >= min_points {
                queue.extend(reach.into_iter().filter(|&k| label[k].is_none()));
            }
        }
    }
    clusters
}

/// Deterministic k-medoids. Seeding is farthest-first and stops early once the
/// farthest remaining node is already within `threshold` of a medoid.
fn kmedoids(matrix: &SimilarityMatrix, k: usize, threshold: f64) -> Vec<Vec<usize>> {
    let n = matrix.size;
    if n == 0 || k == 0 {
        return Vec::new();
    }

    let centrality = |i: usize| (0..n).map(|j| matrix.get(i, j)).sum::<f64>();
    let mut first = 0;
    for i in 1..n {
        if centrality(i) > centrality(first) {
            first = i;
        }
    }
    let mut medoids = vec![first];
    while medoids.len() < k {
        let closeness = |i: usize| {
            medoids
                .iter()
                .map(|&m| matrix.get(i, m))
                .fold(f64::MIN, f64::max)
        };
        let mut farthest: Option<(f64, usize)> = None;
        for i in (0..n).filter(|i| !medoids.contains(i)) {
            let c = closeness(i);
            if farthest.is_none_or(|(fc, _)| c < fc) {
                farthest = Some((c, i));
            }
        }
        match farthest {
            Some((c, i)) if c < threshold => medoids.push(i),
            _ => break,
        }
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    for _ in 0..KMEDOIDS_MAX_ROUNDS {
        groups = medoids.iter().map(|&m| vec![m]).collect();
        for i in (0..n).filter(|i| !medoids.contains(i)) {
            let mut best: Option<(f64, usize)> = None;
            for (g, &m) in medoids.iter().enumerate() {
                let s = matrix.get(i, m);
                if s >= threshold && best.is_none_or(|(bs, _)| s > bs) {
                    best = Some((s, g));
                }
            }
            if let Some((_, g)) = best {
                groups[g].push(i);
            }
        }

        let mut changed = false;
        for (g, group) in groups.iter().enumerate() {
            let cost = |c: usize| group.iter().map(|&m| matrix.get(c, m)).sum::<f64>();
            let mut best = medoids[g];
            for &candidate in group {
                if cost(candidate) > cost(best) {
                    best = candidate;
                }
            }
            if best != medoids[g] {
                medoids[g] = best;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    groups
}

fn summarize(
    id: usize,
    members: &[usize],
    features: &[Features<'_>],
    matrix: &SimilarityMatrix,
) -> CodeCluster {
    let mut kinds: BTreeMap<&str, usize> = BTreeMap::new();
    let mut naming: BTreeSet<String> = BTreeSet::new();
    for &m in members {
        *kinds.entry(features[m].node.kind.as_str()).or_default() += 1;
        if let Some(key) = &features[m].naming {
            naming.insert(key.clone());
        }
    }
    let dominant_type = kinds
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(kind, _)| kind.to_string())
        .unwrap_or_default();

    let mut node_ids: Vec<String> = members.iter().map(|&m| features[m].node.id.clone()).collect();
    node_ids.sort();
    CodeCluster {
        id: format!("cluster:{id}"),
        node_ids,
        dominant_type,
        naming_patterns: naming.into_iter().collect(),
        confidence: matrix.mean_within(members),
    }
}

/// Groups the code nodes of `understanding` into clusters.
pub fn cluster(understanding: &CodebaseUnderstanding, options: &ClusterOptions) -> Vec<CodeCluster> {
    let registry = match naming_registry() {
        Ok(r) => Some(r),
        Err(e) => {
            warn!("Naming metric disabled: {e}");
            None
        }
    };
    let features = collect_features(understanding, options, registry.as_ref());
    if features.len() < 2 {
        return Vec::new();
    }
    let matrix = SimilarityMatrix::build(&features, &options.metrics);

    let mut groups = match options.algorithm {
        ClusterAlgorithm::Hierarchical => {
            hierarchical(&matrix, options.min_similarity, options.max_clusters)
        }
        ClusterAlgorithm::Dbscan => dbscan(&matrix, options.min_similarity, DBSCAN_MIN_POINTS),
        ClusterAlgorithm::Kmeans => kmedoids(
            &matrix,
            options.max_clusters.min(features.len()),
            options.min_similarity,
        ),
    };
    groups.retain(|g| g.len() >= 2);
    for group in &mut groups {
        group.sort_unstable();
    }
    // Members index an id-sorted node list, so the first member is the
    // smallest id.
    groups.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));
    groups.truncate(options.max_clusters);

    let clusters: Vec<CodeCluster> = groups
        .iter()
        .enumerate()
        .map(|(idx, members)| summarize(idx + 1, members, &features, &matrix))
        .collect();
    debug!(
        "{} clusters over {} nodes ({:?})",
        clusters.len(),
        features.len(),
        options.algorithm
    );
    clusters
}
