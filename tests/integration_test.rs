/// End-to-end tests for the analysis pipeline.
///
/// Every test builds a small source tree in a temp dir and drives the public
/// API: analyze → inspect → save/load → update.
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use codelens::describe::describe_understanding;
use codelens::embedder::{MockEmbedder, embed_descriptions};
use codelens::model::{Evidence, RelationshipKind};
use codelens::{AnalysisOptions, CodebaseUnderstanding};
use tempfile::tempdir;

fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

fn analyze(root: &Path) -> CodebaseUnderstanding {
    codelens::analyze(root, &AnalysisOptions::default()).unwrap().0
}

/// Six `*Service.ts` files among ten.
fn service_tree(root: &Path) {
    for name in ["User", "Order", "Payment", "Auth", "Cart", "Mail"] {
        write(
            root,
            &format!("src/{name}Service.ts"),
            "export function handle() {}\n",
        );
    }
    for (file, func) in [("app", "start"), ("config", "load"), ("router", "route"), ("index", "main")] {
        write(root, &format!("src/{file}.ts"), &format!("export function {func}() {{}}\n"));
    }
}

#[test]
fn test_service_suffix_pattern_and_naming_boundary() {
    let dir = tempdir().unwrap();
    service_tree(dir.path());
    let u = analyze(dir.path());

    let suffix: Vec<_> = u
        .patterns
        .iter()
        .filter(|p| p.name == "*Service* suffix convention")
        .collect();
    assert_eq!(suffix.len(), 1, "patterns: {:?}", u.patterns.iter().map(|p| &p.name).collect::<Vec<_>>());
    assert_eq!(suffix[0].frequency, 6);

    // 6 PascalCase stems out of 20 identifiers is exactly 0.30.
    assert!(!u.patterns.iter().any(|p| p.name == "PascalCase naming convention"));
    assert!(u.patterns.iter().any(|p| p.name == "camelCase naming convention"));

    // Sorted by frequency, then confidence.
    for pair in u.patterns.windows(2) {
        assert!(
            pair[0].frequency > pair[1].frequency
                || (pair[0].frequency == pair[1].frequency
                    && pair[0].confidence >= pair[1].confidence)
        );
    }
}

#[test]
fn test_service_classes_named_after_their_files() {
    let dir = tempdir().unwrap();
    for name in ["User", "Order", "Payment", "Auth", "Cart", "Mail"] {
        write(
            dir.path(),
            &format!("src/{name}Service.ts"),
            &format!("export class {name}Service {{}}\n"),
        );
    }
    for (file, func) in [("app", "start"), ("config", "load"), ("router", "route"), ("index", "main")] {
        write(dir.path(), &format!("src/{file}.ts"), &format!("export function {func}() {{}}\n"));
    }
    let u = analyze(dir.path());
    let pattern = |name: &str| u.patterns.iter().find(|p| p.name == name);

    // Each file stem names the class it declares: one identifier per file.
    let suffix = pattern("*Service* suffix convention").expect("suffix pattern");
    assert_eq!(suffix.frequency, 6);
    assert!(
        suffix
            .instances
            .iter()
            .all(|i| i.node_id.starts_with("node:src/") && i.node_id.contains("Service@1"))
    );

    // 6 classes, 4 functions and 4 lowercase stems: 14 identifiers.
    let pascal = pattern("PascalCase naming convention").expect("PascalCase pattern");
    assert_eq!(pascal.frequency, 6);
    assert!((pascal.confidence - 6.0 / 14.0).abs() < 1e-9);
    let camel = pattern("camelCase naming convention").expect("camelCase pattern");
    assert_eq!(camel.frequency, 8);
    assert!((camel.confidence - 8.0 / 14.0).abs() < 1e-9);
}

#[test]
fn test_large_directory_keeps_similarity_edges() {
    let dir = tempdir().unwrap();
    for i in 0..65 {
        write(
            dir.path(),
            &format!("src/components/widget{i}.ts"),
            &format!("export function render{i}() {{}}\n"),
        );
    }
    let u = analyze(dir.path());
    let shared: Vec<_> = u
        .relationships_of_kind(RelationshipKind::SimilarTo)
        .filter(|r| matches!(&r.evidence, Evidence::SharedDirectory { .. }))
        .collect();
    assert_eq!(shared.len(), 65 * 64 / 2);
    for edge in &shared {
        assert!((edge.weight - 0.7).abs() < 1e-9);
        assert!((edge.confidence - 0.6).abs() < 1e-9);
    }

    let mut options = AnalysisOptions::default();
    options.thresholds.max_similarity_group = Some(64);
    let (capped, _) = codelens::analyze(dir.path(), &options).unwrap();
    assert!(
        !capped
            .relationships_of_kind(RelationshipKind::SimilarTo)
            .any(|r| matches!(&r.evidence, Evidence::SharedDirectory { .. }))
    );
}

#[test]
fn test_descriptions_embed_in_order() {
    let dir = tempdir().unwrap();
    write(dir.path(), "src/app.ts", "import { fmt } from './util';\nexport function start() {\n  fmt();\n}\n");
    write(dir.path(), "src/util.ts", "export function fmt() {}\n");
    let u = analyze(dir.path());

    let descriptions = describe_understanding(&u);
    assert!(descriptions.iter().any(|d| d.id == "node:src/app.ts#start@2"));
    assert!(descriptions.iter().any(|d| d.text.contains("imports")));

    let embeddings = embed_descriptions(&MockEmbedder::new(32), &descriptions, 20, 2).unwrap();
    assert_eq!(embeddings.len(), descriptions.len());
    for (description, embedding) in descriptions.iter().zip(&embeddings) {
        assert_eq!(description.id, embedding.id);
        assert_eq!(embedding.vector.len(), 32);
    }
}

#[test]
fn test_exclusion_globs_leave_nothing_behind() {
    let dir = tempdir().unwrap();
    write(dir.path(), "src/app.ts", "export function start() {}\n");
    write(dir.path(), "generated/api.ts", "export function generatedCall() {}\n");

    let mut options = AnalysisOptions::default();
    options.exclude_patterns.push("**/generated/**".to_string());
    let (u, _) = codelens::analyze(dir.path(), &options).unwrap();

    assert!(u.tree.file("generated/api.ts").is_none());
    assert!(u.tree.directory("generated").is_none());
    assert!(u.nodes.values().all(|n| !n.path.starts_with("generated/")));
    assert!(
        u.relationships
            .iter()
            .all(|r| !r.source.contains("generated") && !r.target_id().contains("generated"))
    );
    assert!(u.tree.file("src/app.ts").is_some());
}

#[test]
fn test_containment_is_a_forest() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "src/api/user.ts",
        "export class UserApi {\n  load(id: string) {\n    return id;\n  }\n}\n",
    );
    write(dir.path(), "src/main.py", "def run():\n    pass\n");
    write(dir.path(), "README.md", "# readme\n");
    let u = analyze(dir.path());

    let mut parent: BTreeMap<String, String> = BTreeMap::new();
    for rel in u.relationships_of_kind(RelationshipKind::Contains) {
        let previous = parent.insert(rel.target_id(), rel.source.clone());
        assert!(previous.is_none(), "{} has two parents", rel.target_id());
    }
    assert!(!parent.contains_key("dir:."));

    for file in u.tree.files() {
        assert!(parent.contains_key(&file.id), "{} is not contained", file.id);
    }
    for id in u.nodes.keys() {
        assert!(parent.contains_key(id), "{id} is not contained");
    }
    // Every chain climbs to the root without revisiting anything.
    for start in parent.keys() {
        let mut seen = BTreeSet::new();
        let mut current = start.clone();
        while let Some(up) = parent.get(&current) {
            assert!(seen.insert(current.clone()), "cycle through {current}");
            current = up.clone();
        }
        assert_eq!(current, "dir:.");
    }

    let method = u.node("node:src/api/user.ts#UserApi.load@2").unwrap();
    assert_eq!(parent[&method.id], "node:src/api/user.ts#UserApi@1");
}

#[test]
fn test_similar_controllers() {
    let dir = tempdir().unwrap();
    write(dir.path(), "src/UserController.ts", "export class UserController {}\n");
    write(dir.path(), "lib/OrderController.ts", "export class OrderController {}\n");
    let u = analyze(dir.path());

    let edge = u
        .relationships_of_kind(RelationshipKind::SimilarTo)
        .find(|r| matches!(&r.evidence, Evidence::NamingPattern { .. }))
        .expect("naming similarity edge");
    assert_eq!(edge.source, "file:lib/OrderController.ts");
    assert_eq!(edge.target_id(), "file:src/UserController.ts");
    assert!((edge.weight - 0.8).abs() < 1e-9);
    assert!((edge.confidence - 0.7).abs() < 1e-9);
}

#[test]
fn test_relative_import_resolution() {
    let dir = tempdir().unwrap();
    write(dir.path(), "src/app.ts", "import { fmt } from './util';\nfmt();\n");
    write(dir.path(), "src/util.ts", "export function fmt() {}\n");
    let u = analyze(dir.path());

    let imports: Vec<_> = u
        .relationships_of_kind(RelationshipKind::Imports)
        .filter(|r| r.source == "file:src/app.ts")
        .collect();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].target_id(), "file:src/util.ts");
    assert!((imports[0].confidence - 0.7).abs() < 1e-9);
    assert!(!imports[0].ambiguous);

    // A sibling `util/index.ts` makes the same specifier ambiguous.
    write(dir.path(), "src/util/index.ts", "export function fmt() {}\n");
    let u = analyze(dir.path());
    let mut targets: Vec<(String, f64, bool)> = u
        .relationships_of_kind(RelationshipKind::Imports)
        .filter(|r| r.source == "file:src/app.ts")
        .map(|r| (r.target_id(), r.confidence, r.ambiguous))
        .collect();
    targets.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0].0, "file:src/util.ts");
    assert_eq!(targets[1].0, "file:src/util/index.ts");
    for (_, confidence, ambiguous) in &targets {
        assert!((confidence - 0.63).abs() < 1e-9);
        assert!(*ambiguous);
    }
}

#[test]
fn test_save_load_round_trip() {
    let dir = tempdir().unwrap();
    service_tree(dir.path());
    let u = analyze(dir.path());

    let store = dir.path().join(".codelens/understanding.json");
    codelens::save(&u, &store).unwrap();
    let loaded = codelens::load(&store).unwrap();

    assert_eq!(loaded.id, u.id);
    assert_eq!(loaded.tree.file_count(), u.tree.file_count());
    assert_eq!(
        loaded.nodes.keys().collect::<Vec<_>>(),
        u.nodes.keys().collect::<Vec<_>>()
    );
    assert_eq!(loaded.relationships, u.relationships);
    assert_eq!(loaded.patterns, u.patterns);
    assert_eq!(loaded.concepts, u.concepts);
    assert_eq!(loaded.clusters, u.clusters);
    assert_eq!(loaded.data_flow, u.data_flow);
    assert_eq!(loaded.languages, u.languages);
}

#[test]
fn test_analysis_is_idempotent() {
    let dir = tempdir().unwrap();
    service_tree(dir.path());
    write(dir.path(), "src/util.ts", "export function fmt() {}\n");
    let a = analyze(dir.path());
    let b = analyze(dir.path());

    assert_eq!(a.nodes, b.nodes);
    assert_eq!(a.relationships, b.relationships);
    assert_eq!(a.patterns, b.patterns);
    assert_eq!(a.concepts, b.concepts);
    assert_eq!(a.semantic_units, b.semantic_units);
    assert_eq!(a.clusters, b.clusters);
    assert_eq!(a.data_flow, b.data_flow);
    assert_eq!(a.languages, b.languages);
}

#[test]
fn test_incremental_update_preserves_unrelated_files() {
    let dir = tempdir().unwrap();
    write(dir.path(), "src/a.ts", "export function alpha() {}\n");
    write(dir.path(), "src/b.ts", "import { alpha } from './a';\nexport function beta() {\n  alpha();\n}\n");
    let options = AnalysisOptions::default();
    let (first, _) = codelens::analyze(dir.path(), &options).unwrap();

    write(dir.path(), "src/a.ts", "export function alpha() {}\nexport function gamma() {}\n");
    let (second, stats) = codelens::update(dir.path(), first.clone(), &options).unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(stats.files_reused, 1);

    let (old_b, new_b) = (first.tree.file("src/b.ts").unwrap(), second.tree.file("src/b.ts").unwrap());
    assert_eq!(old_b.content_hash, new_b.content_hash);
    assert_eq!(
        first.nodes_in_file("src/b.ts").map(|n| &n.id).collect::<Vec<_>>(),
        second.nodes_in_file("src/b.ts").map(|n| &n.id).collect::<Vec<_>>()
    );
    assert_ne!(
        first.tree.file("src/a.ts").unwrap().content_hash,
        second.tree.file("src/a.ts").unwrap().content_hash
    );
    assert!(second.node("node:src/a.ts#gamma@2").is_some());

    // The unchanged importer still resolves against the re-analyzed file.
    assert!(
        second
            .relationships_of_kind(RelationshipKind::Imports)
            .any(|r| r.source == "file:src/b.ts" && r.target_id() == "file:src/a.ts")
    );
    assert!(
        second
            .relationships_of_kind(RelationshipKind::Calls)
            .any(|r| r.source == "node:src/b.ts#beta@2" && r.target_id() == "node:src/a.ts#alpha@1")
    );

    // An update of an unchanged tree matches a fresh analysis.
    let (third, _) = codelens::update(dir.path(), second.clone(), &options).unwrap();
    let fresh = analyze(dir.path());
    assert_eq!(third.nodes, fresh.nodes);
    let ids = |u: &CodebaseUnderstanding| {
        u.relationships.iter().map(|r| r.id.clone()).collect::<BTreeSet<_>>()
    };
    assert_eq!(ids(&third), ids(&fresh));
}
