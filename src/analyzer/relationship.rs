use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::Analyzer;
use super::naming::casing_style;
use super::resolve::{FileIndex, Resolution, SymbolIndex, python_module_path};
use crate::context::{DefinitionCategory, SharedAnalysisContext};
use crate::error::Result;
use crate::extract::language_for_extension;
use crate::model::{
    Evidence, FileNode, NodeKind, Relationship, RelationshipKind, RelationshipTarget,
    directory_id, parent_dir,
};

const IMPORT_CONFIDENCE: f64 = 0.7;
const INHERITANCE_CONFIDENCE: f64 = 0.8;
const CALL_CONFIDENCE: f64 = 0.6;

const IMPORT_WEIGHT: f64 = 0.8;
const INHERITANCE_WEIGHT: f64 = 0.9;
const CALL_WEIGHT: f64 = 0.6;

const NAMING_WEIGHT: f64 = 0.8;
const NAMING_CONFIDENCE: f64 = 0.7;
const DIRECTORY_WEIGHT: f64 = 0.7;
const DIRECTORY_CONFIDENCE: f64 = 0.6;

/// Structural suffixes registered on top of the base set.
pub(crate) const EXTRA_SUFFIXES: &[&str] = &[
    "Repository", "Provider", "Handler", "Component", "Manager", "Store", "Model",
];

const TEST_FILE_SHAPE: &str = "shape:test-file";
const HOOK_SHAPE: &str = "shape:hook";

static ES_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:import|export)\s+(?:type\s+)?[^'";]*?\bfrom\s*['"]([^'"]+)['"]"#).unwrap()
});
static ES_SIDE_EFFECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*import\s+['"]([^'"]+)['"]"#).unwrap());
static ES_DYNAMIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bimport\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());
static REQUIRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\brequire\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());
static PY_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*from\s+(\.*[\w.]*)\s+import[ \t]+\(?[ \t]*([\w \t,*]+)").unwrap()
});
static PY_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*import\s+([\w.]+(?:\s+as\s+\w+)?(?:\s*,\s*[\w.]+(?:\s+as\s+\w+)?)*)")
        .unwrap()
});

static TYPE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)\b(class|interface|struct|record|protocol|object)\s+([A-Za-z_$][\w$]*)([^{\n]*)")
        .unwrap()
});
static EXTENDS_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bextends\s+(.+?)(?:\bimplements\b|\bwith\b|$)").unwrap());
static IMPLEMENTS_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bimplements\s+(.+?)(?:\bextends\b|$)").unwrap());
static PY_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*class\s+(\w+)\s*\(([^)]*)\)\s*:").unwrap());
static RUBY_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*class\s+(\w+)\s*<\s*([\w:]+)").unwrap());
static RUST_IMPL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*impl(?:<[^>]*>)?\s+([\w:]+)(?:<[^>]*>)?\s+for\s+([\w:]+)").unwrap()
});

/// An edge waiting for resolution.
#[derive(Debug, Clone)]
struct Candidate {
    /// `None` for colon base lists, where the target kind decides.
    kind: Option<RelationshipKind>,
    source: String,
    origin: String,
    /// Text as written in the source.
    reference: String,
    /// What is looked up: a path specifier for imports, a name otherwise.
    lookup: String,
}

impl Candidate {
    fn key(&self) -> (String, Option<RelationshipKind>, String) {
        (self.source.clone(), self.kind, self.reference.clone())
    }
}

/// Builds containment, import, inheritance, call and similarity edges.
#[derive(Default)]
pub struct RelationshipAnalyzer {
    imports: Vec<Candidate>,
    inheritance: Vec<Candidate>,
    calls: Vec<Candidate>,
    seen: HashSet<(String, Option<RelationshipKind>, String)>,
}

impl RelationshipAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&mut self, candidate: Candidate) {
        if !self.seen.insert(candidate.key()) {
            return;
        }
        match candidate.kind {
            Some(RelationshipKind::Imports) => self.imports.push(candidate),
            Some(RelationshipKind::Calls) => self.calls.push(candidate),
            _ => self.inheritance.push(candidate),
        }
    }

    fn queue_import(&mut self, file: &FileNode, reference: String, language: &str) {
        let lookup = import_lookup(&reference, language);
        self.queue(Candidate {
            kind: Some(RelationshipKind::Imports),
            source: file.id.clone(),
            origin: file.path.clone(),
            reference,
            lookup,
        });
    }

    fn collect_imports(&mut self, file: &FileNode, content: &str, language: &str) {
        match language {
            "typescript" | "javascript" => {
                for re in [&*ES_FROM, &*ES_SIDE_EFFECT, &*ES_DYNAMIC, &*REQUIRE] {
                    for caps in re.captures_iter(content) {
                        self.queue_import(file, caps[1].to_string(), language);
                    }
                }
            }
            "python" => {
                for caps in PY_FROM.captures_iter(content) {
                    let module = &caps[1];
                    if module.chars().all(|c| c == '.') {
                        // `from . import a, b` imports sibling modules.
                        for name in import_names(&caps[2]) {
                            self.queue_import(file, format!("{module}{name}"), language);
                        }
                    } else {
                        self.queue_import(file, module.to_string(), language);
                    }
                }
                for caps in PY_IMPORT.captures_iter(content) {
                    for module in caps[1].split(',') {
                        let module = module.split_whitespace().next().unwrap_or("");
                        if !module.is_empty() {
                            self.queue_import(file, module.to_string(), language);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn collect_inheritance(
        &mut self,
        file: &FileNode,
        content: &str,
        language: &str,
        ctx: &SharedAnalysisContext,
    ) {
        let mut found: Vec<(String, Option<RelationshipKind>, String)> = Vec::new();
        match language {
            "python" => {
                for caps in PY_CLASS.captures_iter(content) {
                    for base in caps[2].split(',').map(str::trim) {
                        if base.is_empty() || base.contains('=') || base == "object" {
                            continue;
                        }
                        found.push((caps[1].to_string(), Some(RelationshipKind::Extends), base.to_string()));
                    }
                }
            }
            "ruby" => {
                for caps in RUBY_CLASS.captures_iter(content) {
                    found.push((caps[1].to_string(), Some(RelationshipKind::Extends), caps[2].to_string()));
                }
            }
            "rust" => {
                for caps in RUST_IMPL.captures_iter(content) {
                    found.push((caps[2].to_string(), Some(RelationshipKind::Implements), caps[1].to_string()));
                }
            }
            _ => {
                for caps in TYPE_DECL.captures_iter(content) {
                    let keyword = &caps[1];
                    let name = caps[2].to_string();
                    for (kind, base) in heritage(keyword, &caps[3], language) {
                        found.push((name.clone(), kind, base));
                    }
                }
            }
        }

        for (name, kind, base) in found {
            let base = bare_type_name(&base);
            if base.is_empty() || base == name {
                continue;
            }
            let source = ctx
                .understanding
                .nodes_in_file(&file.path)
                .find(|n| n.name == name && !n.kind.is_callable())
                .map_or_else(|| file.id.clone(), |n| n.id.clone());
            self.queue(Candidate {
                kind,
                source,
                origin: file.path.clone(),
                reference: base.clone(),
                lookup: base,
            });
        }
    }

    fn collect_calls(&mut self, file: &FileNode, ctx: &SharedAnalysisContext) {
        let calls: Vec<(String, String)> = ctx
            .understanding
            .nodes_in_file(&file.path)
            .flat_map(|n| n.facts.calls.iter().map(|c| (n.id.clone(), c.name.clone())))
            .collect();
        for (source, name) in calls {
            self.queue(Candidate {
                kind: Some(RelationshipKind::Calls),
                source,
                origin: file.path.clone(),
                reference: name.clone(),
                lookup: name,
            });
        }
    }

    fn resolve_imports(&self, files: &FileIndex, discount: (f64, f64)) -> Vec<Relationship> {
        let mut out = Vec::new();
        for c in &self.imports {
            let evidence = Evidence::Import {
                specifier: c.reference.clone(),
            };
            let resolution = files.resolve_import(&c.lookup, parent_dir(&c.origin));
            let resolution = match resolution {
                Resolution::Unique(path) => Resolution::Unique(format!("file:{path}")),
                Resolution::Ambiguous(paths) => {
                    Resolution::Ambiguous(paths.into_iter().map(|p| format!("file:{p}")).collect())
                }
                Resolution::Unresolved => Resolution::Unresolved,
            };
            out.extend(edges(
                RelationshipKind::Imports,
                c,
                resolution,
                IMPORT_WEIGHT,
                IMPORT_CONFIDENCE,
                discount,
                true,
                &evidence,
            ));
        }
        out
    }

    fn resolve_inheritance(&self, symbols: &SymbolIndex, discount: (f64, f64)) -> Vec<Relationship> {
        let mut out = Vec::new();
        for c in &self.inheritance {
            let resolution = symbols.resolve_type(&c.lookup);
            let kind = c.kind.unwrap_or_else(|| match &resolution {
                Resolution::Unique(id) => match symbols.type_kind(id) {
                    Some(NodeKind::Interface | NodeKind::Trait) => RelationshipKind::Implements,
                    _ => RelationshipKind::Extends,
                },
                _ => RelationshipKind::Extends,
            });
            let evidence = Evidence::Inheritance {
                name: c.reference.clone(),
            };
            out.extend(edges(
                kind,
                c,
                resolution,
                INHERITANCE_WEIGHT,
                INHERITANCE_CONFIDENCE,
                discount,
                true,
                &evidence,
            ));
        }
        out
    }

    fn resolve_calls(
        &self,
        symbols: &SymbolIndex,
        discount: (f64, f64),
    ) -> (Vec<Relationship>, usize) {
        let mut out = Vec::new();
        let mut dropped = 0;
        for c in &self.calls {
            let resolution = symbols.resolve_call(&c.lookup, &c.origin);
            if resolution == Resolution::Unresolved {
                dropped += 1;
                continue;
            }
            let evidence = Evidence::Call {
                name: c.reference.clone(),
            };
            out.extend(edges(
                RelationshipKind::Calls,
                c,
                resolution,
                CALL_WEIGHT,
                CALL_CONFIDENCE,
                discount,
                false,
                &evidence,
            ));
        }
        (out, dropped)
    }
}

/// Edges for one resolved candidate. `discount` is (ambiguity, unresolved).
#[allow(clippy::too_many_arguments)]
fn edges(
    kind: RelationshipKind,
    candidate: &Candidate,
    resolution: Resolution,
    weight: f64,
    confidence: f64,
    (ambiguity, unresolved): (f64, f64),
    keep_unresolved: bool,
    evidence: &Evidence,
) -> Vec<Relationship> {
    let edge = |target: RelationshipTarget, confidence: f64| {
        Relationship::new(
            kind,
            candidate.source.clone(),
            target,
            weight,
            confidence,
            candidate.origin.clone(),
            evidence.clone(),
        )
    };
    match resolution {
        Resolution::Unique(id) => vec![edge(RelationshipTarget::Resolved(id), confidence)],
        Resolution::Ambiguous(ids) => {
            let ids: Vec<String> = ids.into_iter().filter(|id| *id != candidate.source).collect();
            let ambiguous = ids.len() > 1;
            let confidence = if ambiguous { confidence * ambiguity } else { confidence };
            ids.into_iter()
                .map(|id| {
                    edge(RelationshipTarget::Resolved(id), confidence).with_ambiguity(ambiguous)
                })
                .collect()
        }
        Resolution::Unresolved if keep_unresolved => vec![edge(
            RelationshipTarget::Unresolved(candidate.reference.clone()),
            confidence * unresolved,
        )],
        Resolution::Unresolved => Vec::new(),
    }
}

fn import_lookup(reference: &str, language: &str) -> String {
    if language == "python" && !reference.contains('/') {
        python_module_path(reference)
    } else {
        reference.to_string()
    }
}

fn import_names(list: &str) -> Vec<&str> {
    list.split(',')
        .filter_map(|part| part.split_whitespace().next())
        .filter(|name| *name != "*")
        .collect()
}

/// Base types named in the tail of a type declaration.
fn heritage(keyword: &str, tail: &str, language: &str) -> Vec<(Option<RelationshipKind>, String)> {
    let tail = strip_parens(tail);
    let mut out = Vec::new();
    if matches!(language, "kotlin" | "csharp" | "swift") {
        let list = tail
            .split_once(':')
            .map(|(_, rest)| rest.split(" where ").next().unwrap_or(rest))
            .unwrap_or("");
        for base in split_list(list) {
            out.push((None, base));
        }
        return out;
    }
    if let Some(caps) = EXTENDS_LIST.captures(&tail) {
        let bases = split_list(&caps[1]);
        // Only interfaces extend more than one parent.
        let take = if keyword == "interface" { bases.len() } else { 1 };
        for base in bases.into_iter().take(take) {
            out.push((Some(RelationshipKind::Extends), base));
        }
    }
    if let Some(caps) = IMPLEMENTS_LIST.captures(&tail) {
        for base in split_list(&caps[1]) {
            out.push((Some(RelationshipKind::Implements), base));
        }
    }
    out
}

/// Removes parenthesised groups (constructor parameters, call arguments).
fn strip_parens(text: &str) -> String {
    let mut depth = 0usize;
    text.chars()
        .filter(|c| match c {
            '(' => {
                depth += 1;
                false
            }
            ')' => {
                depth = depth.saturating_sub(1);
                false
            }
            _ => depth == 0,
        })
        .collect()
}

/// Splits a comma list at angle-bracket depth zero.
fn split_list(list: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in list.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|p| p.trim().trim_end_matches('{').trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// `ns.Base<T>` -> `Base`, `std::fmt::Display` -> `Display`.
fn bare_type_name(name: &str) -> String {
    let name = name.split('<').next().unwrap_or(name).trim();
    let name = name.rsplit(['.', ':']).next().unwrap_or(name);
    name.chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        .collect()
}

/// The grouping key of a file name: test-file shape, structural suffix, hook
/// shape, then casing style.
fn naming_key(ctx: &SharedAnalysisContext, stem: &str) -> Option<String> {
    let registry = &ctx.registry;
    if registry.get(TEST_FILE_SHAPE).is_some_and(|d| d.is_match(stem)) {
        return Some(TEST_FILE_SHAPE.to_string());
    }
    if let Some(def) = registry.first_match(DefinitionCategory::StructuralSuffix, stem) {
        return Some(def.name.clone());
    }
    if registry.get(HOOK_SHAPE).is_some_and(|d| d.is_match(stem)) {
        return Some(HOOK_SHAPE.to_string());
    }
    casing_style(registry, stem).map(|style| format!("naming:{style}"))
}

fn pairwise(
    group: &[String],
    weight: f64,
    confidence: f64,
    origin: impl Fn(&str) -> String,
    evidence: &Evidence,
) -> Vec<Relationship> {
    let mut out = Vec::new();
    for (i, a) in group.iter().enumerate() {
        for b in &group[i + 1..] {
            out.push(Relationship::new(
                RelationshipKind::SimilarTo,
                a.clone(),
                RelationshipTarget::Resolved(b.clone()),
                weight,
                confidence,
                origin(a),
                evidence.clone(),
            ));
        }
    }
    out
}

fn similarity_edges(ctx: &SharedAnalysisContext) -> Vec<Relationship> {
    let within_cap = |len: usize| {
        ctx.options
            .thresholds
            .max_similarity_group
            .is_none_or(|cap| len <= cap)
    };
    let mut by_name: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut by_dir: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();

    for file in ctx.understanding.tree.files() {
        if ctx.file_language(&file.path).is_none() {
            continue;
        }
        if let Some(key) = naming_key(ctx, file.stem()) {
            by_name.entry(key).or_default().push(file.id.clone());
        }
        if let Some(ext) = &file.extension {
            by_dir
                .entry((file.directory().to_string(), ext.clone()))
                .or_default()
                .push(file.id.clone());
        }
    }

    let origin = |id: &str| id.strip_prefix("file:").unwrap_or(id).to_string();
    let mut out = Vec::new();
    for (key, mut group) in by_name {
        if group.len() < 2 || !within_cap(group.len()) {
            continue;
        }
        group.sort();
        let evidence = Evidence::NamingPattern { key };
        out.extend(pairwise(&group, NAMING_WEIGHT, NAMING_CONFIDENCE, origin, &evidence));
    }
    for ((directory, extension), mut group) in by_dir {
        if group.len() < 2 || !within_cap(group.len()) {
            continue;
        }
        group.sort();
        let evidence = Evidence::SharedDirectory {
            directory,
            extension,
        };
        out.extend(pairwise(&group, DIRECTORY_WEIGHT, DIRECTORY_CONFIDENCE, origin, &evidence));
    }
    out
}

/// Containment edges for a file: its directory chain, the file itself and
/// every node it owns.
fn containment(file: &FileNode, ctx: &SharedAnalysisContext) -> Vec<Relationship> {
    let mut out = Vec::new();
    let dir = file.directory();
    let mut parent = directory_id("");
    let mut walked = String::new();
    for segment in dir.split('/').filter(|s| !s.is_empty()) {
        if !walked.is_empty() {
            walked.push('/');
        }
        walked.push_str(segment);
        let child = directory_id(&walked);
        out.push(Relationship::containment(&parent, &child, &file.path));
        parent = child;
    }
    out.push(Relationship::containment(&parent, &file.id, &file.path));

    for node in ctx.understanding.nodes_in_file(&file.path) {
        let source = node.parent.as_deref().unwrap_or(&file.id);
        out.push(Relationship::containment(source, &node.id, &file.path));
    }
    out
}

impl Analyzer for RelationshipAnalyzer {
    fn id(&self) -> &'static str {
        "relationship"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["language", "pattern"]
    }

    fn initialize(&mut self, ctx: &mut SharedAnalysisContext) -> Result<()> {
        for suffix in EXTRA_SUFFIXES {
            ctx.registry.register(
                &format!("suffix:{suffix}"),
                DefinitionCategory::StructuralSuffix,
                &format!("(?i){suffix}$"),
                &format!("*{suffix} types"),
            )?;
        }
        ctx.registry.register(
            "suffix:Util",
            DefinitionCategory::StructuralSuffix,
            "(?i)utils?$",
            "*Util helpers",
        )?;
        ctx.registry.register(
            TEST_FILE_SHAPE,
            DefinitionCategory::Shape,
            r"(?i:^test_|_test$|\.test$|\.spec$|_spec$)|^test[A-Z]|Tests?$",
            "test files",
        )?;
        ctx.registry.register(
            HOOK_SHAPE,
            DefinitionCategory::Shape,
            r"^use[A-Z]\w*$",
            "useX hooks",
        )?;
        Ok(())
    }

    fn analyze_file(
        &mut self,
        file: &FileNode,
        content: &str,
        ctx: &mut SharedAnalysisContext,
    ) -> Result<()> {
        let edges = containment(file, ctx);
        ctx.add_relationships(edges);

        let Some(language) = ctx.file_language(&file.path).map(str::to_string) else {
            return Ok(());
        };
        self.collect_imports(file, content, &language);
        self.collect_inheritance(file, content, &language, ctx);
        self.collect_calls(file, ctx);
        Ok(())
    }

    fn revisit_file(&mut self, file: &FileNode, ctx: &mut SharedAnalysisContext) -> Result<()> {
        let edges = containment(file, ctx);
        ctx.add_relationships(edges);

        let language = file
            .extension
            .as_deref()
            .and_then(language_for_extension)
            .unwrap_or("");
        for rel in ctx.take_carried(&file.path) {
            let Some(reference) = rel.evidence.reference().map(str::to_string) else {
                continue;
            };
            let lookup = match rel.kind {
                RelationshipKind::Imports => import_lookup(&reference, language),
                _ => reference.clone(),
            };
            self.queue(Candidate {
                kind: Some(rel.kind),
                source: rel.source,
                origin: rel.origin,
                reference,
                lookup,
            });
        }
        Ok(())
    }

    fn process_relationships(&mut self, ctx: &mut SharedAnalysisContext) -> Result<()> {
        let thresholds = &ctx.options.thresholds;
        let discount = (thresholds.ambiguity_discount, thresholds.unresolved_discount);
        let files = FileIndex::new(ctx.understanding.tree.files().into_iter().map(|f| f.path.clone()));
        let symbols = SymbolIndex::new(ctx.understanding.nodes.values());

        let mut resolved = self.resolve_imports(&files, discount);
        resolved.extend(self.resolve_inheritance(&symbols, discount));
        let (calls, dropped) = self.resolve_calls(&symbols, discount);
        resolved.extend(calls);
        if dropped > 0 {
            debug!("{dropped} calls did not resolve to a known function");
        }
        resolved.extend(similarity_edges(ctx));

        let added = ctx.add_relationships(resolved);
        debug!(
            "{added} relationships from {} import, {} inheritance and {} call candidates",
            self.imports.len(),
            self.inheritance.len(),
            self.calls.len()
        );
        Ok(())
    }

    fn cleanup(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{LanguageAnalyzer, PatternAnalyzer};
    use crate::config::AnalysisOptions;
    use crate::extract::SyntaxExtractor;
    use crate::model::CodebaseUnderstanding;
    use std::path::Path;

    fn analyze(files: &[(&str, &str)]) -> SharedAnalysisContext {
        analyze_with(files, AnalysisOptions::default())
    }

    fn analyze_with(files: &[(&str, &str)], options: AnalysisOptions) -> SharedAnalysisContext {
        let mut understanding = CodebaseUnderstanding::new(Path::new("/tmp/project"));
        let nodes: Vec<FileNode> = files
            .iter()
            .map(|(path, content)| FileNode::new(path, content.len() as u64, String::new()))
            .collect();
        for node in &nodes {
            understanding.tree.insert_file(node.clone());
        }
        let mut ctx = SharedAnalysisContext::new(understanding, options);
        let mut analyzers: Vec<Box<dyn Analyzer>> = vec![
            Box::new(LanguageAnalyzer::new(SyntaxExtractor::new().unwrap())),
            Box::new(PatternAnalyzer::new()),
            Box::new(RelationshipAnalyzer::new()),
        ];
        for analyzer in analyzers.iter_mut() {
            analyzer.initialize(&mut ctx).unwrap();
        }
        for (node, (_, content)) in nodes.iter().zip(files) {
            for analyzer in analyzers.iter_mut() {
                analyzer.analyze_file(node, content, &mut ctx).unwrap();
            }
        }
        for analyzer in analyzers.iter_mut() {
            analyzer.process_relationships(&mut ctx).unwrap();
        }
        ctx
    }

    fn find<'a>(ctx: &'a SharedAnalysisContext, kind: RelationshipKind, source: &str) -> Vec<&'a Relationship> {
        ctx.understanding
            .relationships_of_kind(kind)
            .filter(|r| r.source == source)
            .collect()
    }

    #[test]
    fn test_containment_chain() {
        let ctx = analyze(&[("src/api/user.ts", "export function load() {}\n")]);
        let ids: Vec<&str> = ctx
            .understanding
            .relationships_of_kind(RelationshipKind::Contains)
            .map(|r| r.id.as_str())
            .collect();
        assert!(ids.contains(&"contains|dir:.|dir:src|containment"));
        assert!(ids.contains(&"contains|dir:src|dir:src/api|containment"));
        assert!(ids.contains(&"contains|dir:src/api|file:src/api/user.ts|containment"));
        assert!(ids.contains(&"contains|file:src/api/user.ts|node:src/api/user.ts#load@1|containment"));
    }

    #[test]
    fn test_relative_import_unique() {
        let ctx = analyze(&[
            ("src/app.ts", "import { fmt } from './util';\n"),
            ("src/util.ts", "export function fmt() {}\n"),
        ]);
        let imports = find(&ctx, RelationshipKind::Imports, "file:src/app.ts");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].target, RelationshipTarget::Resolved("file:src/util.ts".to_string()));
        assert!((imports[0].confidence - 0.7).abs() < 1e-9);
        assert!(!imports[0].ambiguous);
    }

    #[test]
    fn test_ambiguous_import_is_discounted() {
        let ctx = analyze(&[
            ("src/app.ts", "const u = require('./util');\n"),
            ("src/util.ts", ""),
            ("src/util/index.ts", ""),
        ]);
        let imports = find(&ctx, RelationshipKind::Imports, "file:src/app.ts");
        assert_eq!(imports.len(), 2);
        for rel in imports {
            assert!(rel.ambiguous);
            assert!((rel.confidence - 0.63).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unresolved_import() {
        let ctx = analyze(&[("src/app.ts", "import React from 'react';\n")]);
        let imports = find(&ctx, RelationshipKind::Imports, "file:src/app.ts");
        assert_eq!(imports[0].target, RelationshipTarget::Unresolved("react".to_string()));
        assert!((imports[0].confidence - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_python_relative_imports() {
        let ctx = analyze(&[
            ("pkg/app.py", "from .models import User\nfrom . import views\n"),
            ("pkg/models.py", "class User:\n    pass\n"),
            ("pkg/views.py", ""),
        ]);
        let targets: Vec<String> = find(&ctx, RelationshipKind::Imports, "file:pkg/app.py")
            .iter()
            .map(|r| r.target_id())
            .collect();
        assert!(targets.contains(&"file:pkg/models.py".to_string()));
        assert!(targets.contains(&"file:pkg/views.py".to_string()));
    }

    #[test]
    fn test_inheritance_edges() {
        let ctx = analyze(&[
            (
                "src/repo.ts",
                "export interface Repo {}\nexport class Base {}\nexport class UserRepo extends Base implements Repo {}\n",
            ),
        ]);
        let source = "node:src/repo.ts#UserRepo@3";
        let extends = find(&ctx, RelationshipKind::Extends, source);
        assert_eq!(extends[0].target_id(), "node:src/repo.ts#Base@2");
        assert!((extends[0].confidence - 0.8).abs() < 1e-9);
        let implements = find(&ctx, RelationshipKind::Implements, source);
        assert_eq!(implements[0].target_id(), "node:src/repo.ts#Repo@1");
    }

    #[test]
    fn test_rust_impl_for() {
        let ctx = analyze(&[(
            "src/lib.rs",
            "pub trait Store {}\npub struct Memory;\nimpl Store for Memory {}\n",
        )]);
        let implements = find(&ctx, RelationshipKind::Implements, "node:src/lib.rs#Memory@2");
        assert_eq!(implements[0].target_id(), "node:src/lib.rs#Store@1");
    }

    #[test]
    fn test_calls_resolve_and_unknown_calls_drop() {
        let ctx = analyze(&[(
            "src/a.ts",
            "function helper() {}\nfunction run() {\n  helper();\n  console.log('x');\n}\n",
        )]);
        let calls = find(&ctx, RelationshipKind::Calls, "node:src/a.ts#run@2");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target_id(), "node:src/a.ts#helper@1");
        assert_eq!(calls[0].weight, 0.6);
    }

    #[test]
    fn test_similar_controllers() {
        let ctx = analyze(&[
            ("src/UserController.ts", ""),
            ("lib/OrderController.ts", ""),
        ]);
        let similar = find(&ctx, RelationshipKind::SimilarTo, "file:lib/OrderController.ts");
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].target_id(), "file:src/UserController.ts");
        assert_eq!(similar[0].weight, 0.8);
        assert_eq!(
            similar[0].evidence,
            Evidence::NamingPattern { key: "suffix:Controller".to_string() }
        );
    }

    #[test]
    fn test_same_directory_similarity() {
        let ctx = analyze(&[("src/alpha.ts", ""), ("src/beta.ts", ""), ("src/gamma.py", "")]);
        let similar: Vec<&Relationship> = ctx
            .understanding
            .relationships_of_kind(RelationshipKind::SimilarTo)
            .filter(|r| matches!(r.evidence, Evidence::SharedDirectory { .. }))
            .collect();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].source, "file:src/alpha.ts");
        assert_eq!(similar[0].weight, 0.7);
        assert_eq!(similar[0].confidence, 0.6);
    }

    fn shared_directory_edges(ctx: &SharedAnalysisContext) -> Vec<&Relationship> {
        ctx.understanding
            .relationships_of_kind(RelationshipKind::SimilarTo)
            .filter(|r| matches!(r.evidence, Evidence::SharedDirectory { .. }))
            .collect()
    }

    #[test]
    fn test_large_directory_is_linked_pairwise() {
        let names: Vec<String> = (0..65).map(|i| format!("src/components/widget{i}.ts")).collect();
        let files: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "")).collect();

        let ctx = analyze(&files);
        let edges = shared_directory_edges(&ctx);
        assert_eq!(edges.len(), 65 * 64 / 2);
        assert!(edges.iter().all(|r| r.weight == 0.7 && r.confidence == 0.6));

        let mut options = AnalysisOptions::default();
        options.thresholds.max_similarity_group = Some(64);
        let capped = analyze_with(&files, options);
        assert!(shared_directory_edges(&capped).is_empty());
    }

    #[test]
    fn test_each_pair_linked_once_per_evidence() {
        let ctx = analyze(&[
            ("src/UserController.ts", ""),
            ("src/OrderController.ts", ""),
            ("src/CartController.ts", ""),
        ]);
        let mut seen = HashSet::new();
        let mut naming = 0;
        let mut directory = 0;
        for rel in ctx.understanding.relationships_of_kind(RelationshipKind::SimilarTo) {
            assert!(rel.source < rel.target_id(), "{} is not ordered", rel.id);
            let tag = match rel.evidence {
                Evidence::NamingPattern { .. } => {
                    naming += 1;
                    "naming"
                }
                Evidence::SharedDirectory { .. } => {
                    directory += 1;
                    "directory"
                }
                _ => "other",
            };
            assert!(seen.insert((rel.source.clone(), rel.target_id(), tag)));
        }
        assert_eq!(naming, 3);
        assert_eq!(directory, 3);
    }

    #[test]
    fn test_self_match_does_not_make_edge_ambiguous() {
        let candidate = Candidate {
            kind: Some(RelationshipKind::Calls),
            source: "node:a.ts#A.save@2".to_string(),
            origin: "a.ts".to_string(),
            reference: "save".to_string(),
            lookup: "save".to_string(),
        };
        let evidence = Evidence::Call { name: "save".to_string() };
        let resolution = Resolution::Ambiguous(vec![
            "node:a.ts#A.save@2".to_string(),
            "node:a.ts#B.save@7".to_string(),
        ]);
        let out = edges(
            RelationshipKind::Calls,
            &candidate,
            resolution,
            CALL_WEIGHT,
            CALL_CONFIDENCE,
            (0.9, 0.5),
            false,
            &evidence,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target_id(), "node:a.ts#B.save@7");
        assert!(!out[0].ambiguous);
        assert!((out[0].confidence - CALL_CONFIDENCE).abs() < 1e-9);

        let resolution = Resolution::Ambiguous(vec![
            "node:a.ts#A.save@2".to_string(),
            "node:a.ts#B.save@7".to_string(),
            "node:b.ts#save@1".to_string(),
        ]);
        let out = edges(
            RelationshipKind::Calls,
            &candidate,
            resolution,
            CALL_WEIGHT,
            CALL_CONFIDENCE,
            (0.9, 0.5),
            false,
            &evidence,
        );
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.ambiguous));
        assert!(out.iter().all(|r| (r.confidence - CALL_CONFIDENCE * 0.9).abs() < 1e-9));
    }

    #[test]
    fn test_heritage_lists() {
        assert_eq!(
            heritage("class", " : Base(), IRepo<User> ", "kotlin"),
            vec![(None, "Base".to_string()), (None, "IRepo<User>".to_string())]
        );
        assert_eq!(bare_type_name("ns.Base<T>"), "Base");
        assert_eq!(bare_type_name("std::fmt::Display"), "Display");
        assert_eq!(
            heritage("interface", " extends A, B<C> {", "typescript"),
            vec![
                (Some(RelationshipKind::Extends), "A".to_string()),
                (Some(RelationshipKind::Extends), "B<C>".to_string())
            ]
        );
    }
}
