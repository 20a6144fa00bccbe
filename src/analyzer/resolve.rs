//! Name and path resolution against the files and nodes of one run.
use std::collections::{BTreeSet, HashMap};

use crate::model::{CodeNode, NodeKind};

/// Extensions probed when an import names a module without one.
pub const IMPORT_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "rs", "go", "java", "kt", "cs", "php", "rb",
];

/// Outcome of matching one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Unique(String),
    Ambiguous(Vec<String>),
    Unresolved,
}

impl Resolution {
    fn from_matches(mut matches: Vec<String>) -> Self {
        matches.sort();
        matches.dedup();
        match matches.len() {
            0 => Resolution::Unresolved,
            1 => Resolution::Unique(matches.remove(0)),
            _ => Resolution::Ambiguous(matches),
        }
    }
}

/// Converts a python module reference to a path specifier.
/// `.models` -> `./models`, `..core.db` -> `../core/db`, `os.path` -> `os/path`.
pub fn python_module_path(module: &str) -> String {
    let dots = module.chars().take_while(|c| *c == '.').count();
    let rest = module[dots..].replace('.', "/");
    match dots {
        0 => rest,
        1 => format!("./{rest}"),
        n => format!("{}{rest}", "../".repeat(n - 1)),
    }
}

/// Joins `specifier` onto `dir`, folding `.` and `..`. `None` when the path
/// climbs above the root.
fn join_relative(dir: &str, specifier: &str) -> Option<String> {
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

fn probes(base: &str) -> Vec<String> {
    let base = base.trim_end_matches('/');
    let mut out = Vec::with_capacity(IMPORT_EXTENSIONS.len() * 2 + 3);
    if !base.is_empty() {
        out.push(base.to_string());
        out.extend(IMPORT_EXTENSIONS.iter().map(|ext| format!("{base}.{ext}")));
    }
    let prefix = if base.is_empty() {
        String::new()
    } else {
        format!("{base}/")
    };
    out.extend(IMPORT_EXTENSIONS.iter().map(|ext| format!("{prefix}index.{ext}")));
    out.push(format!("{prefix}__init__.py"));
    out.push(format!("{prefix}mod.rs"));
    out
}

/// Known file paths of the current tree.
pub struct FileIndex {
    paths: BTreeSet<String>,
}

impl FileIndex {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Files an import `specifier` written in `importer_dir` may refer to.
    pub fn resolve_import(&self, specifier: &str, importer_dir: &str) -> Resolution {
        let specifier = specifier.trim();
        if specifier.is_empty() {
            return Resolution::Unresolved;
        }

        let matches: Vec<String> = if let Some(absolute) = specifier.strip_prefix('/') {
            self.exact(absolute)
        } else if specifier == "."
            || specifier == ".."
            || specifier.starts_with("./")
            || specifier.starts_with("../")
        {
            match join_relative(importer_dir, specifier) {
                Some(joined) => self.exact(&joined),
                None => Vec::new(),
            }
        } else {
            self.by_suffix(specifier)
        };
        Resolution::from_matches(matches)
    }

    fn exact(&self, base: &str) -> Vec<String> {
        probes(base)
            .into_iter()
            .filter(|p| self.paths.contains(p))
            .collect()
    }

    fn by_suffix(&self, specifier: &str) -> Vec<String> {
        let probes = probes(specifier);
        self.paths
            .iter()
            .filter(|path| {
                probes.iter().any(|probe| {
                    path.as_str() == probe
                        || path
                            .strip_suffix(probe.as_str())
                            .is_some_and(|head| head.ends_with('/'))
                })
            })
            .cloned()
            .collect()
    }
}

/// Code nodes by simple name, split into type-like and callable kinds.
#[derive(Default)]
pub struct SymbolIndex {
    types: HashMap<String, Vec<(String, String, NodeKind)>>,
    callables: HashMap<String, Vec<(String, String)>>,
}

impl SymbolIndex {
    pub fn new<'a>(nodes: impl IntoIterator<Item = &'a CodeNode>) -> Self {
        let mut index = Self::default();
        for node in nodes {
            if node.kind.is_type_like() || node.kind == NodeKind::Enum {
                index
                    .types
                    .entry(node.name.clone())
                    .or_default()
                    .push((node.id.clone(), node.path.clone(), node.kind));
            } else if node.kind.is_callable() {
                index
                    .callables
                    .entry(node.name.clone())
                    .or_default()
                    .push((node.id.clone(), node.path.clone()));
            }
        }
        index
    }

    /// Type-like nodes named `name`.
    pub fn resolve_type(&self, name: &str) -> Resolution {
        let matches = self
            .types
            .get(name)
            .map(|entries| entries.iter().map(|(id, _, _)| id.clone()).collect())
            .unwrap_or_default();
        Resolution::from_matches(matches)
    }

    /// Kind of a resolved type node.
    pub fn type_kind(&self, id: &str) -> Option<NodeKind> {
        self.types
            .values()
            .flatten()
            .find(|(node_id, _, _)| node_id == id)
            .map(|(_, _, kind)| *kind)
    }

    /// Functions and methods named `name`; a single match in `caller_path`
    /// wins over matches elsewhere.
    pub fn resolve_call(&self, name: &str, caller_path: &str) -> Resolution {
        let Some(entries) = self.callables.get(name) else {
            return Resolution::Unresolved;
        };
        let local: Vec<&String> = entries
            .iter()
            .filter(|(_, path)| path == caller_path)
            .map(|(id, _)| id)
            .collect();
        if let [only] = local.as_slice() {
            return Resolution::Unique((*only).clone());
        }
        Resolution::from_matches(entries.iter().map(|(id, _)| id.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeFacts, Span, node_id};

    fn index(paths: &[&str]) -> FileIndex {
        FileIndex::new(paths.iter().copied())
    }

    #[test]
    fn test_python_module_path() {
        assert_eq!(python_module_path(".models"), "./models");
        assert_eq!(python_module_path("..core.db"), "../core/db");
        assert_eq!(python_module_path("os.path"), "os/path");
    }

    #[test]
    fn test_relative_import_probes_extensions() {
        let files = index(&["src/util.ts", "src/api/user.ts"]);
        assert_eq!(
            files.resolve_import("../util", "src/api"),
            Resolution::Unique("src/util.ts".to_string())
        );
        assert_eq!(
            files.resolve_import("./util", "src"),
            Resolution::Unique("src/util.ts".to_string())
        );
    }

    #[test]
    fn test_index_and_package_probes() {
        let files = index(&["src/util.ts", "src/util/index.ts", "pkg/__init__.py", "core/mod.rs"]);
        assert_eq!(
            files.resolve_import("./util", "src"),
            Resolution::Ambiguous(vec!["src/util.ts".to_string(), "src/util/index.ts".to_string()])
        );
        assert_eq!(
            files.resolve_import("./pkg", ""),
            Resolution::Unique("pkg/__init__.py".to_string())
        );
        assert_eq!(
            files.resolve_import("/core", "anything"),
            Resolution::Unique("core/mod.rs".to_string())
        );
    }

    #[test]
    fn test_bare_specifier_suffix_match() {
        let files = index(&["src/lib/format.ts", "src/format_helpers.ts"]);
        assert_eq!(
            files.resolve_import("lib/format", "src/app"),
            Resolution::Unique("src/lib/format.ts".to_string())
        );
        assert_eq!(files.resolve_import("react", "src"), Resolution::Unresolved);
    }

    #[test]
    fn test_climbing_above_root_is_unresolved() {
        let files = index(&["a.ts"]);
        assert_eq!(files.resolve_import("../../a", "src"), Resolution::Unresolved);
    }

    fn node(path: &str, name: &str, kind: NodeKind) -> CodeNode {
        CodeNode {
            id: node_id(path, name, 1),
            name: name.to_string(),
            qualified_name: name.to_string(),
            kind,
            path: path.to_string(),
            span: Span { start_line: 1, end_line: 2 },
            content_hash: String::new(),
            parent: None,
            children: Vec::new(),
            confidence: 0.9,
            signature: String::new(),
            language: "typescript".to_string(),
            facts: NodeFacts::default(),
        }
    }

    #[test]
    fn test_call_prefers_same_file() {
        let nodes = vec![
            node("a.ts", "save", NodeKind::Function),
            node("b.ts", "save", NodeKind::Function),
            node("b.ts", "Repo", NodeKind::Class),
        ];
        let symbols = SymbolIndex::new(&nodes);
        assert_eq!(
            symbols.resolve_call("save", "a.ts"),
            Resolution::Unique("node:a.ts#save@1".to_string())
        );
        assert!(matches!(symbols.resolve_call("save", "c.ts"), Resolution::Ambiguous(ids) if ids.len() == 2));
        assert_eq!(symbols.resolve_call("missing", "a.ts"), Resolution::Unresolved);
        assert_eq!(
            symbols.resolve_type("Repo"),
            Resolution::Unique("node:b.ts#Repo@1".to_string())
        );
        assert_eq!(symbols.type_kind("node:b.ts#Repo@1"), Some(NodeKind::Class));
    }
}
