use std::collections::{HashMap, HashSet};

use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator};

use super::languages::LanguageConfig;
use super::{Extraction, RawCall, RawSymbol, extract_signature};
use crate::error::{AnalysisError, Result};
use crate::model::NodeKind;

/// Call targets that never resolve to project code.
const BUILTIN_CALLS: &[&str] = &[
    "len", "make", "append", "delete", "print", "println", "panic", "recover", "range",
    "return", "break", "continue", "require", "super",
];

struct Grammar {
    language: Language,
    symbols: Query,
    calls: Option<Query>,
}

pub struct TreeSitterExtractor {
    grammars: HashMap<&'static str, Grammar>,
}

impl TreeSitterExtractor {
    pub fn new() -> Result<Self> {
        let mut grammars = HashMap::new();
        for config in LanguageConfig::get_all() {
            let symbols = Query::new(&config.language, config.query).map_err(|e| {
                AnalysisError::Extraction(format!("{} symbol query: {e}", config.name))
            })?;
            let calls = if config.call_query.is_empty() {
                None
            } else {
                Some(Query::new(&config.language, config.call_query).map_err(|e| {
                    AnalysisError::Extraction(format!("{} call query: {e}", config.name))
                })?)
            };
            grammars.insert(
                config.name,
                Grammar {
                    language: config.language,
                    symbols,
                    calls,
                },
            );
        }
        Ok(Self { grammars })
    }

    pub fn supports(&self, language: &str) -> bool {
        self.grammars.contains_key(language)
    }

    pub fn extract(&self, source: &str, lang: &str) -> Result<Extraction> {
        let grammar = self
            .grammars
            .get(lang)
            .ok_or_else(|| AnalysisError::Extraction(format!("no grammar for {lang}")))?;

        let mut parser = Parser::new();
        parser
            .set_language(&grammar.language)
            .map_err(|e| AnalysisError::Extraction(e.to_string()))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| AnalysisError::Extraction("failed to parse code".to_string()))?;

        let bytes = source.as_bytes();
        let symbols = extract_symbols(&grammar.symbols, tree.root_node(), bytes, lang)?;
        let calls = match &grammar.calls {
            Some(query) => extract_calls(query, tree.root_node(), bytes),
            None => Vec::new(),
        };
        Ok(Extraction { symbols, calls })
    }
}

fn kind_for_capture(capture: &str) -> Option<NodeKind> {
    match capture {
        "function" => Some(NodeKind::Function),
        "method" => Some(NodeKind::Method),
        "class" => Some(NodeKind::Class),
        "struct" => Some(NodeKind::Struct),
        "interface" => Some(NodeKind::Interface),
        "enum" => Some(NodeKind::Enum),
        "trait" => Some(NodeKind::Trait),
        "namespace" => Some(NodeKind::Namespace),
        _ => None,
    }
}

fn extract_symbols(query: &Query, root: Node, source: &[u8], lang: &str) -> Result<Vec<RawSymbol>> {
    let mut cursor = QueryCursor::new();
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    let mut matches = cursor.matches(query, root, source);
    while let Some(m) = matches.next() {
        let mut main_node = None;
        let mut kind = None;
        let mut name = String::new();

        for cap in m.captures {
            let capture_name = query.capture_names()[cap.index as usize];
            if capture_name == "name" {
                if let Ok(text) = cap.node.utf8_text(source) {
                    name = text.to_string();
                }
            } else if let Some(k) = kind_for_capture(capture_name) {
                main_node = Some(cap.node);
                kind = Some(k);
            }
        }

        let (Some(node), Some(mut kind)) = (main_node, kind) else {
            continue;
        };
        if name.is_empty() || !seen.insert((node.start_byte(), node.end_byte())) {
            continue;
        }

        let text = node
            .utf8_text(source)
            .map_err(|e| AnalysisError::Extraction(e.to_string()))?
            .to_string();
        let parent = if lang == "go" && kind == NodeKind::Method {
            go_receiver(node, source)
        } else {
            find_parent_symbol(node, source, lang)
        };
        if kind == NodeKind::Function && parent.is_some() {
            kind = NodeKind::Method;
        }

        symbols.push(RawSymbol {
            signature: extract_signature(&text, lang),
            name,
            kind,
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            parent,
            text,
        });
    }

    symbols.sort_by_key(|s| (s.start_line, s.end_line));
    Ok(symbols)
}

fn extract_calls(query: &Query, root: Node, source: &[u8]) -> Vec<RawCall> {
    let mut cursor = QueryCursor::new();
    let mut calls = Vec::new();
    let mut seen = HashSet::new();

    let mut matches = cursor.matches(query, root, source);
    while let Some(m) = matches.next() {
        for cap in m.captures {
            let Ok(name) = cap.node.utf8_text(source) else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() || BUILTIN_CALLS.contains(&name) {
                continue;
            }
            let line = cap.node.start_position().row + 1;
            if seen.insert((name.to_string(), line)) {
                calls.push(RawCall {
                    name: name.to_string(),
                    line,
                });
            }
        }
    }

    calls.sort_by_key(|c| c.line);
    calls
}

/// Receiver type of a go method: `(s *Server)` -> `Server`.
fn go_receiver(node: Node, source: &[u8]) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?.utf8_text(source).ok()?;
    let ty = receiver
        .trim_matches(|c| c == '(' || c == ')')
        .split_whitespace()
        .last()?
        .trim_start_matches('*');
    let ty = ty.split('[').next().unwrap_or(ty);
    if ty.is_empty() { None } else { Some(ty.to_string()) }
}

fn find_parent_symbol(node: Node, source: &[u8], lang: &str) -> Option<String> {
    let mut parent = node.parent();
    while let Some(p) = parent {
        let kind = p.kind();
        let is_class_like = match lang {
            "go" => kind == "type_declaration",
            "python" => kind == "class_definition",
            "typescript" | "javascript" => {
                kind == "class_declaration" || kind == "interface_declaration"
            }
            "rust" => kind == "impl_item" || kind == "trait_item",
            _ => false,
        };

        if is_class_like {
            if lang == "rust" && kind == "impl_item" {
                if let Some(type_node) = p.child_by_field_name("type") {
                    if let Ok(name) = type_node.utf8_text(source) {
                        let base = name.split('<').next().unwrap_or(name);
                        return Some(base.trim().to_string());
                    }
                }
            } else if let Some(name_node) = p.child_by_field_name("name") {
                if let Ok(name) = name_node.utf8_text(source) {
                    return Some(name.to_string());
                }
            }
        }
        parent = p.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(extraction: &'a Extraction, name: &str) -> &'a RawSymbol {
        extraction
            .symbols
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("symbol {name} not extracted"))
    }

    #[test]
    fn test_parse_rust_code() {
        let extractor = TreeSitterExtractor::new().expect("Failed to initialize extractor");
        let source_code = r#"
struct MyStruct {
    field: i32,
}

impl MyStruct {
    fn my_method(&self) {
        println!("Hello");
        self.helper();
    }
}

fn my_function() {
    external_function();
}
"#;

        let extraction = extractor.extract(source_code, "rust").unwrap();

        assert_eq!(find(&extraction, "MyStruct").kind, NodeKind::Struct);
        let method = find(&extraction, "my_method");
        assert_eq!(method.kind, NodeKind::Method);
        assert_eq!(method.parent.as_deref(), Some("MyStruct"));
        assert_eq!(method.qualified_name(), "MyStruct.my_method");
        let function = find(&extraction, "my_function");
        assert_eq!(function.kind, NodeKind::Function);
        assert_eq!(function.start_line, 13);

        let names: Vec<&str> = extraction.calls.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"helper"));
        assert!(names.contains(&"external_function"));
    }

    #[test]
    fn test_parse_python_code() {
        let extractor = TreeSitterExtractor::new().unwrap();
        let source_code = r#"
class MyClass:
    def my_method(self):
        print("Hello")

def my_function():
    pass
"#;

        let extraction = extractor.extract(source_code, "python").unwrap();
        assert_eq!(find(&extraction, "MyClass").kind, NodeKind::Class);
        let method = find(&extraction, "my_method");
        assert_eq!(method.kind, NodeKind::Method);
        assert_eq!(method.parent.as_deref(), Some("MyClass"));
        assert_eq!(find(&extraction, "my_function").kind, NodeKind::Function);
        assert!(extraction.calls.iter().all(|c| c.name != "print"));
    }

    #[test]
    fn test_parse_typescript_code() {
        let extractor = TreeSitterExtractor::new().unwrap();
        let source_code = r#"import { save } from './store';

export interface Repo {
  find(id: string): string;
}

export class UserService {
  load(id: string) {
    return save(id);
  }
}

export const helper = (x: number) => x * 2;
"#;

        let extraction = extractor.extract(source_code, "typescript").unwrap();
        assert_eq!(find(&extraction, "Repo").kind, NodeKind::Interface);
        assert_eq!(find(&extraction, "UserService").kind, NodeKind::Class);
        let load = find(&extraction, "load");
        assert_eq!(load.kind, NodeKind::Method);
        assert_eq!(load.parent.as_deref(), Some("UserService"));
        assert_eq!(find(&extraction, "helper").kind, NodeKind::Function);
        assert!(extraction.calls.iter().any(|c| c.name == "save" && c.line == 9));
    }

    #[test]
    fn test_parse_go_code() {
        let extractor = TreeSitterExtractor::new().unwrap();
        let source_code = r#"package main

type Server struct {
	addr string
}

func (s *Server) Start() {
	listen(s.addr)
}
"#;
        let extraction = extractor.extract(source_code, "go").unwrap();
        assert_eq!(find(&extraction, "Server").kind, NodeKind::Struct);
        let start = find(&extraction, "Start");
        assert_eq!(start.kind, NodeKind::Method);
        assert_eq!(start.parent.as_deref(), Some("Server"));
        assert!(extraction.calls.iter().any(|c| c.name == "listen"));
    }
}
