use std::collections::HashMap;

use regex::Regex;

use super::{Extraction, RawCall, RawSymbol, extract_signature};
use crate::error::{AnalysisError, Result};
use crate::model::NodeKind;

const TYPE_RULE: &str = r"^\s*(?:(?:public|private|protected|internal|abstract|final|static|sealed|partial|open|data|export|case|fileprivate|inline|value)\s+)*(enum\s+class|enum|class|interface|record|struct|trait|object|protocol|extension|namespace|module)\s+([A-Za-z_]\w*)";

const JVM_METHOD: &str = r"^\s*(?:(?:public|private|protected|static|final|abstract|synchronized|native|default|override|internal|virtual|async|sealed|new)\s+)+(?:[\w<>\[\],.?]+\s+)?([A-Za-z_]\w*)\s*\(";

/// Callable rules per language; the first capture group is the name.
const CALLABLE_RULES: &[(&str, &str)] = &[
    ("java", JVM_METHOD),
    ("csharp", JVM_METHOD),
    (
        "kotlin",
        r"^\s*(?:[\w@]+\s+)*fun\s+(?:<[^>]*>\s*)?(?:[\w.]+\.)?([A-Za-z_]\w*)\s*\(",
    ),
    (
        "php",
        r"^\s*(?:(?:public|private|protected|static|abstract|final)\s+)*function\s+&?([A-Za-z_]\w*)\s*\(",
    ),
    ("ruby", r"^\s*def\s+(?:self\.)?([A-Za-z_]\w*[?!=]?)"),
    (
        "swift",
        r"^\s*(?:(?:@\w+|public|private|internal|open|fileprivate|static|class|override|final|mutating)\s+)*func\s+([A-Za-z_]\w*)",
    ),
    (
        "scala",
        r"^\s*(?:(?:override|private|protected|final|implicit)\s+)*def\s+([A-Za-z_]\w*)",
    ),
    (
        "cpp",
        r"^\s*(?:[\w:*&<>]+\s+)+[*&]*([A-Za-z_][\w:~]*)\s*\([^;]*$",
    ),
    (
        "c",
        r"^\s*(?:[\w*]+\s+)+\**([A-Za-z_]\w*)\s*\([^;]*$",
    ),
];

const KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "sizeof", "function", "def", "fun",
    "func", "elif", "when", "foreach", "using", "lock", "typeof", "else", "do", "try",
    "match", "unless", "until", "synchronized", "new", "throw", "in", "not", "and", "or",
];

struct LanguageRules {
    callable: Regex,
}

/// Line-oriented symbol extraction for languages without a bundled grammar.
pub struct RegexExtractor {
    type_rule: Regex,
    call_rule: Regex,
    languages: HashMap<&'static str, LanguageRules>,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| AnalysisError::Extraction(format!("fallback rule: {e}")))
}

fn type_kind(keyword: &str) -> NodeKind {
    match keyword {
        "interface" | "protocol" => NodeKind::Interface,
        "struct" => NodeKind::Struct,
        "trait" => NodeKind::Trait,
        "namespace" | "module" => NodeKind::Namespace,
        k if k.starts_with("enum") => NodeKind::Enum,
        _ => NodeKind::Class,
    }
}

impl RegexExtractor {
    pub fn new() -> Result<Self> {
        let mut languages = HashMap::new();
        for (name, callable) in CALLABLE_RULES {
            languages.insert(
                *name,
                LanguageRules {
                    callable: compile(callable)?,
                },
            );
        }
        Ok(Self {
            type_rule: compile(TYPE_RULE)?,
            call_rule: compile(r"\b([A-Za-z_]\w*)\s*\(")?,
            languages,
        })
    }

    pub fn supports(&self, language: &str) -> bool {
        self.languages.contains_key(language)
    }

    pub fn extract(&self, source: &str, language: &str) -> Extraction {
        let Some(rules) = self.languages.get(language) else {
            return Extraction::default();
        };
        let lines: Vec<&str> = source.lines().collect();
        let mut symbols = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            if let Some(caps) = self.type_rule.captures(line) {
                let keyword = caps.get(1).map_or("class", |m| m.as_str());
                let name = caps.get(2).map_or("", |m| m.as_str());
                if !name.is_empty() && !KEYWORDS.contains(&name) {
                    symbols.push(self.symbol(&lines, idx, name, type_kind(keyword), language));
                }
                continue;
            }
            if let Some(caps) = rules.callable.captures(line) {
                let name = caps.get(1).map_or("", |m| m.as_str());
                if !name.is_empty() && !KEYWORDS.contains(&name) {
                    symbols.push(self.symbol(&lines, idx, name, NodeKind::Function, language));
                }
            }
        }

        assign_parents(&mut symbols);
        let calls = self.calls(&lines, &symbols);
        Extraction { symbols, calls }
    }

    fn symbol(
        &self,
        lines: &[&str],
        idx: usize,
        name: &str,
        kind: NodeKind,
        language: &str,
    ) -> RawSymbol {
        let end = if language == "ruby" {
            ruby_block_end(lines, idx)
        } else {
            brace_block_end(lines, idx)
        };
        let text = lines[idx..=end].join("\n");
        RawSymbol {
            name: name.to_string(),
            kind,
            start_line: idx + 1,
            end_line: end + 1,
            parent: None,
            signature: extract_signature(&text, language),
            text,
        }
    }

    fn calls(&self, lines: &[&str], symbols: &[RawSymbol]) -> Vec<RawCall> {
        let mut calls = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            let line_no = idx + 1;
            for caps in self.call_rule.captures_iter(line) {
                let Some(m) = caps.get(1) else {
                    continue;
                };
                let name = m.as_str();
                if KEYWORDS.contains(&name) {
                    continue;
                }
                let is_declaration = symbols
                    .iter()
                    .any(|s| s.start_line == line_no && s.name == name);
                if is_declaration || calls.iter().any(|c: &RawCall| c.line == line_no && c.name == name) {
                    continue;
                }
                calls.push(RawCall {
                    name: name.to_string(),
                    line: line_no,
                });
            }
        }
        calls
    }
}

/// Last line (0-based) of the brace block opened at or shortly after `start`.
fn brace_block_end(lines: &[&str], start: usize) -> usize {
    let mut depth = 0usize;
    let mut opened = false;
    for (idx, line) in lines.iter().enumerate().skip(start) {
        if !opened && idx > start + 3 {
            return start;
        }
        for c in line.chars() {
            match c {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' if depth > 0 => {
                    depth -= 1;
                    if opened && depth == 0 {
                        return idx;
                    }
                }
                _ => {}
            }
        }
        if !opened && line.trim_end().ends_with(';') {
            return idx;
        }
    }
    if opened { lines.len().saturating_sub(1) } else { start }
}

fn ruby_block_end(lines: &[&str], start: usize) -> usize {
    let indent = |l: &str| l.len() - l.trim_start().len();
    let base = indent(lines[start]);
    lines
        .iter()
        .enumerate()
        .skip(start + 1)
        .find(|(_, l)| l.trim() == "end" && indent(l) == base)
        .map_or(start, |(idx, _)| idx)
}

/// Links each symbol to the innermost enclosing type and promotes functions
/// declared inside a type to methods.
fn assign_parents(symbols: &mut [RawSymbol]) {
    let spans: Vec<(usize, usize, usize, String, bool)> = symbols
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let container = s.kind.is_type_like() || matches!(s.kind, NodeKind::Namespace | NodeKind::Enum);
            (i, s.start_line, s.end_line, s.name.clone(), container)
        })
        .collect();

    for (i, symbol) in symbols.iter_mut().enumerate() {
        let parent = spans
            .iter()
            .filter(|(j, start, end, _, container)| {
                *container
                    && *j != i
                    && *start <= symbol.start_line
                    && symbol.end_line <= *end
                    && (*start, *end) != (symbol.start_line, symbol.end_line)
            })
            .min_by_key(|(_, start, end, _, _)| end - start);
        if let Some((_, _, _, name, _)) = parent {
            symbol.parent = Some(name.clone());
            if symbol.kind == NodeKind::Function {
                symbol.kind = NodeKind::Method;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_java_class_and_methods() {
        let extractor = RegexExtractor::new().unwrap();
        let source = r#"package app;

public class OrderController extends BaseController implements Handler {
    private final OrderService service;

    public Order create(Request req) {
        validate(req);
        return service.save(req);
    }
}
"#;
        let extraction = extractor.extract(source, "java");
        let class = &extraction.symbols[0];
        assert_eq!(class.name, "OrderController");
        assert_eq!(class.kind, NodeKind::Class);
        assert_eq!((class.start_line, class.end_line), (3, 10));

        let method = extraction.symbols.iter().find(|s| s.name == "create").unwrap();
        assert_eq!(method.kind, NodeKind::Method);
        assert_eq!(method.parent.as_deref(), Some("OrderController"));
        assert_eq!((method.start_line, method.end_line), (6, 9));

        let calls: Vec<&str> = extraction.calls.iter().map(|c| c.name.as_str()).collect();
        assert!(calls.contains(&"validate"));
        assert!(calls.contains(&"save"));
        assert!(!calls.contains(&"create"));
    }

    #[test]
    fn test_ruby_blocks() {
        let extractor = RegexExtractor::new().unwrap();
        let source = "class User\n  def full_name\n    first + last\n  end\nend\n";
        let extraction = extractor.extract(source, "ruby");
        assert_eq!(extraction.symbols.len(), 2);
        assert_eq!(extraction.symbols[0].end_line, 5);
        let method = &extraction.symbols[1];
        assert_eq!(method.kind, NodeKind::Method);
        assert_eq!(method.end_line, 4);
    }

    #[test]
    fn test_kotlin_enum_class() {
        let extractor = RegexExtractor::new().unwrap();
        let extraction = extractor.extract("enum class Color { RED, GREEN }\n", "kotlin");
        assert_eq!(extraction.symbols[0].name, "Color");
        assert_eq!(extraction.symbols[0].kind, NodeKind::Enum);
    }

    #[test]
    fn test_c_function_block() {
        let extractor = RegexExtractor::new().unwrap();
        let source = "int add(int a, int b) {\n  return a + b;\n}\n";
        let extraction = extractor.extract(source, "c");
        assert_eq!(extraction.symbols.len(), 1);
        assert_eq!(extraction.symbols[0].name, "add");
        assert_eq!(extraction.symbols[0].end_line, 3);
    }

    #[test]
    fn test_unknown_language_is_empty() {
        let extractor = RegexExtractor::new().unwrap();
        assert!(!extractor.supports("cobol"));
        assert!(extractor.extract("x()", "cobol").symbols.is_empty());
    }
}
