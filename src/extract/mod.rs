//! Heuristic syntax extraction.
//!
//! Tree-sitter grammars cover go, python, typescript, javascript and rust;
//! every other recognised language goes through line-oriented regex rules.
//! Neither path aims for compiler-grade accuracy.
pub mod facts;
pub mod fallback;
pub mod languages;
mod parser;

use crate::error::{AnalysisError, Result};
use crate::model::NodeKind;

pub use fallback::RegexExtractor;
pub use languages::{LanguageConfig, language_for_extension, paradigms};
pub use parser::TreeSitterExtractor;

/// A symbol found in one file, before it becomes a code node.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSymbol {
    pub name: String,
    pub kind: NodeKind,
    pub start_line: usize,
    pub end_line: usize,
    /// Name of the enclosing type-like symbol, if any.
    pub parent: Option<String>,
    pub signature: String,
    pub text: String,
}

impl RawSymbol {
    pub fn qualified_name(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{parent}.{}", self.name),
            None => self.name.clone(),
        }
    }

    fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCall {
    pub name: String,
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub symbols: Vec<RawSymbol>,
    pub calls: Vec<RawCall>,
}

impl Extraction {
    /// For each symbol, the indices of the calls made directly inside it.
    /// A call belongs to the innermost callable whose span holds its line.
    pub fn calls_by_symbol(&self) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); self.symbols.len()];
        for (call_idx, call) in self.calls.iter().enumerate() {
            let owner = self
                .symbols
                .iter()
                .enumerate()
                .filter(|(_, s)| s.kind.is_callable() && s.contains_line(call.line))
                .min_by_key(|(_, s)| s.end_line - s.start_line)
                .map(|(idx, _)| idx);
            if let Some(idx) = owner {
                out[idx].push(call_idx);
            }
        }
        out
    }
}

/// Entry point for symbol extraction, built once per run and handed to the
/// language analyzer.
pub struct SyntaxExtractor {
    tree_sitter: TreeSitterExtractor,
    fallback: RegexExtractor,
}

impl SyntaxExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            tree_sitter: TreeSitterExtractor::new()?,
            fallback: RegexExtractor::new()?,
        })
    }

    pub fn supports(&self, language: &str) -> bool {
        self.tree_sitter.supports(language) || self.fallback.supports(language)
    }

    /// Whether `language` is parsed with a real grammar.
    pub fn is_structured(&self, language: &str) -> bool {
        self.tree_sitter.supports(language)
    }

    pub fn extract(&self, source: &str, language: &str) -> Result<Extraction> {
        if self.tree_sitter.supports(language) {
            self.tree_sitter.extract(source, language)
        } else if self.fallback.supports(language) {
            Ok(self.fallback.extract(source, language))
        } else {
            Err(AnalysisError::Extraction(format!(
                "unsupported language: {language}"
            )))
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Declaration text up to the start of the body, on one line.
pub(crate) fn extract_signature(content: &str, lang: &str) -> String {
    let content = content.trim();
    let first_line = content.lines().next().unwrap_or("").trim();
    match lang {
        "python" => {
            if let Some(stripped) = first_line.strip_suffix(':') {
                return stripped.to_string();
            }
            match content.find("):") {
                Some(idx) => collapse_whitespace(&content[..idx + 1]),
                None => first_line.to_string(),
            }
        }
        "ruby" => first_line.to_string(),
        "typescript" | "javascript" => {
            if let Some(idx) = content.find("=>") {
                collapse_whitespace(&content[..idx + 2])
            } else if let Some(idx) = content.find('{') {
                collapse_whitespace(&content[..idx])
            } else {
                first_line.to_string()
            }
        }
        _ => match content.find('{') {
            Some(idx) => collapse_whitespace(&content[..idx]),
            None => first_line.to_string(),
        },
    }
}
