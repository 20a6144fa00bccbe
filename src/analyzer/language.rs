use std::collections::HashSet;

use tracing::debug;

use super::Analyzer;
use crate::context::SharedAnalysisContext;
use crate::error::Result;
use crate::extract::facts::{CallSite, derive_facts};
use crate::extract::{SyntaxExtractor, language_for_extension, paradigms};
use crate::model::language::mark_dominant;
use crate::model::{CodeNode, FileNode, Span, content_hash, node_id};

/// Confidence of nodes from a real grammar versus line-oriented rules.
const STRUCTURED_CONFIDENCE: f64 = 0.9;
const HEURISTIC_CONFIDENCE: f64 = 0.6;

/// Detects file languages and turns extracted symbols into code nodes.
pub struct LanguageAnalyzer {
    extractor: SyntaxExtractor,
}

impl LanguageAnalyzer {
    pub fn new(extractor: SyntaxExtractor) -> Self {
        Self { extractor }
    }

    fn record_language(ctx: &mut SharedAnalysisContext, file: &FileNode, language: &str) {
        ctx.set_file_language(&file.path, language);
        let details = ctx
            .understanding
            .languages
            .entry(language.to_string())
            .or_default();
        details.record_file(&file.path, file.extension.as_deref(), file.size);
        if details.paradigms.is_empty() {
            details.paradigms = paradigms(language).iter().map(|p| p.to_string()).collect();
        }
    }

    fn build_nodes(&self, file: &FileNode, content: &str, language: &str) -> Result<Vec<CodeNode>> {
        let extraction = self.extractor.extract(content, language)?;
        let lines: Vec<&str> = content.lines().collect();
        let line_text = |line: usize| lines.get(line.saturating_sub(1)).copied().unwrap_or("");
        let confidence = if self.extractor.is_structured(language) {
            STRUCTURED_CONFIDENCE
        } else {
            HEURISTIC_CONFIDENCE
        };
        let calls_by_symbol = extraction.calls_by_symbol();

        let mut nodes: Vec<CodeNode> = Vec::with_capacity(extraction.symbols.len());
        let mut seen = HashSet::new();
        for (idx, symbol) in extraction.symbols.iter().enumerate() {
            let qualified_name = symbol.qualified_name();
            let id = node_id(&file.path, &qualified_name, symbol.start_line);
            if !seen.insert(id.clone()) {
                continue;
            }
            let sites: Vec<CallSite<'_>> = calls_by_symbol[idx]
                .iter()
                .map(|&c| {
                    let call = &extraction.calls[c];
                    CallSite {
                        call,
                        line_text: line_text(call.line),
                    }
                })
                .collect();
            let facts = derive_facts(symbol, line_text(symbol.start_line), &sites, language);

            nodes.push(CodeNode {
                id,
                name: symbol.name.clone(),
                qualified_name,
                kind: symbol.kind,
                path: file.path.clone(),
                span: Span {
                    start_line: symbol.start_line,
                    end_line: symbol.end_line,
                },
                content_hash: content_hash(&symbol.text),
                parent: None,
                children: Vec::new(),
                confidence,
                signature: symbol.signature.clone(),
                language: language.to_string(),
                facts,
            });
        }

        link_parents(&mut nodes);
        Ok(nodes)
    }
}

/// Resolves each node's parent by name within the file: the innermost
/// containing container with that name, else the first one declared.
fn link_parents(nodes: &mut [CodeNode]) {
    let containers: Vec<(String, String, Span)> = nodes
        .iter()
        .filter(|n| !n.kind.is_callable())
        .map(|n| (n.id.clone(), n.name.clone(), n.span))
        .collect();

    let mut links: Vec<(usize, String)> = Vec::new();
    for (idx, node) in nodes.iter().enumerate() {
        let Some(parent_name) = node.qualified_name.rsplit_once('.').map(|(p, _)| p) else {
            continue;
        };
        let parent_name = parent_name.rsplit('.').next().unwrap_or(parent_name);
        let candidates: Vec<&(String, String, Span)> = containers
            .iter()
            .filter(|(id, name, _)| name == parent_name && *id != node.id)
            .collect();
        let chosen = candidates
            .iter()
            .filter(|(_, _, span)| span.contains_line(node.span.start_line))
            .min_by_key(|(_, _, span)| span.line_count())
            .or_else(|| candidates.first());
        if let Some((id, _, _)) = chosen {
            links.push((idx, id.clone()));
        }
    }

    for (idx, parent_id) in links {
        nodes[idx].parent = Some(parent_id.clone());
        let child_id = nodes[idx].id.clone();
        if let Some(parent) = nodes.iter_mut().find(|n| n.id == parent_id) {
            if !parent.children.contains(&child_id) {
                parent.children.push(child_id);
            }
        }
    }
}

impl Analyzer for LanguageAnalyzer {
    fn id(&self) -> &'static str {
        "language"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn analyze_file(
        &mut self,
        file: &FileNode,
        content: &str,
        ctx: &mut SharedAnalysisContext,
    ) -> Result<()> {
        let Some(language) = file.extension.as_deref().and_then(language_for_extension) else {
            return Ok(());
        };
        Self::record_language(ctx, file, language);

        let nodes = self.build_nodes(file, content, language)?;
        debug!("{}: {} nodes ({language})", file.path, nodes.len());
        for node in nodes {
            ctx.add_node(node);
        }
        Ok(())
    }

    fn revisit_file(&mut self, file: &FileNode, ctx: &mut SharedAnalysisContext) -> Result<()> {
        if let Some(language) = file.extension.as_deref().and_then(language_for_extension) {
            Self::record_language(ctx, file, language);
        }
        Ok(())
    }

    fn discover_patterns(&mut self, ctx: &mut SharedAnalysisContext) -> Result<()> {
        mark_dominant(&mut ctx.understanding.languages);
        Ok(())
    }
}
