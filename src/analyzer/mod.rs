//! Pluggable analyzers and the contract the coordinator drives them through.
//!
//! Every hook has an empty default body, so an analyzer only implements the
//! phases it contributes to. Hooks receive the shared context by `&mut`; the
//! coordinator hands it to one analyzer at a time.
pub mod language;
pub mod naming;
pub mod pattern;
pub mod relationship;
pub mod resolve;
pub mod semantic;

use crate::config::AnalysisOptions;
use crate::context::SharedAnalysisContext;
use crate::error::Result;
use crate::extract::SyntaxExtractor;
use crate::model::FileNode;

pub use language::LanguageAnalyzer;
pub use pattern::PatternAnalyzer;
pub use relationship::RelationshipAnalyzer;
pub use semantic::SemanticAnalyzer;

pub trait Analyzer {
    /// Unique id used for dependency declarations and log lines.
    fn id(&self) -> &'static str;

    /// Lower runs earlier among analyzers with no ordering constraint.
    fn priority(&self) -> i32 {
        100
    }

    /// Ids of analyzers that must run before this one in every phase.
    fn dependencies(&self) -> &'static [&'static str] {
        &[]
    }

    fn initialize(&mut self, _ctx: &mut SharedAnalysisContext) -> Result<()> {
        Ok(())
    }

    /// Called once per new or changed file during content analysis.
    fn analyze_file(
        &mut self,
        _file: &FileNode,
        _content: &str,
        _ctx: &mut SharedAnalysisContext,
    ) -> Result<()> {
        Ok(())
    }

    /// Called instead of [`Analyzer::analyze_file`] for files an incremental
    /// run kept from the previous understanding.
    fn revisit_file(&mut self, _file: &FileNode, _ctx: &mut SharedAnalysisContext) -> Result<()> {
        Ok(())
    }

    fn process_relationships(&mut self, _ctx: &mut SharedAnalysisContext) -> Result<()> {
        Ok(())
    }

    fn discover_patterns(&mut self, _ctx: &mut SharedAnalysisContext) -> Result<()> {
        Ok(())
    }

    fn integrate_analysis(&mut self, _ctx: &mut SharedAnalysisContext) -> Result<()> {
        Ok(())
    }

    fn cleanup(&mut self) {}
}

/// The built-in analyzer set for `options`.
pub fn default_analyzers(options: &AnalysisOptions) -> Result<Vec<Box<dyn Analyzer>>> {
    let extractor = SyntaxExtractor::new()?;
    let mut analyzers: Vec<Box<dyn Analyzer>> = vec![
        Box::new(LanguageAnalyzer::new(extractor)),
        Box::new(PatternAnalyzer::new()),
        Box::new(RelationshipAnalyzer::new()),
    ];
    if options.semantic_analysis {
        analyzers.push(Box::new(SemanticAnalyzer::new()));
    }
    Ok(analyzers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_analyzers_respect_semantic_toggle() {
        let mut options = AnalysisOptions::default();
        let ids: Vec<&str> = default_analyzers(&options)
            .unwrap()
            .iter()
            .map(|a| a.id())
            .collect();
        assert_eq!(ids, vec!["language", "pattern", "relationship", "semantic"]);

        options.semantic_analysis = false;
        let ids: Vec<&str> = default_analyzers(&options)
            .unwrap()
            .iter()
            .map(|a| a.id())
            .collect();
        assert!(!ids.contains(&"semantic"));
    }
}
