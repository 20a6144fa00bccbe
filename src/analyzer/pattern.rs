use std::collections::BTreeMap;

use tracing::debug;

use super::Analyzer;
use super::naming::{affixes, casing_style, register_casing_styles};
use crate::context::{DefinitionCategory, SharedAnalysisContext};
use crate::error::Result;
use crate::model::insight::sort_for_presentation;
use crate::model::{CodePattern, DirectoryNode, FileNode, PatternCategory, PatternInstance};

/// Structural suffixes every run knows about.
pub(crate) const STRUCTURAL_SUFFIXES: &[&str] = &["Controller", "Service", "Factory"];

/// Directory names that say nothing about how features are organized.
const WELL_KNOWN_DIRS: &[&str] = &[
    "src", "lib", "app", "test", "tests", "spec", "specs", "__tests__", "docs", "doc", "dist",
    "build", "target", "out", "bin", "vendor", "node_modules", "public", "static", "assets",
    "config", "scripts", "tools", "examples", "utils", "util", "shared", "common", "internal",
    "pkg", "cmd", "include", "resources",
];

/// Tallies identifier statistics while files stream past and turns them into
/// structural, naming and organization patterns.
#[derive(Default)]
pub struct PatternAnalyzer {
    identifiers: usize,
    by_kind: BTreeMap<String, Vec<String>>,
    by_style: BTreeMap<String, Vec<String>>,
    prefixes: BTreeMap<String, Vec<String>>,
    suffixes: BTreeMap<String, Vec<String>>,
}

impl PatternAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    fn tally(&mut self, ctx: &SharedAnalysisContext, id: &str, name: &str, kind: &str) {
        self.identifiers += 1;
        self.by_kind
            .entry(kind.to_string())
            .or_default()
            .push(id.to_string());
        if let Some(style) = casing_style(&ctx.registry, name) {
            self.by_style
                .entry(style.to_string())
                .or_default()
                .push(id.to_string());
        }
        let (prefixes, suffixes) = affixes(name);
        for prefix in prefixes {
            self.prefixes.entry(prefix).or_default().push(id.to_string());
        }
        for suffix in suffixes {
            self.suffixes.entry(suffix).or_default().push(id.to_string());
        }
    }

    fn tally_file(&mut self, file: &FileNode, ctx: &SharedAnalysisContext) {
        let nodes: Vec<(String, String, &'static str)> = ctx
            .understanding
            .nodes_in_file(&file.path)
            .map(|n| (n.id.clone(), n.name.clone(), n.kind.as_str()))
            .collect();
        // `UserService.ts` declaring `UserService` is one identifier, not two.
        let stem_declared = nodes.iter().any(|(_, name, _)| name == file.stem());
        for (id, name, kind) in nodes {
            self.tally(ctx, &id, &name, kind);
        }
        if !stem_declared {
            self.tally(ctx, &file.id, file.stem(), "file");
        }
    }

    fn structural_patterns(&self, min_instances: usize) -> Vec<CodePattern> {
        self.by_kind
            .iter()
            .filter(|(_, ids)| ids.len() >= min_instances)
            .map(|(kind, ids)| {
                let share = ids.len() as f64 / self.identifiers as f64;
                let mut pattern = CodePattern::new(
                    PatternCategory::Structural,
                    format!("{kind} structure"),
                    format!("{} {kind} declarations", ids.len()),
                );
                pattern.instances = instances(ids);
                pattern.frequency = ids.len();
                pattern.confidence = (0.5 + share / 2.0).min(0.95);
                pattern.importance = share;
                pattern
            })
            .collect()
    }

    fn naming_patterns(&self, min_share: f64) -> Vec<CodePattern> {
        self.by_style
            .iter()
            .filter_map(|(style, ids)| {
                let share = ids.len() as f64 / self.identifiers as f64;
                if share <= min_share {
                    return None;
                }
                let mut pattern = CodePattern::new(
                    PatternCategory::Naming,
                    format!("{style} naming convention"),
                    format!("{:.0}% of identifiers use {style}", share * 100.0),
                );
                pattern.instances = instances(ids);
                pattern.frequency = ids.len();
                pattern.confidence = share;
                pattern.importance = share;
                Some(pattern)
            })
            .collect()
    }

    fn affix_patterns(&self, min_count: f64) -> Vec<CodePattern> {
        let prefixes = self.prefixes.iter().map(|(p, ids)| {
            (format!("{p}* prefix convention"), format!("identifiers starting with {p}"), ids)
        });
        let suffixes = self.suffixes.iter().map(|(s, ids)| {
            (format!("*{s}* suffix convention"), format!("identifiers ending with {s}"), ids)
        });
        prefixes
            .chain(suffixes)
            .filter(|(_, _, ids)| ids.len() as f64 > min_count)
            .map(|(name, description, ids)| {
                let share = ids.len() as f64 / self.identifiers as f64;
                let mut pattern = CodePattern::new(PatternCategory::Naming, name, description);
                pattern.instances = instances(ids);
                pattern.frequency = ids.len();
                pattern.confidence = (0.5 + share).min(0.9);
                pattern.importance = share;
                pattern
            })
            .collect()
    }
}

fn instances(ids: &[String]) -> Vec<PatternInstance> {
    ids.iter()
        .map(|id| PatternInstance {
            node_id: id.clone(),
            score: 1.0,
        })
        .collect()
}

fn organization_patterns(directories: &[&DirectoryNode]) -> Vec<CodePattern> {
    let mut patterns = Vec::new();

    let features: Vec<&DirectoryNode> = directories
        .iter()
        .copied()
        .filter(|d| !d.path.is_empty())
        .filter(|d| !WELL_KNOWN_DIRS.contains(&d.name.to_lowercase().as_str()))
        .filter(|d| d.children.len() > 1 && d.subdirectories().next().is_some())
        .collect();
    if features.len() >= 3 {
        let mut pattern = CodePattern::new(
            PatternCategory::Organization,
            "feature-based organization",
            "code grouped into feature directories with their own sub-structure",
        );
        pattern.instances = features
            .iter()
            .map(|d| PatternInstance {
                node_id: d.id.clone(),
                score: 1.0,
            })
            .collect();
        pattern.frequency = features.len();
        pattern.confidence = (0.5 + 0.1 * features.len() as f64).min(0.9);
        pattern.importance = features.len() as f64 / directories.len().max(1) as f64;
        patterns.push(pattern);
    }

    let mvc: Vec<Vec<&DirectoryNode>> = ["models", "views", "controllers"]
        .iter()
        .map(|name| {
            directories
                .iter()
                .copied()
                .filter(|d| d.name.eq_ignore_ascii_case(name))
                .collect()
        })
        .collect();
    if mvc.iter().all(|dirs| !dirs.is_empty()) {
        let mut pattern = CodePattern::new(
            PatternCategory::Organization,
            "MVC organization",
            "models, views and controllers directories",
        );
        pattern.instances = mvc
            .iter()
            .flatten()
            .map(|d| PatternInstance {
                node_id: d.id.clone(),
                score: 1.0,
            })
            .collect();
        pattern.frequency = pattern.instances.len();
        pattern.confidence = 0.9;
        pattern.importance = 0.5;
        patterns.push(pattern);
    }
    patterns
}

impl Analyzer for PatternAnalyzer {
    fn id(&self) -> &'static str {
        "pattern"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["language"]
    }

    fn initialize(&mut self, ctx: &mut SharedAnalysisContext) -> Result<()> {
        register_casing_styles(&mut ctx.registry)?;
        for suffix in STRUCTURAL_SUFFIXES {
            ctx.registry.register(
                &format!("suffix:{suffix}"),
                DefinitionCategory::StructuralSuffix,
                &format!("(?i){suffix}$"),
                &format!("*{suffix} types"),
            )?;
        }
        Ok(())
    }

    fn analyze_file(
        &mut self,
        file: &FileNode,
        _content: &str,
        ctx: &mut SharedAnalysisContext,
    ) -> Result<()> {
        self.tally_file(file, ctx);
        Ok(())
    }

    fn revisit_file(&mut self, file: &FileNode, ctx: &mut SharedAnalysisContext) -> Result<()> {
        self.tally_file(file, ctx);
        Ok(())
    }

    fn discover_patterns(&mut self, ctx: &mut SharedAnalysisContext) -> Result<()> {
        if self.identifiers == 0 {
            return Ok(());
        }
        let thresholds = &ctx.options.thresholds;
        let mut patterns = self.structural_patterns(thresholds.structural_min_instances);
        patterns.extend(self.naming_patterns(thresholds.naming_share));
        patterns.extend(self.affix_patterns(thresholds.affix_min_count(self.identifiers)));
        patterns.extend(organization_patterns(&ctx.understanding.tree.directories()));
        sort_for_presentation(&mut patterns);

        debug!(
            "{} patterns from {} identifiers",
            patterns.len(),
            self.identifiers
        );
        ctx.understanding.patterns.extend(patterns);
        Ok(())
    }

    fn cleanup(&mut self) {
        *self = Self::default();
    }
}
