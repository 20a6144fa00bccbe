use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::AnalysisStats;
use super::discovery::discover;
use crate::analyzer::Analyzer;
use crate::cluster::cluster;
use crate::config::AnalysisOptions;
use crate::context::{Phase, SharedAnalysisContext};
use crate::dataflow::analyze_data_flows;
use crate::error::{AnalysisError, Result};
use crate::fs::FileSystem;
use crate::model::{CodebaseUnderstanding, FileNode, FileSystemTree, Relationship};

/// What an incremental run knows about the previous snapshot.
#[derive(Debug, Default)]
pub struct Baseline {
    /// Previous content hash per file path.
    pub hashes: HashMap<String, String>,
    /// Every relationship of the previous snapshot.
    pub relationships: Vec<Relationship>,
}

/// Orders analyzers by their dependencies, breaking ties by priority then id.
pub fn order_analyzers(analyzers: Vec<Box<dyn Analyzer>>) -> Result<Vec<Box<dyn Analyzer>>> {
    let mut by_id: BTreeMap<&'static str, Box<dyn Analyzer>> = BTreeMap::new();
    for analyzer in analyzers {
        let id = analyzer.id();
        if by_id.insert(id, analyzer).is_some() {
            return Err(AnalysisError::Dependency(format!("duplicate analyzer id {id}")));
        }
    }
    for (id, analyzer) in &by_id {
        for dep in analyzer.dependencies() {
            if !by_id.contains_key(dep) {
                return Err(AnalysisError::Dependency(format!(
                    "{id} depends on unknown analyzer {dep}"
                )));
            }
        }
    }

    let mut placed: BTreeSet<&'static str> = BTreeSet::new();
    let mut order: Vec<&'static str> = Vec::with_capacity(by_id.len());
    while order.len() < by_id.len() {
        let next = by_id
            .iter()
            .filter(|(id, _)| !placed.contains(*id))
            .filter(|(_, a)| a.dependencies().iter().all(|d| placed.contains(d)))
            .min_by_key(|(id, a)| (a.priority(), **id))
            .map(|(id, _)| *id);
        match next {
            Some(id) => {
                placed.insert(id);
                order.push(id);
            }
            None => {
                let stuck: Vec<&str> = by_id
                    .keys()
                    .filter(|id| !placed.contains(*id))
                    .copied()
                    .collect();
                return Err(AnalysisError::Dependency(format!(
                    "dependency cycle among {}",
                    stuck.join(", ")
                )));
            }
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|id| by_id.remove(id))
        .collect())
}

fn phase_error(analyzer: &str, phase: Phase, error: AnalysisError) -> AnalysisError {
    match error {
        AnalysisError::Analyzer { .. } => error,
        other => AnalysisError::Analyzer {
            analyzer: analyzer.to_string(),
            phase,
            message: other.to_string(),
        },
    }
}

/// Drives the analyzers through the phases of one run.
pub struct PipelineCoordinator<F: FileSystem> {
    fs: F,
    analyzers: Vec<Box<dyn Analyzer>>,
}

impl<F: FileSystem> PipelineCoordinator<F> {
    pub fn new(fs: F, analyzers: Vec<Box<dyn Analyzer>>) -> Result<Self> {
        Ok(Self {
            fs,
            analyzers: order_analyzers(analyzers)?,
        })
    }

    /// Analyzer ids in execution order.
    pub fn analyzer_ids(&self) -> Vec<&'static str> {
        self.analyzers.iter().map(|a| a.id()).collect()
    }

    fn each_analyzer<H>(&mut self, ctx: &mut SharedAnalysisContext, mut hook: H) -> Result<()>
    where
        H: FnMut(&mut dyn Analyzer, &mut SharedAnalysisContext) -> Result<()>,
    {
        let phase = ctx.current_phase();
        for analyzer in self.analyzers.iter_mut() {
            let started = Instant::now();
            hook(analyzer.as_mut(), ctx).map_err(|e| phase_error(analyzer.id(), phase, e))?;
            debug!(
                "{} finished {phase:?} in {:?}",
                analyzer.id(),
                started.elapsed()
            );
        }
        Ok(())
    }

    /// Runs every phase over `root`, filling `understanding`.
    ///
    /// With a `baseline`, files whose hash is unchanged keep their nodes and
    /// are revisited instead of re-analyzed.
    pub fn run(
        &mut self,
        root: &Path,
        mut understanding: CodebaseUnderstanding,
        options: &AnalysisOptions,
        baseline: Option<Baseline>,
    ) -> Result<(CodebaseUnderstanding, AnalysisStats)> {
        let started = Instant::now();
        let mut stats = AnalysisStats::default();

        understanding.tree = FileSystemTree::new(&understanding.tree.root.name);
        understanding.relationships.clear();
        understanding.languages.clear();
        understanding.clear_derived();

        let mut ctx = SharedAnalysisContext::new(understanding, options.clone());

        // INITIALIZATION
        info!("Analyzing {}", root.display());
        self.each_analyzer(&mut ctx, |a, ctx| a.initialize(ctx))?;

        // DISCOVERY
        ctx.advance_to(Phase::Discovery)?;
        let cache = ctx.cache().clone();
        let discovery = discover(&self.fs, root, options, &cache, &mut ctx.understanding.tree)?;
        stats.files_skipped = discovery.skipped;
        for warning in discovery.warnings {
            ctx.warn(warning);
        }

        let baseline = baseline.unwrap_or_default();
        let unchanged: BTreeSet<String> = discovery
            .files
            .iter()
            .filter(|f| baseline.hashes.get(&f.path) == Some(&f.content_hash))
            .map(|f| f.path.clone())
            .collect();
        let dropped = {
            let nodes = &mut ctx.understanding.nodes;
            let before = nodes.len();
            nodes.retain(|_, n| unchanged.contains(&n.path));
            before - nodes.len()
        };
        for rel in baseline.relationships {
            if unchanged.contains(&rel.origin) {
                ctx.carry_relationship(rel);
            }
        }
        if !baseline.hashes.is_empty() {
            info!(
                "{} unchanged, {} new or changed, {dropped} stale nodes dropped",
                unchanged.len(),
                discovery.files.len() - unchanged.len()
            );
        }

        // CONTENT_ANALYSIS
        ctx.advance_to(Phase::ContentAnalysis)?;
        for file in &discovery.files {
            if unchanged.contains(&file.path) {
                stats.files_reused += 1;
                if self.revisit(file, &mut ctx) {
                    stats.files_indexed += 1;
                } else {
                    stats.files_failed += 1;
                }
                continue;
            }
            let absolute = root.join(&file.path);
            let content = match cache.acquire(&file.path, || {
                self.fs.read(&absolute).map(|c| c.content)
            }) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping {}: {e}", file.path);
                    ctx.warn(format!("{}: {e}", file.path));
                    stats.files_skipped += 1;
                    continue;
                }
            };
            if self.analyze(file, &content, &mut ctx) {
                stats.files_indexed += 1;
            } else {
                stats.files_failed += 1;
            }
        }
        let purged = cache.relieve_memory();
        debug!("released {purged} cached files after content analysis");

        // RELATIONSHIP_MAPPING
        ctx.advance_to(Phase::RelationshipMapping)?;
        self.each_analyzer(&mut ctx, |a, ctx| a.process_relationships(ctx))?;

        // PATTERN_DISCOVERY
        ctx.advance_to(Phase::PatternDiscovery)?;
        self.each_analyzer(&mut ctx, |a, ctx| a.discover_patterns(ctx))?;

        // INTEGRATION
        ctx.advance_to(Phase::Integration)?;
        self.each_analyzer(&mut ctx, |a, ctx| a.integrate_analysis(ctx))?;
        ctx.understanding.clusters = cluster(&ctx.understanding, &options.cluster);
        ctx.understanding.data_flow = analyze_data_flows(&ctx.understanding, &options.flow);

        // CLEANUP
        ctx.advance_to(Phase::Cleanup)?;
        for analyzer in self.analyzers.iter_mut() {
            analyzer.cleanup();
        }

        let (mut understanding, warnings, cache) = ctx.into_parts();
        understanding.updated_at = Utc::now();
        stats.nodes_extracted = understanding.nodes.len();
        stats.patterns = understanding.patterns.len();
        stats.relationships = understanding.relationships.len();
        stats.concepts = understanding.concepts.len();
        stats.peak_memory_bytes = cache.peak_bytes();
        stats.warnings = warnings;
        stats.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            "Analysis finished: {} files, {} nodes, {} relationships, {} patterns in {}ms",
            stats.files_indexed,
            stats.nodes_extracted,
            stats.relationships,
            stats.patterns,
            stats.elapsed_ms
        );
        Ok((understanding, stats))
    }

    /// Runs `analyze_file` on every analyzer; a failing analyzer is skipped
    /// for this file only. Returns false when any analyzer failed.
    fn analyze(&mut self, file: &FileNode, content: &str, ctx: &mut SharedAnalysisContext) -> bool {
        let mut ok = true;
        for analyzer in self.analyzers.iter_mut() {
            if let Err(e) = analyzer.analyze_file(file, content, ctx) {
                warn!("{} failed on {}: {e}", analyzer.id(), file.path);
                ctx.warn(format!("{} ({}): {e}", file.path, analyzer.id()));
                ok = false;
            }
        }
        ok
    }

    fn revisit(&mut self, file: &FileNode, ctx: &mut SharedAnalysisContext) -> bool {
        let mut ok = true;
        for analyzer in self.analyzers.iter_mut() {
            if let Err(e) = analyzer.revisit_file(file, ctx) {
                warn!("{} failed to revisit {}: {e}", analyzer.id(), file.path);
                ctx.warn(format!("{} ({}): {e}", file.path, analyzer.id()));
                ok = false;
            }
        }
        ok
    }
}
