use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use codelens::describe::describe_understanding;
use codelens::embedder::{MockEmbedder, embed_descriptions};
use codelens::{AnalysisOptions, AnalysisStats, CodebaseUnderstanding};

const DEFAULT_STORE: &str = ".codelens/understanding.json";

#[derive(Parser)]
#[command(name = "codelens", about = "Build a structural understanding of a source tree")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a tree from scratch and save the result
    Analyze {
        /// Root directory to analyze
        root: PathBuf,

        /// Output file (defaults to <root>/.codelens/understanding.json)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// JSON analysis options
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Re-analyze changed files on top of a saved understanding
    Update {
        root: PathBuf,

        /// Saved understanding to update in place
        #[arg(long)]
        store: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the counts of a saved understanding
    Stats {
        store: PathBuf,
    },

    /// Export symbol and relationship descriptions as JSON lines
    Describe {
        store: PathBuf,

        /// Attach deterministic mock embeddings with this many dimensions
        #[arg(long)]
        embed_dimensions: Option<usize>,

        /// Descriptions per embedding batch (clamped to 20..=50)
        #[arg(long, default_value_t = 32)]
        batch_size: usize,

        /// Batches embedded at the same time
        #[arg(long, default_value_t = 4)]
        parallelism: usize,
    },
}

fn load_options(path: Option<&Path>) -> Result<AnalysisOptions> {
    let options = match path {
        Some(p) => AnalysisOptions::load(p)?,
        None => AnalysisOptions::default(),
    };
    options.validate()?;
    Ok(options)
}

fn print_run(stats: &AnalysisStats, out: &Path) {
    println!("files indexed:    {}", stats.files_indexed);
    println!("files reused:     {}", stats.files_reused);
    println!("files skipped:    {}", stats.files_skipped);
    println!("files failed:     {}", stats.files_failed);
    println!("nodes:            {}", stats.nodes_extracted);
    println!("relationships:    {}", stats.relationships);
    println!("patterns:         {}", stats.patterns);
    println!("concepts:         {}", stats.concepts);
    println!("peak memory:      {} bytes", stats.peak_memory_bytes);
    println!("elapsed:          {} ms", stats.elapsed_ms);
    for warning in &stats.warnings {
        println!("warning: {warning}");
    }
    println!("saved to {}", out.display());
}

fn print_understanding(u: &CodebaseUnderstanding) {
    println!("id:               {}", u.id);
    println!("root:             {}", u.root_path.display());
    println!("updated:          {}", u.updated_at.to_rfc3339());
    println!("files:            {}", u.tree.file_count());
    println!(
        "languages:        {}",
        u.languages.keys().cloned().collect::<Vec<_>>().join(", ")
    );
    if let Some(lang) = u.dominant_language() {
        println!("dominant:         {lang}");
    }
    println!("nodes:            {}", u.nodes.len());
    println!("relationships:    {}", u.relationships.len());
    println!("patterns:         {}", u.patterns.len());
    for pattern in u.patterns.iter().take(10) {
        println!("  {} (x{}, {:.2})", pattern.name, pattern.frequency, pattern.confidence);
    }
    println!("concepts:         {}", u.concepts.len());
    println!("semantic units:   {}", u.semantic_units.len());
    println!("clusters:         {}", u.clusters.len());
    println!(
        "data flows:       {} flows, {} paths",
        u.data_flow.flows.len(),
        u.data_flow.paths.len()
    );
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { root, out, config } => {
            let options = load_options(config.as_deref())?;
            let out = out.unwrap_or_else(|| root.join(DEFAULT_STORE));
            let (understanding, stats) = codelens::analyze(&root, &options)
                .with_context(|| format!("analysis of {} failed", root.display()))?;
            codelens::save(&understanding, &out)?;
            print_run(&stats, &out);
        }
        Commands::Update { root, store, config } => {
            let options = load_options(config.as_deref())?;
            let (understanding, stats) = match codelens::load(&store) {
                Ok(existing) => codelens::update(&root, existing, &options)?,
                Err(e) if e.is_missing_or_corrupt() => {
                    warn!("{e}; running a full analysis");
                    codelens::analyze(&root, &options)?
                }
                Err(e) => return Err(e.into()),
            };
            codelens::save(&understanding, &store)?;
            print_run(&stats, &store);
        }
        Commands::Stats { store } => {
            let understanding = codelens::load(&store)?;
            info!("Loaded {}", store.display());
            print_understanding(&understanding);
        }
        Commands::Describe {
            store,
            embed_dimensions,
            batch_size,
            parallelism,
        } => {
            let understanding = codelens::load(&store)?;
            let descriptions = describe_understanding(&understanding);
            match embed_dimensions {
                Some(dimensions) => {
                    let embedder = MockEmbedder::new(dimensions);
                    let embeddings =
                        embed_descriptions(&embedder, &descriptions, batch_size, parallelism)?;
                    info!("Embedded {} descriptions", embeddings.len());
                    for (description, embedding) in descriptions.iter().zip(&embeddings) {
                        let line = serde_json::json!({
                            "id": description.id,
                            "text": description.text,
                            "vector": embedding.vector,
                        });
                        println!("{line}");
                    }
                }
                None => {
                    for description in &descriptions {
                        println!("{}", serde_json::to_string(description)?);
                    }
                }
            }
        }
    }

    Ok(())
}
