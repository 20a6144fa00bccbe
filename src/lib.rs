//! # codelens — emergent codebase understanding
//!
//! Walks a source tree and builds a queryable model of it: languages, code
//! nodes, containment/import/inheritance/call/similarity relationships,
//! naming and structural patterns, concepts, semantic units, clusters and
//! data flows.
//!
//! ## Architecture
//!
//! - **[`model`]** — The `CodebaseUnderstanding` aggregate and its entities
//! - **[`context`]** — Shared analysis context (blackboard, pattern registry, content cache)
//! - **[`fs`]** — File system port and the local-disk adapter
//! - **[`extract`]** — Tree-sitter symbol extraction with a regex fallback
//! - **[`analyzer`]** — Language, pattern, relationship and semantic analyzers
//! - **[`pipeline`]** — Discovery and the phase coordinator
//! - **[`cluster`]** / **[`dataflow`]** — Integration-phase clustering and data-flow graphs
//! - **[`store`]** — JSON persistence
//! - **[`describe`]** / **[`embedder`]** — Text export and the embedding port
//! - **[`engine`]** — `analyze`, `update`, `cluster`, `analyze_data_flows`, `save`, `load`

pub mod analyzer;
pub mod cluster;
pub mod config;
pub mod context;
pub mod dataflow;
pub mod describe;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fs;
pub mod model;
pub mod pipeline;
pub mod store;

pub use config::{AnalysisOptions, ClusterOptions, FlowOptions, Thresholds};
pub use engine::{analyze, analyze_data_flows, cluster, load, save, update};
pub use error::{AnalysisError, StoreError};
pub use model::CodebaseUnderstanding;
pub use pipeline::AnalysisStats;
