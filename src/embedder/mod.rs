/// Embedding port for symbol and relationship descriptions.
///
/// The engine never runs a model itself; callers plug an [`Embedder`] in and
/// hand it the output of [`crate::describe::describe_understanding`].
pub mod mock;

use std::thread;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::describe::Description;

pub use mock::MockEmbedder;

/// Batch sizes outside this range are clamped into it.
pub const MIN_BATCH: usize = 20;
pub const MAX_BATCH: usize = 50;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("embedder returned {got} vectors for a batch of {expected}")]
    BatchMismatch { expected: usize, got: usize },

    #[error("embedding worker panicked")]
    WorkerPanicked,
}

/// Text embedding provider.
///
/// Implementations must be `Send + Sync`; batches are embedded from several
/// threads at once.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    fn dimensions(&self) -> usize;
}

/// An embedded description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embedding {
    pub id: String,
    pub vector: Vec<f32>,
}

fn embed_chunk<E: Embedder + ?Sized>(
    embedder: &E,
    chunk: &[Description],
) -> Result<Vec<Embedding>, EmbedderError> {
    let texts: Vec<&str> = chunk.iter().map(|d| d.text.as_str()).collect();
    let vectors = embedder.embed_batch(&texts)?;
    if vectors.len() != chunk.len() {
        return Err(EmbedderError::BatchMismatch {
            expected: chunk.len(),
            got: vectors.len(),
        });
    }
    Ok(chunk
        .iter()
        .zip(vectors)
        .map(|(d, vector)| Embedding {
            id: d.id.clone(),
            vector,
        })
        .collect())
}

/// Embeds `descriptions` in batches of `batch_size` (clamped to 20..=50),
/// running at most `parallelism` batches at a time. Output keeps input order.
pub fn embed_descriptions<E: Embedder + ?Sized>(
    embedder: &E,
    descriptions: &[Description],
    batch_size: usize,
    parallelism: usize,
) -> Result<Vec<Embedding>, EmbedderError> {
    let batch_size = batch_size.clamp(MIN_BATCH, MAX_BATCH);
    let parallelism = parallelism.max(1);
    let batches: Vec<&[Description]> = descriptions.chunks(batch_size).collect();
    debug!(
        "embedding {} descriptions in {} batches ({} at a time)",
        descriptions.len(),
        batches.len(),
        parallelism
    );

    let mut out = Vec::with_capacity(descriptions.len());
    for wave in batches.chunks(parallelism) {
        let results: Vec<Result<Vec<Embedding>, EmbedderError>> = thread::scope(|scope| {
            let handles: Vec<_> = wave
                .iter()
                .map(|chunk| scope.spawn(move || embed_chunk(embedder, chunk)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or(Err(EmbedderError::WorkerPanicked)))
                .collect()
        });
        for result in results {
            out.extend(result?);
        }
    }
    Ok(out)
}
