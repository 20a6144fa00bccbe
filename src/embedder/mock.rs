/// Deterministic embedder for tests and dry runs.
use sha2::{Digest, Sha256};

use super::{Embedder, EmbedderError};

/// Produces unit-length vectors derived from the SHA-256 of the text, so
/// equal descriptions always embed identically.
#[derive(Debug, Clone, Copy)]
pub struct MockEmbedder {
    pub dimensions: usize,
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self { dimensions: 384 }
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let digest = Sha256::digest(text.as_bytes());
        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|i| {
                let byte = digest[i % digest.len()];
                // Rotate per lap so long vectors don't just repeat the digest.
                let lap = (i / digest.len()) as u32;
                f32::from(byte.rotate_left(lap % 8)) / 255.0 - 0.5
            })
            .collect();

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
