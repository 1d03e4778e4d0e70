//! Exact nearest-neighbour index over chunk embeddings.
//!
//! [`EmbeddingIndex`] stores one L2-normalized vector per chunk, at the
//! chunk's id. Similarity is the inner product of normalized vectors, which
//! is cosine similarity in `[-1, 1]`. The corpus is a single resume, so a
//! brute-force scan is both exact and fast enough.

use tracing::debug;

use crate::document::Chunk;
use crate::embedding::{EmbeddingProvider, normalize};
use crate::error::{RagError, Result};

/// Similarity metric recorded in persisted indexes.
pub const METRIC: &str = "cosine";

/// An append-only list of normalized vectors; position is the chunk id.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl EmbeddingIndex {
    /// Create an empty index of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension, vectors: Vec::new() }
    }

    /// Create an index from pre-computed vectors, normalizing each one.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexError`] if any vector has the wrong length.
    pub fn from_vectors(dimension: usize, vectors: Vec<Vec<f32>>) -> Result<Self> {
        let mut index = Self { dimension, vectors: Vec::with_capacity(vectors.len()) };
        for vector in vectors {
            index.push(vector)?;
        }
        Ok(index)
    }

    /// Embed every chunk with one batch call and index the results in order.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if embedding fails, or
    /// [`RagError::IndexError`] if the provider returns the wrong number of
    /// vectors or a vector of the wrong dimension.
    pub async fn build(chunks: &[Chunk], provider: &dyn EmbeddingProvider) -> Result<Self> {
        let dimension = provider.dimensions();
        if chunks.is_empty() {
            return Ok(Self::new(dimension));
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = provider.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::IndexError(format!(
                "provider '{}' returned {} embeddings for {} chunks",
                provider.name(),
                vectors.len(),
                chunks.len()
            )));
        }

        let index = Self::from_vectors(dimension, vectors)?;
        debug!(count = index.len(), dimension, "built embedding index");
        Ok(index)
    }

    /// Append a vector, normalizing it first.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexError`] if the vector has the wrong length.
    pub fn push(&mut self, mut vector: Vec<f32>) -> Result<()> {
        self.check_dimension(&vector)?;
        normalize(&mut vector);
        self.vectors.push(vector);
        Ok(())
    }

    /// Return up to `k` `(id, score)` pairs, best first, ties by lowest id.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexError`] if the query has the wrong length.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        self.check_dimension(query)?;
        if k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        normalize(&mut query);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(id, vector)| (id, dot(vector, &query)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Dimensionality of every vector in the index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The stored (normalized) vectors in id order.
    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RagError::IndexError(format!(
                "expected a {}-dimensional vector, got {}",
                self.dimension,
                vector.len()
            )));
        }
        Ok(())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
