//! The chunk list, its embedding index, and the build identity, as one unit.
//!
//! A [`Corpus`] is immutable once constructed. [`SharedCorpus`] holds the
//! current corpus behind an `Arc` so each request reads one consistent
//! snapshot while a rebuild prepares its replacement off to the side.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::chunking::ChunkingStrategy;
use crate::document::Chunk;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::EmbeddingIndex;
use crate::preparer::DocumentPreparer;

/// Identifies how a corpus was built. Persisted with both artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusManifest {
    /// Name of the embedding model that produced the vectors.
    pub embedding_model: String,
    /// Vector dimensionality.
    pub dimension: usize,
    /// Chunking strategy the chunks were produced with.
    pub chunking: ChunkingStrategy,
    /// SHA-256 over the chunk texts, see [`fingerprint`].
    pub fingerprint: String,
}

/// SHA-256 over the chunk texts in order, hex encoded.
///
/// Each text is prefixed by its byte length so that different splits of the
/// same document hash differently.
pub fn fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update((chunk.text.len() as u64).to_le_bytes());
        hasher.update(chunk.text.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Chunks plus their index, guaranteed to describe the same build.
#[derive(Debug, Clone)]
pub struct Corpus {
    chunks: Vec<Chunk>,
    index: EmbeddingIndex,
    manifest: CorpusManifest,
}

impl Corpus {
    /// Prepare `raw_text`, embed every chunk, and assemble a corpus.
    ///
    /// # Errors
    ///
    /// Propagates embedding and index errors.
    pub async fn build(
        raw_text: &str,
        strategy: ChunkingStrategy,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        let chunks = DocumentPreparer::new(strategy).prepare(raw_text);
        let index = EmbeddingIndex::build(&chunks, provider).await?;
        let manifest = CorpusManifest {
            embedding_model: provider.name().to_string(),
            dimension: provider.dimensions(),
            chunking: strategy,
            fingerprint: fingerprint(&chunks),
        };
        info!(
            chunks = chunks.len(),
            model = %manifest.embedding_model,
            dimension = manifest.dimension,
            chunking = %strategy,
            "built corpus"
        );
        Self::from_parts(chunks, index, manifest)
    }

    /// A corpus with no content, built for `provider`.
    pub fn empty(provider: &dyn EmbeddingProvider, strategy: ChunkingStrategy) -> Self {
        Self {
            chunks: Vec::new(),
            index: EmbeddingIndex::new(provider.dimensions()),
            manifest: CorpusManifest {
                embedding_model: provider.name().to_string(),
                dimension: provider.dimensions(),
                chunking: strategy,
                fingerprint: fingerprint(&[]),
            },
        }
    }

    /// Assemble a corpus from parts, checking that they belong together.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::BuildInconsistency`] if the chunk and vector counts
    /// differ, chunk ids are not `0..n` in order, the index dimension differs
    /// from the manifest, or the fingerprint does not match the chunks.
    pub fn from_parts(
        chunks: Vec<Chunk>,
        index: EmbeddingIndex,
        manifest: CorpusManifest,
    ) -> Result<Self> {
        if chunks.len() != index.len() {
            return Err(RagError::BuildInconsistency(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                index.len()
            )));
        }
        if let Some(chunk) = chunks.iter().enumerate().find(|(pos, c)| c.id != *pos).map(|(_, c)| c)
        {
            return Err(RagError::BuildInconsistency(format!(
                "chunk ids are not sequential: found id {} out of place",
                chunk.id
            )));
        }
        if index.dimension() != manifest.dimension {
            return Err(RagError::BuildInconsistency(format!(
                "index dimension {} does not match manifest dimension {}",
                index.dimension(),
                manifest.dimension
            )));
        }
        let actual = fingerprint(&chunks);
        if actual != manifest.fingerprint {
            return Err(RagError::BuildInconsistency(format!(
                "chunk fingerprint {actual} does not match manifest fingerprint {}",
                manifest.fingerprint
            )));
        }
        Ok(Self { chunks, index, manifest })
    }

    /// Verify that `provider` produces vectors comparable with this corpus.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::BuildInconsistency`] on a model or dimension mismatch.
    pub fn check_embedder(&self, provider: &dyn EmbeddingProvider) -> Result<()> {
        if provider.dimensions() != self.manifest.dimension {
            return Err(RagError::BuildInconsistency(format!(
                "embedder '{}' produces {}-dimensional vectors, corpus was built with {}",
                provider.name(),
                provider.dimensions(),
                self.manifest.dimension
            )));
        }
        if provider.name() != self.manifest.embedding_model {
            return Err(RagError::BuildInconsistency(format!(
                "embedder '{}' differs from corpus model '{}'",
                provider.name(),
                self.manifest.embedding_model
            )));
        }
        Ok(())
    }

    /// The chunk with the given id.
    pub fn chunk(&self, id: usize) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    /// All chunks in id order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    pub fn manifest(&self) -> &CorpusManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// The current [`Corpus`], swappable at runtime.
///
/// Readers take an `Arc` snapshot and never observe a half-built corpus.
/// Rebuilds are serialized and publish with a single write.
#[derive(Debug)]
pub struct SharedCorpus {
    current: RwLock<Arc<Corpus>>,
    rebuild: Mutex<()>,
}

impl SharedCorpus {
    pub fn new(corpus: Corpus) -> Self {
        Self { current: RwLock::new(Arc::new(corpus)), rebuild: Mutex::new(()) }
    }

    /// The corpus as of now. Holds no lock after returning.
    pub async fn snapshot(&self) -> Arc<Corpus> {
        Arc::clone(&*self.current.read().await)
    }

    /// Replace the current corpus.
    pub async fn publish(&self, corpus: Corpus) {
        *self.current.write().await = Arc::new(corpus);
    }

    /// Build a new corpus from `raw_text` and publish it.
    ///
    /// Only one rebuild runs at a time; a second caller waits for the first.
    /// Readers keep seeing the old corpus until the new one is complete. On
    /// error the old corpus stays in place.
    ///
    /// # Errors
    ///
    /// Propagates build errors.
    pub async fn rebuild(
        &self,
        raw_text: &str,
        strategy: ChunkingStrategy,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Arc<Corpus>> {
        let _guard = self.rebuild.lock().await;
        let corpus = Arc::new(Corpus::build(raw_text, strategy, provider).await?);
        *self.current.write().await = Arc::clone(&corpus);
        info!(chunks = corpus.len(), "published rebuilt corpus");
        Ok(corpus)
    }

    /// Wait until no rebuild is in flight.
    pub async fn wait_for_rebuild(&self) {
        drop(self.rebuild.lock().await);
    }
}
