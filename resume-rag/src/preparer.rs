//! Turns raw resume text into cleaned, numbered chunks.

use tracing::debug;

use crate::chunking::{Chunker, ChunkingStrategy};
use crate::document::Chunk;
use crate::pii;

/// Cleans contact details out of the source document and chunks the rest.
pub struct DocumentPreparer {
    chunker: Box<dyn Chunker>,
}

impl DocumentPreparer {
    /// Create a preparer for the given chunking strategy.
    pub fn new(strategy: ChunkingStrategy) -> Self {
        Self { chunker: strategy.chunker() }
    }

    /// Create a preparer around a custom chunker.
    pub fn with_chunker(chunker: Box<dyn Chunker>) -> Self {
        Self { chunker }
    }

    /// The strategy chunks are produced with.
    pub fn strategy(&self) -> ChunkingStrategy {
        self.chunker.strategy()
    }

    /// Scrub contact details from `raw_text` and split it into chunks.
    ///
    /// Chunk ids follow document order from 0. Preparing the same text twice
    /// yields identical chunks. Blank input yields no chunks.
    pub fn prepare(&self, raw_text: &str) -> Vec<Chunk> {
        let cleaned = pii::scrub_source(raw_text);
        let chunks = self.chunker.chunk(&cleaned);
        debug!(
            strategy = %self.chunker.strategy(),
            input_chars = raw_text.chars().count(),
            chunks = chunks.len(),
            "prepared source document"
        );
        chunks
    }
}

impl Default for DocumentPreparer {
    fn default() -> Self {
        Self::new(ChunkingStrategy::default())
    }
}

impl std::fmt::Debug for DocumentPreparer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentPreparer").field("strategy", &self.strategy()).finish()
    }
}
