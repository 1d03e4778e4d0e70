//! Packs ranked chunks into a bounded context string.

use tracing::{debug, warn};

use crate::document::ScoredChunk;

/// Context assembled from retrieved chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedContext {
    /// Included chunk texts joined by `\n`, in rank order.
    pub text: String,
    /// Ids of the included chunks, in rank order.
    pub included: Vec<usize>,
    /// Characters of chunk text used.
    pub used: usize,
    /// Number of hits left out.
    pub dropped: usize,
}

impl PackedContext {
    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }
}

/// Greedily packs whole chunks, best first, until the next one overflows.
///
/// The budget counts characters of chunk text; the newline separators are
/// free. Packing stops at the first chunk that does not fit, so a lower ranked
/// short chunk never displaces a higher ranked long one.
#[derive(Debug, Clone, Copy)]
pub struct ContextPacker {
    budget: usize,
}

impl ContextPacker {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn pack(&self, hits: &[ScoredChunk]) -> PackedContext {
        let mut packed = PackedContext::default();
        let mut texts: Vec<&str> = Vec::new();

        for hit in hits {
            let len = hit.chunk.text.chars().count();
            if packed.used + len > self.budget {
                break;
            }
            packed.used += len;
            packed.included.push(hit.chunk.id);
            texts.push(&hit.chunk.text);
        }

        packed.text = texts.join("\n");
        packed.dropped = hits.len() - packed.included.len();

        if packed.is_empty() && !hits.is_empty() {
            warn!(
                budget = self.budget,
                first_chunk_chars = hits[0].chunk.text.chars().count(),
                "context budget exhausted by the top chunk; generating without context"
            );
        } else {
            debug!(
                included = ?packed.included,
                used = packed.used,
                dropped = packed.dropped,
                "packed context"
            );
        }
        packed
    }
}
