//! Data types for chunks, retrieval results, and conversation history.

use serde::{Deserialize, Serialize};

/// A retrievable unit of source-document text.
///
/// Ids are assigned in document order starting at 0 when the corpus is built
/// and never change afterwards. The chunk's embedding lives in the
/// [`EmbeddingIndex`](crate::EmbeddingIndex) at the same position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Stable 0-based position of the chunk in the source document.
    pub id: usize,
    /// The text content of the chunk.
    pub text: String,
}

/// A retrieved [`Chunk`] paired with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity in `[-1, 1]` (higher is more relevant).
    pub score: f32,
}

/// The outcome of a retrieval.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// Hits ordered by descending score, ties broken by lowest chunk id.
    Relevant(Vec<ScoredChunk>),
    /// Nothing in the corpus is similar enough to ground an answer.
    NoRelevantContent {
        /// The best score seen, if the corpus was searched at all.
        best_score: Option<f32>,
    },
}

impl Retrieval {
    /// Whether the retriever abstained.
    pub fn is_abstention(&self) -> bool {
        matches!(self, Self::NoRelevantContent { .. })
    }

    /// The retrieved hits, or an empty slice when abstaining.
    pub fn hits(&self) -> &[ScoredChunk] {
        match self {
            Self::Relevant(hits) => hits,
            Self::NoRelevantContent { .. } => &[],
        }
    }
}

/// One prior question/answer exchange, used read-only as prompt context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    /// What the user asked.
    pub question: String,
    /// What the assistant replied.
    pub answer: String,
}

impl ConversationTurn {
    /// Create a turn from a question and its answer.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }
}
