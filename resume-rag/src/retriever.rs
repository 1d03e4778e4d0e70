//! Top-K retrieval with an abstention signal.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::corpus::Corpus;
use crate::document::{Retrieval, ScoredChunk};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Finds the chunks most similar to a question.
///
/// When even the best hit scores below the abstention threshold the retriever
/// reports [`Retrieval::NoRelevantContent`] instead of weak hits, so callers
/// can abstain rather than answer from unrelated text.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    abstention_threshold: f32,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, abstention_threshold: f32) -> Self {
        Self { embedder, abstention_threshold }
    }

    pub fn abstention_threshold(&self) -> f32 {
        self.abstention_threshold
    }

    /// Embed `query` and return up to `k` hits from `corpus`.
    ///
    /// An empty corpus abstains without calling the embedder.
    ///
    /// # Errors
    ///
    /// Propagates embedding and index errors.
    #[instrument(skip_all, fields(k = k, chunks = corpus.len()))]
    pub async fn retrieve(&self, corpus: &Corpus, query: &str, k: usize) -> Result<Retrieval> {
        if corpus.is_empty() {
            debug!("corpus is empty, abstaining");
            return Ok(Retrieval::NoRelevantContent { best_score: None });
        }

        let hits = self.search(corpus, query, k).await?;
        let best_score = hits.first().map(|hit| hit.score);
        debug!(
            best_score,
            threshold = self.abstention_threshold,
            scores = ?hits.iter().map(|h| (h.chunk.id, h.score)).collect::<Vec<_>>(),
            "retrieved"
        );

        match best_score {
            Some(score) if score >= self.abstention_threshold => Ok(Retrieval::Relevant(hits)),
            _ => Ok(Retrieval::NoRelevantContent { best_score }),
        }
    }

    /// Raw ranked hits with no abstention applied.
    ///
    /// # Errors
    ///
    /// Propagates embedding and index errors.
    pub async fn search(&self, corpus: &Corpus, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if corpus.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        corpus
            .index()
            .search(&query_vector, k)?
            .into_iter()
            .map(|(id, score)| {
                let chunk = corpus.chunk(id).cloned().ok_or_else(|| {
                    RagError::IndexError(format!("index returned unknown chunk id {id}"))
                })?;
                Ok(ScoredChunk { chunk, score })
            })
            .collect()
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.name())
            .field("abstention_threshold", &self.abstention_threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingStrategy;
    use crate::embedding::HashingEmbeddingProvider;

    const TEXT: &str = "Four years of experience with Kafka streaming. \
                        Built REST services in Spring Boot. \
                        Holds a master's degree in computer science.";

    async fn corpus(provider: &HashingEmbeddingProvider) -> Corpus {
        Corpus::build(TEXT, ChunkingStrategy::Sentence, provider).await.unwrap()
    }

    #[tokio::test]
    async fn relevant_question_returns_ranked_hits() {
        let provider = HashingEmbeddingProvider::default();
        let corpus = corpus(&provider).await;
        let retriever = Retriever::new(Arc::new(provider), 0.2);

        let retrieval = retriever.retrieve(&corpus, "experience with Kafka", 2).await.unwrap();
        let hits = retrieval.hits();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.id, 0);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn unrelated_question_abstains() {
        let provider = HashingEmbeddingProvider::default();
        let corpus = corpus(&provider).await;
        let retriever = Retriever::new(Arc::new(provider), 0.5);

        let retrieval = retriever.retrieve(&corpus, "favourite pizza topping", 3).await.unwrap();
        assert!(retrieval.is_abstention());
        assert!(matches!(retrieval, Retrieval::NoRelevantContent { best_score: Some(_) }));
    }

    #[tokio::test]
    async fn empty_corpus_abstains_without_score() {
        let provider = HashingEmbeddingProvider::default();
        let corpus = Corpus::empty(&provider, ChunkingStrategy::Sentence);
        let retriever = Retriever::new(Arc::new(provider), 0.25);

        let retrieval = retriever.retrieve(&corpus, "anything", 3).await.unwrap();
        assert_eq!(retrieval, Retrieval::NoRelevantContent { best_score: None });
    }

    #[tokio::test]
    async fn retrieval_is_deterministic() {
        let provider = HashingEmbeddingProvider::default();
        let corpus = corpus(&provider).await;
        let retriever = Retriever::new(Arc::new(provider), 0.0);

        let first = retriever.retrieve(&corpus, "Spring Boot services", 3).await.unwrap();
        let second = retriever.retrieve(&corpus, "Spring Boot services", 3).await.unwrap();
        assert_eq!(first, second);
    }
}
