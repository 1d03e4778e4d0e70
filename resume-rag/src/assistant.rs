//! The question-answering entry point.
//!
//! [`ResumeAssistant`] is constructed once at startup and then shared. It
//! composes the retriever, packer, prompt builder, generator, and sanitizer
//! into a single call that always yields a user-facing string.
//!
//! # Example
//!
//! ```rust,ignore
//! use resume_rag::{ResumeAssistant, RagConfig, store};
//!
//! let assistant = ResumeAssistant::builder()
//!     .config(RagConfig::default())
//!     .corpus(store::load("models")?)
//!     .embedder(Arc::new(embedder))
//!     .generator(Arc::new(generator))
//!     .build()?;
//!
//! let reply = assistant.answer("What does the candidate do in their current role?", &[]).await;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::config::RagConfig;
use crate::corpus::{Corpus, SharedCorpus};
use crate::document::{ConversationTurn, Retrieval, ScoredChunk};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generator::{AnswerGenerator, Generation, TextGenerator};
use crate::packer::ContextPacker;
use crate::prompt::{PromptBuilder, PromptPolicy};
use crate::retriever::Retriever;
use crate::sanitizer::ResponseSanitizer;
use crate::store;

/// Reply to a blank question.
pub const EMPTY_QUESTION_REPLY: &str = "Please ask a question.";
/// Reply when anything between retrieval and generation fails.
pub const FAILURE_REPLY: &str =
    "Sorry, something went wrong while generating an answer. Please try again.";

/// Why the assistant declined to answer from the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbstentionReason {
    /// Nothing in the corpus was similar enough to the question.
    EmptyRetrieval,
    /// The model itself answered with the abstention phrase.
    ModelAbstained,
}

/// How an [`Answer`] came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    Grounded,
    Abstained(AbstentionReason),
    Refused,
    Failed,
    EmptyQuestion,
}

/// A user-facing reply and how it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub kind: AnswerKind,
}

impl Answer {
    fn new(text: impl Into<String>, kind: AnswerKind) -> Self {
        Self { text: text.into(), kind }
    }
}

/// Answers questions about one resume.
pub struct ResumeAssistant {
    config: RagConfig,
    corpus: SharedCorpus,
    embedder: Arc<dyn EmbeddingProvider>,
    retriever: Retriever,
    packer: ContextPacker,
    prompts: PromptBuilder,
    generator: AnswerGenerator,
    sanitizer: ResponseSanitizer,
}

impl ResumeAssistant {
    /// Create a new [`ResumeAssistantBuilder`].
    pub fn builder() -> ResumeAssistantBuilder {
        ResumeAssistantBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn policy(&self) -> &PromptPolicy {
        self.prompts.policy()
    }

    /// Answer `question`, given earlier turns of the conversation.
    ///
    /// Never fails: errors are logged and replaced by a fixed message.
    pub async fn answer(&self, question: &str, history: &[ConversationTurn]) -> String {
        self.respond(question, history).await.text
    }

    /// Like [`answer`](Self::answer), but also reports how the reply came about.
    #[instrument(
        skip_all,
        fields(question_chars = question.chars().count(), history = history.len())
    )]
    pub async fn respond(&self, question: &str, history: &[ConversationTurn]) -> Answer {
        let question = question.trim();
        if question.is_empty() {
            return Answer::new(EMPTY_QUESTION_REPLY, AnswerKind::EmptyQuestion);
        }

        let policy = self.prompts.policy();
        if self.generator.is_pii_request(question) {
            warn!("question asks for contact details, refusing");
            return Answer::new(policy.refusal_phrase.clone(), AnswerKind::Refused);
        }

        let corpus = self.corpus.snapshot().await;
        let hits = match self.retriever.retrieve(&corpus, question, self.config.top_k).await {
            Ok(Retrieval::Relevant(hits)) => hits,
            Ok(Retrieval::NoRelevantContent { best_score }) => {
                info!(?best_score, outcome = "abstained", "no relevant content");
                return Answer::new(
                    self.sanitizer.abstention_phrase(),
                    AnswerKind::Abstained(AbstentionReason::EmptyRetrieval),
                );
            }
            Err(e) => {
                error!(error = %e, "retrieval failed");
                return Answer::new(FAILURE_REPLY, AnswerKind::Failed);
            }
        };

        let context = self.packer.pack(&hits);
        let prompt = self.prompts.build(&context.text, question, history);

        let answer = match self.generator.generate(question, &prompt, &self.config.decoding).await {
            Generation::Refused => Answer::new(policy.refusal_phrase.clone(), AnswerKind::Refused),
            Generation::Failed { .. } => Answer::new(FAILURE_REPLY, AnswerKind::Failed),
            Generation::Completed { raw } => {
                let text = self.sanitizer.sanitize(&raw, &prompt);
                let kind = if self.sanitizer.is_abstention(&text) {
                    AnswerKind::Abstained(AbstentionReason::ModelAbstained)
                } else {
                    AnswerKind::Grounded
                };
                Answer::new(text, kind)
            }
        };

        info!(
            outcome = ?answer.kind,
            context_chunks = ?context.included,
            answer_chars = answer.text.chars().count(),
            "answered question"
        );
        answer
    }

    /// Ranked hits for `query` with no abstention or generation.
    ///
    /// # Errors
    ///
    /// Propagates embedding and index errors.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let corpus = self.corpus.snapshot().await;
        self.retriever.search(&corpus, query, k).await
    }

    /// What the retriever would return for `query`, abstention included.
    ///
    /// # Errors
    ///
    /// Propagates embedding and index errors.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Retrieval> {
        let corpus = self.corpus.snapshot().await;
        self.retriever.retrieve(&corpus, query, k).await
    }

    /// The corpus requests currently read from.
    pub async fn corpus(&self) -> Arc<Corpus> {
        self.corpus.snapshot().await
    }

    /// Rebuild the corpus from new source text and publish it.
    ///
    /// Requests in flight finish against the old corpus. Returns the new
    /// chunk count.
    ///
    /// # Errors
    ///
    /// Propagates build errors; the old corpus stays in place.
    pub async fn rebuild(&self, raw_text: &str) -> Result<usize> {
        let corpus =
            self.corpus.rebuild(raw_text, self.config.chunking, self.embedder.as_ref()).await?;
        Ok(corpus.len())
    }

    /// Persist the current corpus to `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PersistenceError`] if writing fails.
    pub async fn save(&self, dir: impl Into<PathBuf>) -> Result<()> {
        let dir = dir.into();
        let corpus = self.corpus.snapshot().await;
        let target = dir.display().to_string();
        tokio::task::spawn_blocking(move || store::save(&corpus, dir)).await.map_err(|e| {
            RagError::PersistenceError { path: target, message: e.to_string() }
        })?
    }

    /// Wait for any in-flight rebuild, then log teardown.
    pub async fn shutdown(&self) {
        self.corpus.wait_for_rebuild().await;
        info!(backend = self.generator.backend_name(), "resume assistant shut down");
    }
}

impl std::fmt::Debug for ResumeAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeAssistant")
            .field("config", &self.config)
            .field("retriever", &self.retriever)
            .field("generator", &self.generator)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`ResumeAssistant`].
///
/// `corpus`, `embedder`, and `generator` are required. `config` and `policy`
/// fall back to their defaults.
#[derive(Default)]
pub struct ResumeAssistantBuilder {
    config: Option<RagConfig>,
    policy: Option<PromptPolicy>,
    corpus: Option<Corpus>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl ResumeAssistantBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn policy(mut self, policy: PromptPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Set the corpus to serve, loaded from disk or freshly built.
    pub fn corpus(mut self, corpus: Corpus) -> Self {
        self.corpus = Some(corpus);
        self
    }

    /// Set the embedding provider. Must be the one the corpus was built with.
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the [`ResumeAssistant`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required part is missing or the
    /// configuration is invalid, and [`RagError::BuildInconsistency`] if the
    /// embedder does not match the corpus.
    pub fn build(self) -> Result<ResumeAssistant> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let corpus =
            self.corpus.ok_or_else(|| RagError::ConfigError("corpus is required".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::ConfigError("embedder is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;

        corpus.check_embedder(embedder.as_ref())?;

        let policy = self.policy.unwrap_or_default();
        info!(
            chunks = corpus.len(),
            model = %corpus.manifest().embedding_model,
            backend = generator.name(),
            top_k = config.top_k,
            threshold = config.abstention_threshold,
            "resume assistant ready"
        );

        Ok(ResumeAssistant {
            retriever: Retriever::new(Arc::clone(&embedder), config.abstention_threshold),
            packer: ContextPacker::new(config.context_budget),
            prompts: PromptBuilder::new(policy.clone(), config.history_window),
            generator: AnswerGenerator::new(generator, config.generation_timeout()),
            sanitizer: ResponseSanitizer::new(policy.abstention_phrase),
            corpus: SharedCorpus::new(corpus),
            embedder,
            config,
        })
    }
}
