//! # resume-rag
//!
//! Retrieval-augmented question answering over a single resume.
//!
//! ## Overview
//!
//! A question goes through a fixed pipeline:
//!
//! 1. a contact-details pre-check that refuses before anything else runs
//! 2. [`Retriever`] — embed the question, rank chunks by cosine similarity,
//!    abstain when nothing is similar enough
//! 3. [`ContextPacker`] — fit the best chunks into a character budget
//! 4. [`PromptBuilder`] — policy, context, recent history, question
//! 5. [`AnswerGenerator`] — call the [`TextGenerator`], containing any failure
//! 6. [`ResponseSanitizer`] — extract the answer and redact contact details
//!
//! [`ResumeAssistant`] wires these together and is the only entry point a
//! front end needs. The corpus is built offline by [`Corpus::build`] and
//! persisted with [`store`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use resume_rag::{ChunkingStrategy, Corpus, HashingEmbeddingProvider, ResumeAssistant};
//!
//! let embedder = Arc::new(HashingEmbeddingProvider::default());
//! let corpus = Corpus::build(&resume_text, ChunkingStrategy::Sentence, embedder.as_ref()).await?;
//!
//! let assistant = ResumeAssistant::builder()
//!     .corpus(corpus)
//!     .embedder(embedder)
//!     .generator(Arc::new(my_generator))
//!     .build()?;
//!
//! println!("{}", assistant.answer("Which projects did the candidate lead?", &[]).await);
//! ```
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Embedding and generation through a local Ollama server |
//! | `fastembed` | In-process all-MiniLM-L6-v2 embeddings |
//! | `full` | Both of the above |

pub mod assistant;
pub mod chunking;
pub mod config;
pub mod corpus;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod index;
pub mod packer;
pub mod pii;
pub mod preparer;
pub mod prompt;
pub mod retriever;
pub mod sanitizer;
pub mod store;

#[cfg(feature = "fastembed")]
pub mod fastembed;
#[cfg(feature = "ollama")]
pub mod ollama;

pub use assistant::{
    AbstentionReason, Answer, AnswerKind, EMPTY_QUESTION_REPLY, FAILURE_REPLY, ResumeAssistant,
    ResumeAssistantBuilder,
};
pub use chunking::{Chunker, ChunkingStrategy, SentenceChunker, WordWindowChunker};
pub use config::{DecodingConfig, RagConfig, RagConfigBuilder};
pub use corpus::{Corpus, CorpusManifest, SharedCorpus};
pub use document::{Chunk, ConversationTurn, Retrieval, ScoredChunk};
pub use embedding::{EmbeddingProvider, HashingEmbeddingProvider};
pub use error::{RagError, Result};
pub use generator::{AnswerGenerator, Generation, TextGenerator};
pub use index::EmbeddingIndex;
pub use packer::{ContextPacker, PackedContext};
pub use preparer::DocumentPreparer;
pub use prompt::{PromptBuilder, PromptPolicy};
pub use retriever::Retriever;
pub use sanitizer::ResponseSanitizer;

#[cfg(feature = "fastembed")]
pub use crate::fastembed::FastEmbedProvider;
#[cfg(feature = "ollama")]
pub use ollama::{OllamaEmbeddingProvider, OllamaGenerator};
