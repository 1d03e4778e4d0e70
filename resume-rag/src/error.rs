//! Error types for the `resume-rag` crate.

use thiserror::Error;

/// Errors that can occur while building, loading, or querying the corpus.
///
/// Only startup paths surface these to a caller. The request path
/// ([`ResumeAssistant::answer`](crate::ResumeAssistant::answer)) converts every
/// failure into a fixed user-facing string instead.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred while building or searching the embedding index.
    #[error("Index error: {0}")]
    IndexError(String),

    /// The persisted artifacts (or the configured embedder) do not describe
    /// the same build. Fatal: the process must refuse to serve.
    #[error("Build inconsistency: {0}")]
    BuildInconsistency(String),

    /// The text generation backend failed.
    #[error("Generation error ({backend}): {message}")]
    GenerationError {
        /// The generation backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Reading or writing an artifact failed.
    #[error("Persistence error ({path}): {message}")]
    PersistenceError {
        /// The artifact path involved.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RagError {
    /// Whether this error must stop the process from serving requests.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BuildInconsistency(_))
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
