//! Answer generation behind a black-box text generator.
//!
//! [`TextGenerator`] is the seam to a language model. [`AnswerGenerator`]
//! wraps one and owns everything that must hold regardless of the model:
//! the contact-details pre-check, serialization for backends that cannot run
//! concurrently, the optional timeout, and containment of errors and panics.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::config::DecodingConfig;
use crate::error::Result;
use crate::pii;

/// A text generation backend.
///
/// Implementations receive the full prompt and return the decoded output.
/// Causal language models usually return the prompt followed by the
/// continuation; backends that return only the continuation must say so via
/// [`echoes_prompt`](TextGenerator::echoes_prompt).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for `prompt`.
    async fn generate(&self, prompt: &str, decoding: &DecodingConfig) -> Result<String>;

    /// Backend identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Whether the output starts with the prompt.
    fn echoes_prompt(&self) -> bool {
        true
    }

    /// Whether concurrent calls are safe. Backends that return `false` are
    /// called one request at a time.
    fn supports_concurrency(&self) -> bool {
        false
    }
}

/// What happened when an answer was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// The question asked for contact details; the backend was not called.
    Refused,
    /// The backend produced output, normalized to start with the prompt.
    Completed {
        /// Prompt followed by the generated continuation.
        raw: String,
    },
    /// The backend errored, panicked, or timed out.
    Failed {
        /// Internal description, for logs only.
        reason: String,
    },
}

/// Runs a [`TextGenerator`] with policy checks and failure containment.
pub struct AnswerGenerator {
    backend: Arc<dyn TextGenerator>,
    gate: Option<Mutex<()>>,
    timeout: Option<Duration>,
}

impl AnswerGenerator {
    pub fn new(backend: Arc<dyn TextGenerator>, timeout: Option<Duration>) -> Self {
        let gate = (!backend.supports_concurrency()).then(|| Mutex::new(()));
        Self { backend, gate, timeout }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Whether `question` asks for private contact details.
    pub fn is_pii_request(&self, question: &str) -> bool {
        pii::is_pii_request(question)
    }

    /// Generate a raw answer for `prompt`, unless `question` is refused.
    ///
    /// Never returns an error: every backend failure becomes
    /// [`Generation::Failed`] and is logged here.
    pub async fn generate(
        &self,
        question: &str,
        prompt: &str,
        decoding: &DecodingConfig,
    ) -> Generation {
        if self.is_pii_request(question) {
            warn!(backend = self.backend.name(), "refusing contact details request");
            return Generation::Refused;
        }

        // The timeout also covers the wait for the gate.
        let attempt = async {
            let _permit = match &self.gate {
                Some(gate) => Some(gate.lock().await),
                None => None,
            };
            AssertUnwindSafe(self.backend.generate(prompt, decoding)).catch_unwind().await
        };
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(outcome) => outcome,
                Err(_) => return self.failed(format!("timed out after {limit:?}")),
            },
            None => attempt.await,
        };

        match outcome {
            Ok(Ok(output)) if self.backend.echoes_prompt() => Generation::Completed { raw: output },
            Ok(Ok(continuation)) => {
                Generation::Completed { raw: format!("{prompt}{continuation}") }
            }
            Ok(Err(err)) => self.failed(err.to_string()),
            Err(panic) => self.failed(format!("backend panicked: {}", panic_message(&*panic))),
        }
    }

    fn failed(&self, reason: String) -> Generation {
        error!(backend = self.backend.name(), error = %reason, "answer generation failed");
        Generation::Failed { reason }
    }
}

impl std::fmt::Debug for AnswerGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerGenerator")
            .field("backend", &self.backend.name())
            .field("serialized", &self.gate.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::RagError;

    struct Echo {
        calls: AtomicUsize,
        echoes: bool,
    }

    #[async_trait]
    impl TextGenerator for Echo {
        async fn generate(&self, prompt: &str, _decoding: &DecodingConfig) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.echoes { Ok(format!("{prompt} ok")) } else { Ok(" ok".to_string()) }
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn echoes_prompt(&self) -> bool {
            self.echoes
        }
    }

    struct Broken;

    #[async_trait]
    impl TextGenerator for Broken {
        async fn generate(&self, _prompt: &str, _decoding: &DecodingConfig) -> Result<String> {
            Err(RagError::GenerationError {
                backend: "broken".to_string(),
                message: "model not loaded".to_string(),
            })
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    struct Panicking;

    #[async_trait]
    impl TextGenerator for Panicking {
        async fn generate(&self, _prompt: &str, _decoding: &DecodingConfig) -> Result<String> {
            panic!("tensor shape mismatch")
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    struct Slow;

    #[async_trait]
    impl TextGenerator for Slow {
        async fn generate(&self, _prompt: &str, _decoding: &DecodingConfig) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".to_string())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn echo(echoes: bool) -> Arc<Echo> {
        Arc::new(Echo { calls: AtomicUsize::new(0), echoes })
    }

    #[tokio::test]
    async fn pii_requests_skip_the_backend() {
        let backend = echo(true);
        let generator = AnswerGenerator::new(backend.clone(), None);
        let outcome =
            generator.generate("what's your phone number?", "P", &DecodingConfig::default()).await;
        assert_eq!(outcome, Generation::Refused);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn continuation_only_output_gets_prompt_prepended() {
        let generator = AnswerGenerator::new(echo(false), None);
        let outcome = generator.generate("q", "PROMPT", &DecodingConfig::default()).await;
        assert_eq!(outcome, Generation::Completed { raw: "PROMPT ok".to_string() });

        let generator = AnswerGenerator::new(echo(true), None);
        let outcome = generator.generate("q", "PROMPT", &DecodingConfig::default()).await;
        assert_eq!(outcome, Generation::Completed { raw: "PROMPT ok".to_string() });
    }

    #[tokio::test]
    async fn backend_errors_become_failures() {
        let generator = AnswerGenerator::new(Arc::new(Broken), None);
        let outcome = generator.generate("q", "p", &DecodingConfig::default()).await;
        assert!(matches!(
            outcome,
            Generation::Failed { reason } if reason.contains("model not loaded")
        ));
    }

    #[tokio::test]
    async fn panics_are_contained() {
        let generator = AnswerGenerator::new(Arc::new(Panicking), None);
        let outcome = generator.generate("q", "p", &DecodingConfig::default()).await;
        assert!(matches!(
            outcome,
            Generation::Failed { reason } if reason.contains("tensor shape")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_become_failures() {
        let generator = AnswerGenerator::new(Arc::new(Slow), Some(Duration::from_secs(5)));
        let outcome = generator.generate("q", "p", &DecodingConfig::default()).await;
        assert!(matches!(outcome, Generation::Failed { reason } if reason.contains("timed out")));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_requests_share_the_timeout() {
        let generator = AnswerGenerator::new(Arc::new(Slow), Some(Duration::from_secs(5)));
        let decoding = DecodingConfig::default();
        let started = tokio::time::Instant::now();

        let (first, second) = tokio::join!(
            generator.generate("q1", "p", &decoding),
            generator.generate("q2", "p", &decoding),
        );

        assert!(matches!(first, Generation::Failed { .. }));
        assert!(matches!(second, Generation::Failed { .. }));
        assert!(started.elapsed() < Duration::from_secs(6));
    }
}
