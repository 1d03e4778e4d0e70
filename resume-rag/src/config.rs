//! Configuration for the question-answering pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunking::ChunkingStrategy;
use crate::error::{RagError, Result};

/// Decoding parameters forwarded unchanged to the text generation backend.
///
/// The core never interprets these values beyond validating their ranges;
/// each [`TextGenerator`](crate::TextGenerator) maps them onto its own
/// options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecodingConfig {
    /// Maximum number of new tokens to generate.
    pub max_new_tokens: usize,
    /// Sampling temperature. Lower is more factual.
    pub temperature: f32,
    /// Nucleus sampling probability mass.
    pub top_p: f32,
    /// Penalty applied to repeated tokens.
    pub repetition_penalty: f32,
    /// Prefer greedy (reproducible) decoding when the backend supports it.
    pub deterministic: bool,
    /// Optional fixed sampling seed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for DecodingConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 200,
            temperature: 0.3,
            top_p: 0.95,
            repetition_penalty: 1.1,
            deterministic: true,
            seed: None,
        }
    }
}

/// Configuration parameters for the question-answering pipeline.
///
/// Every field has a default, so partial configuration files deserialize
/// cleanly. Use [`RagConfig::builder`] to get validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Number of chunks to retrieve per question.
    pub top_k: usize,
    /// Maximum packed context length, in characters of chunk text.
    pub context_budget: usize,
    /// Minimum cosine similarity of the best hit. Below this the retriever abstains.
    pub abstention_threshold: f32,
    /// Number of most recent conversation turns rendered into the prompt.
    pub history_window: usize,
    /// How the source document is split into chunks.
    pub chunking: ChunkingStrategy,
    /// Decoding parameters for the generation backend.
    pub decoding: DecodingConfig,
    /// Optional per-call generation timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_timeout_secs: Option<u64>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            context_budget: 3600,
            abstention_threshold: 0.25,
            history_window: 3,
            chunking: ChunkingStrategy::default(),
            decoding: DecodingConfig::default(),
            generation_timeout_secs: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// The generation timeout, if one is configured.
    pub fn generation_timeout(&self) -> Option<Duration> {
        self.generation_timeout_secs.map(Duration::from_secs)
    }

    /// Check that all parameters are within their valid ranges.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.context_budget == 0 {
            return Err(RagError::ConfigError(
                "context_budget must be greater than zero".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.abstention_threshold) {
            return Err(RagError::ConfigError(format!(
                "abstention_threshold ({}) must be a cosine similarity in [-1, 1]",
                self.abstention_threshold
            )));
        }
        if let ChunkingStrategy::WordWindow { words: 0 } = self.chunking {
            return Err(RagError::ConfigError(
                "word_window chunking needs at least one word per chunk".to_string(),
            ));
        }

        let decoding = &self.decoding;
        if decoding.max_new_tokens == 0 {
            return Err(RagError::ConfigError(
                "decoding.max_new_tokens must be greater than zero".to_string(),
            ));
        }
        if !(decoding.temperature >= 0.0) {
            return Err(RagError::ConfigError(format!(
                "decoding.temperature ({}) must not be negative",
                decoding.temperature
            )));
        }
        if !(decoding.top_p > 0.0 && decoding.top_p <= 1.0) {
            return Err(RagError::ConfigError(format!(
                "decoding.top_p ({}) must be in (0, 1]",
                decoding.top_p
            )));
        }
        if !(decoding.repetition_penalty > 0.0) {
            return Err(RagError::ConfigError(format!(
                "decoding.repetition_penalty ({}) must be positive",
                decoding.repetition_penalty
            )));
        }
        if self.generation_timeout_secs == Some(0) {
            return Err(RagError::ConfigError(
                "generation_timeout_secs must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the number of chunks to retrieve per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the packed context budget in characters.
    pub fn context_budget(mut self, budget: usize) -> Self {
        self.config.context_budget = budget;
        self
    }

    /// Set the minimum top similarity below which the retriever abstains.
    pub fn abstention_threshold(mut self, threshold: f32) -> Self {
        self.config.abstention_threshold = threshold;
        self
    }

    /// Set the number of prior turns rendered into the prompt.
    pub fn history_window(mut self, turns: usize) -> Self {
        self.config.history_window = turns;
        self
    }

    /// Set the chunking strategy.
    pub fn chunking(mut self, strategy: ChunkingStrategy) -> Self {
        self.config.chunking = strategy;
        self
    }

    /// Set the decoding parameters.
    pub fn decoding(mut self, decoding: DecodingConfig) -> Self {
        self.config.decoding = decoding;
        self
    }

    /// Set a per-call generation timeout.
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.config.generation_timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any parameter is out of range.
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.top_k, 3);
        assert_eq!(config.chunking, ChunkingStrategy::Sentence);
        assert!(config.generation_timeout().is_none());
    }

    #[test]
    fn rejects_zero_top_k() {
        let err = RagConfig::builder().top_k(0).build().unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn rejects_threshold_outside_cosine_range() {
        assert!(RagConfig::builder().abstention_threshold(1.5).build().is_err());
        assert!(RagConfig::builder().abstention_threshold(-0.2).build().is_ok());
    }

    #[test]
    fn rejects_empty_word_window() {
        let err = RagConfig::builder()
            .chunking(ChunkingStrategy::WordWindow { words: 0 })
            .build()
            .unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn rejects_bad_decoding() {
        let decoding = DecodingConfig { top_p: 0.0, ..DecodingConfig::default() };
        assert!(RagConfig::builder().decoding(decoding).build().is_err());

        let decoding = DecodingConfig { temperature: f32::NAN, ..DecodingConfig::default() };
        assert!(RagConfig::builder().decoding(decoding).build().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: RagConfig =
            serde_json::from_str(r#"{"top_k": 5, "decoding": {"temperature": 0.0}}"#).unwrap();
        assert_eq!(config.top_k, 5);
        assert_eq!(config.decoding.temperature, 0.0);
        assert_eq!(config.decoding.max_new_tokens, 200);
        assert_eq!(config.context_budget, 3600);
    }

    #[test]
    fn word_window_round_trips_through_json() {
        let config: RagConfig =
            serde_json::from_str(r#"{"chunking": {"strategy": "word_window", "words": 300}}"#)
                .unwrap();
        assert_eq!(config.chunking, ChunkingStrategy::WordWindow { words: 300 });
    }
}
