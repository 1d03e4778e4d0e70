//! Layered settings: defaults, then a TOML file, then `RESUME_RAG_*`
//! environment variables, then command-line flags.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, bail};
use resume_rag::ollama::{
    DEFAULT_BASE_URL, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_GENERATION_MODEL,
};
use resume_rag::embedding::DEFAULT_HASHING_DIMENSIONS;
use resume_rag::{PromptPolicy, RagConfig};
use serde::{Deserialize, Serialize};

use crate::cli::{Cli, EmbedderKind};

const ENV_PREFIX: &str = "RESUME_RAG_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbedderSettings {
    pub kind: EmbedderKind,
    /// Ollama server for embeddings.
    pub url: String,
    /// Ollama embedding model.
    pub model: String,
    /// Output size of `model`.
    pub dimensions: usize,
    /// Vector size of the offline hashing embedder.
    pub hashing_dimensions: usize,
    /// Where fastembed caches downloaded model files.
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbedderSettings {
    fn default() -> Self {
        Self {
            kind: EmbedderKind::default(),
            url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            hashing_dimensions: DEFAULT_HASHING_DIMENSIONS,
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Ollama server for generation.
    pub url: String,
    pub model: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self { url: DEFAULT_BASE_URL.to_string(), model: DEFAULT_GENERATION_MODEL.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub index_dir: PathBuf,
    pub embedder: EmbedderSettings,
    pub generator: GeneratorSettings,
    pub rag: RagConfig,
    pub policy: PromptPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("models"),
            embedder: EmbedderSettings::default(),
            generator: GeneratorSettings::default(),
            rag: RagConfig::default(),
            policy: PromptPolicy::default(),
        }
    }
}

impl Settings {
    /// Resolve settings for this invocation, reading the process environment.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut settings = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.apply_cli(cli);
        settings.rag.validate().context("invalid rag settings")?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid settings file {}", path.display()))
    }

    /// Override fields from `RESUME_RAG_*` variables found through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty());

        if let Some(dir) = var("INDEX_DIR") {
            self.index_dir = PathBuf::from(dir);
        }
        if let Some(kind) = var("EMBEDDER") {
            self.embedder.kind = match kind.to_ascii_lowercase().as_str() {
                "ollama" => EmbedderKind::Ollama,
                "hashing" => EmbedderKind::Hashing,
                "fastembed" => EmbedderKind::Fastembed,
                other => bail!("{ENV_PREFIX}EMBEDDER: unknown embedder '{other}'"),
            };
        }
        if let Some(url) = var("OLLAMA_URL") {
            self.embedder.url = url.clone();
            self.generator.url = url;
        }
        if let Some(model) = var("EMBEDDING_MODEL") {
            self.embedder.model = model;
        }
        if let Some(dimensions) = var("EMBEDDING_DIMENSIONS") {
            self.embedder.dimensions = parse("EMBEDDING_DIMENSIONS", &dimensions)?;
        }
        if let Some(model) = var("GENERATION_MODEL") {
            self.generator.model = model;
        }
        if let Some(top_k) = var("TOP_K") {
            self.rag.top_k = parse("TOP_K", &top_k)?;
        }
        if let Some(budget) = var("CONTEXT_BUDGET") {
            self.rag.context_budget = parse("CONTEXT_BUDGET", &budget)?;
        }
        if let Some(threshold) = var("ABSTENTION_THRESHOLD") {
            self.rag.abstention_threshold = parse("ABSTENTION_THRESHOLD", &threshold)?;
        }
        if let Some(secs) = var("GENERATION_TIMEOUT_SECS") {
            self.rag.generation_timeout_secs = Some(parse("GENERATION_TIMEOUT_SECS", &secs)?);
        }
        Ok(())
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(dir) = &cli.index_dir {
            self.index_dir = dir.clone();
        }
        if let Some(kind) = cli.embedder {
            self.embedder.kind = kind;
        }
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.trim().parse().with_context(|| format!("{ENV_PREFIX}{name}: cannot parse '{value}'"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use clap::Parser;
    use resume_rag::ChunkingStrategy;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            index_dir = "artifacts"

            [embedder]
            kind = "hashing"

            [rag]
            top_k = 5

            [rag.chunking]
            strategy = "word_window"
            words = 300
            "#,
        )
        .unwrap();
        assert_eq!(settings.index_dir, PathBuf::from("artifacts"));
        assert_eq!(settings.embedder.kind, EmbedderKind::Hashing);
        assert_eq!(settings.rag.top_k, 5);
        assert_eq!(settings.rag.chunking, ChunkingStrategy::WordWindow { words: 300 });
        assert_eq!(settings.rag.context_budget, 3600);
        assert_eq!(settings.generator.model, DEFAULT_GENERATION_MODEL);
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut settings = Settings::default();
        settings
            .apply_env(env(&[
                ("RESUME_RAG_TOP_K", "7"),
                ("RESUME_RAG_EMBEDDER", "Hashing"),
                ("RESUME_RAG_OLLAMA_URL", "http://gpu-box:11434"),
                ("RESUME_RAG_INDEX_DIR", ""),
            ]))
            .unwrap();
        assert_eq!(settings.rag.top_k, 7);
        assert_eq!(settings.embedder.kind, EmbedderKind::Hashing);
        assert_eq!(settings.generator.url, "http://gpu-box:11434");
        assert_eq!(settings.index_dir, PathBuf::from("models"));
    }

    #[test]
    fn malformed_environment_values_are_errors() {
        let mut settings = Settings::default();
        assert!(settings.apply_env(env(&[("RESUME_RAG_TOP_K", "many")])).is_err());
        assert!(settings.apply_env(env(&[("RESUME_RAG_EMBEDDER", "word2vec")])).is_err());
    }

    #[test]
    fn flags_override_everything() {
        let cli = Cli::try_parse_from([
            "resume-rag",
            "--index-dir",
            "/tmp/idx",
            "--embedder",
            "hashing",
            "chat",
        ])
        .unwrap();
        let mut settings = Settings::default();
        settings.apply_env(env(&[("RESUME_RAG_INDEX_DIR", "elsewhere")])).unwrap();
        settings.apply_cli(&cli);
        assert_eq!(settings.index_dir, PathBuf::from("/tmp/idx"));
        assert_eq!(settings.embedder.kind, EmbedderKind::Hashing);
    }
}
