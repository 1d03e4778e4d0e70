use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use resume_rag::ollama::{OllamaEmbeddingProvider, OllamaGenerator};
use resume_rag::{
    ConversationTurn, Corpus, EmbeddingProvider, HashingEmbeddingProvider, ResumeAssistant,
    Retrieval, TextGenerator, store,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::info;

use crate::cli::EmbedderKind;
use crate::settings::Settings;

/// Instantiate the configured embedding backend.
pub fn embedder(settings: &Settings) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let config = &settings.embedder;
    let provider: Arc<dyn EmbeddingProvider> = match config.kind {
        EmbedderKind::Ollama => Arc::new(
            OllamaEmbeddingProvider::new(&config.url).with_model(&config.model, config.dimensions),
        ),
        EmbedderKind::Hashing => {
            Arc::new(HashingEmbeddingProvider::new(config.hashing_dimensions)?)
        }
        #[cfg(feature = "fastembed")]
        EmbedderKind::Fastembed => {
            Arc::new(resume_rag::FastEmbedProvider::new(config.cache_dir.clone())?)
        }
        #[cfg(not(feature = "fastembed"))]
        EmbedderKind::Fastembed => {
            bail!("this binary was built without the `fastembed` feature")
        }
    };
    Ok(provider)
}

pub fn generator(settings: &Settings) -> Arc<dyn TextGenerator> {
    Arc::new(OllamaGenerator::new(&settings.generator.url).with_model(&settings.generator.model))
}

/// Load the persisted corpus and assemble an assistant around it.
///
/// Fails before serving anything if the artifacts are inconsistent with each
/// other or with the configured embedder.
pub fn load_assistant(
    settings: &Settings,
    generator: Arc<dyn TextGenerator>,
) -> anyhow::Result<ResumeAssistant> {
    if !store::exists(&settings.index_dir) {
        bail!(
            "no index in {}; run `resume-rag build --source <file>` first",
            settings.index_dir.display()
        );
    }
    let corpus = store::load(&settings.index_dir).with_context(|| {
        format!("failed to load the index from {}", settings.index_dir.display())
    })?;

    let assistant = ResumeAssistant::builder()
        .config(settings.rag.clone())
        .policy(settings.policy.clone())
        .corpus(corpus)
        .embedder(embedder(settings)?)
        .generator(generator)
        .build()
        .context("failed to start the assistant; rebuild the index if the embedder changed")?;
    Ok(assistant)
}

pub async fn build(
    settings: &Settings,
    source: &Path,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(source)
        .with_context(|| format!("failed to read {}", source.display()))?;
    if raw.trim().is_empty() {
        bail!("{} is empty", source.display());
    }

    let embedder = embedder(settings)?;
    let corpus = Corpus::build(&raw, settings.rag.chunking, embedder.as_ref())
        .await
        .context("failed to build the corpus")?;
    store::save(&corpus, &settings.index_dir)?;

    info!(source = %source.display(), chunks = corpus.len(), "index built");
    writeln!(
        out,
        "Built index with {} chunks → {}",
        corpus.len(),
        settings.index_dir.display()
    )?;
    Ok(())
}

pub async fn ask(
    assistant: &ResumeAssistant,
    question: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let reply = assistant.answer(question, &[]).await;
    writeln!(out, "{reply}")?;
    Ok(())
}

pub async fn search(
    assistant: &ResumeAssistant,
    query: &str,
    k: usize,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let hits = assistant.search(query, k).await?;
    let threshold = assistant.config().abstention_threshold;

    if hits.is_empty() {
        writeln!(out, "No chunks indexed.")?;
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        let marker = if hit.score >= threshold { ' ' } else { '-' };
        writeln!(
            out,
            "{marker}{:>2}. [{:.4}] #{} {}",
            rank + 1,
            hit.score,
            hit.chunk.id,
            hit.chunk.text
        )?;
    }

    let verdict = match assistant.retrieve(query, k).await? {
        Retrieval::Relevant(_) => "answer",
        Retrieval::NoRelevantContent { .. } => "abstain",
    };
    writeln!(out, "threshold {threshold:.2}: would {verdict}")?;
    Ok(())
}

/// Read questions from the terminal until `exit`, `quit`, Ctrl-C, or Ctrl-D.
pub async fn chat(assistant: &ResumeAssistant, out: &mut impl Write) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    let read = || -> anyhow::Result<Option<String>> {
        match editor.readline("you> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    };
    converse(assistant, read, out).await
}

/// Answer each line from `read` with rolling history, until it runs dry or
/// a line is `exit` or `quit`.
pub async fn converse(
    assistant: &ResumeAssistant,
    mut read: impl FnMut() -> anyhow::Result<Option<String>>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut history: Vec<ConversationTurn> = Vec::new();
    writeln!(out, "Ask about the resume. Type `exit` to quit.")?;

    while let Some(line) = read()? {
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_ascii_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let reply = assistant.answer(question, &history).await;
        writeln!(out, "bot> {reply}")?;
        out.flush()?;
        history.push(ConversationTurn::new(question, reply));
    }

    assistant.shutdown().await;
    Ok(())
}
