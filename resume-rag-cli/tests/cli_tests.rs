//! Build and search end to end with the offline hashing embedder.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use resume_rag::prompt::DEFAULT_REFUSAL_PHRASE;
use resume_rag::store::{CHUNKS_FILE, INDEX_FILE};
use resume_rag::{DecodingConfig, TextGenerator};
use resume_rag_cli::cli::Cli;
use resume_rag_cli::commands;
use resume_rag_cli::settings::Settings;

const RESUME: &str = "JANE DOE Backend Engineer jane@example.com | 412-499-6900\n\
    Built a Kafka ingestion pipeline handling 500,000 events per second. \
    Migrated payment services from Java to Rust. \
    Mentored four junior engineers.";

async fn run(args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(args)?;
    let mut out = Vec::new();
    resume_rag_cli::run(cli, &mut out).await?;
    Ok(String::from_utf8(out)?)
}

/// Echoes the prompt and appends a fixed answer.
struct Canned;

#[async_trait]
impl TextGenerator for Canned {
    async fn generate(
        &self,
        prompt: &str,
        _decoding: &DecodingConfig,
    ) -> resume_rag::Result<String> {
        Ok(format!("{prompt} Migrated payment services to Rust."))
    }

    fn name(&self) -> &str {
        "canned"
    }
}

fn build_args<'a>(index: &'a str, source: &'a str) -> Vec<&'a str> {
    vec![
        "resume-rag",
        "--embedder",
        "hashing",
        "--index-dir",
        index,
        "build",
        "--source",
        source,
    ]
}

fn setup(dir: &Path) -> (String, String) {
    let source = dir.join("resume.txt");
    fs::write(&source, RESUME).unwrap();
    let index = dir.join("models");
    (index.to_string_lossy().into_owned(), source.to_string_lossy().into_owned())
}

#[tokio::test]
async fn build_writes_both_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let (index, source) = setup(dir.path());

    let out = run(&build_args(&index, &source)).await.unwrap();
    assert!(out.starts_with("Built index with 3 chunks"), "{out}");
    assert!(Path::new(&index).join(INDEX_FILE).is_file());
    assert!(Path::new(&index).join(CHUNKS_FILE).is_file());

    let chunks = fs::read_to_string(Path::new(&index).join(CHUNKS_FILE)).unwrap();
    assert!(!chunks.contains("jane@example.com"));
    assert!(!chunks.contains("499-6900"));
}

#[tokio::test]
async fn search_ranks_matching_chunk_first() {
    let dir = tempfile::tempdir().unwrap();
    let (index, source) = setup(dir.path());
    run(&build_args(&index, &source)).await.unwrap();

    let out = run(&[
        "resume-rag",
        "--embedder",
        "hashing",
        "--index-dir",
        &index,
        "search",
        "payment",
        "services",
        "Rust",
        "-k",
        "2",
    ])
    .await
    .unwrap();

    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3, "{out}");
    assert!(lines[0].contains("#1 Migrated payment services"), "{out}");
    assert!(lines[2].starts_with("threshold 0.25: would answer"), "{out}");
}

#[tokio::test]
async fn serving_with_another_embedder_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let (index, source) = setup(dir.path());
    run(&build_args(&index, &source)).await.unwrap();

    // Ollama's default model is 384-dimensional; the index holds 512.
    let args = ["resume-rag", "--embedder", "ollama", "--index-dir", &index, "search", "rust"];
    let err = run(&args).await.unwrap_err();
    let root = err.root_cause().to_string();
    assert!(root.contains("Build inconsistency"), "{err:#}");
}

#[tokio::test]
async fn missing_index_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("absent").to_string_lossy().into_owned();
    let args = ["resume-rag", "--embedder", "hashing", "--index-dir", &index, "ask", "hello"];
    let err = run(&args).await.unwrap_err();
    assert!(format!("{err:#}").contains("resume-rag build"), "{err:#}");
}

#[tokio::test]
async fn chat_answers_each_line_until_exit() {
    let dir = tempfile::tempdir().unwrap();
    let (index, source) = setup(dir.path());
    run(&build_args(&index, &source)).await.unwrap();

    let args = ["resume-rag", "--embedder", "hashing", "--index-dir", &index, "chat"];
    let cli = Cli::try_parse_from(args).unwrap();
    let settings = Settings::load(&cli).unwrap();
    let assistant = commands::load_assistant(&settings, Arc::new(Canned)).unwrap();

    let mut lines = ["payment services Rust", "  ", "what's your phone number?", "exit", "unread"]
        .into_iter()
        .map(String::from);
    let mut out = Vec::new();
    commands::converse(&assistant, || Ok(lines.next()), &mut out).await.unwrap();

    let out = String::from_utf8(out).unwrap();
    let replies: Vec<String> =
        out.lines().filter(|line| line.starts_with("bot> ")).map(String::from).collect();
    assert_eq!(
        replies,
        vec![
            "bot> Migrated payment services to Rust.".to_string(),
            format!("bot> {DEFAULT_REFUSAL_PHRASE}"),
        ]
    );
}
