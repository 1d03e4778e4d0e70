use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(
    name = "resume-rag",
    version,
    about = "Ask questions about a resume, grounded in its text"
)]
pub struct Cli {
    /// TOML settings file.
    #[arg(long, global = true, env = "RESUME_RAG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the index and chunk artifacts.
    #[arg(long, global = true)]
    pub index_dir: Option<PathBuf>,

    /// Embedding backend.
    #[arg(long, global = true, value_enum)]
    pub embedder: Option<EmbedderKind>,

    /// Log output format (logs go to stderr).
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// More verbose logging; repeat for trace output.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clean, chunk, and embed a plain-text resume, then write the artifacts.
    Build {
        /// Plain-text resume to index.
        #[arg(long)]
        source: PathBuf,
    },

    /// Answer a single question.
    Ask {
        /// The question.
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Interactive question loop. Type `exit` or `quit` to leave.
    Chat,

    /// Show ranked chunks and scores for a query, for threshold tuning.
    Search {
        /// The query.
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Number of hits to show (defaults to the configured top_k).
        #[arg(short, long)]
        k: Option<usize>,
    },
}

#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Ollama `/api/embed`.
    #[default]
    Ollama,
    /// Offline bag-of-words hashing, no model needed.
    Hashing,
    /// In-process all-MiniLM-L6-v2 (needs the `fastembed` feature).
    Fastembed,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "resume-rag",
            "search",
            "kafka",
            "streams",
            "-k",
            "5",
            "--embedder",
            "hashing",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.embedder, Some(EmbedderKind::Hashing));
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Search { query, k } => {
                assert_eq!(query, vec!["kafka", "streams"]);
                assert_eq!(k, Some(5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn build_requires_source() {
        assert!(Cli::try_parse_from(["resume-rag", "build"]).is_err());
        let cli = Cli::try_parse_from(["resume-rag", "build", "--source", "resume.txt"]).unwrap();
        assert!(matches!(cli.command, Command::Build { .. }));
        assert_eq!(cli.log_format, LogFormat::Pretty);
    }

    #[test]
    fn ask_requires_a_question() {
        assert!(Cli::try_parse_from(["resume-rag", "ask"]).is_err());
    }
}
