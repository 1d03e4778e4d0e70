//! Command-line front end for `resume-rag`.
//!
//! Builds the corpus artifacts offline and serves questions from them, one
//! at a time or in an interactive loop.

pub mod cli;
pub mod commands;
pub mod settings;
pub mod telemetry;

use std::io::Write;

use cli::{Cli, Command};
use settings::Settings;

/// Dispatch a parsed command line.
pub async fn run(cli: Cli, out: &mut impl Write) -> anyhow::Result<()> {
    let settings = Settings::load(&cli)?;

    match cli.command {
        Command::Build { source } => commands::build(&settings, &source, out).await,
        Command::Ask { question } => {
            let assistant = commands::load_assistant(&settings, commands::generator(&settings))?;
            commands::ask(&assistant, &question.join(" "), out).await
        }
        Command::Chat => {
            let assistant = commands::load_assistant(&settings, commands::generator(&settings))?;
            commands::chat(&assistant, out).await
        }
        Command::Search { query, k } => {
            let assistant = commands::load_assistant(&settings, commands::generator(&settings))?;
            let k = k.unwrap_or(settings.rag.top_k);
            commands::search(&assistant, &query.join(" "), k, out).await
        }
    }
}
