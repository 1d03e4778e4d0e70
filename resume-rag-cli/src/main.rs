use clap::Parser;
use resume_rag_cli::cli::Cli;
use resume_rag_cli::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    telemetry::init(cli.log_format, cli.verbose);

    resume_rag_cli::run(cli, &mut std::io::stdout()).await
}
