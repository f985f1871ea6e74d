//! multimodal-serve - Main Entry Point

use clap::Parser;
use multimodal_serve::cli::{cmd_info, cmd_predict, cmd_serve, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "multimodal_serve=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { model_dir, host, port } => {
            cmd_serve(model_dir, host, port).await?;
        }
        Commands::Predict { model_dir, input, content_type, accept, output } => {
            cmd_predict(&model_dir, &input, &content_type, &accept, output.as_deref())?;
        }
        Commands::Info { model_dir } => {
            cmd_info(&model_dir)?;
        }
    }

    Ok(())
}
