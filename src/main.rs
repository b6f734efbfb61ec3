//! Command line entry point for the studio workflow

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use studio_mini::{
    client::Style, config::Settings, orchestrator::OrchestratorState, preparation, Studio,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "studio-mini", version, about = "Generate images from a picture and a prompt")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one generation (Ctrl-C aborts)
    Generate {
        /// PNG or JPG input
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value = "Editorial")]
        style: Style,
    },
    /// List recent generations
    History,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = Settings::load_from_path(&cli.config)?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    // stdout carries command output only
    let layer = fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);
    if settings.logging.format == "json" {
        registry.with(layer.json()).init();
    } else {
        registry.with(layer).init();
    }

    let mut studio = Studio::from_settings(&settings);
    studio.load_history().await;

    match cli.command {
        Command::Generate {
            image,
            prompt,
            style,
        } => {
            let raw = preparation::read_raw_image(&image).await?;
            let prepared = studio.select_image(raw).await?;
            if prepared.was_downscaled {
                info!(
                    max_dim = settings.preparation.max_dim,
                    "File was larger than the size limit and was downscaled before sending"
                );
            }
            studio.set_prompt(prompt);
            studio.set_style(style);

            let abort = studio.abort_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    abort.abort();
                }
            });

            let state = studio.generate().await?;
            for line in studio.status_log() {
                println!("{}", line);
            }
            if !studio.error().is_empty() {
                eprintln!("{}", studio.error());
            }
            if let OrchestratorState::Succeeded(result) = state {
                println!("{} {} [{}]", result.id, result.created_at.to_rfc3339(), result.style);
            }
        }
        Command::History => {
            if studio.history().is_empty() {
                println!("No generations yet.");
            }
            for entry in studio.history() {
                println!(
                    "{}  {}  [{}]  {}",
                    entry.id,
                    entry.created_at.to_rfc3339(),
                    entry.style,
                    entry.prompt
                );
            }
        }
    }

    Ok(())
}
