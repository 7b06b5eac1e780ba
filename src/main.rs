mod args;
mod artifacts;
mod audio;
mod config;
mod error;
mod ffmpeg;
mod giphy;
mod keywords;
mod pipeline;
mod probe;
mod reconcile;
mod server;
mod summarize;
#[cfg(test)]
mod testing;
mod tts;

use anyhow::Context;
use clap::Parser;
use std::fs;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::args::{Args, Command};
use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::summarize::Summarizer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.overrides.apply(AppConfig::from_env());

    match args.command {
        Command::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            info!("Starting text-to-video API on {}:{}", config.host, config.port);
            let pipeline = Pipeline::from_config(config).context("failed to initialize pipeline")?;
            server::serve(pipeline).await?;
        }
        Command::Render { text, text_file } => {
            let text = match (text, text_file) {
                (Some(text), _) => text,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("either --text or --text-file is required"),
            };
            render(config, &text).await?;
        }
        Command::Summarize { pdf, render: also_render } => {
            info!("Summarizing {}", pdf.display());
            let summarizer = Summarizer::from_config(&config).context("failed to initialize summarizer")?;
            let summary = summarizer
                .summarize_pdf(&pdf)
                .await
                .with_context(|| format!("failed to summarize {}", pdf.display()))?;
            println!("{}", summary);

            if also_render {
                render(config, &summary).await?;
            }
        }
    }

    Ok(())
}

async fn render(config: AppConfig, text: &str) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(config).context("failed to initialize pipeline")?;
    match pipeline.run(text).await {
        Some(output) => {
            info!("Final video written to {}", output.video_path.display());
            println!("{}", output.video_path.display());
            Ok(())
        }
        None => {
            error!("Failed to generate video");
            anyhow::bail!("video generation failed; see log for the failing stage")
        }
    }
}
