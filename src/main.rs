#![deny(clippy::all)]

mod audio;
mod config;
mod controller;
mod display;
mod error;
mod gemini;
mod session;
mod summarizer;
mod transcription;

use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the display surface
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let settings = config::load()?;
    info!(
        model = %settings.config.summary.model,
        chunk_threshold = settings.config.summary.chunk_threshold,
        language = %settings.config.recognizer.language,
        "Configuration loaded"
    );

    controller::run(settings).await
}
