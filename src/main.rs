use anyhow::{Context, Result};
use clap::Parser;
use iaro::channels::{FlowRouter, stdio};
use iaro::config::Config;
use iaro::error::ConfigError;
use iaro::providers::{ChatProvider, GeminiProvider};
use iaro::search::SearchService;
use iaro::sessions::SessionManager;
use iaro::transcription::{DeepgramTranscriber, Transcriber};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// iAro — asistente conversacional en español.
#[derive(Debug, Parser)]
#[command(name = "iaro", version, about)]
struct Cli {
    /// Path to config.toml (defaults to ~/.iaro/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("iaro=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_or_init_at(path)?,
        None => Config::load_or_init()?,
    };
    let config = Arc::new(config);

    let gemini_key = config
        .keys
        .gemini
        .clone()
        .ok_or(ConfigError::MissingKey("GEMINI_API_KEY"))
        .context("set keys.gemini in config.toml or the GEMINI_API_KEY env var")?;
    let deepgram_key = config
        .keys
        .deepgram
        .clone()
        .ok_or(ConfigError::MissingKey("DEEPGRAM_API_KEY"))
        .context("set keys.deepgram in config.toml or the DEEPGRAM_API_KEY env var")?;

    let sessions = Arc::new(SessionManager::new(config.memory.max_history_size));
    let provider: Arc<dyn ChatProvider> = Arc::new(GeminiProvider::new(gemini_key, &config.llm));
    let transcriber: Arc<dyn Transcriber> = Arc::new(DeepgramTranscriber::new(deepgram_key));
    let search = Arc::new(SearchService::new(provider.clone(), config.keys.clone()));

    let router = FlowRouter::new(sessions, provider, transcriber, search, config.clone());
    stdio::run(&router, &config.media.storage_dir).await
}
