mod analytics;
mod api;
mod audio;
mod backend;
mod coach;
mod config;
mod error;
mod extract;
mod llm;
mod model_store;
mod models;
mod quotes;
mod store;
mod voice;

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use crate::api::{build_router, AppState};
use crate::backend::build_backend;
use crate::coach::FallbackCoach;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::llm::build_provider;
use crate::llm::openrouter::OpenRouterClient;
use crate::quotes::QuoteCache;
use crate::store::build_store;
use crate::voice::{CommandSynthesizer, VoicePipeline};

/// Command-line overrides; everything else comes from the environment.
#[derive(Debug, Parser)]
#[command(name = "personal-tracker-server", version, about)]
struct Cli {
    /// Interface to bind, overrides `HOST`.
    #[arg(long)]
    host: Option<String>,
    /// Port to bind, overrides `PORT`.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "personal_tracker_server=info,axum=info".into()),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let mut cfg = AppConfig::from_env()?;
    if let Some(host) = cli.host {
        cfg.host = host;
    }
    if let Some(port) = cli.port {
        cfg.port = port;
    }

    let provider = build_provider(&cfg)?;
    let store = build_store(&cfg);
    let coach = build_coach(&cfg)?;
    let voice = VoicePipeline::new(
        build_backend(&cfg),
        cfg.voice_flush_chunks,
        cfg.voice_min_audio_bytes,
    );

    let state = Arc::new(AppState {
        provider,
        store,
        coach,
        quotes: QuoteCache::new(&cfg.quote_cache_file),
        voice,
        tts: Arc::new(CommandSynthesizer::from_config(&cfg)),
        cfg: cfg.clone(),
    });

    let app = build_router(state);

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        host = %cfg.host,
        port = cfg.port,
        provider = cfg.provider_kind.as_str(),
        mock_store = cfg.supabase.is_none(),
        whisper_model = %cfg.whisper_model,
        "starting personal-tracker-server"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// The coach needs its own OpenRouter key even when chat runs on Gemini.
fn build_coach(cfg: &AppConfig) -> Result<Option<FallbackCoach>, AppError> {
    if cfg.openrouter_api_key.is_none() {
        warn!("OPENROUTER_API_KEY not set; coach feedback disabled");
        return Ok(None);
    }
    let transport = Arc::new(OpenRouterClient::from_config(cfg)?);
    let models = cfg.coach_models();
    info!(models = ?models, "coach fallback chain configured");
    Ok(Some(FallbackCoach::new(transport, models)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
