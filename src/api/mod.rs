//! HTTP and WebSocket surface of the tracker.
//!
//! Handlers own request parsing and response shaping; model calls,
//! persistence, and transcription are delegated to the collaborators held
//! in [`AppState`].

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tracing::warn;

use crate::coach::FallbackCoach;
use crate::config::AppConfig;
use crate::llm::AiProvider;
use crate::quotes::QuoteCache;
use crate::store::Store;
use crate::voice::{Synthesizer, VoicePipeline};

mod chat;
mod insights;
mod tracking;
mod voice;

/// Human-readable service name returned by status endpoints.
pub const APP_NAME: &str = "personal-tracker-server";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared state injected into all route handlers.
pub struct AppState {
    pub cfg: AppConfig,
    pub provider: Arc<dyn AiProvider>,
    pub store: Arc<dyn Store>,
    /// `None` when no OpenRouter key is configured.
    pub coach: Option<FallbackCoach>,
    pub quotes: QuoteCache,
    pub voice: VoicePipeline,
    pub tts: Arc<dyn Synthesizer>,
}

/// Builds the Axum router for all public endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.cfg);
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/chat", post(chat::send_message))
        .route("/api/chat/history/:user_id", get(chat::history))
        .route("/api/tracking/log", post(tracking::log_entry))
        .route("/api/tracking/:user_id", get(tracking::entries))
        .route("/api/analytics/dashboard/:user_id", get(insights::dashboard))
        .route("/api/quotes/daily-quote", get(insights::daily_quote))
        .route("/api/coach/feedback", post(insights::coach_feedback))
        .route("/api/voice/tts", post(voice::text_to_speech))
        .route("/api/voice/stream", get(voice::stream))
        .layer(cors)
        .with_state(state)
}

/// Allows the local dev server plus `FRONTEND_URL`, with credentials.
fn cors_layer(cfg: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .allowed_origins()
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Root status endpoint (`GET /`).
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Personal Tracker API is running!",
        "name": APP_NAME,
        "version": APP_VERSION,
    }))
}

/// Liveness probe (`GET /health`).
pub async fn health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

#[cfg(test)]
mod tests;
