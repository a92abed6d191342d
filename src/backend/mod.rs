//! Speech-to-text backends used by the voice pipeline.
//!
//! The WebSocket layer depends on the [`Transcriber`] trait instead of a
//! concrete engine, so sessions can be tested without a Whisper model.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::error::AppError;

pub mod whisper_rs;

/// Converts one recorded audio container (WebM, WAV, OGG, ...) to text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, AppError>;
}

/// Builds the local Whisper backend. The model is loaded on first use.
pub fn build_backend(cfg: &AppConfig) -> Arc<dyn Transcriber> {
    Arc::new(whisper_rs::WhisperRsBackend::new(cfg))
}

/// Collapses whitespace runs to single spaces.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
