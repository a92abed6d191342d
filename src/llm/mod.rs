//! Provider abstraction for the upstream language models.
//!
//! Route handlers depend on the [`AiProvider`] trait, never on a concrete
//! API. The provider is built once at startup by [`build_provider`] and
//! shared through the router state.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{AppConfig, ProviderKind};
use crate::error::AppError;
use crate::models::TrackingEntry;

pub mod gemini;
pub mod openrouter;
pub mod parse;
pub mod prompts;

use parse::ModelOutput;

/// Result of a chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    /// Text shown to the user.
    pub response: String,
    /// Tracking fields extracted by the model, if any.
    pub extracted_data: Option<Value>,
    /// Upstream failure description when `response` is the apology text.
    pub error: Option<String>,
}

impl ChatReply {
    /// Builds a reply from model output. A JSON object carrying a string
    /// `response` is used as-is; anything else becomes a plain text reply.
    pub fn from_output(output: ModelOutput) -> Self {
        match output {
            ModelOutput::Parsed(Value::Object(mut map)) => {
                match map.remove("response") {
                    Some(Value::String(response)) => {
                        let extracted_data = map
                            .remove("extracted_data")
                            .filter(|v| !v.is_null());
                        Self {
                            response,
                            extracted_data,
                            error: None,
                        }
                    }
                    other => {
                        if let Some(v) = other {
                            map.insert("response".to_string(), v);
                        }
                        Self::text(Value::Object(map).to_string())
                    }
                }
            }
            ModelOutput::Parsed(other) => Self::text(other.to_string()),
            ModelOutput::Raw(text) => Self::text(text),
        }
    }

    /// The user-safe reply used when the model call failed.
    pub fn apology(error: impl Into<String>) -> Self {
        Self {
            response: prompts::CHAT_APOLOGY.to_string(),
            extracted_data: None,
            error: Some(error.into()),
        }
    }

    fn text(response: String) -> Self {
        Self {
            response,
            extracted_data: None,
            error: None,
        }
    }
}

/// Capability contract every backing model must satisfy.
///
/// Implementations never fail: chat returns an apology reply, insights and
/// quotes fall back to fixed text.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Answers a user message and extracts tracking data from it.
    async fn chat(&self, message: &str, context: Option<&str>) -> ChatReply;

    /// Produces free-text observations about a set of entries.
    async fn generate_insights(&self, entries: &[TrackingEntry]) -> Vec<String>;

    /// Produces a short motivational quote naming `user_name`.
    async fn generate_daily_quote(&self, user_name: &str) -> String;
}

/// Builds the configured provider. Fails when its API key is missing.
pub fn build_provider(cfg: &AppConfig) -> Result<Arc<dyn AiProvider>, AppError> {
    match cfg.provider_kind {
        ProviderKind::Gemini => Ok(Arc::new(gemini::GeminiProvider::new(cfg)?)),
        ProviderKind::OpenRouter => Ok(Arc::new(openrouter::OpenRouterProvider::new(cfg)?)),
    }
}

/// Serializes entries for the insights prompt.
pub(crate) fn entries_json(entries: &[TrackingEntry]) -> String {
    serde_json::to_string_pretty(entries).unwrap_or_else(|_| "[]".to_string())
}

/// Shared post-processing for quote text.
pub(crate) fn finish_quote(raw: Result<String, AppError>, user_name: &str) -> String {
    match raw.map(|text| parse::clean_quote(&text)) {
        Ok(quote) if !quote.is_empty() => quote,
        Ok(_) => {
            tracing::warn!("quote generation returned empty text; using fallback");
            prompts::daily_quote_fallback(user_name)
        }
        Err(err) => {
            tracing::warn!(error = %err, "quote generation failed; using fallback");
            prompts::daily_quote_fallback(user_name)
        }
    }
}

/// Shared post-processing for insight lists.
pub(crate) fn finish_insights(raw: Result<String, AppError>) -> Vec<String> {
    match raw {
        Ok(text) => parse::insights_from_output(parse::parse_model_output(&text))
            .unwrap_or_else(|| {
                tracing::warn!("insights output was not a JSON string array; using fallback");
                prompts::fallback_insights()
            }),
        Err(err) => {
            tracing::warn!(error = %err, "insight generation failed; using fallback");
            prompts::fallback_insights()
        }
    }
}
