//! Google Gemini provider using the `generateContent` REST endpoint.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::llm::openrouter::REQUEST_TIMEOUT;
use crate::llm::parse::parse_model_output;
use crate::llm::prompts;
use crate::llm::{entries_json, finish_insights, finish_quote, AiProvider, ChatReply};
use crate::models::TrackingEntry;

/// [`AiProvider`] backed by a Gemini model.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl GeminiProvider {
    /// Fails when `GEMINI_API_KEY` is unset.
    pub fn new(cfg: &AppConfig) -> Result<Self, AppError> {
        let api_key = cfg
            .gemini_api_key
            .clone()
            .ok_or_else(|| AppError::config("GEMINI_API_KEY not found in environment variables"))?;
        let model = cfg.gemini_model.clone();
        let endpoint = generate_endpoint(&cfg.gemini_base_url, &model);
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| AppError::config(format!("failed to create HTTP client: {err}")))?;
        info!(model = %model, "initialized gemini provider");
        Ok(Self {
            client,
            api_key,
            endpoint,
            model,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(status.as_u16(), text));
        }

        let json: Value = response.json().await?;
        candidate_text(&json)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| AppError::internal("gemini response contained no text"))
    }
}

/// `{base}/models/{name}:generateContent`, accepting model ids with or
/// without the `models/` prefix.
fn generate_endpoint(base_url: &str, model: &str) -> String {
    let model = model.trim_start_matches('/');
    let model = if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    };
    format!("{}/{}:generateContent", base_url.trim_end_matches('/'), model)
}

/// Concatenates the text parts of the first candidate.
fn candidate_text(json: &Value) -> Option<String> {
    let parts = json["candidates"][0]["content"]["parts"].as_array()?;
    let text = parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect::<String>();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    async fn chat(&self, message: &str, context: Option<&str>) -> ChatReply {
        let prompt = prompts::chat_prompt(message, prompts::context_or_first(context));
        match self.generate(&prompt).await {
            Ok(text) => ChatReply::from_output(parse_model_output(&text)),
            Err(err) => {
                warn!(error = %err, model = %self.model, "gemini chat failed");
                ChatReply::apology(err.to_string())
            }
        }
    }

    async fn generate_insights(&self, entries: &[TrackingEntry]) -> Vec<String> {
        let prompt = prompts::insights_prompt(&entries_json(entries));
        finish_insights(self.generate(&prompt).await)
    }

    async fn generate_daily_quote(&self, user_name: &str) -> String {
        let prompt = prompts::daily_quote_prompt(user_name);
        finish_quote(self.generate(&prompt).await, user_name)
    }
}
