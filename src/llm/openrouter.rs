//! OpenRouter provider speaking the OpenAI-compatible chat-completions API.
//!
//! [`CompletionTransport`] is the HTTP seam: the provider uses it for all
//! three contract operations and the coach uses it to walk its model list.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::llm::parse::parse_model_output;
use crate::llm::prompts::{self, FIRST_CONVERSATION};
use crate::llm::{finish_insights, finish_quote, entries_json, AiProvider, ChatReply};
use crate::models::TrackingEntry;

/// Per-request timeout for chat-completion calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const REFERER: &str = "https://ak-personal-vault.vercel.app";
const APP_TITLE: &str = "Ak Personal Vault";

/// One message of a chat-completions request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptMessage {
    pub role: &'static str,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Failure of a single chat-completion call.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// The API answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Network(String),
    #[error("failed to parse completion: {0}")]
    Parse(String),
    #[error("completion had no content")]
    EmptyResponse,
}

impl CompletionError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<CompletionError> for AppError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Status { status, body } => AppError::upstream(status, body),
            other => AppError::internal(other.to_string()),
        }
    }
}

/// Sends one chat-completion request for a specific model.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        messages: &[PromptMessage],
    ) -> Result<String, CompletionError>;
}

/// `reqwest`-backed transport for OpenRouter.
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl OpenRouterClient {
    pub fn new(api_key: String, base_url: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| AppError::config(format!("failed to create HTTP client: {err}")))?;
        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    /// Builds a client from `OPENROUTER_API_KEY`, failing when it is unset.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, AppError> {
        let api_key = cfg
            .openrouter_api_key
            .clone()
            .ok_or_else(|| AppError::config("OPENROUTER_API_KEY not found in environment variables"))?;
        Self::new(api_key, &cfg.openrouter_base_url)
    }
}

#[async_trait]
impl CompletionTransport for OpenRouterClient {
    async fn complete(
        &self,
        model: &str,
        messages: &[PromptMessage],
    ) -> Result<String, CompletionError> {
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", APP_TITLE)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|err| CompletionError::Parse(err.to_string()))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(CompletionError::EmptyResponse)?;
        Ok(content.to_string())
    }
}

/// [`AiProvider`] backed by an OpenRouter-hosted model.
pub struct OpenRouterProvider {
    transport: Box<dyn CompletionTransport>,
    model: String,
}

impl OpenRouterProvider {
    pub fn new(cfg: &AppConfig) -> Result<Self, AppError> {
        let transport = OpenRouterClient::from_config(cfg)?;
        info!(model = %cfg.openrouter_model, "initialized openrouter provider");
        Ok(Self::with_transport(Box::new(transport), cfg.openrouter_model.clone()))
    }

    pub fn with_transport(transport: Box<dyn CompletionTransport>, model: String) -> Self {
        Self { transport, model }
    }

    async fn request(&self, messages: &[PromptMessage]) -> Result<String, AppError> {
        Ok(self.transport.complete(&self.model, messages).await?)
    }
}

/// System prompt, optional prior context, then the user turn.
fn chat_messages(message: &str, context: Option<&str>) -> Vec<PromptMessage> {
    let mut messages = vec![PromptMessage::system(prompts::CHAT_SYSTEM_PROMPT)];
    let context = prompts::context_or_first(context);
    if context != FIRST_CONVERSATION {
        messages.push(PromptMessage::assistant(format!(
            "Previous context: {context}"
        )));
    }
    messages.push(PromptMessage::user(message));
    messages
}

#[async_trait]
impl AiProvider for OpenRouterProvider {
    async fn chat(&self, message: &str, context: Option<&str>) -> ChatReply {
        match self.request(&chat_messages(message, context)).await {
            Ok(text) => ChatReply::from_output(parse_model_output(&text)),
            Err(err) => {
                warn!(error = %err, model = %self.model, "openrouter chat failed");
                ChatReply::apology(err.to_string())
            }
        }
    }

    async fn generate_insights(&self, entries: &[TrackingEntry]) -> Vec<String> {
        let prompt = prompts::insights_prompt(&entries_json(entries));
        finish_insights(self.request(&[PromptMessage::user(prompt)]).await)
    }

    async fn generate_daily_quote(&self, user_name: &str) -> String {
        let prompt = prompts::daily_quote_prompt(user_name);
        finish_quote(
            self.request(&[PromptMessage::user(prompt)]).await,
            user_name,
        )
    }
}
