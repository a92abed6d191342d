//! Conversation-partner replies with sequential model fallback.
//!
//! Talks to the chat-completions transport directly rather than through
//! [`crate::llm::AiProvider`]: it needs per-call model selection and must
//! surface upstream errors instead of papering over them.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::AppError;
use crate::llm::openrouter::{CompletionError, CompletionTransport, PromptMessage};
use crate::llm::prompts;

const HTTP_SERVICE_UNAVAILABLE: u16 = 503;

/// Walks an ordered candidate list until one model answers.
pub struct FallbackCoach {
    transport: Arc<dyn CompletionTransport>,
    models: Vec<String>,
}

impl FallbackCoach {
    /// `models` is tried in order on every call; the first entry is the
    /// configured default.
    pub fn new(transport: Arc<dyn CompletionTransport>, models: Vec<String>) -> Self {
        Self { transport, models }
    }

    /// Returns the first successful candidate's trimmed reply.
    ///
    /// A 503 or a transport/parse failure moves on to the next candidate; any
    /// other HTTP status stops immediately and is returned. Exhausting the
    /// list yields [`AppError::ServiceUnavailable`].
    pub async fn feedback(&self, message: &str) -> Result<String, AppError> {
        let messages = [PromptMessage::user(prompts::conversation_partner_prompt(message))];

        for (attempt, model) in self.models.iter().enumerate() {
            match self.transport.complete(model, &messages).await {
                Ok(text) => {
                    info!(model = %model, attempt = attempt + 1, "coach reply generated");
                    return Ok(text.trim().to_string());
                }
                Err(err) if err.status() == Some(HTTP_SERVICE_UNAVAILABLE) => {
                    warn!(model = %model, "coach model unavailable; trying next");
                }
                Err(err @ CompletionError::Status { .. }) => {
                    warn!(model = %model, error = %err, "coach model rejected request");
                    return Err(err.into());
                }
                Err(err) => {
                    warn!(model = %model, error = %err, "coach model call failed; trying next");
                }
            }
        }

        Err(AppError::service_unavailable(format!(
            "all {} coach models are unavailable; try again later",
            self.models.len()
        )))
    }
}
