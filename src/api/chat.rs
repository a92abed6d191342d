use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::AppState;
use crate::error::AppError;
use crate::extract::entries_from_extracted;
use crate::models::{ChatMessage, ChatRequest, ChatResponse, Role};

/// Prior messages fed back to the model as context.
const CONTEXT_MESSAGES: usize = 5;
const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<usize>,
}

/// Space-joined message texts, oldest first. `None` for an empty history.
fn history_context(newest_first: &[ChatMessage]) -> Option<String> {
    if newest_first.is_empty() {
        return None;
    }
    let joined = newest_first
        .iter()
        .rev()
        .map(|m| m.message.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    Some(joined)
}

/// `POST /api/chat`: answers the message, logs both turns, and stores any
/// extracted tracking data.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let history = state.store.chat_history(&req.user_id, CONTEXT_MESSAGES).await?;
    let context = history_context(&history);

    let reply = state.provider.chat(&req.message, context.as_deref()).await;
    if let Some(err) = reply.error.as_deref() {
        warn!(user_id = %req.user_id, error = %err, "chat model call failed; replying with apology");
    }

    state
        .store
        .save_chat_message(&req.user_id, Role::User, &req.message)
        .await?;
    state
        .store
        .save_chat_message(&req.user_id, Role::Assistant, &reply.response)
        .await?;

    let now = Utc::now();
    if let Some(extracted) = reply.extracted_data.as_ref() {
        let entries = entries_from_extracted(extracted, &req.user_id, &now.to_rfc3339());
        info!(user_id = %req.user_id, count = entries.len(), "saving extracted entries");
        for entry in entries {
            state.store.save_tracking_entry(entry).await?;
        }
    }

    Ok(Json(ChatResponse {
        response: reply.response,
        extracted_data: reply.extracted_data,
        timestamp: now,
    }))
}

/// `GET /api/chat/history/{user_id}`.
pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let history = state.store.chat_history(&user_id, limit).await?;
    Ok(Json(json!({ "history": history })))
}
