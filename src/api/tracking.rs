use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::api::AppState;
use crate::error::AppError;
use crate::models::{NewTrackingEntry, TrackingEntry, TrackingKind};

const DEFAULT_ENTRY_LIMIT: usize = 30;

#[derive(Debug, Deserialize)]
pub struct EntriesQuery {
    #[serde(rename = "type")]
    kind: Option<TrackingKind>,
    limit: Option<usize>,
}

/// `POST /api/tracking/log`. A missing timestamp is set to now.
pub async fn log_entry(
    State(state): State<Arc<AppState>>,
    Json(mut entry): Json<NewTrackingEntry>,
) -> Result<Json<TrackingEntry>, AppError> {
    if entry.timestamp.is_none() {
        entry.timestamp = Some(Utc::now().to_rfc3339());
    }
    info!(user_id = %entry.user_id, kind = %entry.kind, value = entry.value, "logging entry");
    let stored = state.store.save_tracking_entry(entry).await?;
    Ok(Json(stored))
}

/// `GET /api/tracking/{user_id}`, newest first.
pub async fn entries(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<EntriesQuery>,
) -> Result<Json<Value>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_ENTRY_LIMIT);
    let entries = state
        .store
        .tracking_entries(&user_id, query.kind, limit)
        .await?;
    let count = entries.len();
    Ok(Json(json!({ "entries": entries, "count": count })))
}
