//! Dashboard, daily quote, and coach routes.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Local, Utc};
use serde::Deserialize;
use tracing::info;

use crate::analytics::{self, DEFAULT_WINDOW_DAYS};
use crate::api::AppState;
use crate::error::AppError;
use crate::models::{CoachingRequest, CoachingResponse, Dashboard};
use crate::quotes::{self, DailyQuote};

/// Ten years; longer windows are rejected.
const MAX_WINDOW_DAYS: i64 = 3650;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    days: Option<i64>,
}

/// `GET /api/analytics/dashboard/{user_id}?days=7`.
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Dashboard>, AppError> {
    let days = query.days.unwrap_or(DEFAULT_WINDOW_DAYS);
    if !(0..=MAX_WINDOW_DAYS).contains(&days) {
        return Err(AppError::invalid_request(format!(
            "days must be between 0 and {MAX_WINDOW_DAYS}, got {days}"
        )));
    }

    let dashboard = analytics::dashboard(
        state.store.as_ref(),
        state.provider.as_ref(),
        &user_id,
        days,
        Utc::now(),
    )
    .await?;
    Ok(Json(dashboard))
}

/// `GET /api/quotes/daily-quote`.
pub async fn daily_quote(State(state): State<Arc<AppState>>) -> Json<DailyQuote> {
    let quote = quotes::daily_quote(
        &state.quotes,
        state.provider.as_ref(),
        &state.cfg.quote_user_name,
        Local::now(),
    )
    .await;
    Json(quote)
}

/// `POST /api/coach/feedback`.
pub async fn coach_feedback(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CoachingRequest>,
) -> Result<Json<CoachingResponse>, AppError> {
    let coach = state
        .coach
        .as_ref()
        .ok_or_else(|| AppError::config("OPENROUTER_API_KEY not found"))?;

    info!(user_id = %req.user_id, chars = req.message.len(), "coach feedback requested");
    let feedback = coach.feedback(&req.message).await?;
    Ok(Json(CoachingResponse { feedback }))
}
