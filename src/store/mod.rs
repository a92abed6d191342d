//! Persistence gateway for tracking entries and chat history.
//!
//! [`SupabaseStore`] talks to the hosted PostgREST API. When no usable
//! credentials are configured, [`MockStore`] answers every call with
//! placeholder data so the rest of the service keeps working.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{ChatMessage, NewTrackingEntry, Role, TrackingEntry, TrackingKind};

mod mock;
mod supabase;

pub use mock::MockStore;
pub use supabase::SupabaseStore;

/// Storage contract used by the route handlers.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts one entry and returns the stored row.
    async fn save_tracking_entry(&self, entry: NewTrackingEntry)
        -> Result<TrackingEntry, AppError>;

    /// Newest-first entries for a user, optionally restricted to one kind.
    async fn tracking_entries(
        &self,
        user_id: &str,
        kind: Option<TrackingKind>,
        limit: usize,
    ) -> Result<Vec<TrackingEntry>, AppError>;

    /// Appends one message to the chat log.
    async fn save_chat_message(
        &self,
        user_id: &str,
        role: Role,
        message: &str,
    ) -> Result<ChatMessage, AppError>;

    /// Newest-first chat messages for a user.
    async fn chat_history(&self, user_id: &str, limit: usize)
        -> Result<Vec<ChatMessage>, AppError>;
}

/// Picks the hosted store when credentials are present, mock mode otherwise.
pub fn build_store(cfg: &AppConfig) -> Arc<dyn Store> {
    match cfg.supabase.as_ref() {
        Some(supabase) => match SupabaseStore::new(supabase) {
            Ok(store) => {
                info!(url = %supabase.url, "supabase persistence configured");
                Arc::new(store)
            }
            Err(err) => {
                warn!(error = %err, "supabase client setup failed; using mock mode");
                Arc::new(MockStore)
            }
        },
        None => {
            warn!("supabase not configured; using mock mode");
            Arc::new(MockStore)
        }
    }
}
