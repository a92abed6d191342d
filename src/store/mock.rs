use async_trait::async_trait;
use tracing::info;

use crate::error::AppError;
use crate::models::{ChatMessage, NewTrackingEntry, Role, TrackingEntry, TrackingKind};
use crate::store::Store;

pub const MOCK_ENTRY_ID: &str = "mock-id-123";
pub const MOCK_MESSAGE_ID: &str = "mock-msg-123";

/// Placeholder store used without database credentials. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockStore;

#[async_trait]
impl Store for MockStore {
    async fn save_tracking_entry(
        &self,
        entry: NewTrackingEntry,
    ) -> Result<TrackingEntry, AppError> {
        info!(kind = %entry.kind, value = entry.value, "mock: would save tracking entry");
        Ok(TrackingEntry {
            id: Some(MOCK_ENTRY_ID.to_string()),
            user_id: entry.user_id,
            kind: entry.kind,
            value: entry.value,
            notes: entry.notes,
            timestamp: entry.timestamp.unwrap_or_default(),
        })
    }

    async fn tracking_entries(
        &self,
        user_id: &str,
        _kind: Option<TrackingKind>,
        _limit: usize,
    ) -> Result<Vec<TrackingEntry>, AppError> {
        info!(user_id, "mock: would fetch tracking entries");
        Ok(Vec::new())
    }

    async fn save_chat_message(
        &self,
        user_id: &str,
        role: Role,
        message: &str,
    ) -> Result<ChatMessage, AppError> {
        let preview: String = message.chars().take(50).collect();
        info!(user_id, role = role.as_str(), preview = %preview, "mock: would save chat message");
        Ok(ChatMessage {
            id: Some(MOCK_MESSAGE_ID.to_string()),
            user_id: user_id.to_string(),
            role,
            message: message.to_string(),
            created_at: None,
        })
    }

    async fn chat_history(
        &self,
        user_id: &str,
        _limit: usize,
    ) -> Result<Vec<ChatMessage>, AppError> {
        info!(user_id, "mock: would fetch chat history");
        Ok(Vec::new())
    }
}
