use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::config::SupabaseConfig;
use crate::error::AppError;
use crate::models::{ChatMessage, NewTrackingEntry, Role, TrackingEntry, TrackingKind};
use crate::store::Store;

const TRACKING_TABLE: &str = "tracking_logs";
const CHAT_TABLE: &str = "chat_messages";

/// Store backed by Supabase's PostgREST API.
pub struct SupabaseStore {
    client: reqwest::Client,
    rest_url: String,
    key: String,
}

impl SupabaseStore {
    pub fn new(cfg: &SupabaseConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| AppError::config(format!("failed to create HTTP client: {err}")))?;
        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", cfg.url),
            key: cfg.key.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    /// Inserts one row and returns the representation PostgREST echoes back.
    async fn insert<B, T>(&self, table: &str, row: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.table_url(table))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await
            .map_err(|err| AppError::persistence(format!("insert into {table} failed: {err}")))?;

        let mut rows: Vec<T> = read_rows(table, response).await?;
        if rows.is_empty() {
            return Err(AppError::persistence(format!(
                "insert into {table} returned no rows"
            )));
        }
        Ok(rows.swap_remove(0))
    }

    async fn select<T>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .get(self.table_url(table))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .query(query)
            .send()
            .await
            .map_err(|err| AppError::persistence(format!("select from {table} failed: {err}")))?;

        read_rows(table, response).await
    }
}

async fn read_rows<T: DeserializeOwned>(
    table: &str,
    response: reqwest::Response,
) -> Result<Vec<T>, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::persistence(format!(
            "{table} request failed with HTTP {status}: {body}"
        )));
    }
    response
        .json::<Vec<T>>()
        .await
        .map_err(|err| AppError::persistence(format!("invalid {table} rows: {err}")))
}

fn tracking_query(user_id: &str, kind: Option<TrackingKind>, limit: usize) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("select", "*".to_string()),
        ("user_id", format!("eq.{user_id}")),
    ];
    if let Some(kind) = kind {
        query.push(("type", format!("eq.{kind}")));
    }
    query.push(("order", "timestamp.desc".to_string()));
    query.push(("limit", limit.to_string()));
    query
}

fn chat_query(user_id: &str, limit: usize) -> Vec<(&'static str, String)> {
    vec![
        ("select", "*".to_string()),
        ("user_id", format!("eq.{user_id}")),
        ("order", "created_at.desc".to_string()),
        ("limit", limit.to_string()),
    ]
}

#[async_trait]
impl Store for SupabaseStore {
    async fn save_tracking_entry(
        &self,
        entry: NewTrackingEntry,
    ) -> Result<TrackingEntry, AppError> {
        self.insert(TRACKING_TABLE, &entry).await
    }

    async fn tracking_entries(
        &self,
        user_id: &str,
        kind: Option<TrackingKind>,
        limit: usize,
    ) -> Result<Vec<TrackingEntry>, AppError> {
        self.select(TRACKING_TABLE, &tracking_query(user_id, kind, limit))
            .await
    }

    async fn save_chat_message(
        &self,
        user_id: &str,
        role: Role,
        message: &str,
    ) -> Result<ChatMessage, AppError> {
        let row = json!({
            "user_id": user_id,
            "role": role,
            "message": message,
        });
        self.insert(CHAT_TABLE, &row).await
    }

    async fn chat_history(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, AppError> {
        self.select(CHAT_TABLE, &chat_query(user_id, limit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_query_filters_and_orders() {
        let query = tracking_query("u1", Some(TrackingKind::Water), 30);
        assert_eq!(
            query,
            vec![
                ("select", "*".to_string()),
                ("user_id", "eq.u1".to_string()),
                ("type", "eq.water".to_string()),
                ("order", "timestamp.desc".to_string()),
                ("limit", "30".to_string()),
            ]
        );
        assert!(!tracking_query("u1", None, 5).iter().any(|(k, _)| *k == "type"));
    }

    #[test]
    fn chat_query_orders_newest_first() {
        let query = chat_query("u1", 5);
        assert!(query.contains(&("order", "created_at.desc".to_string())));
        assert!(query.contains(&("limit", "5".to_string())));
    }

    #[test]
    fn rest_url_is_derived_from_project_url() {
        let store = SupabaseStore::new(&SupabaseConfig {
            url: "https://abc.supabase.co".into(),
            key: "k".into(),
        })
        .unwrap();
        assert_eq!(
            store.table_url(TRACKING_TABLE),
            "https://abc.supabase.co/rest/v1/tracking_logs"
        );
    }
}
