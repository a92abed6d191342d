//! Wire and storage shapes shared by routes, persistence, and analytics.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a tracked fact.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingKind {
    Sleep,
    Water,
    Gym,
    Mood,
    Work,
    Learning,
}

impl TrackingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sleep => "sleep",
            Self::Water => "water",
            Self::Gym => "gym",
            Self::Mood => "mood",
            Self::Work => "work",
            Self::Learning => "learning",
        }
    }
}

impl fmt::Display for TrackingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracking entry before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrackingEntry {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TrackingKind,
    pub value: f64,
    #[serde(default)]
    pub notes: Option<String>,
    /// RFC 3339 timestamp; filled with the current time when absent.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A stored tracking entry as returned by the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEntry {
    #[serde(default, deserialize_with = "id_as_string")]
    pub id: Option<String>,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TrackingKind,
    pub value: f64,
    #[serde(default)]
    pub notes: Option<String>,
    pub timestamp: String,
}

impl TrackingEntry {
    /// Parses the stored timestamp; offset-less values are taken as UTC.
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One line of the append-only chat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, deserialize_with = "id_as_string")]
    pub id: Option<String>,
    pub user_id: String,
    pub role: Role,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub extracted_data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoachingRequest {
    pub message: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoachingResponse {
    pub feedback: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TtsRequest {
    pub text: String,
}

/// Aggregated view over a lookback window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub sleep_avg: f64,
    pub water_avg: f64,
    pub gym_count: usize,
    pub mood_avg: f64,
    pub total_entries: usize,
    pub insights: Vec<String>,
}

/// Accepts RFC 3339 or a naive ISO-8601 datetime (as written by Python's
/// `isoformat()`), returning UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// PostgREST returns numeric or uuid ids depending on the table definition.
fn id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
