//! JSON frames exchanged on the voice WebSocket.

use serde::{Deserialize, Serialize};

/// Client → server actions, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    StartRecording,
    AudioChunk {
        /// Base64-encoded audio bytes.
        #[serde(default)]
        audio: String,
    },
    StopRecording,
    Ping,
    /// Any other action; ignored.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parses one text frame. Only invalid JSON is an error; valid JSON that
    /// does not describe a known action becomes [`ClientMessage::Unknown`].
    pub fn from_frame(text: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Ok(Self::deserialize(value).unwrap_or(Self::Unknown))
    }
}

/// Server → client messages, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Status { message: String },
    Transcription { text: String },
    Error { message: String },
    Pong,
}

impl ServerMessage {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
