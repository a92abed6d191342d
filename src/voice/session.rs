//! State machine for one voice WebSocket connection.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, info, warn};

use crate::backend::Transcriber;
use crate::voice::buffer::{ChunkBuffer, RecordingState};
use crate::voice::protocol::{ClientMessage, ServerMessage};

/// Shared transcription settings; cheap to clone per connection.
#[derive(Clone)]
pub struct VoicePipeline {
    transcriber: Arc<dyn Transcriber>,
    flush_chunks: usize,
    min_audio_bytes: usize,
}

impl VoicePipeline {
    pub fn new(transcriber: Arc<dyn Transcriber>, flush_chunks: usize, min_audio_bytes: usize) -> Self {
        Self {
            transcriber,
            flush_chunks,
            min_audio_bytes,
        }
    }

    pub fn session(&self) -> VoiceSession {
        VoiceSession {
            buffer: ChunkBuffer::new(self.flush_chunks),
            pipeline: self.clone(),
        }
    }

    /// Transcribes one flushed buffer. Short audio is skipped and failures
    /// are logged; both yield `None`, as does an empty transcript.
    pub async fn flush(&self, audio: Vec<u8>) -> Option<String> {
        if audio.len() < self.min_audio_bytes {
            debug!(bytes = audio.len(), "skipping short audio flush");
            return None;
        }

        match self.transcriber.transcribe(&audio).await {
            Ok(text) if !text.trim().is_empty() => {
                info!(bytes = audio.len(), chars = text.len(), "transcribed audio");
                Some(text)
            }
            Ok(_) => None,
            Err(err) => {
                warn!(bytes = audio.len(), error = %err, "transcription failed");
                None
            }
        }
    }
}

pub struct VoiceSession {
    buffer: ChunkBuffer,
    pipeline: VoicePipeline,
}

impl VoiceSession {
    /// Applies one client action and returns the messages to send back, in
    /// order.
    pub async fn handle(&mut self, message: ClientMessage) -> Vec<ServerMessage> {
        match message {
            ClientMessage::StartRecording => {
                info!("client started recording");
                self.buffer.start();
                vec![ServerMessage::status("Recording started")]
            }
            ClientMessage::AudioChunk { audio } => {
                if audio.is_empty() || self.buffer.state() != RecordingState::Recording {
                    return Vec::new();
                }
                let bytes = match STANDARD.decode(audio.as_bytes()) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        debug!(error = %err, "dropping malformed audio chunk");
                        return Vec::new();
                    }
                };
                match self.buffer.push(bytes) {
                    Some(flushed) => self.transcribe(flushed).await.into_iter().collect(),
                    None => Vec::new(),
                }
            }
            ClientMessage::StopRecording => {
                info!(pending_chunks = self.buffer.len(), "client stopped recording");
                let mut out = Vec::new();
                if let Some(flushed) = self.buffer.stop() {
                    out.extend(self.transcribe(flushed).await);
                }
                out.push(ServerMessage::status("Recording stopped"));
                out
            }
            ClientMessage::Ping => vec![ServerMessage::Pong],
            ClientMessage::Unknown => Vec::new(),
        }
    }

    async fn transcribe(&self, audio: Vec<u8>) -> Option<ServerMessage> {
        self.pipeline
            .flush(audio)
            .await
            .map(|text| ServerMessage::Transcription { text })
    }
}
