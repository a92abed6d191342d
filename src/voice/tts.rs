//! Text-to-speech through a local espeak-compatible executable.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::AppError;

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Returns a complete WAV file for `text`.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, AppError>;
}

/// Runs `<command> -s <rate> -w <out.wav> <text>`.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    command: String,
    rate: u16,
}

impl CommandSynthesizer {
    pub fn new(command: impl Into<String>, rate: u16) -> Self {
        Self {
            command: command.into(),
            rate,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.tts_command.clone(), cfg.tts_rate)
    }
}

#[async_trait]
impl Synthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::invalid_request("text must not be empty"));
        }

        let dir = tempfile::tempdir()
            .map_err(|err| AppError::internal(format!("failed to create temp dir: {err}")))?;
        let out_path = dir.path().join("speech.wav");

        let output = Command::new(&self.command)
            .arg("-s")
            .arg(self.rate.to_string())
            .arg("-w")
            .arg(&out_path)
            .arg(text)
            .output()
            .await
            .map_err(|err| AppError::internal(format!("failed to run {}: {err}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::internal(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let audio = tokio::fs::read(&out_path)
            .await
            .map_err(|err| AppError::internal(format!("speech output missing: {err}")))?;
        if audio.is_empty() {
            return Err(AppError::internal("speech synthesizer produced no audio"));
        }

        debug!(chars = text.len(), "synthesized speech");
        info!(bytes = audio.len(), "generated speech audio");
        Ok(audio)
    }
}
