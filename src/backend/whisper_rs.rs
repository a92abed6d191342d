//! `whisper-rs` backend implementation.
//!
//! The model is resolved (and downloaded if needed) on the first flush and
//! then kept in memory for the life of the process. Inference runs on a
//! blocking worker thread.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio::task;
use tracing::{info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::decode_recording;
use crate::backend::{normalize_text, Transcriber};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::model_store::{ensure_model_ready, ModelSource};

/// Local inference backend powered by `whisper-rs`.
pub struct WhisperRsBackend {
    source: ModelSource,
    language: Option<String>,
    ffmpeg_bin: String,
    context: OnceCell<Arc<Mutex<WhisperContext>>>,
}

impl WhisperRsBackend {
    pub fn new(cfg: &AppConfig) -> Self {
        Self {
            source: ModelSource::from_config(cfg),
            language: cfg.whisper_language.clone(),
            ffmpeg_bin: cfg.ffmpeg_bin.clone(),
            context: OnceCell::new(),
        }
    }

    async fn context(&self) -> Result<Arc<Mutex<WhisperContext>>, AppError> {
        self.context
            .get_or_try_init(|| async {
                let model_path = ensure_model_ready(&self.source).await?;
                let context = task::spawn_blocking(move || load_context(&model_path))
                    .await
                    .map_err(|err| AppError::internal(format!("model load task failed: {err}")))??;
                Ok::<_, AppError>(Arc::new(Mutex::new(context)))
            })
            .await
            .map(Arc::clone)
    }
}

fn load_context(model_path: &Path) -> Result<WhisperContext, AppError> {
    let path = model_path
        .to_str()
        .ok_or_else(|| AppError::config(format!("model path {model_path:?} is not UTF-8")))?;
    let mut params = WhisperContextParameters::default();
    params.use_gpu(cfg!(any(feature = "metal", feature = "cuda")));

    let context = WhisperContext::new_with_params(path, params).map_err(|err| {
        AppError::internal(format!("failed to load whisper model at {path:?}: {err}"))
    })?;
    info!(model = %path, "loaded whisper model");
    Ok(context)
}

#[async_trait]
impl Transcriber for WhisperRsBackend {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, AppError> {
        let samples = decode_recording(&self.ffmpeg_bin, audio).await?;
        let context = self.context().await?;
        let language = self.language.clone();
        task::spawn_blocking(move || run_whisper_rs(&samples, language.as_deref(), &context))
            .await
            .map_err(|err| AppError::internal(format!("whisper-rs worker task failed: {err}")))?
    }
}

fn base_params(language: Option<&str>) -> FullParams<'_, '_> {
    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_no_timestamps(true);
    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);
    params.set_single_segment(false);
    match language.map(str::trim).filter(|lang| !lang.is_empty()) {
        Some(lang) => params.set_language(Some(lang)),
        None => params.set_detect_language(true),
    }
    params
}

fn run_whisper_rs(
    samples: &[f32],
    language: Option<&str>,
    context: &Mutex<WhisperContext>,
) -> Result<String, AppError> {
    let context_guard = context
        .lock()
        .map_err(|_| AppError::internal("failed to lock whisper model context"))?;

    let mut state = context_guard
        .create_state()
        .map_err(|err| AppError::internal(format!("failed to create whisper state: {err}")))?;

    state
        .full(base_params(language), samples)
        .map_err(|err| AppError::internal(format!("whisper inference failed: {err}")))?;
    let mut segments = extract_segments(&state)?;

    if looks_like_non_speech_only(&segments) {
        let mut aggressive = base_params(language);
        aggressive.set_no_speech_thold(1.0);
        aggressive.set_suppress_blank(false);
        state
            .full(aggressive, samples)
            .map_err(|err| AppError::internal(format!("whisper retry failed: {err}")))?;
        let retried = extract_segments(&state)?;
        if speech_len(&retried) > speech_len(&segments) {
            warn!(
                audio_samples = samples.len(),
                "whisper retry replaced non-speech-only transcript"
            );
            segments = retried;
        }
    }

    let speech: Vec<&str> = segments
        .iter()
        .map(String::as_str)
        .filter(|seg| !is_non_speech_marker(seg))
        .collect();
    Ok(normalize_text(&speech.join(" ")))
}

fn extract_segments(state: &whisper_rs::WhisperState) -> Result<Vec<String>, AppError> {
    let count = state.full_n_segments();
    let mut segments = Vec::with_capacity(count.max(0) as usize);
    for i in 0..count {
        let Some(seg) = state.get_segment(i) else {
            continue;
        };
        let text = seg
            .to_str_lossy()
            .map_err(|err| AppError::internal(format!("failed to read segment text: {err}")))?
            .trim()
            .to_string();
        if !text.is_empty() {
            segments.push(text);
        }
    }
    Ok(segments)
}

fn looks_like_non_speech_only(segments: &[String]) -> bool {
    !segments.is_empty() && segments.iter().all(|seg| is_non_speech_marker(seg))
}

/// Whisper annotations such as `[BLANK_AUDIO]` or `(wind)`.
fn is_non_speech_marker(text: &str) -> bool {
    let trimmed = text.trim();
    let bracketed = (trimmed.starts_with('(') && trimmed.ends_with(')'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    bracketed && !trimmed.contains(' ')
}

fn speech_len(segments: &[String]) -> usize {
    segments
        .iter()
        .filter(|seg| !is_non_speech_marker(seg))
        .map(String::len)
        .sum()
}
