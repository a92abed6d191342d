//! Configuration loading from environment variables.
//!
//! Values are validated early so startup fails fast with actionable errors.

use crate::error::AppError;
use std::env;

pub const DEFAULT_FLUSH_CHUNKS: usize = 5;
pub const MAX_FLUSH_CHUNKS: usize = 50;
pub const DEFAULT_MIN_AUDIO_BYTES: usize = 1000;

const SUPABASE_URL_PLACEHOLDER: &str = "https://your-project";
const SUPABASE_KEY_PLACEHOLDER: &str = "your_supabase_anon_key";

/// Backup models tried by the coach after the configured default.
const DEFAULT_COACH_BACKUP_MODELS: &str = "meta-llama/llama-3.3-70b-instruct:free,google/gemma-3-27b-it:free,mistralai/mistral-7b-instruct:free";

/// Upstream model API backing the chat, insight, and quote operations.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ProviderKind {
    /// Google Gemini `generateContent` REST API.
    Gemini,
    /// OpenRouter OpenAI-compatible chat completions.
    OpenRouter,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenRouter => "openrouter",
        }
    }
}

/// Credentials for the hosted PostgREST database.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub key: String,
}

/// Runtime configuration for the HTTP server and its collaborators.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host interface to bind, for example `127.0.0.1`.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
    /// Deployed frontend origin allowed by CORS in addition to the dev server.
    pub frontend_url: Option<String>,
    /// Selected provider for chat, insights, and quotes.
    pub provider_kind: ProviderKind,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,
    pub openrouter_base_url: String,
    /// Models the coach tries after `openrouter_model`, in order.
    pub coach_backup_models: Vec<String>,
    /// `None` selects mock persistence.
    pub supabase: Option<SupabaseConfig>,
    /// Path of the single-entry daily quote cache file.
    pub quote_cache_file: String,
    /// Name woven into the daily quote.
    pub quote_user_name: String,
    /// Number of audio chunks that triggers a flush.
    pub voice_flush_chunks: usize,
    /// Flushed audio below this size is discarded.
    pub voice_min_audio_bytes: usize,
    /// Path to a Whisper model file on disk.
    pub whisper_model: String,
    /// Whether `whisper_model` came from explicit `WHISPER_MODEL`.
    pub whisper_model_explicit: bool,
    /// Enables download on first use when the model file is missing.
    pub whisper_auto_download: bool,
    pub whisper_hf_repo: String,
    pub whisper_hf_filename: String,
    pub whisper_cache_dir: String,
    pub hf_token: Option<String>,
    /// Language passed to Whisper, `None` for auto-detect.
    pub whisper_language: Option<String>,
    pub ffmpeg_bin: String,
    /// Local speech synthesizer executable (espeak-compatible flags).
    pub tts_command: String,
    /// Words per minute for speech synthesis.
    pub tts_rate: u16,
}

impl AppConfig {
    /// Builds configuration from environment variables.
    ///
    /// Variables:
    /// - `HOST` (default `127.0.0.1`), `PORT` (default `8000`)
    /// - `FRONTEND_URL` (optional)
    /// - `AI_PROVIDER` (`openrouter` or `gemini`, default `openrouter`)
    /// - `GEMINI_API_KEY`, `GEMINI_MODEL` (default `models/gemini-2.5-flash`), `GEMINI_BASE_URL`
    /// - `OPENROUTER_API_KEY`, `OPENROUTER_MODEL` (default `mistralai/devstral-2512:free`), `OPENROUTER_BASE_URL`
    /// - `COACH_BACKUP_MODELS` (comma-separated)
    /// - `SUPABASE_URL`, `SUPABASE_KEY` (mock mode when absent or placeholders)
    /// - `QUOTE_CACHE_FILE` (default `daily_quote_cache.json`), `QUOTE_USER_NAME` (default `you`)
    /// - `VOICE_FLUSH_CHUNKS` (default `5`, min `1`, max `50`), `VOICE_MIN_AUDIO_BYTES` (default `1000`)
    /// - `WHISPER_MODEL`, `WHISPER_AUTO_DOWNLOAD` (default `true`), `WHISPER_HF_REPO`,
    ///   `WHISPER_HF_FILENAME` (default `ggml-tiny.en.bin`), `WHISPER_CACHE_DIR`, `HF_TOKEN`
    /// - `WHISPER_LANGUAGE` (default `en`, `auto` to detect)
    /// - `FFMPEG_BIN` (default `ffmpeg`), `TTS_COMMAND` (default `espeak-ng`), `TTS_RATE` (default `175`)
    pub fn from_env() -> Result<Self, AppError> {
        let host = env_str("HOST", "127.0.0.1");
        let port = env_u16("PORT", 8000)?;

        let provider_kind = parse_provider_kind(&env_str("AI_PROVIDER", "openrouter"))?;

        let whisper_auto_download = env_bool("WHISPER_AUTO_DOWNLOAD", true)?;
        let whisper_hf_repo = env_str("WHISPER_HF_REPO", "ggerganov/whisper.cpp");
        let whisper_hf_filename = env_str("WHISPER_HF_FILENAME", "ggml-tiny.en.bin");
        let whisper_cache_dir = env_str("WHISPER_CACHE_DIR", &default_whisper_cache_dir());
        let whisper_model_explicit = env_opt("WHISPER_MODEL").is_some();
        let whisper_model = env_opt("WHISPER_MODEL")
            .unwrap_or_else(|| format!("{}/{}", whisper_cache_dir, whisper_hf_filename));
        let whisper_language = match env_str("WHISPER_LANGUAGE", "en").as_str() {
            "auto" => None,
            lang => Some(lang.to_string()),
        };

        let voice_flush_chunks = env_usize_bounded(
            "VOICE_FLUSH_CHUNKS",
            DEFAULT_FLUSH_CHUNKS,
            1,
            MAX_FLUSH_CHUNKS,
        )?;
        let voice_min_audio_bytes = env_usize_bounded(
            "VOICE_MIN_AUDIO_BYTES",
            DEFAULT_MIN_AUDIO_BYTES,
            0,
            usize::MAX,
        )?;

        Ok(Self {
            host,
            port,
            frontend_url: env_opt("FRONTEND_URL"),
            provider_kind,
            gemini_api_key: env_opt("GEMINI_API_KEY"),
            gemini_model: env_str("GEMINI_MODEL", "models/gemini-2.5-flash"),
            gemini_base_url: env_str(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            openrouter_api_key: env_opt("OPENROUTER_API_KEY"),
            openrouter_model: env_str("OPENROUTER_MODEL", "mistralai/devstral-2512:free"),
            openrouter_base_url: env_str("OPENROUTER_BASE_URL", "https://openrouter.ai/api/v1"),
            coach_backup_models: split_list(&env_str(
                "COACH_BACKUP_MODELS",
                DEFAULT_COACH_BACKUP_MODELS,
            )),
            supabase: supabase_credentials(env_opt("SUPABASE_URL"), env_opt("SUPABASE_KEY")),
            quote_cache_file: env_str("QUOTE_CACHE_FILE", "daily_quote_cache.json"),
            quote_user_name: env_str("QUOTE_USER_NAME", "you"),
            voice_flush_chunks,
            voice_min_audio_bytes,
            whisper_model,
            whisper_model_explicit,
            whisper_auto_download,
            whisper_hf_repo,
            whisper_hf_filename,
            whisper_cache_dir,
            hf_token: env_opt("HF_TOKEN"),
            whisper_language,
            ffmpeg_bin: env_str("FFMPEG_BIN", "ffmpeg"),
            tts_command: env_str("TTS_COMMAND", "espeak-ng"),
            tts_rate: env_u16("TTS_RATE", 175)?,
        })
    }

    /// Ordered, de-duplicated model list walked by the coach.
    pub fn coach_models(&self) -> Vec<String> {
        let mut models = vec![self.openrouter_model.clone()];
        for backup in &self.coach_backup_models {
            if !models.contains(backup) {
                models.push(backup.clone());
            }
        }
        models
    }

    /// Origins allowed by CORS.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = vec!["http://localhost:5173".to_string()];
        if let Some(url) = self.frontend_url.as_deref() {
            let url = url.trim_end_matches('/');
            if !origins.iter().any(|o| o == url) {
                origins.push(url.to_string());
            }
        }
        origins
    }
}

fn parse_provider_kind(raw: &str) -> Result<ProviderKind, AppError> {
    match raw.to_ascii_lowercase().as_str() {
        "gemini" => Ok(ProviderKind::Gemini),
        "openrouter" => Ok(ProviderKind::OpenRouter),
        other => Err(AppError::config(format!(
            "unknown AI_PROVIDER={other:?}; supported: gemini, openrouter"
        ))),
    }
}

/// Returns credentials only when both values are present and not the
/// template placeholders shipped in `.env.example`.
fn supabase_credentials(url: Option<String>, key: Option<String>) -> Option<SupabaseConfig> {
    let (url, key) = (url?, key?);
    if url.starts_with(SUPABASE_URL_PLACEHOLDER) || key == SUPABASE_KEY_PLACEHOLDER {
        return None;
    }
    Some(SupabaseConfig {
        url: url.trim_end_matches('/').to_string(),
        key,
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn default_whisper_cache_dir() -> String {
    format!(
        "{}/.cache/whispercpp/models",
        std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string())
    )
}

fn env_str(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(_) => None,
    }
}

fn env_u16(name: &str, default: u16) -> Result<u16, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.trim().parse::<u16>().map_err(|_| {
        AppError::config(format!("invalid {name}={raw:?}; expected integer 1-65535"))
    })?;
    if parsed == 0 {
        return Err(AppError::config(format!(
            "invalid {name}={raw:?}; expected > 0"
        )));
    }
    Ok(parsed)
}

fn env_bool(name: &str, default: bool) -> Result<bool, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::config(format!(
            "invalid {name}={raw:?}; expected true/false"
        ))),
    }
}

fn env_usize_bounded(
    name: &str,
    default: usize,
    min: usize,
    max: usize,
) -> Result<usize, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_usize_bounded(name, &raw, min, max)
}

fn parse_usize_bounded(name: &str, raw: &str, min: usize, max: usize) -> Result<usize, AppError> {
    let parsed = raw.trim().parse::<usize>().map_err(|_| {
        AppError::config(format!(
            "invalid {name}={raw:?}; expected integer in range [{min}, {max}]"
        ))
    })?;
    if parsed < min || parsed > max {
        return Err(AppError::config(format!(
            "invalid {name}={raw:?}; expected integer in range [{min}, {max}]"
        )));
    }
    Ok(parsed)
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 8000,
        frontend_url: None,
        provider_kind: ProviderKind::OpenRouter,
        gemini_api_key: None,
        gemini_model: "models/gemini-2.5-flash".to_string(),
        gemini_base_url: "http://127.0.0.1:9".to_string(),
        openrouter_api_key: Some("test-key".to_string()),
        openrouter_model: "primary".to_string(),
        openrouter_base_url: "http://127.0.0.1:9".to_string(),
        coach_backup_models: vec!["backup-a".to_string(), "backup-b".to_string()],
        supabase: None,
        quote_cache_file: "/tmp/daily_quote_cache.json".to_string(),
        quote_user_name: "you".to_string(),
        voice_flush_chunks: DEFAULT_FLUSH_CHUNKS,
        voice_min_audio_bytes: DEFAULT_MIN_AUDIO_BYTES,
        whisper_model: "dummy".to_string(),
        whisper_model_explicit: true,
        whisper_auto_download: false,
        whisper_hf_repo: "ggerganov/whisper.cpp".to_string(),
        whisper_hf_filename: "ggml-tiny.en.bin".to_string(),
        whisper_cache_dir: "/tmp".to_string(),
        hf_token: None,
        whisper_language: Some("en".to_string()),
        ffmpeg_bin: "ffmpeg".to_string(),
        tts_command: "espeak-ng".to_string(),
        tts_rate: 175,
    }
}
