//! Whisper model path resolution and optional Hugging Face download.
//!
//! Resolution happens on the first voice flush, not at startup, so the HTTP
//! API is usable without a model on disk.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::AppConfig;
use crate::error::AppError;

const LOCK_TIMEOUT: Duration = Duration::from_secs(120);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(250);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Where the Whisper model lives and how to fetch it when missing.
#[derive(Debug, Clone)]
pub struct ModelSource {
    pub path: PathBuf,
    /// Set when the path came from `WHISPER_MODEL`; downloads then land there.
    pub explicit: bool,
    pub auto_download: bool,
    pub hf_repo: String,
    pub hf_filename: String,
    pub cache_dir: PathBuf,
    pub hf_token: Option<String>,
}

impl ModelSource {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            path: PathBuf::from(&cfg.whisper_model),
            explicit: cfg.whisper_model_explicit,
            auto_download: cfg.whisper_auto_download,
            hf_repo: cfg.whisper_hf_repo.clone(),
            hf_filename: cfg.whisper_hf_filename.clone(),
            cache_dir: PathBuf::from(&cfg.whisper_cache_dir),
            hf_token: cfg.hf_token.clone(),
        }
    }

    fn target_path(&self) -> PathBuf {
        if self.explicit {
            self.path.clone()
        } else {
            self.cache_dir.join(&self.hf_filename)
        }
    }
}

/// Returns a readable local model path, downloading it first if allowed.
pub async fn ensure_model_ready(source: &ModelSource) -> Result<PathBuf, AppError> {
    if model_file_exists(&source.path) {
        return Ok(source.path.clone());
    }

    if !source.auto_download {
        return Err(AppError::config(format!(
            "model file not found at {:?}; set WHISPER_MODEL to an existing file or enable WHISPER_AUTO_DOWNLOAD",
            source.path
        )));
    }

    let target_path = source.target_path();
    if model_file_exists(&target_path) {
        return Ok(target_path);
    }

    if let Some(parent) = target_path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|err| {
            AppError::internal(format!(
                "failed to create model cache directory {parent:?}: {err}"
            ))
        })?;
    }

    let lock_path = lock_path_for(&target_path);
    let _guard = acquire_lock(&lock_path).await?;

    if model_file_exists(&target_path) {
        return Ok(target_path);
    }

    download_model_to_path(source, &target_path).await?;
    Ok(target_path)
}

fn model_file_exists(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

fn lock_path_for(target_path: &Path) -> PathBuf {
    let lock_name = format!(
        "{}.lock",
        target_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("model")
    );
    target_path.with_file_name(lock_name)
}

async fn acquire_lock(path: &Path) -> Result<LockGuard, AppError> {
    let start = Instant::now();
    loop {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let _ = writeln!(file, "pid={}", std::process::id());
                return Ok(LockGuard {
                    path: path.to_path_buf(),
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                if start.elapsed() >= LOCK_TIMEOUT {
                    return Err(AppError::internal(format!(
                        "timed out waiting for model download lock at {path:?}"
                    )));
                }
                tokio::time::sleep(LOCK_POLL_INTERVAL).await;
            }
            Err(err) => {
                return Err(AppError::internal(format!(
                    "failed to acquire model download lock at {path:?}: {err}"
                )));
            }
        }
    }
}

async fn download_model_to_path(source: &ModelSource, target_path: &Path) -> Result<(), AppError> {
    let url = hf_resolve_url(&source.hf_repo, &source.hf_filename);
    info!(%url, target = ?target_path, "downloading whisper model");

    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|err| AppError::internal(format!("failed to create HTTP client: {err}")))?;

    let mut request = client.get(&url);
    if let Some(token) = source.hf_token.as_deref() {
        request = request.bearer_auth(token);
    }

    let mut response = request.send().await.map_err(|err| {
        AppError::internal(format!(
            "failed to download model from {url}: {err}; check network connectivity"
        ))
    })?;

    match response.status() {
        status if status.is_success() => {}
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(AppError::internal(format!(
                "Hugging Face rejected model download from {url} with {}; set HF_TOKEN for authenticated access",
                response.status()
            )));
        }
        StatusCode::NOT_FOUND => {
            return Err(AppError::internal(format!(
                "model not found at {url}; verify WHISPER_HF_REPO and WHISPER_HF_FILENAME"
            )));
        }
        status => {
            return Err(AppError::upstream(
                status.as_u16(),
                format!("model download failed from {url}"),
            ));
        }
    }

    let tmp_path = target_path.with_extension("part");
    let mut out = tokio::fs::File::create(&tmp_path).await.map_err(|err| {
        AppError::internal(format!(
            "failed to create temporary model file {tmp_path:?}: {err}"
        ))
    })?;

    let mut size = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| AppError::internal(format!("model download from {url} interrupted: {err}")))?
    {
        size += chunk.len() as u64;
        out.write_all(&chunk).await.map_err(|err| {
            AppError::internal(format!(
                "failed writing downloaded model to {tmp_path:?}: {err}"
            ))
        })?;
    }
    out.flush().await.map_err(|err| {
        AppError::internal(format!(
            "failed to flush downloaded model file {tmp_path:?}: {err}"
        ))
    })?;
    drop(out);

    if size == 0 {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(AppError::internal(format!(
            "downloaded empty model file from {url}; refusing to continue"
        )));
    }

    tokio::fs::rename(&tmp_path, target_path)
        .await
        .map_err(|err| {
            AppError::internal(format!(
                "failed to move model from {tmp_path:?} to {target_path:?}: {err}"
            ))
        })?;

    info!(bytes = size, target = ?target_path, "whisper model ready");
    Ok(())
}

fn hf_resolve_url(repo: &str, filename: &str) -> String {
    format!(
        "https://huggingface.co/{}/resolve/main/{}",
        repo.trim_matches('/'),
        filename.trim_matches('/')
    )
}

struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
