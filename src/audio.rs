//! Decoding of recorded voice audio into Whisper input.
//!
//! Browser recordings arrive as WebM/Opus, which symphonia cannot decode, so
//! the primary path shells out to ffmpeg for 16 kHz mono PCM. Containers that
//! symphonia does understand (WAV, OGG/Vorbis, MP3, FLAC) are decoded in
//! process when ffmpeg is unavailable or rejects the input.

use std::io::{Cursor, ErrorKind};
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AppError;

pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Guesses a container extension from magic bytes, defaulting to `webm`.
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x1A, 0x45, 0xDF, 0xA3, ..] => "webm",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => "wav",
        [b'O', b'g', b'g', b'S', ..] => "ogg",
        [b'f', b'L', b'a', b'C', ..] => "flac",
        [b'I', b'D', b'3', ..] | [0xFF, 0xFB, ..] | [0xFF, 0xF3, ..] => "mp3",
        _ => "webm",
    }
}

/// Converts a recorded container into 16 kHz mono samples.
///
/// Tries ffmpeg first, then in-process decoding.
pub async fn decode_recording(ffmpeg_bin: &str, bytes: &[u8]) -> Result<Vec<f32>, AppError> {
    let extension = sniff_extension(bytes);
    match convert_with_ffmpeg(ffmpeg_bin, bytes, extension).await {
        Ok(samples) if !samples.is_empty() => return Ok(samples),
        Ok(_) => warn!(bytes = bytes.len(), "ffmpeg produced no samples"),
        Err(err) => warn!(error = %err, extension, "ffmpeg conversion failed; decoding in process"),
    }

    let owned = bytes.to_vec();
    tokio::task::spawn_blocking(move || decode_to_mono_16khz_f32(&owned, extension))
        .await
        .map_err(|err| AppError::internal(format!("audio decode task failed: {err}")))?
}

/// Runs `ffmpeg` on a temporary copy of `bytes`, reading back raw `s16le`.
pub async fn convert_with_ffmpeg(
    ffmpeg_bin: &str,
    bytes: &[u8],
    extension: &str,
) -> Result<Vec<f32>, AppError> {
    let dir = tempfile::tempdir()
        .map_err(|err| AppError::internal(format!("failed to create temp dir: {err}")))?;
    let input_path = dir.path().join(format!("input.{extension}"));
    let output_path = dir.path().join("output.raw");

    tokio::fs::write(&input_path, bytes)
        .await
        .map_err(|err| AppError::internal(format!("failed to write temp audio: {err}")))?;

    let output = Command::new(ffmpeg_bin)
        .arg("-y")
        .arg("-loglevel")
        .arg("error")
        .arg("-i")
        .arg(&input_path)
        .args(["-ar", "16000", "-ac", "1", "-f", "s16le", "-acodec", "pcm_s16le"])
        .arg(&output_path)
        .output()
        .await
        .map_err(|err| AppError::internal(format!("failed to run {ffmpeg_bin}: {err}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::internal(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let pcm = read_file(&output_path).await?;
    debug!(pcm_bytes = pcm.len(), "ffmpeg conversion finished");
    Ok(pcm_s16le_to_f32(&pcm))
}

async fn read_file(path: &Path) -> Result<Vec<u8>, AppError> {
    tokio::fs::read(path)
        .await
        .map_err(|err| AppError::internal(format!("failed to read {path:?}: {err}")))
}

/// Little-endian 16-bit PCM to `[-1.0, 1.0)` floats. A trailing odd byte is
/// dropped.
pub fn pcm_s16le_to_f32(pcm: &[u8]) -> Vec<f32> {
    pcm.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// Decodes media bytes into normalized 16 kHz mono samples.
///
/// `extension_hint` is used to improve container format probing.
pub fn decode_to_mono_16khz_f32(bytes: &[u8], extension_hint: &str) -> Result<Vec<f32>, AppError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(extension_hint);

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| AppError::internal(format!("failed to open recording: {err}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| AppError::internal("no audio track found in recording"))?;

    if track.codec_params.codec == CODEC_TYPE_NULL {
        return Err(AppError::internal("unsupported codec: missing codec information"));
    }

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| AppError::internal(format!("unsupported codec: {err}")))?;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(TARGET_SAMPLE_RATE);
    let track_id = track.id;
    let mut mono = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(err) => {
                return Err(AppError::internal(format!(
                    "failed while reading recording: {err}"
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(err) => {
                return Err(AppError::internal(format!(
                    "failed to decode audio packet: {err}"
                )));
            }
        };

        sample_rate = decoded.spec().rate;
        let channels = decoded.spec().channels.count();

        let mut sample_buffer =
            SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        sample_buffer.copy_interleaved_ref(decoded);
        let samples = sample_buffer.samples();

        if channels <= 1 {
            mono.extend_from_slice(samples);
            continue;
        }

        // Average the channels of each frame.
        for frame in samples.chunks(channels) {
            mono.push(frame.iter().sum::<f32>() / channels as f32);
        }
    }

    if mono.is_empty() {
        return Err(AppError::internal("decoded recording is empty"));
    }

    let normalized = mono
        .into_iter()
        .map(|s| s.clamp(-1.0, 1.0))
        .collect::<Vec<_>>();

    Ok(if sample_rate == TARGET_SAMPLE_RATE {
        normalized
    } else {
        resample_linear(&normalized, sample_rate, TARGET_SAMPLE_RATE)
    })
}

/// Resamples a mono signal from `src_rate` to `dst_rate` via linear interpolation.
fn resample_linear(input: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || input.len() < 2 {
        return input.to_vec();
    }

    let ratio = src_rate as f64 / dst_rate as f64;
    let out_len = ((input.len() as f64) * (dst_rate as f64) / (src_rate as f64)).round() as usize;
    let out_len = out_len.max(1);

    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos.floor() as usize;
        let frac = (src_pos - idx as f64) as f32;

        let a = input[idx.min(input.len() - 1)];
        let b = input[(idx + 1).min(input.len() - 1)];
        out.push(a + (b - a) * frac);
    }

    out
}
