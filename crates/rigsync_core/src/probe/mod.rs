//! Video metadata probing via ffprobe.
//!
//! One invocation per file extracts the three fields the alignment
//! pipeline depends on: the container's creation-time tag, the embedded
//! timecode tag, and the video stream's rational frame rate (plus the
//! frame count when the container reports one). Everything else in the
//! prober's output is ignored.
//!
//! Missing tags are data-quality diagnostics on the record, not errors;
//! only a missing file, a failed tool launch, or unparsable tool output
//! fail the probe.

use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::models::{FrameRate, MediaRecord};

/// The external prober binary.
pub const PROBER: &str = "ffprobe";

/// Camera-token prefixes recognized in filenames.
const LABEL_PREFIXES: [&str; 2] = ["GoPro", "CAMERA"];

/// Errors for probe operations.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// File not found.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// Failed to launch the prober.
    #[error("failed to run {tool}: {message}")]
    ToolLaunch { tool: String, message: String },

    /// The prober exited with a failure status.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// The prober's output was not usable.
    #[error("failed to parse {tool} output for {path}: {message}")]
    ParseFailed {
        tool: String,
        path: PathBuf,
        message: String,
    },
}

impl ProbeError {
    fn parse_failed(path: &Path, message: impl Into<String>) -> Self {
        Self::ParseFailed {
            tool: PROBER.to_string(),
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Result type for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Probe one video file.
///
/// Runs `ffprobe -v error -show_streams -select_streams v -of json` and
/// reduces the first video stream to a [`MediaRecord`].
pub fn probe_file(path: &Path) -> ProbeResult<MediaRecord> {
    if !path.exists() {
        return Err(ProbeError::FileNotFound(path.to_path_buf()));
    }

    tracing::debug!(file = %path.display(), "probing");

    let output = ProcessCommand::new(PROBER)
        .args(["-v", "error", "-show_streams", "-select_streams", "v", "-of", "json"])
        .arg(path)
        .output()
        .map_err(|e| ProbeError::ToolLaunch {
            tool: PROBER.to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ProbeError::CommandFailed {
            tool: PROBER.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            message: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let json: Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| ProbeError::parse_failed(path, e.to_string()))?;

    parse_streams_json(&json, path)
}

/// Reduce prober JSON to a media record.
///
/// Split from [`probe_file`] so the field extraction is testable without
/// the external tool.
pub fn parse_streams_json(json: &Value, path: &Path) -> ProbeResult<MediaRecord> {
    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .ok_or_else(|| ProbeError::parse_failed(path, "no streams array"))?;

    let stream = streams
        .iter()
        .find(|s| s.get("codec_type").and_then(|t| t.as_str()) == Some("video"))
        .ok_or_else(|| ProbeError::parse_failed(path, "no video stream"))?;

    let mut record = MediaRecord::new(path);
    let tags = stream.get("tags");

    match tags
        .and_then(|t| t.get("creation_time"))
        .and_then(|c| c.as_str())
    {
        Some(raw) => match parse_creation_time(raw) {
            Some(time) => record.creation_time = Some(time),
            None => record.add_diagnostic(format!("unparsable creation_time '{}'", raw)),
        },
        None => record.add_diagnostic("missing creation_time tag"),
    }

    match tags.and_then(|t| t.get("timecode")).and_then(|c| c.as_str()) {
        Some(timecode) => record.timecode = Some(timecode.to_string()),
        // Absence is an expected state, flagged but not an error.
        None => record.add_diagnostic("missing timecode tag"),
    }

    match stream.get("avg_frame_rate").and_then(|r| r.as_str()) {
        Some(raw) => match FrameRate::parse(raw) {
            Some(rate) => record.frame_rate = Some(rate),
            None => record.add_diagnostic(format!("unusable frame rate '{}'", raw)),
        },
        None => record.add_diagnostic("missing avg_frame_rate"),
    }

    record.nb_frames = stream
        .get("nb_frames")
        .and_then(|n| n.as_str())
        .and_then(|n| n.parse().ok());

    if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
        record.device_label = device_label(file_name);
    }

    Ok(record)
}

/// Parse the container's creation-time tag.
///
/// Tags are RFC 3339 with a trailing `Z` in practice, but some firmware
/// writes a bare local-less datetime; both are accepted and read as UTC.
fn parse_creation_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Some(time.with_timezone(&Utc));
    }
    let trimmed = raw.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Extract the recording timestamp from a filename.
///
/// Collector output is named `YYYYMMDD_HHMMSS-<label>-...`; the leading
/// token is the trigger time used to group files into trials.
pub fn filename_timestamp(file_name: &str) -> Option<NaiveDateTime> {
    let token = timestamp_token(file_name)?;
    NaiveDateTime::parse_from_str(token, "%Y%m%d_%H%M%S").ok()
}

/// Extract the camera token from a filename.
///
/// The token follows the timestamp: `20250101_101500-GoPro1234-trial.mp4`
/// yields `GoPro1234`. Both collector conventions (`GoPro`/`CAMERA`
/// prefixes) are recognized.
pub fn device_label(file_name: &str) -> Option<String> {
    let token = timestamp_token(file_name)?;
    let rest = &file_name[token.len()..];
    let rest = rest.strip_prefix('-')?;
    let label = rest.split('-').next()?;

    for prefix in LABEL_PREFIXES {
        if let Some(digits) = label.strip_prefix(prefix) {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return Some(label.to_string());
            }
        }
    }
    None
}

/// The leading `YYYYMMDD_HHMMSS` token, when present.
fn timestamp_token(file_name: &str) -> Option<&str> {
    let token = file_name.get(..15)?;
    let bytes = token.as_bytes();
    let shape_ok = bytes[8] == b'_'
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[9..].iter().all(u8::is_ascii_digit);
    shape_ok.then_some(token)
}
