//! Media-file metadata produced by the prober and consumed by the
//! synchronization engine.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rational frame rate, e.g. 30000/1001 for NTSC 29.97.
///
/// The denominator is guaranteed nonzero by construction; a source whose
/// advertised rate cannot satisfy that is represented as `None` upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    /// Create a rate, rejecting zero numerator or denominator.
    pub fn new(num: u32, den: u32) -> Option<Self> {
        if num == 0 || den == 0 {
            None
        } else {
            Some(Self { num, den })
        }
    }

    /// Parse a frame rate string like "24000/1001" or "30".
    pub fn parse(rate: &str) -> Option<Self> {
        match rate.split_once('/') {
            Some((num, den)) => {
                let num: u32 = num.trim().parse().ok()?;
                let den: u32 = den.trim().parse().ok()?;
                Self::new(num, den)
            }
            None => {
                let num: u32 = rate.trim().parse().ok()?;
                Self::new(num, 1)
            }
        }
    }

    /// The rate as a float, for offset arithmetic.
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Nominal integer rate (29.97 -> 30), the bound for frame fields.
    pub fn nominal(&self) -> u32 {
        self.as_f64().round() as u32
    }
}

impl std::fmt::Display for FrameRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// Per-file metadata record.
///
/// A record with an unparsable timecode or frame rate is retained and
/// flagged in `diagnostics`; only the offset computation excludes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Path to the video file.
    pub file_path: PathBuf,
    /// Container-reported creation time (best-effort accuracy).
    pub creation_time: Option<DateTime<Utc>>,
    /// Raw embedded timecode string, absent when the container has none.
    pub timecode: Option<String>,
    /// Video stream frame rate; `None` when zero or unparsable.
    pub frame_rate: Option<FrameRate>,
    /// Reported frame count of the stream, when known.
    pub nb_frames: Option<u64>,
    /// Camera token derived from the filename (e.g. "GoPro1234").
    pub device_label: Option<String>,
    /// Data-quality notes collected while probing and synchronizing.
    pub diagnostics: Vec<String>,
}

impl MediaRecord {
    /// Create an empty record for a file.
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            creation_time: None,
            timecode: None,
            frame_rate: None,
            nb_frames: None,
            device_label: None,
            diagnostics: Vec::new(),
        }
    }

    /// Record a data-quality note.
    pub fn add_diagnostic(&mut self, note: impl Into<String>) {
        self.diagnostics.push(note.into());
    }

    /// Absolute seconds value of the embedded timecode.
    ///
    /// `None` when the timecode is absent, malformed, or the frame rate
    /// is unusable; the reason is not recorded here (callers that care
    /// add a diagnostic).
    pub fn timecode_seconds(&self) -> Option<f64> {
        let timecode = self.timecode.as_deref()?;
        let rate = self.frame_rate?;
        crate::timecode::parse_timecode(timecode, rate).ok()
    }

    /// The file name without directories, for reports.
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.display().to_string())
    }

    /// The path as a string key for offset maps.
    pub fn path_key(&self) -> String {
        self.file_path.display().to_string()
    }
}

impl MediaRecord {
    /// Convenience used by tests and callers that already hold metadata.
    pub fn with_metadata(
        file_path: impl AsRef<Path>,
        creation_time: DateTime<Utc>,
        timecode: impl Into<String>,
        frame_rate: FrameRate,
    ) -> Self {
        let mut record = Self::new(file_path.as_ref());
        record.creation_time = Some(creation_time);
        record.timecode = Some(timecode.into());
        record.frame_rate = Some(frame_rate);
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rate_parses_rational() {
        let rate = FrameRate::parse("30000/1001").unwrap();
        assert_eq!(rate.num, 30000);
        assert_eq!(rate.den, 1001);
        assert!((rate.as_f64() - 29.97).abs() < 0.01);
        assert_eq!(rate.nominal(), 30);
    }

    #[test]
    fn frame_rate_parses_integer() {
        let rate = FrameRate::parse("30").unwrap();
        assert_eq!(rate.num, 30);
        assert_eq!(rate.den, 1);
    }

    #[test]
    fn frame_rate_rejects_zero() {
        assert!(FrameRate::parse("0/0").is_none());
        assert!(FrameRate::parse("30/0").is_none());
        assert!(FrameRate::parse("0/1").is_none());
        assert!(FrameRate::parse("not-a-rate").is_none());
    }

    #[test]
    fn timecode_seconds_requires_both_fields() {
        let mut record = MediaRecord::new("/footage/a.mp4");
        assert_eq!(record.timecode_seconds(), None);

        record.timecode = Some("01:00:00:00".to_string());
        assert_eq!(record.timecode_seconds(), None);

        record.frame_rate = FrameRate::new(30, 1);
        assert_eq!(record.timecode_seconds(), Some(3600.0));
    }
}
