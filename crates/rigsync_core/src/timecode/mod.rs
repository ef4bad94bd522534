//! Embedded-timecode parsing.
//!
//! Cameras stamp every recording with a running `HH:MM:SS:FF` clock; the
//! drop-frame variant uses `;` before the frame field. Parsing converts a
//! timecode plus the stream's frame rate into an absolute seconds value.
//! Drop-frame rate compensation is not modeled: the `;` marker is accepted
//! and the arithmetic is identical to the colon form.
//!
//! Absence of a timecode is not a parse concern: upstream represents it
//! as `None` and never calls into this module for it.

use thiserror::Error;

use crate::models::FrameRate;

/// Errors for malformed timecode strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimecodeError {
    /// Wrong number of `:`-separated fields.
    #[error("expected 4 timecode fields (HH:MM:SS:FF), got {0}")]
    FieldCount(usize),

    /// A field that is not a non-negative integer.
    #[error("non-integer timecode field '{0}'")]
    InvalidField(String),
}

/// Split a timecode into its four integer fields.
///
/// The drop-frame `;` separator is normalized to `:` first.
fn parse_fields(timecode: &str) -> Result<[u32; 4], TimecodeError> {
    let normalized = timecode.replace(';', ":");
    let fields: Vec<&str> = normalized.split(':').collect();
    if fields.len() != 4 {
        return Err(TimecodeError::FieldCount(fields.len()));
    }

    let mut values = [0u32; 4];
    for (slot, field) in values.iter_mut().zip(&fields) {
        *slot = field
            .parse()
            .map_err(|_| TimecodeError::InvalidField((*field).to_string()))?;
    }
    Ok(values)
}

/// Convert a timecode string into absolute seconds.
///
/// Seconds = `HH*3600 + MM*60 + SS + FF/rate`. A frame field at or above
/// the nominal rate is tolerated here; callers that care about data
/// quality check it separately with [`frame_field_in_range`].
pub fn parse_timecode(timecode: &str, rate: FrameRate) -> Result<f64, TimecodeError> {
    let [hh, mm, ss, ff] = parse_fields(timecode)?;
    let whole = (hh as u64 * 3600 + mm as u64 * 60 + ss as u64) as f64;
    Ok(whole + ff as f64 * rate.den as f64 / rate.num as f64)
}

/// Whether the frame field satisfies `0 <= FF < round(rate)`.
///
/// An out-of-range field is a data-quality issue, not a parse failure.
pub fn frame_field_in_range(timecode: &str, rate: FrameRate) -> Result<bool, TimecodeError> {
    let [_, _, _, ff] = parse_fields(timecode)?;
    Ok(ff < rate.nominal())
}
