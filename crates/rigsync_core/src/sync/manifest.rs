//! Alignment manifest: the persisted output of the synchronization
//! engine, consumed by the downstream trimming/export stage.
//!
//! The manifest must be byte-for-byte reproducible for identical inputs
//! (trimming decisions depend on it), so offsets live in a `BTreeMap` and
//! serialization always goes through [`AlignmentManifest::to_json_string`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// End frame used when the reference's frame count is unknown.
///
/// Kept from the collector toolchain; the trimming stage clamps it to the
/// actual stream length.
pub const END_FRAME_FALLBACK: u64 = 99_999;

/// Frame offsets of every file in one trial relative to a reference file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentManifest {
    /// Identifier of the trial this manifest belongs to.
    pub trial_id: String,
    /// The file every offset is relative to.
    pub reference_video: String,
    /// First usable frame on the reference.
    pub start_frame_on_reference_video: u64,
    /// Last usable frame on the reference.
    pub end_frame_on_reference_video: u64,
    /// Signed frame offset per file path. The reference maps to 0.
    pub offsets: BTreeMap<String, i64>,
}

impl AlignmentManifest {
    /// Offset recorded for the reference file itself.
    pub fn reference_offset(&self) -> Option<i64> {
        self.offsets.get(&self.reference_video).copied()
    }

    /// Stable JSON rendering (pretty, sorted keys, trailing newline).
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }
}
