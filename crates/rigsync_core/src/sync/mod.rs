//! Timecode-based synchronization engine.
//!
//! Takes probed media records from independently started cameras and
//! computes, per trial, the signed frame offset of every file relative to
//! a reference file. The reference is the earliest-created file (the
//! first camera started); offsets come from the difference of absolute
//! timecode seconds, scaled by each file's own frame rate and rounded to
//! the nearest frame. Pure computation over already-materialized
//! metadata: nothing here blocks.

mod manifest;

pub use manifest::{AlignmentManifest, END_FRAME_FALLBACK};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::models::MediaRecord;
use crate::probe;
use crate::timecode;

/// Errors for synchronization operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Empty input set.
    #[error("no video records supplied")]
    Empty,

    /// Every record in a trial was excluded from offset computation.
    #[error("no records usable for offset computation in trial '{trial}'")]
    NoUsableRecords { trial: String },

    /// A footage folder without a single video file.
    #[error("no video files found in {0}")]
    NoVideos(PathBuf),

    /// No trial in a folder could be synchronized.
    #[error("no trial could be synchronized")]
    NoUsableTrials,

    /// Filesystem failure while reading footage or writing output.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output serialization failure.
    #[error("failed to serialize alignment output: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SyncError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// A record left out of offset computation, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedRecord {
    pub file: String,
    pub reason: String,
}

/// One synchronized trial: the manifest plus diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct TrialSync {
    /// The persisted alignment result.
    pub manifest: AlignmentManifest,
    /// Records used for the offsets, in reference-first order.
    pub records: Vec<MediaRecord>,
    /// Records excluded from offset computation (still part of the
    /// dataset).
    pub excluded: Vec<ExcludedRecord>,
    /// Data-quality warnings that did not exclude anything.
    pub warnings: Vec<String>,
}

/// Result of synchronizing a whole footage folder.
#[derive(Debug, Serialize)]
pub struct SyncReport {
    /// Successfully synchronized trials, keyed by trial id.
    pub trials: BTreeMap<String, TrialSync>,
    /// Files skipped before grouping (probe failures, no filename
    /// timestamp).
    pub skipped: Vec<ExcludedRecord>,
    /// Trials that could not be synchronized, with reasons.
    pub failed_trials: Vec<(String, String)>,
    /// Where the manifest JSON was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_json: Option<PathBuf>,
    /// Where the offsets CSV was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_csv: Option<PathBuf>,
}

impl SyncReport {
    /// Render a human-readable summary block.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for (trial_id, trial) in &self.trials {
            out.push_str(&format!(
                "Trial {}: reference {}, {} file(s)\n",
                trial_id,
                trial.manifest.reference_video,
                trial.manifest.offsets.len()
            ));
            for (file, offset) in &trial.manifest.offsets {
                out.push_str(&format!("  {:>6} frames  {}\n", offset, file));
            }
            for excluded in &trial.excluded {
                out.push_str(&format!("  excluded {} ({})\n", excluded.file, excluded.reason));
            }
            for warning in &trial.warnings {
                out.push_str(&format!("  warning: {}\n", warning));
            }
        }
        for skipped in &self.skipped {
            out.push_str(&format!("Skipped {} ({})\n", skipped.file, skipped.reason));
        }
        for (trial_id, reason) in &self.failed_trials {
            out.push_str(&format!("Failed trial {} ({})\n", trial_id, reason));
        }
        out
    }
}

/// The synchronization engine.
pub struct SyncEngine {
    /// Maximum gap in seconds between filename timestamps of files in the
    /// same trial.
    trial_tolerance_secs: u64,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self {
            trial_tolerance_secs: 5,
        }
    }
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the trial-grouping tolerance.
    pub fn with_tolerance(mut self, secs: u64) -> Self {
        self.trial_tolerance_secs = secs;
        self
    }

    /// Compute the alignment manifest for one trial.
    ///
    /// Records without a parsable timecode, a usable frame rate, or a
    /// creation time are excluded from the offset math but reported, not
    /// dropped. The earliest-created usable record becomes the reference.
    pub fn synchronize(&self, trial_id: &str, records: &[MediaRecord]) -> SyncResult<TrialSync> {
        if records.is_empty() {
            return Err(SyncError::Empty);
        }

        let mut excluded = Vec::new();
        let mut warnings = Vec::new();
        let mut usable: Vec<(&MediaRecord, f64, crate::models::FrameRate)> = Vec::new();

        for record in records {
            let file = record.path_key();

            let Some(rate) = record.frame_rate else {
                excluded.push(ExcludedRecord {
                    file,
                    reason: "no usable frame rate".to_string(),
                });
                continue;
            };
            let Some(raw_timecode) = record.timecode.as_deref() else {
                excluded.push(ExcludedRecord {
                    file,
                    reason: "no timecode".to_string(),
                });
                continue;
            };
            if record.creation_time.is_none() {
                excluded.push(ExcludedRecord {
                    file,
                    reason: "no creation time".to_string(),
                });
                continue;
            }

            let seconds = match timecode::parse_timecode(raw_timecode, rate) {
                Ok(seconds) => seconds,
                Err(e) => {
                    excluded.push(ExcludedRecord {
                        file,
                        reason: format!("unparsable timecode '{}': {}", raw_timecode, e),
                    });
                    continue;
                }
            };

            if timecode::frame_field_in_range(raw_timecode, rate) == Ok(false) {
                warnings.push(format!(
                    "frame field exceeds nominal rate in '{}' ({})",
                    raw_timecode, file
                ));
            }

            usable.push((record, seconds, rate));
        }

        if usable.is_empty() {
            return Err(SyncError::NoUsableRecords {
                trial: trial_id.to_string(),
            });
        }

        // Earliest creation time first; path breaks ties so the result
        // never depends on input order.
        usable.sort_by(|(a, _, _), (b, _, _)| {
            a.creation_time
                .cmp(&b.creation_time)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });

        let (reference, reference_seconds) = (usable[0].0, usable[0].1);

        let mut offsets = BTreeMap::new();
        for (record, seconds, rate) in &usable {
            let delta = seconds - reference_seconds;
            // Nearest frame, not truncation, so rounding error never
            // accumulates across long takes.
            let frame_offset = (delta * rate.as_f64()).round() as i64;
            offsets.insert(record.path_key(), frame_offset);
        }

        let end_frame = match reference.nb_frames {
            Some(frames) => frames,
            None => {
                warnings.push(format!(
                    "unknown frame count for reference {}, using fallback end frame",
                    reference.path_key()
                ));
                END_FRAME_FALLBACK
            }
        };

        let manifest = AlignmentManifest {
            trial_id: trial_id.to_string(),
            reference_video: reference.path_key(),
            start_frame_on_reference_video: 0,
            end_frame_on_reference_video: end_frame,
            offsets,
        };

        Ok(TrialSync {
            manifest,
            records: usable.iter().map(|(record, _, _)| (*record).clone()).collect(),
            excluded,
            warnings,
        })
    }

    /// Cluster records into trials by their filename timestamps.
    ///
    /// Files whose names carry no timestamp cannot be grouped and are
    /// returned separately. A gap larger than the tolerance starts a new
    /// trial; the trial id is the first file's timestamp.
    pub fn group_by_trial(
        &self,
        records: Vec<MediaRecord>,
    ) -> (Vec<(String, Vec<MediaRecord>)>, Vec<ExcludedRecord>) {
        let mut ungrouped = Vec::new();
        let mut stamped: Vec<(chrono::NaiveDateTime, MediaRecord)> = Vec::new();

        for record in records {
            match probe::filename_timestamp(&record.file_name()) {
                Some(ts) => stamped.push((ts, record)),
                None => ungrouped.push(ExcludedRecord {
                    file: record.path_key(),
                    reason: "no timestamp in filename".to_string(),
                }),
            }
        }

        stamped.sort_by(|(a, ra), (b, rb)| a.cmp(b).then_with(|| ra.file_path.cmp(&rb.file_path)));

        let mut trials: Vec<(String, Vec<MediaRecord>)> = Vec::new();
        let mut current: Vec<(chrono::NaiveDateTime, MediaRecord)> = Vec::new();

        for (ts, record) in stamped {
            let starts_new = match current.last() {
                Some((last_ts, _)) => {
                    (ts - *last_ts).num_seconds().unsigned_abs() > self.trial_tolerance_secs
                }
                None => false,
            };
            if starts_new {
                trials.push(Self::finish_trial(std::mem::take(&mut current)));
            }
            current.push((ts, record));
        }
        if !current.is_empty() {
            trials.push(Self::finish_trial(current));
        }

        (trials, ungrouped)
    }

    fn finish_trial(
        members: Vec<(chrono::NaiveDateTime, MediaRecord)>,
    ) -> (String, Vec<MediaRecord>) {
        let trial_id = members[0].0.format("%Y%m%d_%H%M%S").to_string();
        (trial_id, members.into_iter().map(|(_, r)| r).collect())
    }

    /// Synchronize every trial found in a footage folder and persist the
    /// results.
    ///
    /// Probes each `.mp4`, groups by trial, runs the engine per trial and
    /// writes `output.json` plus `video_offsets.csv` into `out_dir`.
    /// Per-file probe failures and unsynchronizable trials are reported,
    /// not fatal; only a folder yielding nothing at all errors.
    pub fn sync_folder(&self, folder: &Path, out_dir: &Path) -> SyncResult<SyncReport> {
        let entries = fs::read_dir(folder).map_err(|e| SyncError::io(folder, e))?;
        let mut video_paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"))
            })
            .collect();
        video_paths.sort();

        if video_paths.is_empty() {
            return Err(SyncError::NoVideos(folder.to_path_buf()));
        }

        let mut records = Vec::new();
        let mut skipped = Vec::new();
        for path in &video_paths {
            match probe::probe_file(path) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "probe failed");
                    skipped.push(ExcludedRecord {
                        file: path.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut report = self.sync_records(records, skipped)?;
        self.write_outputs(&mut report, out_dir)?;
        Ok(report)
    }

    /// Group and synchronize already-probed records (no I/O).
    pub fn sync_records(
        &self,
        records: Vec<MediaRecord>,
        mut skipped: Vec<ExcludedRecord>,
    ) -> SyncResult<SyncReport> {
        let (groups, ungrouped) = self.group_by_trial(records);
        skipped.extend(ungrouped);

        let mut trials = BTreeMap::new();
        let mut failed_trials = Vec::new();
        for (trial_id, members) in groups {
            match self.synchronize(&trial_id, &members) {
                Ok(trial) => {
                    trials.insert(trial_id, trial);
                }
                Err(e) => {
                    tracing::warn!(trial = %trial_id, error = %e, "trial not synchronized");
                    failed_trials.push((trial_id, e.to_string()));
                }
            }
        }

        if trials.is_empty() {
            return Err(SyncError::NoUsableTrials);
        }

        Ok(SyncReport {
            trials,
            skipped,
            failed_trials,
            output_json: None,
            output_csv: None,
        })
    }

    /// Persist a report's manifests as `output.json` and
    /// `video_offsets.csv` under `out_dir`.
    pub fn write_outputs(&self, report: &mut SyncReport, out_dir: &Path) -> SyncResult<()> {
        fs::create_dir_all(out_dir).map_err(|e| SyncError::io(out_dir, e))?;

        let manifests: BTreeMap<&String, &AlignmentManifest> = report
            .trials
            .iter()
            .map(|(trial_id, trial)| (trial_id, &trial.manifest))
            .collect();
        let mut json = serde_json::to_string_pretty(&manifests)?;
        json.push('\n');

        let json_path = out_dir.join("output.json");
        fs::write(&json_path, json).map_err(|e| SyncError::io(&json_path, e))?;

        let csv_path = out_dir.join("video_offsets.csv");
        let csv = render_offsets_csv(&report.trials);
        fs::write(&csv_path, csv).map_err(|e| SyncError::io(&csv_path, e))?;

        tracing::info!(
            json = %json_path.display(),
            csv = %csv_path.display(),
            "alignment output written"
        );
        report.output_json = Some(json_path);
        report.output_csv = Some(csv_path);
        Ok(())
    }
}

/// Render the per-file offsets table.
fn render_offsets_csv(trials: &BTreeMap<String, TrialSync>) -> String {
    let mut out = String::from("Trial,Filename,Creation Time,Timecode,FPS,Offset (frames)\n");

    for (trial_id, trial) in trials {
        let by_path: BTreeMap<String, &MediaRecord> = trial
            .records
            .iter()
            .map(|record| (record.path_key(), record))
            .collect();

        for (path, offset) in &trial.manifest.offsets {
            let record = by_path.get(path);
            let file_name = record
                .map(|r| r.file_name())
                .unwrap_or_else(|| path.clone());
            let creation = record
                .and_then(|r| r.creation_time)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            let timecode = record
                .and_then(|r| r.timecode.clone())
                .unwrap_or_else(|| "Unknown".to_string());
            let fps = record
                .and_then(|r| r.frame_rate)
                .map(|r| format!("{:.3}", r.as_f64()))
                .unwrap_or_else(|| "Unknown".to_string());

            let row = [
                trial_id.clone(),
                file_name,
                creation,
                timecode,
                fps,
                offset.to_string(),
            ];
            let rendered: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
            out.push_str(&rendered.join(","));
            out.push('\n');
        }
    }
    out
}

/// Quote a CSV field only when it needs it.
fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FrameRate;
    use chrono::{TimeZone, Utc};

    fn record(
        path: &str,
        creation: (u32, u32, u32),
        timecode: &str,
        rate: Option<FrameRate>,
    ) -> MediaRecord {
        let (h, m, s) = creation;
        let mut record = MediaRecord::new(path);
        record.creation_time = Some(Utc.with_ymd_and_hms(2025, 6, 1, h, m, s).unwrap());
        record.timecode = Some(timecode.to_string());
        record.frame_rate = rate;
        record
    }

    fn fps(num: u32) -> Option<FrameRate> {
        FrameRate::new(num, 1)
    }

    #[test]
    fn two_camera_offset_scenario() {
        let a = record("/f/a.mp4", (10, 0, 0), "01:00:00:00", fps(30));
        let b = record("/f/b.mp4", (10, 0, 2), "01:00:02:15", fps(30));

        let trial = SyncEngine::new().synchronize("trial", &[b, a]).unwrap();
        let manifest = &trial.manifest;

        assert_eq!(manifest.reference_video, "/f/a.mp4");
        assert_eq!(manifest.offsets["/f/a.mp4"], 0);
        assert_eq!(manifest.offsets["/f/b.mp4"], 75);
    }

    #[test]
    fn reference_offset_is_always_zero() {
        let a = record("/f/a.mp4", (9, 59, 58), "00:59:58:10", fps(30));
        let b = record("/f/b.mp4", (10, 0, 0), "01:00:00:00", fps(30));
        let trial = SyncEngine::new().synchronize("trial", &[a, b]).unwrap();
        assert_eq!(trial.manifest.reference_offset(), Some(0));
    }

    #[test]
    fn single_file_yields_single_zero_offset() {
        let a = record("/f/a.mp4", (10, 0, 0), "01:00:00:00", fps(30));
        let trial = SyncEngine::new().synchronize("solo", &[a]).unwrap();
        assert_eq!(trial.manifest.offsets.len(), 1);
        assert_eq!(trial.manifest.offsets["/f/a.mp4"], 0);
    }

    #[test]
    fn identical_timecode_and_rate_get_identical_offsets() {
        let a = record("/f/a.mp4", (10, 0, 0), "01:00:00:00", fps(30));
        let b = record("/f/b.mp4", (10, 0, 1), "01:00:01:10", fps(30));
        let c = record("/f/c.mp4", (10, 0, 2), "01:00:01:10", fps(30));

        let trial = SyncEngine::new().synchronize("trial", &[a, b, c]).unwrap();
        assert_eq!(
            trial.manifest.offsets["/f/b.mp4"],
            trial.manifest.offsets["/f/c.mp4"]
        );
    }

    #[test]
    fn offset_scales_with_frame_rate_for_constant_delta() {
        // Both b files sit 2.5 s after the reference.
        let a = record("/f/a.mp4", (10, 0, 0), "01:00:00:00", fps(30));
        let b30 = record("/f/b30.mp4", (10, 0, 2), "01:00:02:15", fps(30));
        let b60 = record("/f/b60.mp4", (10, 0, 3), "01:00:02:30", fps(60));

        let trial = SyncEngine::new().synchronize("trial", &[a, b30, b60]).unwrap();
        assert_eq!(trial.manifest.offsets["/f/b30.mp4"], 75);
        assert_eq!(trial.manifest.offsets["/f/b60.mp4"], 150);
    }

    #[test]
    fn mixed_frame_rates_resolve_through_absolute_seconds() {
        let a = record("/f/a.mp4", (10, 0, 0), "01:00:00:00", fps(30));
        let b = record("/f/b.mp4", (10, 0, 1), "01:00:01:00", fps(25));

        let trial = SyncEngine::new().synchronize("trial", &[a, b]).unwrap();
        // 1.0 s later at 25 fps.
        assert_eq!(trial.manifest.offsets["/f/b.mp4"], 25);
    }

    #[test]
    fn unusable_records_are_excluded_not_dropped() {
        let a = record("/f/a.mp4", (10, 0, 0), "01:00:00:00", fps(30));
        let no_rate = record("/f/norate.mp4", (10, 0, 1), "01:00:01:00", None);
        let bad_tc = record("/f/badtc.mp4", (10, 0, 1), "garbage", fps(30));
        let mut no_tc = record("/f/notc.mp4", (10, 0, 1), "unused", fps(30));
        no_tc.timecode = None;

        let trial = SyncEngine::new()
            .synchronize("trial", &[a, no_rate, bad_tc, no_tc])
            .unwrap();

        assert_eq!(trial.manifest.offsets.len(), 1);
        assert_eq!(trial.excluded.len(), 3);
        let reasons: Vec<&str> = trial.excluded.iter().map(|e| e.reason.as_str()).collect();
        assert!(reasons.iter().any(|r| r.contains("frame rate")));
        assert!(reasons.iter().any(|r| r.contains("unparsable timecode")));
        assert!(reasons.iter().any(|r| r.contains("no timecode")));
    }

    #[test]
    fn all_records_unusable_is_an_error() {
        let mut a = record("/f/a.mp4", (10, 0, 0), "unused", fps(30));
        a.timecode = None;
        let result = SyncEngine::new().synchronize("trial", &[a]);
        assert!(matches!(result, Err(SyncError::NoUsableRecords { .. })));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            SyncEngine::new().synchronize("trial", &[]),
            Err(SyncError::Empty)
        ));
    }

    #[test]
    fn unknown_reference_length_falls_back_with_warning() {
        let a = record("/f/a.mp4", (10, 0, 0), "01:00:00:00", fps(30));
        let trial = SyncEngine::new().synchronize("trial", &[a]).unwrap();
        assert_eq!(trial.manifest.end_frame_on_reference_video, END_FRAME_FALLBACK);
        assert!(trial.warnings.iter().any(|w| w.contains("frame count")));
    }

    #[test]
    fn known_reference_length_sets_window() {
        let mut a = record("/f/a.mp4", (10, 0, 0), "01:00:00:00", fps(30));
        a.nb_frames = Some(5400);
        let trial = SyncEngine::new().synchronize("trial", &[a]).unwrap();
        assert_eq!(trial.manifest.start_frame_on_reference_video, 0);
        assert_eq!(trial.manifest.end_frame_on_reference_video, 5400);
    }

    #[test]
    fn out_of_range_frame_field_warns_but_counts() {
        let a = record("/f/a.mp4", (10, 0, 0), "01:00:00:00", fps(30));
        let b = record("/f/b.mp4", (10, 0, 1), "01:00:01:45", fps(30));
        let trial = SyncEngine::new().synchronize("trial", &[a, b]).unwrap();
        assert!(trial.manifest.offsets.contains_key("/f/b.mp4"));
        assert!(trial.warnings.iter().any(|w| w.contains("frame field")));
    }

    #[test]
    fn synchronization_is_deterministic() {
        let make = || {
            vec![
                record("/f/a.mp4", (10, 0, 0), "01:00:00:00", fps(30)),
                record("/f/b.mp4", (10, 0, 2), "01:00:02:15", fps(30)),
                record("/f/c.mp4", (10, 0, 4), "01:00:04:00", fps(30)),
            ]
        };
        let engine = SyncEngine::new();
        let first = engine.synchronize("trial", &make()).unwrap();
        let mut reversed = make();
        reversed.reverse();
        let second = engine.synchronize("trial", &reversed).unwrap();

        assert_eq!(
            first.manifest.to_json_string().unwrap(),
            second.manifest.to_json_string().unwrap()
        );
    }

    #[test]
    fn grouping_splits_on_timestamp_gaps() {
        let r1 = record("/f/20250601_100000-GoPro1111-squat.mp4", (10, 0, 0), "01:00:00:00", fps(30));
        let r2 = record("/f/20250601_100003-GoPro2222-squat.mp4", (10, 0, 3), "01:00:03:00", fps(30));
        let r3 = record("/f/20250601_103000-GoPro1111-jump.mp4", (10, 30, 0), "01:30:00:00", fps(30));
        let unstamped = MediaRecord::new("/f/GOPR0001.mp4");

        let engine = SyncEngine::new();
        let (trials, ungrouped) = engine.group_by_trial(vec![r3, r1, r2, unstamped]);

        assert_eq!(trials.len(), 2);
        assert_eq!(trials[0].0, "20250601_100000");
        assert_eq!(trials[0].1.len(), 2);
        assert_eq!(trials[1].0, "20250601_103000");
        assert_eq!(ungrouped.len(), 1);
        assert!(ungrouped[0].reason.contains("timestamp"));
    }

    #[test]
    fn sync_records_reports_failed_trials() {
        let good_a = record("/f/20250601_100000-GoPro1111-a.mp4", (10, 0, 0), "01:00:00:00", fps(30));
        let good_b = record("/f/20250601_100002-GoPro2222-a.mp4", (10, 0, 2), "01:00:02:15", fps(30));
        let mut bad = record("/f/20250601_110000-GoPro1111-b.mp4", (11, 0, 0), "unused", fps(30));
        bad.timecode = None;

        let report = SyncEngine::new()
            .sync_records(vec![good_a, good_b, bad], Vec::new())
            .unwrap();

        assert_eq!(report.trials.len(), 1);
        assert_eq!(report.failed_trials.len(), 1);
        assert_eq!(report.failed_trials[0].0, "20250601_110000");
    }

    #[test]
    fn outputs_are_written_and_byte_stable() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SyncEngine::new();

        let build = || {
            let a = record("/f/20250601_100000-GoPro1111-a.mp4", (10, 0, 0), "01:00:00:00", fps(30));
            let b = record("/f/20250601_100002-GoPro2222-a.mp4", (10, 0, 2), "01:00:02:15", fps(30));
            engine.sync_records(vec![a, b], Vec::new()).unwrap()
        };

        let mut first = build();
        engine.write_outputs(&mut first, dir.path()).unwrap();
        let json_first = fs::read_to_string(first.output_json.as_ref().unwrap()).unwrap();
        let csv_first = fs::read_to_string(first.output_csv.as_ref().unwrap()).unwrap();

        let mut second = build();
        engine.write_outputs(&mut second, dir.path()).unwrap();
        let json_second = fs::read_to_string(second.output_json.as_ref().unwrap()).unwrap();
        let csv_second = fs::read_to_string(second.output_csv.as_ref().unwrap()).unwrap();

        assert_eq!(json_first, json_second);
        assert_eq!(csv_first, csv_second);
        assert!(json_first.contains("reference_video"));
        assert!(csv_first.starts_with("Trial,Filename,Creation Time,Timecode,FPS,Offset (frames)"));
        assert!(csv_first.contains("75"));
    }
}
