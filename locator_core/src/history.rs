//! History store and CSV export.
//!
//! The long-term record of raw + scene coordinates, used by the picker for
//! hover lookup and by export. Capped at `max_saved_points`; once full,
//! every append evicts exactly one oldest entry.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::ExportError;
use crate::sample::{RawSample, SceneSample};

/// CSV header row.
pub const CSV_HEADER: &str = "timestamp,raw_x,raw_y,raw_z,scene_x,scene_y,scene_z";

/// A raw sample together with the scene coordinate derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub raw: RawSample,
    pub scene: SceneSample,
}

impl HistoryEntry {
    pub fn new(raw: RawSample, scene: SceneSample) -> Self {
        Self { raw, scene }
    }

    /// Hover text: `x:<3dp>, y:<3dp>, z:<3dp>` of the raw coordinate.
    pub fn tooltip(&self) -> String {
        format!("x:{:.3}, y:{:.3}, z:{:.3}", self.raw.x, self.raw.y, self.raw.z)
    }

    /// Clipboard text: raw coordinate with 6 decimals.
    pub fn clipboard_text(&self) -> String {
        format!("{:.6}, {:.6}, {:.6}", self.raw.x, self.raw.y, self.raw.z)
    }

    /// One CSV data row. Floats use the shortest representation that
    /// round-trips exactly.
    pub fn csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            iso_timestamp(&self.raw.timestamp),
            self.raw.x,
            self.raw.y,
            self.raw.z,
            self.scene.sx,
            self.scene.sy,
            self.scene.sz,
        )
    }
}

/// ISO-8601 with millisecond precision and `Z` suffix.
pub fn iso_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Suggested export filename, `trajectory_<iso timestamp>.csv` with `:` and `.` replaced by `-`.
pub fn suggested_filename(now: &DateTime<Utc>) -> String {
    let stamp = iso_timestamp(now).replace([':', '.'], "-");
    format!("trajectory_{stamp}.csv")
}

/// CSV text detached from the store, so the file write can happen after
/// the session lock is released.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSnapshot {
    pub filename: String,
    pub csv: String,
    /// Data rows, excluding the header
    pub rows: usize,
}

impl ExportSnapshot {
    /// Writes the CSV into `dir` and returns the file path.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
        let path = dir.as_ref().join(&self.filename);
        std::fs::write(&path, &self.csv)?;
        tracing::info!(path = %path.display(), rows = self.rows, "exported history");
        Ok(path)
    }
}

/// FIFO-capped store of history entries.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    entries: VecDeque<HistoryEntry>,
    max_len: usize,
}

impl HistoryStore {
    /// Creates an empty store capped at `max_len` entries (at least one).
    pub fn new(max_len: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            entries: VecDeque::with_capacity(max_len.min(4096)),
            max_len,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Appends an entry, evicting the oldest first when at capacity.
    pub fn append(&mut self, entry: HistoryEntry) {
        if self.entries.len() >= self.max_len {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in chronological order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HistoryEntry> + ExactSizeIterator + '_ {
        self.entries.iter()
    }

    /// The `limit` most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.entries.iter().rev().take(limit)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Renders the store as CSV: header plus one row per entry, newline separated.
    pub fn to_csv(&self) -> String {
        let mut out = String::with_capacity(CSV_HEADER.len() + self.entries.len() * 96);
        out.push_str(CSV_HEADER);
        for entry in &self.entries {
            out.push('\n');
            // Writing into a String cannot fail
            let _ = write!(out, "{}", entry.csv_row());
        }
        out
    }

    /// Captures the CSV text and filename for a later write.
    ///
    /// `Err(ExportError::Empty)` when there is nothing to export.
    pub fn export_snapshot(&self, now: &DateTime<Utc>) -> Result<ExportSnapshot, ExportError> {
        if self.is_empty() {
            tracing::info!("nothing to export");
            return Err(ExportError::Empty);
        }
        Ok(ExportSnapshot {
            filename: suggested_filename(now),
            csv: self.to_csv(),
            rows: self.len(),
        })
    }

    /// Writes the CSV into `dir` under the suggested filename.
    ///
    /// # Returns
    /// * `Ok(path)` - File written
    /// * `Err(ExportError::Empty)` - Nothing to export, no file created
    pub fn export_to_dir(&self, dir: impl AsRef<Path>, now: &DateTime<Utc>) -> Result<PathBuf, ExportError> {
        self.export_snapshot(now)?.write_to(dir)
    }

    /// Drops the backing storage entirely (engine teardown).
    pub(crate) fn release(&mut self) {
        self.entries = VecDeque::new();
    }
}
