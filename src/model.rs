// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Domain models and core data structures.
//!
//! This module defines the central entities of the caching layer: cached
//! track metadata, filesystem observations, reconciliation diffs, and the
//! advisory statistics record.

use serde::{Deserialize, Serialize};

/// Parsed tag fields for one media file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackTags {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<u32>,
    pub genre: Option<String>,
    pub track_number: Option<u32>,
}

/// A cached metadata row for one media file.
///
/// The `id` is the file's stable absolute path and acts as the unique
/// primary key for the record's whole lifetime. A record is created on
/// first scan, refreshed in place when the file's modification time moves
/// forward, and removed when a completed enumeration shows the file gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: String,
    pub tags: TrackTags,
    pub duration_seconds: u64,
    pub bitrate_bps: Option<u32>,
    pub mtime_millis: i64,
    pub size_bytes: Option<i64>,
    pub cached_at_millis: i64,
    pub favorite: bool,
}

/// Tag reader output: a full record plus the raw artwork payload lifted
/// out of the file's embedded picture.
///
/// The payload travels explicitly with the scan result rather than being
/// stripped off a shared object later; art acquisition consumes it and the
/// caller drops its own copy afterwards.
#[derive(Debug, Clone)]
pub struct ScannedTrack {
    pub record: TrackRecord,
    pub artwork: Option<Vec<u8>>,
}

/// What the filesystem enumerator observes for one file without opening it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileIdentity {
    pub path: String,
    pub mtime_millis: i64,
    pub size_bytes: i64,
}

/// Result of enumerating the media directories.
///
/// `Unknown` is the explicit "could not fully enumerate" sentinel. An
/// enumerator must never return a silently truncated listing; deletion
/// detection is only valid against a `Complete` one.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    Complete(Vec<FileIdentity>),
    Unknown,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibraryDiff {
    pub new_ids: Vec<String>,
    pub modified_ids: Vec<String>,
    pub deleted_ids: Vec<String>,
}

impl LibraryDiff {
    /// True when the pass found nothing to do.
    pub fn is_empty(&self) -> bool {
        self.new_ids.is_empty() && self.modified_ids.is_empty() && self.deleted_ids.is_empty()
    }
}

/// Advisory cache counters, never used for correctness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: i64,
    pub misses: i64,
    pub total_tracks: i64,
    pub last_update_millis: i64,
}

/// Per-record outcome counts for a best-effort write batch.
///
/// The batch itself commits as one transaction; these counts report rows
/// that were individually rejected while the remainder went through.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchReport {
    pub applied: usize,
    pub failed: usize,
}
