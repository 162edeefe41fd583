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

//! Database row mapping for domain models.
//!
//! This module provides the conversion logic between raw SQLite result
//! rows and the cached track records, ensuring type-safe extraction of
//! model attributes from database queries.

use rusqlite::Row;

use crate::model::{TrackRecord, TrackTags};

impl TrackRecord {
    /// Maps an SQLite row to a [`TrackRecord`] instance.
    ///
    /// Column order must match the store's shared SELECT column list.
    ///
    /// # Errors
    ///
    /// Returns a [`rusqlite::Error`] if:
    /// * The row does not contain enough columns.
    /// * The data in a column cannot be converted to the required Rust type.
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let duration: i64 = row.get(7)?;

        Ok(Self {
            id: row.get(0)?,
            tags: TrackTags {
                title: row.get(1)?,
                artist: row.get(2)?,
                album: row.get(3)?,
                year: row.get(4)?,
                genre: row.get(5)?,
                track_number: row.get(6)?,
            },
            duration_seconds: u64::try_from(duration).unwrap_or(0),
            bitrate_bps: row.get(8)?,
            mtime_millis: row.get(9)?,
            size_bytes: row.get(10)?,
            cached_at_millis: row.get(11)?,
            favorite: row.get(12)?,
        })
    }
}

/// Parameter tuple for the store's upsert statement, in column order.
#[allow(clippy::type_complexity)]
pub(super) fn upsert_params(
    record: &TrackRecord,
) -> (
    &str,
    &str,
    &str,
    &str,
    Option<u32>,
    Option<&str>,
    Option<u32>,
    i64,
    Option<u32>,
    i64,
    Option<i64>,
    i64,
    bool,
) {
    (
        record.id.as_str(),
        record.tags.title.as_str(),
        record.tags.artist.as_str(),
        record.tags.album.as_str(),
        record.tags.year,
        record.tags.genre.as_deref(),
        record.tags.track_number,
        i64::try_from(record.duration_seconds).unwrap_or(-1),
        record.bitrate_bps,
        record.mtime_millis,
        record.size_bytes,
        record.cached_at_millis,
        record.favorite,
    )
}
