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

//! Persistent track metadata store.
//!
//! This module handles all interactions with the SQLite database backing
//! the cache: schema creation, upserts, deletions, and the secondary
//! grouping queries. It uses cached statements to optimize frequently
//! executed queries.
//!
//! # Tables
//!
//! * `tracks` - One row per media file, keyed by absolute path, with
//!   secondary indices on album, artist, and modification time.
//! * `cache_stats` - A singleton row of advisory counters carrying the
//!   schema version tag.
//!
//! # Versioning
//!
//! The singleton row records the schema version the database was created
//! with. A mismatch on open triggers a drop-and-rebuild of both tables
//! rather than an attempt to read rows in an incompatible layout; the
//! database is only ever a cache, so losing it costs one full rescan.

mod model;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::{BatchReport, CacheStats, TrackRecord};

/// Bumped whenever the persisted layout changes incompatibly.
const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = "BEGIN;

    CREATE TABLE IF NOT EXISTS tracks (
        path TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        artist TEXT NOT NULL,
        album TEXT NOT NULL,
        year INTEGER,
        genre TEXT,
        track_number INTEGER,
        duration INTEGER NOT NULL,
        bitrate INTEGER,
        mtime INTEGER NOT NULL,
        size INTEGER,
        cached_at INTEGER NOT NULL,
        favorite INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks (album);
    CREATE INDEX IF NOT EXISTS idx_tracks_artist ON tracks (artist);
    CREATE INDEX IF NOT EXISTS idx_tracks_mtime ON tracks (mtime);

    CREATE TABLE IF NOT EXISTS cache_stats (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        schema_version INTEGER NOT NULL,
        hits INTEGER NOT NULL DEFAULT 0,
        misses INTEGER NOT NULL DEFAULT 0,
        total_tracks INTEGER NOT NULL DEFAULT 0,
        last_update_millis INTEGER NOT NULL DEFAULT 0
    );

    COMMIT;";

const UPSERT_SQL: &str = "
    INSERT INTO tracks (path, title, artist, album, year, genre, track_number,
                        duration, bitrate, mtime, size, cached_at, favorite)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
    ON CONFLICT (path) DO UPDATE SET
        title = excluded.title,
        artist = excluded.artist,
        album = excluded.album,
        year = excluded.year,
        genre = excluded.genre,
        track_number = excluded.track_number,
        duration = excluded.duration,
        bitrate = excluded.bitrate,
        mtime = excluded.mtime,
        size = excluded.size,
        cached_at = excluded.cached_at,
        favorite = excluded.favorite";

const SELECT_SQL: &str = "
    SELECT path, title, artist, album, year, genre, track_number,
           duration, bitrate, mtime, size, cached_at, favorite
    FROM tracks";

/// Handle to the SQLite database holding cached track metadata.
///
/// Each thread that needs the store opens its own handle against the same
/// database file; WAL mode keeps readers unblocked while the background
/// worker writes.
pub struct MetadataStore {
    conn: Connection,
}

impl MetadataStore {
    /// Opens the database file and configures performance settings.
    ///
    /// Idempotent and safe under concurrent callers: schema creation runs
    /// inside a transaction with `IF NOT EXISTS` guards, so only the first
    /// opener actually creates anything.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CacheError::StoreUnavailable`] if the file
    /// cannot be opened or the schema cannot be initialized.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::configure(conn)
    }

    /// Opens a private in-memory database, useful for tests and for
    /// sessions that should not persist anything.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self> {
        // In-memory databases report "memory" here; that is fine, WAL is
        // only needed for cross-connection concurrency on disk.
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
        if journal_mode != "wal" && journal_mode != "memory" {
            warn!(mode = %journal_mode, "could not switch journal mode to WAL");
        }

        conn.execute_batch(
            "
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 15000;
            PRAGMA cache_size = -64000; -- Use 64MB of RAM for cache
        ",
        )?;

        conn.set_prepared_statement_cache_capacity(100);

        create_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Fetches the record for one file identity.
    ///
    /// Records an advisory cache hit or miss as a side effect.
    pub fn get(&self, id: &str) -> Result<Option<TrackRecord>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{SELECT_SQL} WHERE path = ?1"))?;
        let record = stmt
            .query_row([id], TrackRecord::from_row)
            .optional()?;

        // Counter updates are advisory only, never worth failing a read.
        let column = if record.is_some() { "hits" } else { "misses" };
        let _ = self.conn.execute(
            &format!("UPDATE cache_stats SET {column} = {column} + 1 WHERE id = 1"),
            [],
        );

        Ok(record)
    }

    /// Upserts a single record by its path key.
    pub fn set(&mut self, record: &TrackRecord) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(UPSERT_SQL)?;
        stmt.execute(model::upsert_params(record))?;
        Ok(())
    }

    /// Upserts a batch of records as one atomic unit.
    ///
    /// The batch commits in a single transaction, so a concurrent reader
    /// observes either none or all of it. Within the transaction, a row
    /// that SQLite rejects is skipped and counted while the remainder goes
    /// through; the returned [`BatchReport`] carries both counts.
    ///
    /// # Errors
    ///
    /// Returns an error only if the transaction itself cannot be started
    /// or committed.
    pub fn set_many(&mut self, records: &[TrackRecord]) -> Result<BatchReport> {
        let mut report = BatchReport::default();

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_SQL)?;
            for record in records {
                match stmt.execute(model::upsert_params(record)) {
                    Ok(_) => report.applied += 1,
                    Err(e) => {
                        warn!(id = %record.id, error = %e, "skipping record in batch");
                        report.failed += 1;
                    }
                }
            }
        }
        tx.commit()?;

        Ok(report)
    }

    /// Deletes one record. Returns whether a row was actually removed.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("DELETE FROM tracks WHERE path = ?1")?;
        Ok(stmt.execute([id])? > 0)
    }

    /// Deletes a batch of records in one transaction, returning the number
    /// of rows removed.
    pub fn delete_many(&mut self, ids: &[String]) -> Result<usize> {
        let mut removed = 0;

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM tracks WHERE path = ?1")?;
            for id in ids {
                removed += stmt.execute([id])?;
            }
        }
        tx.commit()?;

        Ok(removed)
    }

    /// Fetches every cached path key, sorted.
    pub fn all_keys(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT path FROM tracks ORDER BY path")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(keys)
    }

    /// Fetches every cached record, sorted by path.
    ///
    /// An empty table yields an empty vector, not an error.
    pub fn all_records(&self) -> Result<Vec<TrackRecord>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{SELECT_SQL} ORDER BY path"))?;
        let records = stmt
            .query_map([], TrackRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    /// Fetches all records for an album, ordered by track number and title.
    pub fn records_for_album(&self, album: &str) -> Result<Vec<TrackRecord>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{SELECT_SQL} WHERE album = ?1 ORDER BY track_number, title"
        ))?;
        let records = stmt
            .query_map([album], TrackRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    /// Fetches all records for an artist, ordered by album and track number.
    pub fn records_for_artist(&self, artist: &str) -> Result<Vec<TrackRecord>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{SELECT_SQL} WHERE artist = ?1 ORDER BY album, track_number"
        ))?;
        let records = stmt
            .query_map([artist], TrackRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    /// Fetches records whose file modification time is at or after the
    /// given timestamp, newest first.
    pub fn records_modified_since(&self, mtime_millis: i64) -> Result<Vec<TrackRecord>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{SELECT_SQL} WHERE mtime >= ?1 ORDER BY mtime DESC"
        ))?;
        let records = stmt
            .query_map([mtime_millis], TrackRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    /// Number of cached records.
    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Persists the favorite flag in place. Returns whether the record
    /// existed.
    pub fn set_favorite(&mut self, id: &str, favorite: bool) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("UPDATE tracks SET favorite = ?2 WHERE path = ?1")?;
        Ok(stmt.execute(params![id, favorite])? > 0)
    }

    /// Empties the table and resets the advisory counters to zero.
    ///
    /// Only ever called on explicit user action, never automatically.
    pub fn clear(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            DELETE FROM tracks;
            UPDATE cache_stats
            SET hits = 0, misses = 0, total_tracks = 0, last_update_millis = 0
            WHERE id = 1;
            COMMIT;",
        )?;
        Ok(())
    }

    /// Advisory on-disk size estimate in bytes. Zero when unknown.
    pub fn estimate_size(&self) -> u64 {
        let page_count: i64 = self
            .conn
            .query_row("PRAGMA page_count", [], |r| r.get(0))
            .unwrap_or(0);
        let page_size: i64 = self
            .conn
            .query_row("PRAGMA page_size", [], |r| r.get(0))
            .unwrap_or(0);

        u64::try_from(page_count.saturating_mul(page_size)).unwrap_or(0)
    }

    /// Fetches the advisory counters.
    pub fn stats(&self) -> Result<CacheStats> {
        let stats = self.conn.query_row(
            "SELECT hits, misses, total_tracks, last_update_millis
             FROM cache_stats WHERE id = 1",
            [],
            |row| {
                Ok(CacheStats {
                    hits: row.get(0)?,
                    misses: row.get(1)?,
                    total_tracks: row.get(2)?,
                    last_update_millis: row.get(3)?,
                })
            },
        )?;

        Ok(stats)
    }

    /// Refreshes the track total and last-update timestamp after a
    /// reconciliation pass.
    pub fn refresh_totals(&mut self, now_millis: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE cache_stats
             SET total_tracks = (SELECT COUNT(*) FROM tracks),
                 last_update_millis = ?1
             WHERE id = 1",
            params![now_millis],
        )?;
        Ok(())
    }
}

/// Creates the schema if absent and verifies the version tag.
///
/// On a version mismatch both tables are dropped and recreated. The cache
/// is not source-of-truth for any of its data, so a rebuild only costs one
/// full rescan.
fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    seed_stats_row(conn)?;

    let version: Option<i64> = conn
        .query_row("SELECT schema_version FROM cache_stats WHERE id = 1", [], |r| r.get(0))
        .optional()
        .unwrap_or(None);

    match version {
        Some(v) if v == SCHEMA_VERSION => {
            debug!(version = v, "schema up to date");
            Ok(())
        }
        found => {
            info!(?found, expected = SCHEMA_VERSION, "schema version mismatch, rebuilding");
            conn.execute_batch(
                "BEGIN;
                DROP TABLE IF EXISTS tracks;
                DROP TABLE IF EXISTS cache_stats;
                COMMIT;",
            )?;
            conn.execute_batch(SCHEMA_SQL)?;
            seed_stats_row(conn)
        }
    }
}

fn seed_stats_row(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO cache_stats (id, schema_version) VALUES (1, ?1)",
        params![SCHEMA_VERSION],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackTags;

    fn sample_record(id: &str, mtime_millis: i64) -> TrackRecord {
        TrackRecord {
            id: id.to_string(),
            tags: TrackTags {
                title: format!("Title {id}"),
                artist: "Some Artist".to_string(),
                album: "Some Album".to_string(),
                year: Some(2001),
                genre: Some("Electronic".to_string()),
                track_number: Some(1),
            },
            duration_seconds: 245,
            bitrate_bps: Some(320_000),
            mtime_millis,
            size_bytes: Some(9_000_000),
            cached_at_millis: 1_000,
            favorite: false,
        }
    }

    #[test]
    fn count_is_zero_on_fresh_store() {
        let store = MetadataStore::open_in_memory().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.all_records().unwrap().is_empty());
        assert!(store.all_keys().unwrap().is_empty());
    }

    #[test]
    fn set_then_get_roundtrips() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        let record = sample_record("/music/a.mp3", 10);
        store.set(&record).unwrap();

        let fetched = store.get("/music/a.mp3").unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[test]
    fn set_is_an_upsert() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        let mut record = sample_record("/music/a.mp3", 10);
        store.set(&record).unwrap();

        record.mtime_millis = 20;
        record.tags.title = "Renamed".to_string();
        store.set(&record).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let fetched = store.get("/music/a.mp3").unwrap().unwrap();
        assert_eq!(fetched.mtime_millis, 20);
        assert_eq!(fetched.tags.title, "Renamed");
    }

    #[test]
    fn set_many_applies_whole_batch() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        let records = vec![
            sample_record("/music/a.mp3", 10),
            sample_record("/music/b.mp3", 11),
            sample_record("/music/c.mp3", 12),
        ];

        let report = store.set_many(&records).unwrap();
        assert_eq!(report.applied, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn delete_makes_get_return_none() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        store.set(&sample_record("/music/a.mp3", 10)).unwrap();

        assert!(store.delete("/music/a.mp3").unwrap());
        assert!(store.get("/music/a.mp3").unwrap().is_none());
        assert!(!store.delete("/music/a.mp3").unwrap());
    }

    #[test]
    fn delete_many_removes_only_named_rows() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        store
            .set_many(&[
                sample_record("/music/a.mp3", 10),
                sample_record("/music/b.mp3", 11),
                sample_record("/music/c.mp3", 12),
            ])
            .unwrap();

        let removed = store
            .delete_many(&["/music/a.mp3".to_string(), "/music/c.mp3".to_string()])
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.all_keys().unwrap(), vec!["/music/b.mp3".to_string()]);
    }

    #[test]
    fn clear_empties_table_and_resets_stats() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        store
            .set_many(&[sample_record("/music/a.mp3", 10), sample_record("/music/b.mp3", 11)])
            .unwrap();
        store.refresh_totals(5_000).unwrap();
        let _ = store.get("/music/a.mp3").unwrap();

        store.clear().unwrap();

        assert!(store.all_records().unwrap().is_empty());
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_tracks, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.last_update_millis, 0);
    }

    #[test]
    fn favorite_flag_persists() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        store.set(&sample_record("/music/a.mp3", 10)).unwrap();

        assert!(store.set_favorite("/music/a.mp3", true).unwrap());
        assert!(store.get("/music/a.mp3").unwrap().unwrap().favorite);

        assert!(!store.set_favorite("/music/missing.mp3", true).unwrap());
    }

    #[test]
    fn hit_and_miss_counters_advance() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        store.set(&sample_record("/music/a.mp3", 10)).unwrap();

        let _ = store.get("/music/a.mp3").unwrap();
        let _ = store.get("/music/missing.mp3").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn album_query_orders_by_track_number() {
        let mut store = MetadataStore::open_in_memory().unwrap();

        let mut first = sample_record("/music/b.mp3", 10);
        first.tags.track_number = Some(1);
        let mut second = sample_record("/music/a.mp3", 10);
        second.tags.track_number = Some(2);
        let mut other_album = sample_record("/music/c.mp3", 10);
        other_album.tags.album = "Different Album".to_string();

        store.set_many(&[second.clone(), first.clone(), other_album]).unwrap();

        let records = store.records_for_album("Some Album").unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["/music/b.mp3", "/music/a.mp3"]);
    }

    #[test]
    fn modified_since_returns_newest_first() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        store
            .set_many(&[
                sample_record("/music/old.mp3", 100),
                sample_record("/music/mid.mp3", 200),
                sample_record("/music/new.mp3", 300),
            ])
            .unwrap();

        let records = store.records_modified_since(200).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["/music/new.mp3", "/music/mid.mp3"]);
    }

    #[test]
    fn estimate_size_is_nonzero_once_schema_exists() {
        let store = MetadataStore::open_in_memory().unwrap();
        assert!(store.estimate_size() > 0);
    }

    #[test]
    fn schema_version_mismatch_rebuilds_instead_of_reading() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("library.db");
        let db_path = db_path.to_str().unwrap();

        {
            let mut store = MetadataStore::open(db_path).unwrap();
            store.set(&sample_record("/music/a.mp3", 10)).unwrap();
        }

        // Pretend a future version wrote this database.
        {
            let conn = Connection::open(db_path).unwrap();
            conn.execute("UPDATE cache_stats SET schema_version = 99 WHERE id = 1", [])
                .unwrap();
        }

        let store = MetadataStore::open(db_path).unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.stats().unwrap().total_tracks, 0);
    }

    #[test]
    fn reopening_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("library.db");
        let db_path = db_path.to_str().unwrap();

        {
            let mut store = MetadataStore::open(db_path).unwrap();
            store.set(&sample_record("/music/a.mp3", 10)).unwrap();
        }

        let store = MetadataStore::open(db_path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
