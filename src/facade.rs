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

//! Library cache entrypoint.
//!
//! [`MediaCache`] hands the host its cached library immediately and keeps
//! the cache honest in the background. Reconciliation runs on a dedicated
//! worker thread with its own database connection, so the fast path never
//! waits on a filesystem round trip; results come back to the host as
//! [`LibraryEvent`]s on the channel it supplied.
//!
//! # Architecture
//!
//! * The **facade** lives on the host's event-loop thread and serves
//!   queries, favorite toggles, and artwork acquisition synchronously.
//! * A **refresh worker** owns a second store handle and processes
//!   [`CacheCommand`]s, one reconciliation pass at a time. A trigger that
//!   arrives while a pass is in flight is coalesced, not queued.
//!
//! If the database cannot be opened at all, the facade logs it once and
//! degrades to an uncached session: queries return empty results and
//! every refresh is a full rescan. Nothing propagates to the host.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use crate::art::ArtDeduplicationCache;
use crate::art::blob::BlobRef;
use crate::config::CacheConfig;
use crate::events::LibraryEvent;
use crate::model::{CacheStats, TrackRecord};
use crate::reconcile;
use crate::scan::tags::{LoftyTagReader, TagReader};
use crate::scan::{FileSystemEnumerator, WalkdirEnumerator};
use crate::store::MetadataStore;
use crate::util::time::now_millis;

#[derive(Debug)]
enum CacheCommand {
    Refresh,
}

/// Facade over the metadata store, the reconciler, and the art cache.
pub struct MediaCache {
    config: CacheConfig,
    store: Option<MetadataStore>,
    art: ArtDeduplicationCache,
    tag_reader: Arc<dyn TagReader>,
    command_tx: Sender<CacheCommand>,
    refresh_in_flight: Arc<AtomicBool>,
}

impl MediaCache {
    /// Opens the cache with the default filesystem enumerator and tag
    /// reader.
    ///
    /// # Arguments
    ///
    /// * `config` - Media roots, database location, and extension filter.
    /// * `event_tx` - The host's channel for lifecycle notifications.
    pub fn open(config: CacheConfig, event_tx: Sender<LibraryEvent>) -> Self {
        let enumerator = Box::new(WalkdirEnumerator::new(&config.audio_extensions));
        Self::with_components(config, event_tx, enumerator, Arc::new(LoftyTagReader))
    }

    /// Opens the cache with explicit enumerator and tag reader
    /// implementations. The seam the tests and embedded hosts use.
    pub fn with_components(
        config: CacheConfig,
        event_tx: Sender<LibraryEvent>,
        enumerator: Box<dyn FileSystemEnumerator>,
        tag_reader: Arc<dyn TagReader>,
    ) -> Self {
        let store = match MetadataStore::open(&config.database_file) {
            Ok(store) => Some(store),
            Err(e) => {
                // Reported once, here; the session continues uncached.
                warn!(error = %e, "metadata store unavailable, falling back to uncached session");
                None
            }
        };

        let (command_tx, command_rx) = mpsc::channel();
        let refresh_in_flight = Arc::new(AtomicBool::new(false));

        spawn_refresh_worker(
            config.clone(),
            command_rx,
            event_tx,
            Arc::clone(&refresh_in_flight),
            enumerator,
            Arc::clone(&tag_reader),
            store.is_some(),
        );

        Self {
            config,
            store,
            art: ArtDeduplicationCache::with_memory_store(),
            tag_reader,
            command_tx,
            refresh_in_flight,
        }
    }

    /// Whether a database is backing this session. False means every
    /// query is served from the empty fallback and only rescans see data.
    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Returns the cached library immediately and triggers a background
    /// refresh.
    ///
    /// The returned records may be stale; a [`LibraryEvent::Updated`]
    /// follows once the refresh has brought the cache in line with disk.
    pub fn library(&self) -> Vec<TrackRecord> {
        let records = match &self.store {
            Some(store) => store.all_records().unwrap_or_else(|e| {
                warn!(error = %e, "cached read failed, serving empty library");
                vec![]
            }),
            None => vec![],
        };

        self.refresh();

        records
    }

    /// Triggers a background reconciliation pass.
    ///
    /// At most one pass runs at a time; a trigger arriving while one is
    /// in flight is dropped and satisfied by the in-flight pass.
    pub fn refresh(&self) {
        if self.refresh_in_flight.swap(true, Ordering::SeqCst) {
            debug!("refresh already in flight, coalescing");
            return;
        }

        if self.command_tx.send(CacheCommand::Refresh).is_err() {
            self.refresh_in_flight.store(false, Ordering::SeqCst);
            warn!("refresh worker is gone, cannot refresh");
        }
    }

    /// Fetches one cached record.
    pub fn get(&self, id: &str) -> Option<TrackRecord> {
        self.store.as_ref()?.get(id).unwrap_or_default()
    }

    /// Cached records for an album, in track order.
    pub fn tracks_for_album(&self, album: &str) -> Vec<TrackRecord> {
        match &self.store {
            Some(store) => store.records_for_album(album).unwrap_or_default(),
            None => vec![],
        }
    }

    /// Cached records for an artist, grouped by album.
    pub fn tracks_for_artist(&self, artist: &str) -> Vec<TrackRecord> {
        match &self.store {
            Some(store) => store.records_for_artist(artist).unwrap_or_default(),
            None => vec![],
        }
    }

    /// Number of cached records.
    pub fn count(&self) -> i64 {
        match &self.store {
            Some(store) => store.count().unwrap_or(0),
            None => 0,
        }
    }

    /// Persists the favorite flag for a record. Returns whether the
    /// record existed.
    pub fn set_favorite(&mut self, id: &str, favorite: bool) -> bool {
        match &mut self.store {
            Some(store) => store.set_favorite(id, favorite).unwrap_or(false),
            None => false,
        }
    }

    /// Advisory counters; zeroed in an uncached session.
    pub fn stats(&self) -> CacheStats {
        match &self.store {
            Some(store) => store.stats().unwrap_or_default(),
            None => CacheStats::default(),
        }
    }

    /// Advisory database size estimate in bytes.
    pub fn estimate_size(&self) -> u64 {
        self.store.as_ref().map(|s| s.estimate_size()).unwrap_or(0)
    }

    /// Empties the cache and resets its counters. Explicit user action
    /// only; safe to call while a refresh is in flight, whose late writes
    /// simply repopulate an empty table.
    pub fn clear(&mut self) {
        if let Some(store) = &mut self.store
            && let Err(e) = store.clear()
        {
            warn!(error = %e, "failed to clear metadata store");
        }
    }

    /// Returns the artwork blob for a record, registering it as an owner.
    ///
    /// The payload is materialized lazily on first acquisition of the
    /// record's (album, artist) bucket and shared on every subsequent
    /// one. Records without readable artwork get the shared placeholder.
    pub fn artwork(&mut self, record: &TrackRecord) -> BlobRef {
        let tag_reader = Arc::clone(&self.tag_reader);
        let id = record.id.clone();

        self.art
            .acquire(record, move || tag_reader.read_artwork(&id))
    }

    /// Drops one artwork ownership; the blob is revoked with the last
    /// owner.
    pub fn release_artwork(&mut self, record: &TrackRecord) {
        self.art.release(record);
    }

    /// Revokes all artwork blobs. Called automatically on drop.
    pub fn release_all_artwork(&mut self) {
        self.art.release_all();
    }

    /// Fetches the payload behind an artwork blob, if still live.
    pub fn artwork_bytes(&self, blob: &BlobRef) -> Option<Arc<[u8]>> {
        self.art.bytes(blob)
    }

    /// Direct access to the art cache, mainly for inspection.
    pub fn art(&self) -> &ArtDeduplicationCache {
        &self.art
    }

    /// The configuration this cache was opened with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl Drop for MediaCache {
    fn drop(&mut self) {
        self.art.release_all();
    }
}

/// Spawns the background thread that serves refresh commands.
///
/// The worker opens its own database connection; WAL keeps the facade's
/// readers unblocked while it writes. The in-flight flag is cleared when
/// a pass finishes, right before the update notification goes out.
fn spawn_refresh_worker(
    config: CacheConfig,
    command_rx: Receiver<CacheCommand>,
    event_tx: Sender<LibraryEvent>,
    in_flight: Arc<AtomicBool>,
    enumerator: Box<dyn FileSystemEnumerator>,
    tag_reader: Arc<dyn TagReader>,
    persistent: bool,
) {
    thread::spawn(move || {
        let mut store = if persistent {
            match MetadataStore::open(&config.database_file) {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!(error = %e, "refresh worker could not open metadata store");
                    None
                }
            }
        } else {
            None
        };

        while let Ok(command) = command_rx.recv() {
            match command {
                CacheCommand::Refresh => {
                    let listing = enumerator.enumerate(&config.media_dirs);
                    let result = reconcile::run_pass(
                        store.as_mut(),
                        &listing,
                        tag_reader.as_ref(),
                        now_millis(),
                    );

                    in_flight.store(false, Ordering::SeqCst);

                    let event = match result {
                        Ok(diff) => LibraryEvent::Updated(diff),
                        Err(e) => LibraryEvent::RefreshFailed(e.to_string()),
                    };

                    if event_tx.send(event).is_err() {
                        // Host is gone, nothing left to notify.
                        break;
                    }
                }
            }
        }
    });
}
