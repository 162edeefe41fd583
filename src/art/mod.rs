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

//! Reference-counted cover art deduplication.
//!
//! Albums routinely share one piece of artwork across every track. This
//! module keys artwork by normalized (album, artist), materializes the
//! payload into a blob at most once per key, and hands the same blob
//! reference to every owner. A refcount tracks the owners; the blob is
//! revoked exactly once, when the last owner releases it.
//!
//! # Invariant
//!
//! At every point: an entry exists for a key iff its refcount is greater
//! than zero iff its blob has not been revoked. There are no lingering
//! zero-refcount entries.

pub mod blob;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::art::blob::{BlobRef, BlobStore, MemoryBlobStore};
use crate::error::Result;
use crate::model::TrackRecord;
use crate::scan::tags::{UNKNOWN_ALBUM, UNKNOWN_ARTIST};

// Hash domains for the two key derivations, so an id-keyed single can
// never collide with an (album, artist) pair.
const PAIR_SEED: u64 = 0;
const FALLBACK_SEED: u64 = 1;

/// 1x1 transparent PNG served when a record has no usable artwork.
const PLACEHOLDER_ART: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Deterministic artwork bucket for a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlbumArtKey(u64);

impl AlbumArtKey {
    /// Derives the key from the record's normalized (album, artist) pair.
    ///
    /// When both fields are unknown the key falls back to the record's
    /// own id, so untagged singles get one bucket each instead of all
    /// sharing whatever artwork the first one happened to carry.
    pub fn for_record(record: &TrackRecord) -> Self {
        let album = normalize(&record.tags.album);
        let artist = normalize(&record.tags.artist);

        if is_unknown(&album, UNKNOWN_ALBUM) && is_unknown(&artist, UNKNOWN_ARTIST) {
            return Self(xxh3_64_with_seed(record.id.as_bytes(), FALLBACK_SEED));
        }

        let mut buf = Vec::with_capacity(album.len() + artist.len() + 1);
        buf.extend_from_slice(album.as_bytes());
        buf.push(0x1F);
        buf.extend_from_slice(artist.as_bytes());

        Self(xxh3_64_with_seed(&buf, PAIR_SEED))
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn is_unknown(normalized: &str, marker: &str) -> bool {
    normalized.is_empty() || normalized == marker.to_lowercase()
}

struct ArtCacheEntry {
    blob: BlobRef,
    refcount: usize,
}

/// Shared, refcounted artwork blobs keyed by [`AlbumArtKey`].
///
/// All mutations are synchronous and applied in issue order on the owning
/// thread, so two acquisitions of the same key can never race into two
/// independent entries.
pub struct ArtDeduplicationCache {
    blobs: Box<dyn BlobStore>,
    entries: HashMap<AlbumArtKey, ArtCacheEntry>,
    placeholder: BlobRef,
}

impl ArtDeduplicationCache {
    /// Creates the cache on top of the given blob facility and materializes
    /// the shared placeholder, which is never refcounted and survives
    /// [`ArtDeduplicationCache::release_all`].
    pub fn new(mut blobs: Box<dyn BlobStore>) -> Self {
        let placeholder = blobs.create(PLACEHOLDER_ART.to_vec());

        Self {
            blobs,
            entries: HashMap::new(),
            placeholder,
        }
    }

    /// Creates the cache on the in-memory blob store.
    pub fn with_memory_store() -> Self {
        Self::new(Box::new(MemoryBlobStore::new()))
    }

    /// The artwork bucket this record maps to. Pure and deterministic.
    pub fn key_for(&self, record: &TrackRecord) -> AlbumArtKey {
        AlbumArtKey::for_record(record)
    }

    /// Returns the blob for this record's artwork bucket, registering the
    /// record as an owner.
    ///
    /// An existing entry is shared: the refcount goes up and `provider`
    /// is not invoked, so the payload conversion runs at most once per
    /// key. Otherwise `provider` runs exactly once; a payload creates the
    /// entry with refcount 1, while no payload or a conversion failure
    /// yields the placeholder and creates no entry at all.
    pub fn acquire<F>(&mut self, record: &TrackRecord, provider: F) -> BlobRef
    where
        F: FnOnce() -> Result<Option<Vec<u8>>>,
    {
        let key = self.key_for(record);

        if let Some(entry) = self.entries.get_mut(&key) {
            entry.refcount += 1;
            return entry.blob.clone();
        }

        match provider() {
            Ok(Some(bytes)) if !bytes.is_empty() => {
                let blob = self.blobs.create(bytes);
                self.entries.insert(
                    key,
                    ArtCacheEntry {
                        blob: blob.clone(),
                        refcount: 1,
                    },
                );
                blob
            }
            Ok(_) => {
                debug!(id = %record.id, "no artwork payload, using placeholder");
                self.placeholder.clone()
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "artwork conversion failed, using placeholder");
                self.placeholder.clone()
            }
        }
    }

    /// Drops one ownership of this record's artwork bucket.
    ///
    /// The last release revokes the blob and removes the entry in the
    /// same step. Releasing a key that was never acquired is a no-op, so
    /// bulk cleanup can run idempotently.
    pub fn release(&mut self, record: &TrackRecord) {
        let key = self.key_for(record);

        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().refcount > 1 {
                    occupied.get_mut().refcount -= 1;
                } else {
                    let entry = occupied.remove();
                    self.blobs.revoke(&entry.blob);
                }
            }
            Entry::Vacant(_) => {
                debug!(id = %record.id, "release of unowned artwork key ignored");
            }
        }
    }

    /// Revokes every outstanding blob and clears all entries.
    ///
    /// Called at teardown so no blob outlives the session. The shared
    /// placeholder stays valid.
    pub fn release_all(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        for (_, entry) in entries {
            self.blobs.revoke(&entry.blob);
        }
    }

    /// The shared placeholder blob.
    pub fn placeholder(&self) -> BlobRef {
        self.placeholder.clone()
    }

    /// Fetches the payload behind a blob reference, if still live.
    pub fn bytes(&self, blob: &BlobRef) -> Option<Arc<[u8]>> {
        self.blobs.get(blob)
    }

    /// Current owner count for a key; zero when no entry exists.
    pub fn refcount(&self, key: AlbumArtKey) -> usize {
        self.entries.get(&key).map(|e| e.refcount).unwrap_or(0)
    }

    /// Number of distinct artwork entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::model::TrackTags;

    fn record(id: &str, album: &str, artist: &str) -> TrackRecord {
        TrackRecord {
            id: id.to_string(),
            tags: TrackTags {
                title: "Song".to_string(),
                artist: artist.to_string(),
                album: album.to_string(),
                year: None,
                genre: None,
                track_number: None,
            },
            duration_seconds: 180,
            bitrate_bps: None,
            mtime_millis: 1,
            size_bytes: None,
            cached_at_millis: 1,
            favorite: false,
        }
    }

    fn payload() -> Result<Option<Vec<u8>>> {
        Ok(Some(vec![0xAB; 16]))
    }

    #[test]
    fn key_is_deterministic_and_case_insensitive() {
        let a = AlbumArtKey::for_record(&record("/x.mp3", "Night Drive", "Carpenter"));
        let b = AlbumArtKey::for_record(&record("/y.mp3", "  night drive ", "CARPENTER"));

        assert_eq!(a, b);
    }

    #[test]
    fn untagged_singles_do_not_share_a_bucket() {
        let a = AlbumArtKey::for_record(&record("/x.mp3", "Unknown Album", "Unknown Artist"));
        let b = AlbumArtKey::for_record(&record("/y.mp3", "Unknown Album", "Unknown Artist"));

        assert_ne!(a, b);
    }

    #[test]
    fn shared_key_yields_shared_blob_and_single_conversion() {
        let mut cache = ArtDeduplicationCache::with_memory_store();
        let x = record("/x.mp3", "Album", "Artist");
        let y = record("/y.mp3", "Album", "Artist");
        let calls = Cell::new(0);

        let provider = || {
            calls.set(calls.get() + 1);
            payload()
        };

        let blob_x = cache.acquire(&x, provider);
        let blob_y = cache.acquire(&y, || {
            calls.set(calls.get() + 1);
            payload()
        });

        assert_eq!(blob_x, blob_y);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.refcount(cache.key_for(&x)), 2);
    }

    #[test]
    fn refcounted_lifecycle_revokes_exactly_once() {
        let mut cache = ArtDeduplicationCache::with_memory_store();
        let x = record("/x.mp3", "Album", "Artist");
        let y = record("/y.mp3", "Album", "Artist");
        let key = cache.key_for(&x);

        let blob = cache.acquire(&x, payload);
        assert_eq!(cache.refcount(key), 1);

        let shared = cache.acquire(&y, payload);
        assert_eq!(shared, blob);
        assert_eq!(cache.refcount(key), 2);

        cache.release(&x);
        assert_eq!(cache.refcount(key), 1);
        assert!(cache.bytes(&blob).is_some());

        cache.release(&y);
        assert_eq!(cache.refcount(key), 0);
        assert!(cache.bytes(&blob).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn entry_exists_iff_refcount_positive_iff_blob_live() {
        let mut cache = ArtDeduplicationCache::with_memory_store();
        let x = record("/x.mp3", "Album", "Artist");
        let key = cache.key_for(&x);

        assert_eq!(cache.refcount(key), 0);
        assert_eq!(cache.len(), 0);

        let blob = cache.acquire(&x, payload);
        assert_eq!(cache.refcount(key), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.bytes(&blob).is_some());

        cache.release(&x);
        assert_eq!(cache.refcount(key), 0);
        assert_eq!(cache.len(), 0);
        assert!(cache.bytes(&blob).is_none());
    }

    #[test]
    fn missing_payload_yields_placeholder_without_entry() {
        let mut cache = ArtDeduplicationCache::with_memory_store();
        let x = record("/x.mp3", "Album", "Artist");

        let blob = cache.acquire(&x, || Ok(None));

        assert_eq!(blob, cache.placeholder());
        assert!(cache.is_empty());
        assert!(cache.bytes(&blob).is_some());
    }

    #[test]
    fn conversion_failure_yields_placeholder_without_entry() {
        let mut cache = ArtDeduplicationCache::with_memory_store();
        let x = record("/x.mp3", "Album", "Artist");

        let blob = cache.acquire(&x, || {
            Err(crate::error::CacheError::ArtConversion {
                id: "/x.mp3".to_string(),
            })
        });

        assert_eq!(blob, cache.placeholder());
        assert!(cache.is_empty());
    }

    #[test]
    fn release_of_unacquired_key_is_a_noop() {
        let mut cache = ArtDeduplicationCache::with_memory_store();
        let x = record("/x.mp3", "Album", "Artist");

        cache.release(&x);
        assert!(cache.is_empty());
    }

    #[test]
    fn release_all_revokes_everything_but_the_placeholder() {
        let mut cache = ArtDeduplicationCache::with_memory_store();
        let x = record("/x.mp3", "Album A", "Artist");
        let y = record("/y.mp3", "Album B", "Artist");

        let blob_x = cache.acquire(&x, payload);
        let blob_y = cache.acquire(&y, payload);
        assert_eq!(cache.len(), 2);

        cache.release_all();

        assert!(cache.is_empty());
        assert!(cache.bytes(&blob_x).is_none());
        assert!(cache.bytes(&blob_y).is_none());
        assert!(cache.bytes(&cache.placeholder()).is_some());
    }

    #[test]
    fn acquire_after_release_converts_again() {
        let mut cache = ArtDeduplicationCache::with_memory_store();
        let x = record("/x.mp3", "Album", "Artist");
        let calls = Cell::new(0);

        let blob = cache.acquire(&x, || {
            calls.set(calls.get() + 1);
            payload()
        });
        cache.release(&x);

        let again = cache.acquire(&x, || {
            calls.set(calls.get() + 1);
            payload()
        });

        assert_eq!(calls.get(), 2);
        assert_ne!(blob, again);
        assert!(cache.bytes(&again).is_some());
    }
}
