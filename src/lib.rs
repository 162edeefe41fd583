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

//! # Music library metadata cache.
//!
//! A local caching and incremental-synchronization layer for a media
//! library. It keeps a persistent, queryable record of every media file's
//! metadata so application startups avoid a full rescan, and a
//! deduplicated, reference-counted store of derived cover art blobs so
//! albums sharing artwork never duplicate memory.
//!
//! ## Architecture
//!
//! The crate follows an event-driven pattern:
//!
//! * The **facade** ([`MediaCache`]) serves cached data to the host
//!   immediately and owns the art cache.
//! * A **background worker** reconciles the cache against the filesystem
//!   without ever blocking the fast path, re-parsing only files that are
//!   new or changed.
//! * **Events** flow back to the host over a `std::sync::mpsc` channel
//!   after every reconciliation pass.
//!
//! Tag parsing and filesystem enumeration sit behind the [`TagReader`]
//! and [`FileSystemEnumerator`] seams; default implementations based on
//! `lofty` and `walkdir` are provided.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::mpsc;
//!
//! use choolib::{CacheConfig, LibraryEvent, MediaCache};
//!
//! let (event_tx, event_rx) = mpsc::channel();
//! let config = CacheConfig {
//!     media_dirs: vec!["/home/me/Music".to_string()],
//!     ..CacheConfig::default()
//! };
//!
//! let cache = MediaCache::open(config, event_tx);
//!
//! // Cached data is available immediately; the rescan runs behind it.
//! let tracks = cache.library();
//!
//! if let Ok(LibraryEvent::Updated(diff)) = event_rx.recv() {
//!     println!("{} new, {} modified, {} deleted",
//!         diff.new_ids.len(), diff.modified_ids.len(), diff.deleted_ids.len());
//! }
//! ```

pub mod art;
pub mod config;
pub mod error;
pub mod events;
pub mod facade;
pub mod model;
pub mod reconcile;
pub mod scan;
pub mod store;

mod util;

pub use art::blob::{BlobRef, BlobStore, MemoryBlobStore};
pub use art::{AlbumArtKey, ArtDeduplicationCache};
pub use config::{CacheConfig, load_config, save_config};
pub use error::{CacheError, Result};
pub use events::LibraryEvent;
pub use facade::MediaCache;
pub use model::{
    BatchReport, CacheStats, FileIdentity, LibraryDiff, Listing, ScannedTrack, TrackRecord,
    TrackTags,
};
pub use reconcile::reconcile;
pub use scan::tags::{LoftyTagReader, TagReader};
pub use scan::{FileSystemEnumerator, WalkdirEnumerator};
pub use store::MetadataStore;
