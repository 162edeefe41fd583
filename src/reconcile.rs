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

//! Cache-to-filesystem reconciliation.
//!
//! One pass over a complete filesystem listing classifies every file as
//! new, modified, or unchanged relative to the cache, and every cached
//! record without an on-disk counterpart as deleted. Only new and
//! modified files are re-parsed; everything else is served from the
//! cache untouched.
//!
//! Deletion detection is only sound against a complete listing. When the
//! enumerator reports [`Listing::Unknown`] the pass classifies nothing:
//! treating an unavailable listing as "no files on disk" would cascade
//! into wiping the whole cache.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::{FileIdentity, LibraryDiff, Listing, TrackRecord};
use crate::scan::tags::TagReader;
use crate::store::MetadataStore;

/// Computes the diff between cached records and a filesystem listing.
///
/// Pure classification only; applying the diff is the driver's job. An
/// `Unknown` listing always yields an empty diff, for any cache.
pub fn reconcile(cached: &[TrackRecord], listing: &Listing) -> LibraryDiff {
    let Listing::Complete(current) = listing else {
        return LibraryDiff::default();
    };

    let cached_by_id: HashMap<&str, &TrackRecord> =
        cached.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut diff = LibraryDiff::default();
    let mut seen: HashSet<&str> = HashSet::with_capacity(current.len());

    for file in current {
        seen.insert(file.path.as_str());

        match cached_by_id.get(file.path.as_str()) {
            None => diff.new_ids.push(file.path.clone()),
            Some(record) if is_stale(record, file) => diff.modified_ids.push(file.path.clone()),
            Some(_) => {}
        }
    }

    for record in cached {
        if !seen.contains(record.id.as_str()) {
            diff.deleted_ids.push(record.id.clone());
        }
    }

    diff
}

/// A cached record is stale when the file changed under it: a strictly
/// newer modification time, or a size that no longer matches.
fn is_stale(cached: &TrackRecord, observed: &FileIdentity) -> bool {
    if observed.mtime_millis > cached.mtime_millis {
        return true;
    }

    matches!(cached.size_bytes, Some(size) if observed.size_bytes != size)
}

/// Runs one full reconciliation pass against the store.
///
/// Deleted records are removed first; new and modified files then go to
/// the tag reader in one ordered batch, and the parsed results are
/// written back with a refreshed `cached_at_millis`. The favorite flag
/// survives a refresh. With no store (uncached fallback) the diff is
/// still computed and returned so the update notification fires, but
/// nothing persists.
///
/// # Errors
///
/// Store failures mid-pass are reported to the caller; the records
/// already applied stay applied.
pub(crate) fn run_pass(
    mut store: Option<&mut MetadataStore>,
    listing: &Listing,
    tag_reader: &dyn TagReader,
    now_millis: i64,
) -> Result<LibraryDiff> {
    let cached = match store.as_ref() {
        Some(store) => store.all_records()?,
        None => vec![],
    };

    let diff = reconcile(&cached, listing);

    let Listing::Complete(current) = listing else {
        info!("enumeration unavailable, nothing reconciled");
        return Ok(diff);
    };

    if !diff.deleted_ids.is_empty()
        && let Some(store) = store.as_mut()
    {
        let removed = store.delete_many(&diff.deleted_ids)?;
        debug!(removed, "removed records for deleted files");
    }

    let changed: HashSet<&str> = diff
        .new_ids
        .iter()
        .chain(diff.modified_ids.iter())
        .map(String::as_str)
        .collect();

    if !changed.is_empty() {
        let to_read: Vec<FileIdentity> = current
            .iter()
            .filter(|f| changed.contains(f.path.as_str()))
            .cloned()
            .collect();

        let favorites: HashMap<&str, bool> =
            cached.iter().map(|r| (r.id.as_str(), r.favorite)).collect();

        let mut records = Vec::with_capacity(to_read.len());
        for scanned in tag_reader.read_batch(&to_read) {
            // The raw artwork payload is not persisted; art blobs are
            // materialized lazily on first access, keyed by album and
            // artist.
            let mut record = scanned.record;
            record.cached_at_millis = now_millis;
            record.favorite = favorites
                .get(record.id.as_str())
                .copied()
                .unwrap_or(false);
            records.push(record);
        }

        if let Some(store) = store.as_mut() {
            let report = store.set_many(&records)?;
            if report.failed > 0 {
                warn!(
                    failed = report.failed,
                    applied = report.applied,
                    "some records could not be cached"
                );
            }
        }
    }

    if let Some(store) = store.as_mut() {
        store.refresh_totals(now_millis)?;
    }

    Ok(diff)
}
