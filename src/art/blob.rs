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

//! Transient blob references for binary payloads.
//!
//! A [`BlobStore`] turns an owned byte payload into a cheap, cloneable
//! [`BlobRef`] handle and releases the payload again when the handle is
//! revoked. The in-memory implementation backs the art cache; a host with
//! its own blob facility can supply another implementation at the same
//! seam.

use std::collections::HashMap;
use std::sync::Arc;

/// Opaque handle to a stored binary payload.
///
/// The handle stays valid until the store revokes it; cloning the handle
/// does not extend its lifetime. Ownership counting is the art cache's
/// job, not the store's.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobRef(u64);

impl BlobRef {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Create/revoke facility for binary payloads.
pub trait BlobStore: Send {
    /// Stores a payload and returns a fresh reference to it.
    fn create(&mut self, bytes: Vec<u8>) -> BlobRef;

    /// Releases the payload behind a reference. Returns whether the
    /// reference was still live.
    fn revoke(&mut self, blob: &BlobRef) -> bool;

    /// Fetches the payload behind a reference, if still live.
    fn get(&self, blob: &BlobRef) -> Option<Arc<[u8]>>;
}

/// Heap-backed [`BlobStore`].
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    next_id: u64,
    blobs: HashMap<u64, Arc<[u8]>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live payloads.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn create(&mut self, bytes: Vec<u8>) -> BlobRef {
        let id = self.next_id;
        self.next_id += 1;
        self.blobs.insert(id, Arc::from(bytes));
        BlobRef(id)
    }

    fn revoke(&mut self, blob: &BlobRef) -> bool {
        self.blobs.remove(&blob.0).is_some()
    }

    fn get(&self, blob: &BlobRef) -> Option<Arc<[u8]>> {
        self.blobs.get(&blob.0).cloned()
    }
}
