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

//! Error types for the caching layer.
//!
//! Failures fall into a small number of recoverable kinds. A broken or
//! missing database surfaces as [`CacheError::StoreUnavailable`] and the
//! facade degrades to an uncached session instead of propagating it to the
//! host. Artwork conversion failures surface as
//! [`CacheError::ArtConversion`] and are recovered with a placeholder
//! image. Per-record failures inside a write batch are reported as counts,
//! not errors; see [`crate::model::BatchReport`].

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Failures that the caching layer can report.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The SQLite store could not be opened, or a previously working
    /// connection has become unusable. Every store operation reports this
    /// kind; callers treat it as "empty cache" rather than a hard stop.
    #[error("metadata store unavailable: {source}")]
    StoreUnavailable {
        #[source]
        source: rusqlite::Error,
    },

    /// An embedded artwork payload was missing, malformed, or could not be
    /// read from the file. Recovered with the shared placeholder blob.
    #[error("artwork conversion failed for {id}")]
    ArtConversion { id: String },
}

impl From<rusqlite::Error> for CacheError {
    fn from(source: rusqlite::Error) -> Self {
        CacheError::StoreUnavailable { source }
    }
}
