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

//! Library lifecycle notifications.
//!
//! Events are broadcast to the host over the `std::sync::mpsc` channel it
//! supplies when opening the cache, mirroring how the rest of the host
//! application distributes state changes to its event loop.

use crate::model::LibraryDiff;

/// Notifications emitted by the caching layer.
#[derive(Debug, Clone)]
pub enum LibraryEvent {
    /// A reconciliation pass completed. Fired after every pass, even when
    /// the diff is empty, so subscribers can tell "checked, no change"
    /// apart from "never checked".
    Updated(LibraryDiff),

    /// A background refresh could not complete. Non-fatal; the cached data
    /// already handed to the caller remains valid.
    RefreshFailed(String),
}
