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

//! Filesystem enumeration.
//!
//! This module discovers the media files currently on disk. It utilizes
//! `WalkDir` for efficient directory traversal and reports each file's
//! identity (path, modification time, size) without opening it.
//!
//! # Completeness contract
//!
//! Reconciliation detects deletions by comparing the cache against the
//! enumerated listing, so a listing must be complete to be usable. Any
//! traversal failure therefore yields [`Listing::Unknown`] rather than a
//! silently truncated result; a partial listing would read as mass
//! deletion downstream.

pub mod tags;

use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::model::{FileIdentity, Listing};
use crate::util::time::millis_since_epoch;

/// Lists the current media files under a set of root directories.
///
/// Implementations must return either every matching file or
/// [`Listing::Unknown`]; never a partial listing.
pub trait FileSystemEnumerator: Send {
    fn enumerate(&self, roots: &[String]) -> Listing;
}

/// Recursive directory walker filtering by file extension.
pub struct WalkdirEnumerator {
    extensions: Vec<String>,
}

impl WalkdirEnumerator {
    /// Creates an enumerator matching the given extensions, compared
    /// case-insensitively and without the leading dot.
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}

impl FileSystemEnumerator for WalkdirEnumerator {
    fn enumerate(&self, roots: &[String]) -> Listing {
        // An unconfigured session must not look like an empty library;
        // an empty complete listing would cascade into mass deletion.
        if roots.is_empty() {
            warn!("no media directories configured, listing unknown");
            return Listing::Unknown;
        }

        let mut files = Vec::new();

        for root in roots {
            if !Path::new(root).is_dir() {
                warn!(root = %root, "media directory not readable, listing unknown");
                return Listing::Unknown;
            }

            for entry in WalkDir::new(root) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        // A traversal error means completeness is gone,
                        // not that the subtree is empty.
                        warn!(root = %root, error = %e, "traversal failed, listing unknown");
                        return Listing::Unknown;
                    }
                };

                if !entry.file_type().is_file() || !self.matches_extension(entry.path()) {
                    continue;
                }

                let Some(path) = entry.path().to_str() else {
                    debug!(path = %entry.path().display(), "skipping non-UTF-8 path");
                    continue;
                };

                let metadata = match entry.metadata() {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        // Vanished or unreadable between walk and stat;
                        // such a file cannot be tag-read either.
                        debug!(path = %path, error = %e, "skipping unreadable file");
                        continue;
                    }
                };

                files.push(FileIdentity {
                    path: path.to_string(),
                    mtime_millis: metadata
                        .modified()
                        .map(millis_since_epoch)
                        .unwrap_or(0),
                    size_bytes: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
                });
            }
        }

        Listing::Complete(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn enumerator() -> WalkdirEnumerator {
        WalkdirEnumerator::new(&["mp3".to_string(), "flac".to_string()])
    }

    #[test]
    fn enumerates_matching_files_with_sizes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mp3"), b"aaaa").unwrap();
        fs::write(dir.path().join("b.flac"), b"bbbbbb").unwrap();
        fs::write(dir.path().join("notes.txt"), b"nope").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.mp3"), b"cc").unwrap();

        let root = dir.path().to_str().unwrap().to_string();
        let Listing::Complete(mut files) = enumerator().enumerate(&[root]) else {
            panic!("expected a complete listing");
        };
        files.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.mtime_millis > 0));
        assert_eq!(files[0].size_bytes, 4);
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("LOUD.MP3"), b"x").unwrap();

        let root = dir.path().to_str().unwrap().to_string();
        let Listing::Complete(files) = enumerator().enumerate(&[root]) else {
            panic!("expected a complete listing");
        };
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn missing_root_yields_unknown_not_empty() {
        let listing = enumerator().enumerate(&["/definitely/not/a/real/dir".to_string()]);
        assert_eq!(listing, Listing::Unknown);
    }

    #[test]
    fn no_roots_yields_unknown_not_empty() {
        let listing = enumerator().enumerate(&[]);
        assert_eq!(listing, Listing::Unknown);
    }

    #[test]
    fn empty_directory_yields_empty_complete_listing() {
        let dir = tempfile::tempdir().unwrap();

        let root = dir.path().to_str().unwrap().to_string();
        let listing = enumerator().enumerate(&[root]);
        assert_eq!(listing, Listing::Complete(vec![]));
    }
}
