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

//! Tag extraction via Lofty.
//!
//! This module parses metadata out of media files: tag fields, audio
//! properties, and the embedded cover art payload. Reading is idempotent
//! and never writes to the filesystem.

use std::path::Path;

use lofty::picture::PictureType;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use tracing::warn;

use crate::error::{CacheError, Result};
use crate::model::{FileIdentity, ScannedTrack, TrackRecord, TrackTags};

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Parses track metadata for batches of files.
///
/// Output preserves input order and is the same length or shorter:
/// unreadable files are omitted, never substituted with placeholders.
pub trait TagReader: Send + Sync {
    fn read_batch(&self, files: &[FileIdentity]) -> Vec<ScannedTrack>;

    /// Extracts the embedded cover art bytes for one file, preferring the
    /// front cover when several pictures are present.
    fn read_artwork(&self, path: &str) -> Result<Option<Vec<u8>>>;
}

/// [`TagReader`] backed by the Lofty probe.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read_batch(&self, files: &[FileIdentity]) -> Vec<ScannedTrack> {
        let mut tracks = Vec::with_capacity(files.len());

        for file in files {
            let tagged_file = match Probe::open(&file.path).and_then(|p| p.read()) {
                Ok(tagged_file) => tagged_file,
                Err(e) => {
                    warn!(path = %file.path, error = %e, "skipping unreadable file");
                    continue;
                }
            };

            let properties = tagged_file.properties();
            let duration_seconds = properties.duration().as_secs();
            let bitrate_bps = properties.audio_bitrate().map(|kbps| kbps.saturating_mul(1000));

            let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());
            let tags = parse_tags(tag, &file.path);
            let artwork = tag.and_then(front_cover_bytes);

            tracks.push(ScannedTrack {
                record: TrackRecord {
                    id: file.path.clone(),
                    tags,
                    duration_seconds,
                    bitrate_bps,
                    mtime_millis: file.mtime_millis,
                    size_bytes: Some(file.size_bytes),
                    cached_at_millis: 0,
                    favorite: false,
                },
                artwork,
            });
        }

        tracks
    }

    fn read_artwork(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let tagged_file = Probe::open(path)
            .and_then(|p| p.read())
            .map_err(|_| CacheError::ArtConversion { id: path.to_string() })?;

        let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

        Ok(tag.and_then(front_cover_bytes))
    }
}

/// Extracts tag fields, falling back to "Unknown" markers and the file
/// name so that a tagless file still gets a usable record.
fn parse_tags(tag: Option<&Tag>, path: &str) -> TrackTags {
    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string());

    let Some(tag) = tag else {
        return TrackTags {
            title: file_name,
            artist: UNKNOWN_ARTIST.to_string(),
            album: UNKNOWN_ALBUM.to_string(),
            year: None,
            genre: None,
            track_number: None,
        };
    };

    let artist = tag
        .artist()
        .unwrap_or_else(|| UNKNOWN_ARTIST.into())
        .to_string();

    // Prefer the album artist for grouping so multi-artist albums stay
    // together, as the rest of the library presentation expects.
    let artist = tag
        .get(&ItemKey::AlbumArtist)
        .and_then(|item| item.value().text())
        .map(|s| s.to_string())
        .unwrap_or(artist);

    TrackTags {
        title: tag
            .title()
            .map(|t| t.to_string())
            .unwrap_or(file_name),
        artist,
        album: tag
            .album()
            .unwrap_or_else(|| UNKNOWN_ALBUM.into())
            .to_string(),
        year: tag.year(),
        genre: tag.genre().map(|g| g.to_string()),
        track_number: tag.track(),
    }
}

fn front_cover_bytes(tag: &Tag) -> Option<Vec<u8>> {
    tag.pictures()
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| tag.pictures().first())
        .map(|p| p.data().to_vec())
        .filter(|data| !data.is_empty())
}
