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

//! Cache configuration.
//!
//! This module manages the persistent configuration file for the caching
//! layer.

use serde::{Deserialize, Serialize};

const CONFIG_NAME: &str = "choolib";

const DEFAULT_DATABASE_FILE: &str = "library.db";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CacheConfig {
    pub version: u32,
    /// Root directories scanned for media files.
    pub media_dirs: Vec<String>,
    /// Path of the SQLite database file backing the metadata store.
    pub database_file: String,
    /// File extensions considered media files, lowercase, without the dot.
    pub audio_extensions: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: 1,
            media_dirs: vec![],
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            audio_extensions: ["mp3", "flac", "ogg", "m4a", "wav"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

pub fn load_config() -> CacheConfig {
    confy::load(CONFIG_NAME, None).unwrap_or_default()
}

pub fn save_config(cfg: &CacheConfig) -> Result<(), confy::ConfyError> {
    confy::store(CONFIG_NAME, None, cfg)
}
