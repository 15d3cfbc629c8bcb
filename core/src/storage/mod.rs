//! Durable storage for path topology and chapter stats, one JSON file per
//! chapter key under `paths/` and `stats/`.
//!
//! Saves are atomic: the full document is written to a sibling `.tmp` file
//! and renamed over the canonical path, so a crash mid-write never leaves a
//! truncated file. Loads transparently upgrade two legacy formats (flat
//! single-segment JSON and the old delimited text) into the current
//! segmented format, rewriting the file once the upgrade succeeds.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use goldpath_types::TrackerState;

use crate::path::{PathInfo, PathSegmentList, legacy as path_legacy};
use crate::stats::{ChapterStats, ChapterStatsList, legacy as stats_legacy};

mod error;
pub use error::StorageError;


const PATHS_DIR: &str = "paths";
const STATS_DIR: &str = "stats";

/// Lightweight side file for external pollers: current room plus ephemeral
/// flags, cheap to re-read without parsing the full stats file.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackerStateFile {
    pub chapter_key: String,
    pub current_room: String,
    /// RFC 3339 timestamp of the write.
    pub written_at: String,
    pub state: TrackerState,
}

#[derive(Debug, Clone)]
pub struct Storage {
    base: PathBuf,
}

impl Storage {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Platform data directory, `./goldpath` as a last resort.
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("goldpath")
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_file(&self, chapter_key: &str) -> PathBuf {
        self.base.join(PATHS_DIR).join(format!("{chapter_key}.json"))
    }

    fn stats_file(&self, chapter_key: &str) -> PathBuf {
        self.base.join(STATS_DIR).join(format!("{chapter_key}.json"))
    }

    fn state_file(&self) -> PathBuf {
        self.base.join(STATS_DIR).join("state.json")
    }

    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        for dir in [self.base.join(PATHS_DIR), self.base.join(STATS_DIR)] {
            fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    // ── Path topology ───────────────────────────────────────────────────────

    /// Load the path for a chapter, upgrading legacy formats in place.
    /// `Ok(None)` means no path has been recorded for this chapter.
    pub fn load_path(&self, chapter_key: &str) -> Result<Option<PathSegmentList>, StorageError> {
        let file = self.path_file(chapter_key);
        let Some(content) = read_if_exists(&file)? else {
            return Ok(None);
        };

        if let Ok(list) = serde_json::from_str::<PathSegmentList>(&content) {
            return Ok(Some(list));
        }

        // Flat single-path JSON, one format back.
        if let Ok(path) = serde_json::from_str::<PathInfo>(&content) {
            tracing::debug!(chapter = chapter_key, "upgrading flat path file");
            let list = PathSegmentList::from_path(path);
            self.save_path(chapter_key, &list)?;
            return Ok(Some(list));
        }

        // Oldest delimited-text format.
        match path_legacy::parse(&content) {
            Ok(path) => {
                tracing::debug!(chapter = chapter_key, "upgrading delimited-text path file");
                let list = PathSegmentList::from_path(path);
                self.save_path(chapter_key, &list)?;
                Ok(Some(list))
            }
            Err(err) => {
                tracing::warn!(chapter = chapter_key, error = %err, "unreadable path file");
                Ok(None)
            }
        }
    }

    pub fn save_path(
        &self,
        chapter_key: &str,
        list: &PathSegmentList,
    ) -> Result<(), StorageError> {
        self.ensure_dirs()?;
        self.write_atomic(&self.path_file(chapter_key), list)
    }

    // ── Chapter stats ───────────────────────────────────────────────────────

    /// Load stats for a chapter. Unparseable content is recovered as fresh
    /// empty stats rather than failing the load: a bad stats file must never
    /// take the path data down with it.
    pub fn load_stats(&self, chapter_key: &str) -> Result<ChapterStatsList, StorageError> {
        let file = self.stats_file(chapter_key);
        let Some(content) = read_if_exists(&file)? else {
            return Ok(ChapterStatsList::new());
        };

        if let Ok(list) = serde_json::from_str::<ChapterStatsList>(&content) {
            return Ok(list);
        }

        // Flat single-segment JSON; segment index is 0 by construction.
        if let Ok(stats) = serde_json::from_str::<ChapterStats>(&content) {
            tracing::debug!(chapter = chapter_key, "upgrading flat stats file");
            return Ok(ChapterStatsList::from_flat(stats));
        }

        match stats_legacy::parse(&content) {
            Ok(stats) => {
                tracing::debug!(chapter = chapter_key, "upgrading delimited-text stats file");
                Ok(ChapterStatsList::from_flat(stats))
            }
            Err(err) => {
                tracing::warn!(
                    chapter = chapter_key,
                    error = %err,
                    "corrupt stats file, starting fresh"
                );
                Ok(ChapterStatsList::new())
            }
        }
    }

    pub fn save_stats(
        &self,
        chapter_key: &str,
        list: &ChapterStatsList,
    ) -> Result<(), StorageError> {
        self.ensure_dirs()?;
        self.write_atomic(&self.stats_file(chapter_key), list)
    }

    /// Write the polling side file. Best-effort relative to the main stats
    /// file but failures are still reported.
    pub fn save_tracker_state(&self, state: &TrackerStateFile) -> Result<(), StorageError> {
        self.ensure_dirs()?;
        self.write_atomic(&self.state_file(), state)
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn write_atomic<T: Serialize>(&self, file: &Path, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(value)?;
        let tmp = file.with_extension("json.tmp");

        fs::write(&tmp, json).map_err(|source| StorageError::Write {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, file).map_err(|source| StorageError::Replace {
            path: file.to_path_buf(),
            source,
        })
    }
}

fn read_if_exists(file: &Path) -> Result<Option<String>, StorageError> {
    match fs::read_to_string(file) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::Read {
            path: file.to_path_buf(),
            source,
        }),
    }
}
