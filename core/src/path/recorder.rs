//! Live path recording.
//!
//! Rooms are bucketed into the checkpoint they were first visited in; a
//! checkpoint event fires after entering the checkpoint's first room, so
//! `add_checkpoint` moves the most recent room into the new bucket.

use hashbrown::HashSet;

use super::{ChapterMeta, CheckpointInfo, PathInfo, RoomInfo};

#[derive(Debug, Default)]
pub struct PathRecorder {
    visited: HashSet<String>,
    /// Checkpoint label (None until a labeled checkpoint fires) plus rooms.
    buckets: Vec<(Option<String>, Vec<String>)>,
}

impl PathRecorder {
    pub fn new() -> Self {
        Self {
            visited: HashSet::new(),
            buckets: vec![(None, Vec::new())],
        }
    }

    /// Record a room visit. Rooms only join the first bucket they appear in;
    /// revisits are ignored.
    pub fn add_room(&mut self, debug_name: &str) {
        if !self.visited.insert(debug_name.to_string()) {
            return;
        }
        self.buckets
            .last_mut()
            .expect("recorder always has a bucket")
            .1
            .push(debug_name.to_string());
    }

    /// Start a new checkpoint bucket. The checkpoint's first room has already
    /// been recorded, so it moves from the previous bucket into the new one.
    /// With no rooms recorded yet, this only labels the initial bucket.
    pub fn add_checkpoint(&mut self, label: Option<String>) {
        let last = self.buckets.last_mut().expect("recorder always has a bucket");
        match last.1.pop() {
            Some(room) => self.buckets.push((label, vec![room])),
            None => last.0 = label,
        }
    }

    pub fn total_rooms(&self) -> usize {
        self.buckets.iter().map(|(_, rooms)| rooms.len()).sum()
    }

    /// Build a path from the recording. The first checkpoint defaults to
    /// `Start`/`ST`, later unlabeled ones to `CP{n}`. Empty buckets are
    /// dropped.
    pub fn into_path_info(self, meta: Option<ChapterMeta>) -> PathInfo {
        let checkpoints = self
            .buckets
            .into_iter()
            .filter(|(_, rooms)| !rooms.is_empty())
            .enumerate()
            .map(|(idx, (label, rooms))| {
                let (name, abbreviation) = match (idx, label) {
                    (_, Some(label)) => {
                        let abbreviation = abbreviate(&label);
                        (label, abbreviation)
                    }
                    (0, None) => ("Start".to_string(), "ST".to_string()),
                    (n, None) => (format!("CP{}", n + 1), format!("CP{}", n + 1)),
                };
                CheckpointInfo {
                    name,
                    abbreviation,
                    rooms: rooms.into_iter().map(RoomInfo::new).collect(),
                }
            })
            .collect();

        PathInfo {
            checkpoints,
            ignored_rooms: Vec::new(),
            meta,
        }
    }
}

/// First letter of up to two words, uppercased.
fn abbreviate(label: &str) -> String {
    label
        .split_whitespace()
        .take(2)
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}
