//! Chapter path topology: rooms grouped into checkpoints, checkpoints into a
//! path, and named alternate path segments per chapter.
//!
//! The path is static(ish) data edited by the user or produced by the
//! [`PathRecorder`]; per-attempt history lives in the stats store.

use serde::{Deserialize, Serialize};

pub mod legacy;
mod recorder;

pub use recorder::PathRecorder;


/// Chapter identity carried on both path and stats files so either can be
/// consumed standalone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChapterMeta {
    pub campaign: String,
    pub chapter_name: String,
    pub side: String,
    /// Stable chapter SID, engine-assigned.
    pub sid: String,
}

/// A single room on the path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomInfo {
    /// Stable, engine-assigned identity.
    pub debug_name: String,
    /// User override for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    /// Debug names that alias to this room (hub-and-spoke layouts).
    /// A debug name belongs to at most one room's alias set path-wide.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grouped_rooms: Vec<String>,
}

impl RoomInfo {
    pub fn new(debug_name: impl Into<String>) -> Self {
        Self {
            debug_name: debug_name.into(),
            ..Self::default()
        }
    }

    /// Custom name when set, debug name otherwise.
    pub fn display_name(&self) -> &str {
        self.custom_name.as_deref().unwrap_or(&self.debug_name)
    }
}

/// An ordered group of rooms between two save points.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub name: String,
    pub abbreviation: String,
    pub rooms: Vec<RoomInfo>,
}

/// One route through a chapter: ordered checkpoints plus rooms excluded from
/// tracking entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathInfo {
    pub checkpoints: Vec<CheckpointInfo>,
    #[serde(default)]
    pub ignored_rooms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ChapterMeta>,
}

impl PathInfo {
    /// Resolve a grouped-room alias to its canonical debug name.
    /// Total and idempotent: unknown names come back unchanged.
    pub fn resolve_grouped<'a>(&'a self, name: &'a str) -> &'a str {
        for room in self.rooms() {
            if room.grouped_rooms.iter().any(|g| g == name) {
                return &room.debug_name;
            }
        }
        name
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored_rooms.iter().any(|r| r == name)
    }

    /// All rooms in path order.
    pub fn rooms(&self) -> impl Iterator<Item = &RoomInfo> {
        self.checkpoints.iter().flat_map(|cp| cp.rooms.iter())
    }

    pub fn room(&self, debug_name: &str) -> Option<&RoomInfo> {
        self.rooms().find(|r| r.debug_name == debug_name)
    }

    /// 1-based position of a room across the whole path.
    pub fn room_number(&self, debug_name: &str) -> Option<usize> {
        self.rooms()
            .position(|r| r.debug_name == debug_name)
            .map(|i| i + 1)
    }

    pub fn room_count(&self) -> usize {
        self.checkpoints.iter().map(|cp| cp.rooms.len()).sum()
    }

    pub fn checkpoint_of(&self, debug_name: &str) -> Option<&CheckpointInfo> {
        self.checkpoints
            .iter()
            .find(|cp| cp.rooms.iter().any(|r| r.debug_name == debug_name))
    }

    /// Check the path invariants: a debug name appears in exactly one
    /// checkpoint, never doubles as an alias, and ignored rooms stay off
    /// the path.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen: Vec<&str> = Vec::new();
        let mut aliases: Vec<&str> = Vec::new();
        for room in self.rooms() {
            if seen.contains(&room.debug_name.as_str()) {
                return Err(format!("room '{}' appears twice on path", room.debug_name));
            }
            seen.push(&room.debug_name);
            for alias in &room.grouped_rooms {
                if aliases.contains(&alias.as_str()) {
                    return Err(format!("alias '{alias}' grouped under two rooms"));
                }
                aliases.push(alias);
            }
        }
        for alias in &aliases {
            if seen.contains(alias) {
                return Err(format!("alias '{alias}' is also a room on the path"));
            }
        }
        for ignored in &self.ignored_rooms {
            if seen.contains(&ignored.as_str()) {
                return Err(format!("ignored room '{ignored}' is on the path"));
            }
        }
        Ok(())
    }

    /// Remove a room from the path. Returns false when the room is unknown.
    pub fn remove_room(&mut self, debug_name: &str) -> bool {
        for cp in &mut self.checkpoints {
            if let Some(idx) = cp.rooms.iter().position(|r| r.debug_name == debug_name) {
                cp.rooms.remove(idx);
                return true;
            }
        }
        false
    }

    /// Fold a room into the preceding room's alias set. The room loses its
    /// own spot on the path; transitions into it resolve to its host.
    /// Returns false when the room is unknown or has no predecessor.
    pub fn group_with_previous(&mut self, debug_name: &str) -> bool {
        let Some(number) = self.room_number(debug_name) else {
            return false;
        };
        if number < 2 {
            return false;
        }
        let previous_name = self
            .rooms()
            .nth(number - 2)
            .map(|r| r.debug_name.clone())
            .expect("predecessor exists for room_number >= 2");

        let mut removed = None;
        for cp in &mut self.checkpoints {
            if let Some(idx) = cp.rooms.iter().position(|r| r.debug_name == debug_name) {
                removed = Some(cp.rooms.remove(idx));
                break;
            }
        }
        let removed = removed.expect("room found by room_number");

        for cp in &mut self.checkpoints {
            if let Some(host) = cp.rooms.iter_mut().find(|r| r.debug_name == previous_name) {
                host.grouped_rooms.push(removed.debug_name);
                host.grouped_rooms.extend(removed.grouped_rooms);
                return true;
            }
        }
        false
    }

    /// Detach an alias from its host and re-insert it as its own room
    /// directly after the host. Returns false when no room owns the alias.
    pub fn ungroup(&mut self, alias: &str) -> bool {
        for cp in &mut self.checkpoints {
            for idx in 0..cp.rooms.len() {
                if let Some(pos) = cp.rooms[idx].grouped_rooms.iter().position(|g| g == alias) {
                    cp.rooms[idx].grouped_rooms.remove(pos);
                    cp.rooms.insert(idx + 1, RoomInfo::new(alias));
                    return true;
                }
            }
        }
        false
    }

    /// Set or clear a room's custom display name. Whitespace-only names clear.
    pub fn set_custom_name(&mut self, debug_name: &str, custom: Option<&str>) -> bool {
        let custom = custom
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        for cp in &mut self.checkpoints {
            if let Some(room) = cp.rooms.iter_mut().find(|r| r.debug_name == debug_name) {
                room.custom_name = custom;
                return true;
            }
        }
        false
    }
}

/// A named alternate route for the chapter. `path` is `None` for a freshly
/// added segment that has not been recorded yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathInfo>,
}

/// All alternate routes for one chapter, exactly one selected at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegmentList {
    pub segments: Vec<PathSegment>,
    #[serde(default)]
    pub selected_index: usize,
}

impl Default for PathSegmentList {
    fn default() -> Self {
        Self {
            segments: vec![PathSegment {
                name: "Segment 1".to_string(),
                path: None,
            }],
            selected_index: 0,
        }
    }
}

impl PathSegmentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a single flat path as a one-segment list (format migration).
    pub fn from_path(path: PathInfo) -> Self {
        Self {
            segments: vec![PathSegment {
                name: "Segment 1".to_string(),
                path: Some(path),
            }],
            selected_index: 0,
        }
    }

    pub fn current(&self) -> Option<&PathInfo> {
        self.segments
            .get(self.selected_index)
            .and_then(|s| s.path.as_ref())
    }

    pub fn current_mut(&mut self) -> Option<&mut PathInfo> {
        self.segments
            .get_mut(self.selected_index)
            .and_then(|s| s.path.as_mut())
    }

    pub fn set_current(&mut self, path: PathInfo) {
        if let Some(segment) = self.segments.get_mut(self.selected_index) {
            segment.path = Some(path);
        }
    }

    pub fn select(&mut self, index: usize) -> bool {
        if index < self.segments.len() {
            self.selected_index = index;
            true
        } else {
            false
        }
    }

    pub fn add_segment(&mut self) -> &mut PathSegment {
        self.segments.push(PathSegment {
            name: format!("Segment {}", self.segments.len() + 1),
            path: None,
        });
        self.segments.last_mut().expect("just pushed")
    }

    /// Remove a segment by index. The last remaining segment cannot be removed.
    pub fn remove_segment(&mut self, index: usize) -> bool {
        if index >= self.segments.len() || self.segments.len() <= 1 {
            return false;
        }
        self.segments.remove(index);
        if self.selected_index >= self.segments.len() {
            self.selected_index = self.segments.len() - 1;
        }
        true
    }
}
