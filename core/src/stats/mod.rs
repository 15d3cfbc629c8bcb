//! Per-room attempt history and chapter-level counters, one store per path
//! segment. This is the durable state the room state machine mutates; all
//! derived numbers live in [`crate::aggregate`].

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use goldpath_types::TrackerState;

use crate::path::ChapterMeta;

pub mod legacy;

/// Tier of the tracked high-value collectible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GoldenType {
    #[default]
    Golden,
    Silver,
    Platinum,
}

/// Attempt history for a single room.
///
/// Created lazily on first reference to a debug name; only removed by an
/// explicit user wipe.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomStats {
    pub debug_name: String,
    /// Chronological attempt outcomes, `true` = success.
    #[serde(default)]
    pub attempts: Vec<bool>,
    /// Deaths in this room since the run started; reset each run.
    #[serde(default)]
    pub deaths_in_current_run: u32,
    #[serde(default)]
    pub golden_deaths: u32,
    #[serde(default)]
    pub golden_deaths_session: u32,
}

impl RoomStats {
    pub fn new(debug_name: impl Into<String>) -> Self {
        Self {
            debug_name: debug_name.into(),
            ..Self::default()
        }
    }

    pub fn add_attempt(&mut self, success: bool) {
        self.attempts.push(success);
    }

    pub fn last_attempt(&self) -> Option<bool> {
        self.attempts.last().copied()
    }

    pub fn remove_last_attempt(&mut self) -> Option<bool> {
        self.attempts.pop()
    }

    /// Success rate over the trailing `window` attempts. `None` with no
    /// attempts recorded; callers must special-case rather than treat the
    /// room as 0%.
    pub fn success_rate(&self, window: usize) -> Option<f32> {
        if self.attempts.is_empty() || window == 0 {
            return None;
        }
        let start = self.attempts.len().saturating_sub(window);
        let tail = &self.attempts[start..];
        let successes = tail.iter().filter(|&&a| a).count();
        Some(successes as f32 / tail.len() as f32)
    }
}

/// All tracked state for one chapter and path segment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChapterStats {
    #[serde(default)]
    pub chapter_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ChapterMeta>,
    /// Debug name of the room the player currently occupies.
    #[serde(default)]
    pub current_room: String,
    #[serde(default)]
    pub rooms: HashMap<String, RoomStats>,
    /// Rooms reached before each golden-holding death, oldest first.
    /// Bounded: trimmed on append, never retroactively.
    #[serde(default)]
    pub last_golden_runs: Vec<String>,
    #[serde(default)]
    pub golden_collected: u32,
    #[serde(default)]
    pub golden_collected_session: u32,
    #[serde(default)]
    pub golden_type: GoldenType,
    /// Ephemeral flags snapshot for external consumers; not history.
    #[serde(default)]
    pub state: TrackerState,
}

impl ChapterStats {
    pub fn room(&self, debug_name: &str) -> Option<&RoomStats> {
        self.rooms.get(debug_name)
    }

    pub fn room_mut(&mut self, debug_name: &str) -> &mut RoomStats {
        self.rooms
            .entry(debug_name.to_string())
            .or_insert_with(|| RoomStats::new(debug_name))
    }

    pub fn current_room_stats(&self) -> Option<&RoomStats> {
        self.rooms.get(&self.current_room)
    }

    pub fn current_room_stats_mut(&mut self) -> &mut RoomStats {
        let name = self.current_room.clone();
        self.room_mut(&name)
    }

    /// Move the current-room pointer, creating stats for the room lazily.
    pub fn set_current_room(&mut self, debug_name: &str) {
        self.current_room = debug_name.to_string();
        self.room_mut(debug_name);
    }

    /// Append an attempt outcome to the current room.
    pub fn add_attempt(&mut self, success: bool) {
        self.current_room_stats_mut().add_attempt(success);
    }

    /// Record a golden-holding death in the current room and remember how far
    /// the run got. `cap` bounds the run history; the oldest entry is evicted
    /// on append once past it.
    pub fn add_golden_death(&mut self, cap: usize) {
        let room = self.current_room_stats_mut();
        room.golden_deaths += 1;
        room.golden_deaths_session += 1;

        self.last_golden_runs.push(self.current_room.clone());
        if cap > 0 && self.last_golden_runs.len() > cap {
            let excess = self.last_golden_runs.len() - cap;
            self.last_golden_runs.drain(..excess);
        }
    }

    pub fn collected_golden(&mut self, golden_type: GoldenType) {
        self.golden_type = golden_type;
        self.golden_collected += 1;
        self.golden_collected_session += 1;
    }

    pub fn golden_deaths_total(&self) -> u32 {
        self.rooms.values().map(|r| r.golden_deaths).sum()
    }

    pub fn golden_deaths_session_total(&self) -> u32 {
        self.rooms.values().map(|r| r.golden_deaths_session).sum()
    }

    /// New run started: in-run death counters reset, history stays.
    pub fn reset_current_run(&mut self) {
        for room in self.rooms.values_mut() {
            room.deaths_in_current_run = 0;
        }
    }

    /// New play session: session counters reset, lifetime counters stay.
    pub fn reset_session(&mut self) {
        for room in self.rooms.values_mut() {
            room.golden_deaths_session = 0;
        }
        self.golden_collected_session = 0;
    }

    // ── User data wipes ─────────────────────────────────────────────────────

    /// Drop the current room's attempt history.
    pub fn wipe_room_attempts(&mut self) {
        self.current_room_stats_mut().attempts.clear();
    }

    /// Drop every room's stats except the current room, then its attempts too.
    pub fn wipe_chapter(&mut self) {
        let current = self.current_room.clone();
        self.rooms.retain(|name, _| *name == current);
        self.wipe_room_attempts();
    }

    pub fn wipe_golden_deaths(&mut self) {
        for room in self.rooms.values_mut() {
            room.golden_deaths = 0;
            room.golden_deaths_session = 0;
        }
        self.last_golden_runs.clear();
    }

    pub fn wipe_golden_collects(&mut self) {
        self.golden_collected = 0;
        self.golden_collected_session = 0;
    }

    /// Undo the trailing streak of failed attempts in the current room.
    pub fn remove_death_streak(&mut self) {
        let room = self.current_room_stats_mut();
        while room.last_attempt() == Some(false) {
            room.remove_last_attempt();
        }
    }
}

/// One [`ChapterStats`] per path segment, mirroring the segment list's
/// indexing so switching segments never touches unrelated histories.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChapterStatsList {
    pub segments: Vec<ChapterStats>,
}

impl ChapterStatsList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap stats migrated from a flat single-segment format at index 0.
    pub fn from_flat(stats: ChapterStats) -> Self {
        Self {
            segments: vec![stats],
        }
    }

    pub fn get(&self, index: usize) -> Option<&ChapterStats> {
        self.segments.get(index)
    }

    /// Stats for a segment index, growing the list on demand.
    pub fn get_or_create(&mut self, index: usize) -> &mut ChapterStats {
        while self.segments.len() <= index {
            self.segments.push(ChapterStats::default());
        }
        &mut self.segments[index]
    }

    pub fn remove_segment(&mut self, index: usize) -> bool {
        if index < self.segments.len() {
            self.segments.remove(index);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_uses_trailing_window_only() {
        let mut room = RoomStats::new("a-01");
        assert_eq!(room.success_rate(5), None);

        for outcome in [false, false, true, true] {
            room.add_attempt(outcome);
        }
        assert_eq!(room.success_rate(2), Some(1.0));
        assert_eq!(room.success_rate(4), Some(0.5));
        // Window larger than history uses what exists.
        assert_eq!(room.success_rate(100), Some(0.5));
    }

    #[test]
    fn golden_death_history_trims_on_append() {
        let mut stats = ChapterStats::default();
        stats.set_current_room("a-01");
        for _ in 0..4 {
            stats.add_golden_death(3);
        }
        assert_eq!(stats.last_golden_runs.len(), 3);
        assert_eq!(stats.current_room_stats().unwrap().golden_deaths, 4);
    }

    #[test]
    fn run_and_session_resets_are_disjoint() {
        let mut stats = ChapterStats::default();
        stats.set_current_room("a-01");
        stats.add_golden_death(10);
        stats.current_room_stats_mut().deaths_in_current_run = 3;
        stats.collected_golden(GoldenType::Golden);

        stats.reset_current_run();
        let room = stats.current_room_stats().unwrap();
        assert_eq!(room.deaths_in_current_run, 0);
        assert_eq!(room.golden_deaths_session, 1);

        stats.reset_session();
        let room = stats.current_room_stats().unwrap();
        assert_eq!(room.golden_deaths_session, 0);
        assert_eq!(room.golden_deaths, 1);
        assert_eq!(stats.golden_collected_session, 0);
        assert_eq!(stats.golden_collected, 1);
    }

    #[test]
    fn wipe_chapter_keeps_only_current_room_entry() {
        let mut stats = ChapterStats::default();
        stats.set_current_room("a-01");
        stats.add_attempt(true);
        stats.set_current_room("a-02");
        stats.add_attempt(false);

        stats.wipe_chapter();
        assert_eq!(stats.rooms.len(), 1);
        assert!(stats.room("a-02").unwrap().attempts.is_empty());
    }

    #[test]
    fn death_streak_removal_stops_at_success() {
        let mut stats = ChapterStats::default();
        stats.set_current_room("a-01");
        for outcome in [true, false, false, false] {
            stats.add_attempt(outcome);
        }
        stats.remove_death_streak();
        assert_eq!(stats.current_room_stats().unwrap().attempts, vec![true]);
    }

    #[test]
    fn stats_list_grows_on_demand() {
        let mut list = ChapterStatsList::new();
        list.get_or_create(2).set_current_room("a-01");
        assert_eq!(list.segments.len(), 3);
        assert!(list.get(0).unwrap().rooms.is_empty());
    }
}
