//! The room-transition state machine.
//!
//! [`Tracker`] owns the active chapter context (path segments plus
//! per-segment stats) and turns the noisy event stream of transitions,
//! respawns, teleports, deaths, and pickups into per-room attempt outcomes.
//! It is the single writer: events are processed one at a time,
//! synchronously, and every mutation is persisted before the call returns.

use std::path::PathBuf;

use chrono::Utc;
use hashbrown::HashSet;

use goldpath_types::{ChapterView, PaceSignal, RoomView, TrackerConfig, TrackerState};

use crate::aggregate;
use crate::config::TrackerConfigExt;
use crate::pace::PacePredictor;
use crate::path::{ChapterMeta, PathInfo, PathRecorder, PathSegmentList};
use crate::stats::{ChapterStats, ChapterStatsList, GoldenType};
use crate::storage::{Storage, StorageError, TrackerStateFile};

#[cfg(test)]
mod tests;

pub struct Tracker {
    storage: Storage,
    config: TrackerConfig,

    chapter_key: String,
    paths: Option<PathSegmentList>,
    stats: ChapterStatsList,

    previous_room: Option<String>,
    current_room: String,
    /// Permanent in-room progress (switches, keys, doors): survives death.
    completed_permanent: bool,
    /// Revocable in-room progress (an uncollected berry): cleared on death.
    completed_revocable: bool,
    holding_golden: bool,
    completed_chapter: bool,
    /// Per-pickup identities already counted this visit; persistent
    /// collectibles re-fire their touch event every frame.
    completion_dedup: HashSet<String>,

    recorder: Option<PathRecorder>,
    pace: PacePredictor,
    chapters_this_session: HashSet<String>,
}

impl Tracker {
    pub fn new(storage: Storage, config: TrackerConfig) -> Self {
        let pace = PacePredictor::new(config.pace_policy());
        Self {
            storage,
            config,
            chapter_key: String::new(),
            paths: None,
            stats: ChapterStatsList::new(),
            previous_room: None,
            current_room: String::new(),
            completed_permanent: false,
            completed_revocable: false,
            holding_golden: false,
            completed_chapter: false,
            completion_dedup: HashSet::new(),
            recorder: None,
            pace,
            chapters_this_session: HashSet::new(),
        }
    }

    /// Build a tracker from configuration, honoring the data-dir override.
    pub fn from_config(config: TrackerConfig) -> Self {
        let base = config
            .data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(Storage::default_dir);
        Self::new(Storage::new(base), config)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn active(&self) -> bool {
        !self.chapter_key.is_empty()
    }

    fn selected_segment(&self) -> usize {
        self.paths.as_ref().map(|p| p.selected_index).unwrap_or(0)
    }

    /// The currently selected path, if one has been recorded.
    pub fn path(&self) -> Option<&PathInfo> {
        self.paths.as_ref().and_then(|p| p.current())
    }

    /// Stats for the selected segment.
    pub fn chapter_stats(&self) -> Option<&ChapterStats> {
        self.stats.get(self.selected_segment())
    }

    fn chapter_stats_mut(&mut self) -> &mut ChapterStats {
        let index = self.selected_segment();
        self.stats.get_or_create(index)
    }

    // ── Event intake ────────────────────────────────────────────────────────

    /// Enter a chapter: load its path and stats, reset run-local state, and
    /// register the entry room without counting it as an attempt.
    pub fn enter_chapter(
        &mut self,
        chapter_key: &str,
        meta: ChapterMeta,
        entry_room: &str,
    ) -> Result<(), StorageError> {
        tracing::debug!(chapter = chapter_key, room = entry_room, "entering chapter");

        self.recorder = None;
        self.stats = self.storage.load_stats(chapter_key)?;
        self.paths = self.storage.load_path(chapter_key)?;
        self.chapter_key = chapter_key.to_string();

        // Paths recorded before chapter metadata existed pick it up here.
        if let Some(paths) = &mut self.paths {
            let needs_meta = paths.current().is_some_and(|p| p.meta.is_none());
            if needs_meta {
                if let Some(path) = paths.current_mut() {
                    path.meta = Some(meta.clone());
                }
                self.storage.save_path(chapter_key, paths)?;
            }
        }

        self.previous_room = None;
        self.current_room = entry_room.to_string();
        self.completed_permanent = false;
        self.completed_revocable = false;
        self.completed_chapter = false;
        self.holding_golden = false;
        self.completion_dedup.clear();

        {
            let stats = self.chapter_stats_mut();
            stats.chapter_key = chapter_key.to_string();
            stats.meta = Some(meta);
        }

        // Initial bookkeeping pass: registers the entry room without a
        // spurious success.
        self.room_transition(entry_room, false, false)?;

        if self.chapters_this_session.insert(chapter_key.to_string()) {
            self.chapter_stats_mut().reset_session();
        }
        self.chapter_stats_mut().reset_current_run();
        self.save()?;

        self.pace.reset_run();
        Ok(())
    }

    /// Process a room change (transition, respawn elsewhere, or teleport).
    ///
    /// Returns a pace signal when the room just entered is at risk during a
    /// golden run.
    pub fn room_transition(
        &mut self,
        new_room: &str,
        count_attempt: bool,
        holding_golden: bool,
    ) -> Result<Option<PaceSignal>, StorageError> {
        if !self.active() {
            return Ok(None);
        }
        self.holding_golden = holding_golden;
        self.completed_chapter = false;

        let resolved = self
            .path()
            .map(|p| p.resolve_grouped(new_room).to_string())
            .unwrap_or_else(|| new_room.to_string());

        if self.path().is_some_and(|p| p.is_ignored(&resolved)) {
            tracing::debug!(room = %resolved, "ignored room, discarding transition");
            return Ok(None);
        }

        // Backtrack without completing the room: no attempt either way,
        // otherwise failing a side objective would double-penalize.
        if self.previous_room.as_deref() == Some(resolved.as_str()) && !self.room_completed() {
            tracing::debug!(room = %resolved, "backtrack without completion");
            self.previous_room = Some(std::mem::replace(&mut self.current_room, resolved.clone()));
            self.chapter_stats_mut().set_current_room(&resolved);
            self.save()?;
            return Ok(None);
        }

        // Self-transition via teleport or a grouped alias: display refresh only.
        if self.current_room == resolved {
            self.chapter_stats_mut().set_current_room(&resolved);
            self.save()?;
            return Ok(None);
        }

        tracing::debug!(room = %resolved, count_attempt, holding_golden, "room transition");

        self.previous_room = Some(std::mem::replace(&mut self.current_room, resolved.clone()));
        self.completed_permanent = false;
        self.completed_revocable = false;

        if let Some(recorder) = &mut self.recorder {
            recorder.add_room(&resolved);
        }

        if count_attempt && self.attempts_allowed() {
            // The stats current-room pointer still names the room being
            // left; the success lands there, then the pointer moves.
            self.chapter_stats_mut().add_attempt(true);
        }
        self.chapter_stats_mut().set_current_room(&resolved);
        self.save()?;

        if self.holding_golden {
            let index = self.selected_segment();
            let path = self.paths.as_ref().and_then(|p| p.current());
            if let Some(stats) = self.stats.get(index) {
                return Ok(self.pace.check_pace_ping(path, stats));
            }
        }
        Ok(None)
    }

    /// An in-room achievement that makes backtracking count as success.
    pub fn sub_objective_completed(&mut self, reset_on_death: bool) {
        if !self.active() {
            return;
        }
        if reset_on_death {
            self.completed_revocable = true;
        } else {
            self.completed_permanent = true;
        }
    }

    /// Deduplicated variant for persistent collectibles whose touch event
    /// fires every frame. Idempotent per pickup identity until death.
    pub fn sub_objective_completed_once(&mut self, pickup_id: &str, reset_on_death: bool) {
        if !self.active() || !self.completion_dedup.insert(pickup_id.to_string()) {
            return;
        }
        self.sub_objective_completed(reset_on_death);
    }

    /// The player picked up the golden collectible (the run becomes golden).
    pub fn golden_grabbed(&mut self, golden_type: GoldenType) -> Result<(), StorageError> {
        if !self.active() {
            return Ok(());
        }
        self.holding_golden = true;
        self.chapter_stats_mut().golden_type = golden_type;
        self.save()
    }

    /// Exactly one failure outcome per death, no matter how many
    /// death-adjacent notifications the event source raises around it.
    pub fn player_died(&mut self, holding_golden: bool) -> Result<(), StorageError> {
        if !self.active() {
            return Ok(());
        }
        tracing::debug!(room = %self.current_room, holding_golden, "player died");

        self.holding_golden = holding_golden;
        self.completion_dedup.clear();
        // Revocable progress (e.g. an uncollected berry) is gone now; a
        // subsequent backtrack is not forgiven.
        self.completed_revocable = false;

        // The in-run counter tracks what happened, not what is scored; it
        // keeps counting while tracking is paused.
        self.chapter_stats_mut()
            .current_room_stats_mut()
            .deaths_in_current_run += 1;

        if self.config.pause_death_tracking {
            return self.save();
        }
        if self.attempts_allowed() {
            self.chapter_stats_mut().add_attempt(false);
        }

        if holding_golden {
            let cap = self.config.last_golden_runs_cap;
            self.chapter_stats_mut().add_golden_death(cap);
            let index = self.selected_segment();
            let path = self.paths.as_ref().and_then(|p| p.current());
            if let Some(stats) = self.stats.get(index) {
                self.pace.died_with_golden(path, stats);
            }
        }
        self.save()
    }

    /// The golden collectible was banked: the run succeeded.
    pub fn special_item_collected(&mut self) -> Result<(), StorageError> {
        if !self.active() {
            return Ok(());
        }
        let golden_type = self.chapter_stats_mut().golden_type;
        self.chapter_stats_mut().collected_golden(golden_type);
        // Banking the golden ends the run with the chapter.
        self.completed_chapter = true;

        let index = self.selected_segment();
        let path = self.paths.as_ref().and_then(|p| p.current());
        if let Some(stats) = self.stats.get(index) {
            self.pace.collected_golden(path, stats);
        }
        self.save()
    }

    /// The chapter was finished: final room success plus completion state.
    pub fn chapter_completed(&mut self) -> Result<(), StorageError> {
        if !self.active() {
            return Ok(());
        }
        if self.attempts_allowed() {
            self.chapter_stats_mut().add_attempt(true);
        }
        self.completed_chapter = true;
        // Completing the chapter finishes an in-progress recording.
        self.end_path_recording()?;
        self.save()
    }

    /// The run was restarted from the menu. Counts as a golden death when
    /// holding, per policy, since no death event fires on this route.
    pub fn run_restarted(&mut self, holding_golden: bool) -> Result<(), StorageError> {
        if !self.active() {
            return Ok(());
        }
        self.holding_golden = holding_golden;
        // A restart can never complete a recording.
        self.recorder = None;

        if holding_golden
            && self.config.count_restart_as_golden_death
            && !self.config.pause_death_tracking
        {
            let cap = self.config.last_golden_runs_cap;
            self.chapter_stats_mut().add_golden_death(cap);
            let index = self.selected_segment();
            let path = self.paths.as_ref().and_then(|p| p.current());
            if let Some(stats) = self.stats.get(index) {
                self.pace.died_with_golden(path, stats);
            }
        }
        self.save()
    }

    fn attempts_allowed(&self) -> bool {
        !self.config.pause_death_tracking
            && (!self.config.track_golden_only || self.holding_golden)
    }

    fn room_completed(&self) -> bool {
        self.completed_permanent || self.completed_revocable
    }

    // ── Path recording ──────────────────────────────────────────────────────

    pub fn begin_path_recording(&mut self) -> Result<(), StorageError> {
        if !self.active() || self.recorder.is_some() {
            return Ok(());
        }
        let mut recorder = PathRecorder::new();
        recorder.add_room(&self.current_room);
        self.recorder = Some(recorder);
        self.save()
    }

    pub fn record_checkpoint(&mut self, label: Option<String>) {
        if let Some(recorder) = &mut self.recorder {
            recorder.add_checkpoint(label);
        }
    }

    /// Finish recording and install the result as the selected segment's
    /// path. Recordings shorter than two rooms are discarded. Returns whether
    /// a path was saved.
    pub fn end_path_recording(&mut self) -> Result<bool, StorageError> {
        let Some(recorder) = self.recorder.take() else {
            return Ok(false);
        };
        if recorder.total_rooms() < 2 {
            tracing::debug!(
                rooms = recorder.total_rooms(),
                "recording too short to save"
            );
            self.save()?;
            return Ok(false);
        }

        let meta = self.chapter_stats().and_then(|s| s.meta.clone());
        let path = recorder.into_path_info(meta);
        let list = match self.paths.take() {
            Some(mut list) => {
                list.set_current(path);
                list
            }
            None => PathSegmentList::from_path(path),
        };
        self.storage.save_path(&self.chapter_key, &list)?;
        self.paths = Some(list);
        self.save()?;
        Ok(true)
    }

    // ── Segment management ──────────────────────────────────────────────────

    pub fn select_segment(&mut self, index: usize) -> Result<bool, StorageError> {
        let Some(paths) = &mut self.paths else {
            return Ok(false);
        };
        if !paths.select(index) {
            return Ok(false);
        }
        self.save_paths()?;
        // Re-register the occupied room in the segment's own stats.
        let room = self.current_room.clone();
        self.chapter_stats_mut().set_current_room(&room);
        self.save()?;
        Ok(true)
    }

    pub fn add_segment(&mut self) -> Result<usize, StorageError> {
        let paths = self.paths.get_or_insert_with(PathSegmentList::new);
        paths.add_segment();
        let index = paths.segments.len() - 1;
        self.save_paths()?;
        Ok(index)
    }

    pub fn rename_segment(&mut self, name: &str) -> Result<bool, StorageError> {
        if name.is_empty() {
            return Ok(false);
        }
        let Some(paths) = &mut self.paths else {
            return Ok(false);
        };
        let index = paths.selected_index;
        let Some(segment) = paths.segments.get_mut(index) else {
            return Ok(false);
        };
        segment.name = name.to_string();
        self.save_paths()?;
        Ok(true)
    }

    /// Delete the selected segment and its stats. The last segment stays.
    pub fn delete_segment(&mut self) -> Result<bool, StorageError> {
        let Some(paths) = &mut self.paths else {
            return Ok(false);
        };
        let index = paths.selected_index;
        if !paths.remove_segment(index) {
            return Ok(false);
        }
        self.stats.remove_segment(index);
        self.save_paths()?;
        self.save()?;
        Ok(true)
    }

    // ── Path editing ────────────────────────────────────────────────────────

    /// Set or clear the current room's display name.
    pub fn set_custom_room_name(&mut self, custom: Option<&str>) -> Result<bool, StorageError> {
        let room = self.current_room.clone();
        let Some(path) = self.paths.as_mut().and_then(|p| p.current_mut()) else {
            return Ok(false);
        };
        if !path.set_custom_name(&room, custom) {
            return Ok(false);
        }
        self.save_paths()?;
        Ok(true)
    }

    /// Fold the current room into its predecessor's alias set.
    pub fn group_current_with_previous(&mut self) -> Result<bool, StorageError> {
        let room = self.current_room.clone();
        let Some(path) = self.paths.as_mut().and_then(|p| p.current_mut()) else {
            return Ok(false);
        };
        if !path.group_with_previous(&room) {
            return Ok(false);
        }
        let host = path.resolve_grouped(&room).to_string();
        self.current_room = host.clone();
        self.save_paths()?;
        self.chapter_stats_mut().set_current_room(&host);
        self.save()?;
        Ok(true)
    }

    /// Detach an alias back into its own room on the path.
    pub fn ungroup_room(&mut self, alias: &str) -> Result<bool, StorageError> {
        let Some(path) = self.paths.as_mut().and_then(|p| p.current_mut()) else {
            return Ok(false);
        };
        if !path.ungroup(alias) {
            return Ok(false);
        }
        self.save_paths()?;
        self.save()?;
        Ok(true)
    }

    /// Remove the current room from the path entirely.
    pub fn remove_current_room_from_path(&mut self) -> Result<bool, StorageError> {
        let room = self.current_room.clone();
        let Some(path) = self.paths.as_mut().and_then(|p| p.current_mut()) else {
            return Ok(false);
        };
        if !path.remove_room(&room) {
            return Ok(false);
        }
        self.save_paths()?;
        self.save()?;
        Ok(true)
    }

    // ── Data control ────────────────────────────────────────────────────────

    pub fn wipe_room_attempts(&mut self) -> Result<(), StorageError> {
        if !self.active() {
            return Ok(());
        }
        self.chapter_stats_mut().wipe_room_attempts();
        self.save()
    }

    pub fn wipe_chapter(&mut self) -> Result<(), StorageError> {
        if !self.active() {
            return Ok(());
        }
        self.chapter_stats_mut().wipe_chapter();
        self.save()
    }

    pub fn wipe_golden_deaths(&mut self) -> Result<(), StorageError> {
        if !self.active() {
            return Ok(());
        }
        self.chapter_stats_mut().wipe_golden_deaths();
        self.save()
    }

    pub fn wipe_golden_collects(&mut self) -> Result<(), StorageError> {
        if !self.active() {
            return Ok(());
        }
        self.chapter_stats_mut().wipe_golden_collects();
        self.save()
    }

    pub fn remove_last_attempt(&mut self) -> Result<(), StorageError> {
        if !self.active() {
            return Ok(());
        }
        self.chapter_stats_mut()
            .current_room_stats_mut()
            .remove_last_attempt();
        self.save()
    }

    pub fn remove_death_streak(&mut self) -> Result<(), StorageError> {
        if !self.active() {
            return Ok(());
        }
        self.chapter_stats_mut().remove_death_streak();
        self.save()
    }

    /// Manually register an attempt on the current room (user correction).
    pub fn add_manual_attempt(&mut self, success: bool) -> Result<(), StorageError> {
        if !self.active() {
            return Ok(());
        }
        self.chapter_stats_mut().add_attempt(success);
        self.save()
    }

    // ── Output views ────────────────────────────────────────────────────────

    pub fn room_view(&self, debug_name: &str) -> Option<RoomView> {
        let stats = self.chapter_stats()?;
        Some(aggregate::room_view(
            self.path(),
            stats,
            debug_name,
            self.config.attempt_window,
        ))
    }

    pub fn chapter_view(&self) -> Option<ChapterView> {
        let stats = self.chapter_stats()?;
        Some(aggregate::chapter_view(
            self.path(),
            stats,
            self.config.attempt_window,
            &self.config.rolling_average_windows,
        ))
    }

    /// Risk indicator for a room without consuming its per-run ping budget.
    pub fn pace_signal(&self, debug_name: &str) -> Option<PaceSignal> {
        let stats = self.chapter_stats()?;
        self.pace.signal_for(self.path(), stats, debug_name)
    }

    /// Consistent snapshot for concurrent readers: clones of the selected
    /// path and stats, safe to aggregate over while the next event mutates
    /// the live context.
    pub fn snapshot(&self) -> Option<(Option<PathInfo>, ChapterStats)> {
        let stats = self.chapter_stats()?.clone();
        Some((self.path().cloned(), stats))
    }

    // ── Persistence ─────────────────────────────────────────────────────────

    fn save_paths(&self) -> Result<(), StorageError> {
        if let Some(paths) = &self.paths {
            self.storage.save_path(&self.chapter_key, paths)?;
        }
        Ok(())
    }

    fn sync_state(&mut self) {
        let state = TrackerState {
            holding_golden: self.holding_golden,
            chapter_completed: self.completed_chapter,
            golden_done: self.holding_golden && self.completed_chapter,
            death_tracking_paused: self.config.pause_death_tracking,
            recording_path: self.recorder.is_some(),
            chapter_has_path: self.path().is_some(),
        };
        self.chapter_stats_mut().state = state;
    }

    fn save(&mut self) -> Result<(), StorageError> {
        self.sync_state();
        self.storage.save_stats(&self.chapter_key, &self.stats)?;
        self.storage.save_tracker_state(&TrackerStateFile {
            chapter_key: self.chapter_key.clone(),
            current_room: self.current_room.clone(),
            written_at: Utc::now().to_rfc3339(),
            state: self
                .chapter_stats()
                .map(|s| s.state)
                .unwrap_or_default(),
        })
    }
}
