use super::*;
use crate::path::{CheckpointInfo, RoomInfo};

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

static TEST_ID: AtomicU32 = AtomicU32::new(0);

struct Harness {
    tracker: Tracker,
    storage: Storage,
    dir: PathBuf,
}

impl Harness {
    fn with_config(config: TrackerConfig) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "goldpath-tracker-test-{}-{}",
            std::process::id(),
            TEST_ID.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&dir).unwrap();
        let storage = Storage::new(&dir);
        Self {
            tracker: Tracker::new(storage.clone(), config),
            storage,
            dir,
        }
    }

    fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    /// Seed the sample path on disk, then enter the chapter at `a-01`.
    fn entered_with_path() -> Self {
        let mut harness = Self::new();
        harness
            .storage
            .save_path("city", &PathSegmentList::from_path(sample_path()))
            .unwrap();
        harness
            .tracker
            .enter_chapter("city", meta(), "a-01")
            .unwrap();
        harness
    }

    /// Enter the chapter with no path on disk.
    fn entered_without_path() -> Self {
        let mut harness = Self::new();
        harness
            .tracker
            .enter_chapter("city", meta(), "a-01")
            .unwrap();
        harness
    }

    fn attempts(&self, room: &str) -> Vec<bool> {
        self.tracker
            .chapter_stats()
            .and_then(|s| s.room(room))
            .map(|r| r.attempts.clone())
            .unwrap_or_default()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn meta() -> ChapterMeta {
    ChapterMeta {
        campaign: "City".to_string(),
        chapter_name: "Forsaken City".to_string(),
        side: "A".to_string(),
        sid: "1-city".to_string(),
    }
}

/// Start: a-01, a-02 (alias a-02b); End: a-03. "lobby" is ignored.
fn sample_path() -> PathInfo {
    PathInfo {
        checkpoints: vec![
            CheckpointInfo {
                name: "Start".to_string(),
                abbreviation: "ST".to_string(),
                rooms: vec![
                    RoomInfo::new("a-01"),
                    RoomInfo {
                        debug_name: "a-02".to_string(),
                        custom_name: None,
                        grouped_rooms: vec!["a-02b".to_string()],
                    },
                ],
            },
            CheckpointInfo {
                name: "End".to_string(),
                abbreviation: "EN".to_string(),
                rooms: vec![RoomInfo::new("a-03")],
            },
        ],
        ignored_rooms: vec!["lobby".to_string()],
        meta: None,
    }
}

// ── Attempt semantics ───────────────────────────────────────────────────────

#[test]
fn chapter_entry_registers_room_without_an_attempt() {
    let harness = Harness::entered_with_path();
    let stats = harness.tracker.chapter_stats().unwrap();
    assert_eq!(stats.current_room, "a-01");
    assert!(harness.attempts("a-01").is_empty());
}

#[test]
fn forward_transition_credits_the_room_being_left() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.room_transition("a-02", true, false).unwrap();
    assert_eq!(harness.attempts("a-01"), vec![true]);
    assert!(harness.attempts("a-02").is_empty());
    assert_eq!(
        harness.tracker.chapter_stats().unwrap().current_room,
        "a-02"
    );
}

#[test]
fn golden_run_ending_in_death_records_expected_outcomes() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.room_transition("a-02", true, true).unwrap();
    harness.tracker.room_transition("a-03", true, true).unwrap();
    harness.tracker.player_died(true).unwrap();

    assert_eq!(harness.attempts("a-01"), vec![true]);
    assert_eq!(harness.attempts("a-02"), vec![true]);
    assert_eq!(harness.attempts("a-03"), vec![false]);

    let stats = harness.tracker.chapter_stats().unwrap();
    assert_eq!(stats.last_golden_runs, vec!["a-03".to_string()]);
    assert_eq!(stats.room("a-03").unwrap().golden_deaths, 1);
    assert_eq!(stats.room("a-03").unwrap().deaths_in_current_run, 1);
}

#[test]
fn death_records_exactly_one_failure() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.player_died(false).unwrap();
    assert_eq!(harness.attempts("a-01"), vec![false]);
    let stats = harness.tracker.chapter_stats().unwrap();
    assert_eq!(stats.room("a-01").unwrap().golden_deaths, 0);
}

#[test]
fn completing_a_run_records_only_successes() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.room_transition("a-02", true, false).unwrap();
    harness.tracker.room_transition("a-03", true, false).unwrap();
    harness.tracker.chapter_completed().unwrap();

    assert_eq!(harness.attempts("a-01"), vec![true]);
    assert_eq!(harness.attempts("a-02"), vec![true]);
    assert_eq!(harness.attempts("a-03"), vec![true]);
    assert!(harness.tracker.chapter_stats().unwrap().state.chapter_completed);
}

// ── Transition classification ───────────────────────────────────────────────

#[test]
fn backtrack_without_completion_appends_nothing() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.room_transition("a-02", true, false).unwrap();
    harness.tracker.room_transition("a-01", true, false).unwrap();

    assert_eq!(harness.attempts("a-01"), vec![true]);
    assert!(harness.attempts("a-02").is_empty());
    assert_eq!(
        harness.tracker.chapter_stats().unwrap().current_room,
        "a-01"
    );
}

#[test]
fn backtrack_after_completion_counts_as_success() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.room_transition("a-02", true, false).unwrap();
    harness.tracker.sub_objective_completed(false);
    harness.tracker.room_transition("a-01", true, false).unwrap();

    assert_eq!(harness.attempts("a-02"), vec![true]);
}

#[test]
fn revocable_completion_does_not_survive_death() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.room_transition("a-02", true, false).unwrap();
    harness.tracker.sub_objective_completed(true);
    harness.tracker.player_died(false).unwrap();
    harness.tracker.room_transition("a-01", true, false).unwrap();

    // The death itself is the only a-02 outcome; the backtrack is not
    // forgiven by the revoked completion.
    assert_eq!(harness.attempts("a-02"), vec![false]);
}

#[test]
fn deduplicated_completion_can_fire_again_after_death() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.room_transition("a-02", true, false).unwrap();
    harness
        .tracker
        .sub_objective_completed_once("berry-1", true);
    harness
        .tracker
        .sub_objective_completed_once("berry-1", true);
    harness.tracker.player_died(false).unwrap();

    // Death cleared both the completion and the dedup entry.
    harness
        .tracker
        .sub_objective_completed_once("berry-1", true);
    harness.tracker.room_transition("a-01", true, false).unwrap();
    assert_eq!(harness.attempts("a-02"), vec![false, true]);
}

#[test]
fn self_transition_mutates_nothing() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.room_transition("a-01", true, false).unwrap();
    assert!(harness.attempts("a-01").is_empty());
}

#[test]
fn grouped_alias_resolves_to_its_host() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.room_transition("a-02b", true, false).unwrap();

    assert_eq!(harness.attempts("a-01"), vec![true]);
    let stats = harness.tracker.chapter_stats().unwrap();
    assert_eq!(stats.current_room, "a-02");
    assert!(stats.room("a-02b").is_none());

    let view = harness.tracker.room_view("a-02b").unwrap();
    assert_eq!(view.debug_name, "a-02");
    assert_eq!(view.room_number, Some(2));
}

#[test]
fn ignored_rooms_are_discarded_entirely() {
    let mut harness = Harness::entered_with_path();
    let signal = harness.tracker.room_transition("lobby", true, true).unwrap();
    assert!(signal.is_none());

    let stats = harness.tracker.chapter_stats().unwrap();
    assert_eq!(stats.current_room, "a-01");
    assert!(stats.room("lobby").is_none());
}

// ── Config policies ─────────────────────────────────────────────────────────

#[test]
fn paused_tracking_suspends_all_bookkeeping() {
    let mut harness = Harness::with_config(TrackerConfig {
        pause_death_tracking: true,
        ..TrackerConfig::default()
    });
    harness
        .storage
        .save_path("city", &PathSegmentList::from_path(sample_path()))
        .unwrap();
    harness.tracker.enter_chapter("city", meta(), "a-01").unwrap();

    harness.tracker.room_transition("a-02", true, true).unwrap();
    harness.tracker.player_died(true).unwrap();

    assert!(harness.attempts("a-01").is_empty());
    assert!(harness.attempts("a-02").is_empty());
    let stats = harness.tracker.chapter_stats().unwrap();
    assert_eq!(stats.golden_deaths_total(), 0);
}

#[test]
fn paused_tracking_still_counts_in_run_deaths() {
    let mut harness = Harness::with_config(TrackerConfig {
        pause_death_tracking: true,
        ..TrackerConfig::default()
    });
    harness.tracker.enter_chapter("city", meta(), "a-01").unwrap();
    harness.tracker.player_died(false).unwrap();
    harness.tracker.player_died(false).unwrap();

    // Pausing gates the outcome append only; the run still saw the deaths.
    let stats = harness.tracker.chapter_stats().unwrap();
    assert_eq!(stats.room("a-01").unwrap().deaths_in_current_run, 2);
    assert!(harness.attempts("a-01").is_empty());
}

#[test]
fn data_control_before_entering_a_chapter_is_a_no_op() {
    let mut harness = Harness::new();
    harness.tracker.wipe_chapter().unwrap();
    harness.tracker.wipe_golden_deaths().unwrap();
    harness.tracker.add_manual_attempt(true).unwrap();
    harness.tracker.remove_death_streak().unwrap();

    assert!(harness.tracker.chapter_stats().is_none());
    // No stray files keyed by the empty chapter key either.
    assert!(!harness.dir.join("stats").exists());
}

#[test]
fn golden_only_mode_ignores_casual_attempts() {
    let mut harness = Harness::with_config(TrackerConfig {
        track_golden_only: true,
        ..TrackerConfig::default()
    });
    harness.tracker.enter_chapter("city", meta(), "a-01").unwrap();

    harness.tracker.room_transition("a-02", true, false).unwrap();
    assert!(harness.attempts("a-01").is_empty());

    harness.tracker.room_transition("a-03", true, true).unwrap();
    assert_eq!(harness.attempts("a-02"), vec![true]);
}

#[test]
fn restart_while_holding_counts_as_golden_death_by_policy() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.room_transition("a-02", true, true).unwrap();
    harness.tracker.run_restarted(true).unwrap();

    let stats = harness.tracker.chapter_stats().unwrap();
    assert_eq!(stats.room("a-02").unwrap().golden_deaths, 1);
    assert_eq!(stats.last_golden_runs, vec!["a-02".to_string()]);
    // No attempt outcome is recorded on this route.
    assert!(harness.attempts("a-02").is_empty());
}

#[test]
fn restart_golden_death_can_be_disabled() {
    let mut harness = Harness::with_config(TrackerConfig {
        count_restart_as_golden_death: false,
        ..TrackerConfig::default()
    });
    harness.tracker.enter_chapter("city", meta(), "a-01").unwrap();
    harness.tracker.run_restarted(true).unwrap();

    let stats = harness.tracker.chapter_stats().unwrap();
    assert_eq!(stats.golden_deaths_total(), 0);
    assert!(stats.last_golden_runs.is_empty());
}

// ── Pace signals ────────────────────────────────────────────────────────────

#[test]
fn risky_room_pings_on_entry_during_golden_run() {
    let mut harness = Harness::with_config(TrackerConfig {
        pace_min_runs: 1,
        pace_risk_threshold: 0.5,
        ..TrackerConfig::default()
    });
    harness
        .storage
        .save_path("city", &PathSegmentList::from_path(sample_path()))
        .unwrap();
    harness.tracker.enter_chapter("city", meta(), "a-01").unwrap();

    // One golden run dying in a-02 seeds the history.
    harness.tracker.room_transition("a-02", true, true).unwrap();
    harness.tracker.player_died(true).unwrap();

    // Next run: entering a-02 while holding surfaces the signal once.
    harness.tracker.enter_chapter("city", meta(), "a-01").unwrap();
    let signal = harness
        .tracker
        .room_transition("a-02", true, true)
        .unwrap()
        .unwrap();
    assert!(signal.at_risk);
    assert_eq!(signal.room, "a-02");
    assert_eq!(signal.death_share, Some(1.0));

    // Casual entry never pings.
    harness.tracker.room_transition("a-01", true, false).unwrap();
    let signal = harness.tracker.room_transition("a-02", true, false).unwrap();
    assert!(signal.is_none());
}

// ── Path recording ──────────────────────────────────────────────────────────

#[test]
fn recording_builds_and_installs_a_path() {
    let mut harness = Harness::entered_without_path();
    assert!(harness.tracker.path().is_none());

    harness.tracker.begin_path_recording().unwrap();
    harness.tracker.room_transition("a-02", true, false).unwrap();
    harness.tracker.record_checkpoint(Some("Crossing".to_string()));
    harness.tracker.room_transition("a-03", true, false).unwrap();
    assert!(harness.tracker.end_path_recording().unwrap());

    let path = harness.tracker.path().unwrap();
    assert_eq!(path.room_count(), 3);
    assert_eq!(path.checkpoints.len(), 2);
    assert_eq!(path.checkpoints[1].name, "Crossing");
    assert_eq!(path.meta.as_ref().unwrap().sid, "1-city");

    // Installed path is on disk too.
    let reloaded = harness.storage.load_path("city").unwrap().unwrap();
    assert_eq!(reloaded.current().unwrap().room_count(), 3);
}

#[test]
fn short_recordings_are_discarded() {
    let mut harness = Harness::entered_without_path();
    harness.tracker.begin_path_recording().unwrap();
    assert!(!harness.tracker.end_path_recording().unwrap());
    assert!(harness.tracker.path().is_none());
}

#[test]
fn restart_aborts_an_active_recording() {
    let mut harness = Harness::entered_without_path();
    harness.tracker.begin_path_recording().unwrap();
    harness.tracker.room_transition("a-02", true, false).unwrap();
    harness.tracker.run_restarted(false).unwrap();

    assert!(!harness.tracker.end_path_recording().unwrap());
    assert!(harness.tracker.path().is_none());
}

// ── Segments ────────────────────────────────────────────────────────────────

#[test]
fn segments_keep_independent_histories() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.room_transition("a-02", true, false).unwrap();
    assert_eq!(harness.attempts("a-01"), vec![true]);

    let index = harness.tracker.add_segment().unwrap();
    assert!(harness.tracker.select_segment(index).unwrap());
    assert!(harness.attempts("a-01").is_empty());
    harness.tracker.add_manual_attempt(false).unwrap();

    assert!(harness.tracker.select_segment(0).unwrap());
    assert_eq!(harness.attempts("a-01"), vec![true]);
    assert_eq!(harness.attempts("a-02"), Vec::<bool>::new());
}

#[test]
fn deleting_the_selected_segment_drops_its_stats() {
    let mut harness = Harness::entered_with_path();
    let index = harness.tracker.add_segment().unwrap();
    assert!(harness.tracker.select_segment(index).unwrap());
    harness.tracker.add_manual_attempt(true).unwrap();

    assert!(harness.tracker.delete_segment().unwrap());
    // Back on the sole remaining segment, untouched.
    assert!(harness.attempts("a-02").is_empty());
    assert!(!harness.tracker.delete_segment().unwrap());
}

// ── Persistence ─────────────────────────────────────────────────────────────

#[test]
fn history_survives_a_new_tracker_instance() {
    let dir;
    {
        let mut harness = Harness::entered_with_path();
        harness.tracker.room_transition("a-02", true, true).unwrap();
        harness.tracker.player_died(true).unwrap();
        dir = harness.dir.clone();

        let mut tracker = Tracker::new(Storage::new(&dir), TrackerConfig::default());
        tracker.enter_chapter("city", meta(), "a-01").unwrap();

        let stats = tracker.chapter_stats().unwrap();
        assert_eq!(stats.room("a-01").unwrap().attempts, vec![true]);
        assert_eq!(stats.room("a-02").unwrap().golden_deaths, 1);
        // Fresh process session: session counters reset, lifetime kept.
        assert_eq!(stats.room("a-02").unwrap().golden_deaths_session, 0);
        assert_eq!(stats.room("a-02").unwrap().deaths_in_current_run, 0);
    }
}

#[test]
fn state_side_file_reflects_the_live_run() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.room_transition("a-02", true, true).unwrap();

    let raw = fs::read_to_string(harness.dir.join("stats").join("state.json")).unwrap();
    let state: TrackerStateFile = serde_json::from_str(&raw).unwrap();
    assert_eq!(state.chapter_key, "city");
    assert_eq!(state.current_room, "a-02");
    assert!(state.state.holding_golden);
    assert!(state.state.chapter_has_path);
}

// ── Views and data control ──────────────────────────────────────────────────

#[test]
fn views_degrade_without_a_path() {
    let mut harness = Harness::entered_without_path();
    harness.tracker.room_transition("a-02", true, false).unwrap();

    let view = harness.tracker.room_view("a-01").unwrap();
    assert_eq!(view.room_number, None);
    assert_eq!(view.success_rate, Some(1.0));

    let chapter = harness.tracker.chapter_view().unwrap();
    assert_eq!(chapter.golden_chance, None);
    assert_eq!(chapter.room_count, 0);
}

#[test]
fn chapter_view_combines_path_and_history() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.room_transition("a-02", true, true).unwrap();
    harness.tracker.player_died(true).unwrap();

    let chapter = harness.tracker.chapter_view().unwrap();
    assert_eq!(chapter.room_count, 3);
    assert_eq!(chapter.golden_deaths, 1);
    assert_eq!(chapter.checkpoints.len(), 2);
    assert_eq!(chapter.last_runs[0].room, "a-02");
    assert_eq!(chapter.last_runs[0].distance, Some(2));
}

#[test]
fn death_streak_removal_is_exposed_as_a_correction() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.room_transition("a-02", true, false).unwrap();
    harness.tracker.room_transition("a-01", false, false).unwrap();
    harness.tracker.room_transition("a-02", false, false).unwrap();
    harness.tracker.player_died(false).unwrap();
    harness.tracker.player_died(false).unwrap();

    harness.tracker.remove_death_streak().unwrap();
    assert!(harness.attempts("a-02").is_empty());
    assert_eq!(harness.attempts("a-01"), vec![true]);
}

#[test]
fn editing_the_path_groups_and_ungroups_rooms() {
    let mut harness = Harness::entered_with_path();
    harness.tracker.room_transition("a-02", true, false).unwrap();

    assert!(harness.tracker.group_current_with_previous().unwrap());
    let path = harness.tracker.path().unwrap();
    assert_eq!(path.room_count(), 2);
    assert_eq!(path.resolve_grouped("a-02"), "a-01");
    assert_eq!(
        harness.tracker.chapter_stats().unwrap().current_room,
        "a-01"
    );

    assert!(harness.tracker.ungroup_room("a-02").unwrap());
    let path = harness.tracker.path().unwrap();
    assert_eq!(path.room_count(), 3);
    assert_eq!(path.room_number("a-02"), Some(2));
}
