//! Shared configuration and view types for goldpath
//!
//! This crate contains serializable types that cross the boundary between
//! the tracking core (goldpath-core) and external consumers: overlay
//! renderers, external pollers reading the state side file, and the
//! configuration layer.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tracking policy and derived-data settings, persisted via confy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Suspend all attempt/death bookkeeping while set.
    pub pause_death_tracking: bool,
    /// Only record attempts made while holding the golden collectible.
    pub track_golden_only: bool,
    /// Whether restarting a run while holding the golden counts as a golden death.
    pub count_restart_as_golden_death: bool,
    /// Trailing window used for per-room success rates.
    pub attempt_window: usize,
    /// Maximum retained golden-run history entries; oldest evicted on append.
    pub last_golden_runs_cap: usize,
    /// Window sizes for rolling averages of run distance.
    pub rolling_average_windows: Vec<usize>,
    /// Minimum recorded golden runs before pace pings are surfaced.
    pub pace_min_runs: usize,
    /// Share of historical golden deaths at which a room counts as "at risk".
    pub pace_risk_threshold: f64,
    /// Override for the data directory; platform default when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            pause_death_tracking: false,
            track_golden_only: false,
            count_restart_as_golden_death: true,
            attempt_window: 20,
            last_golden_runs_cap: 50,
            rolling_average_windows: vec![1, 3, 10],
            pace_min_runs: 5,
            pace_risk_threshold: 0.2,
            data_dir: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ephemeral tracker state
// ─────────────────────────────────────────────────────────────────────────────

/// Snapshot of ephemeral tracking flags, serialized alongside stats and into
/// the lightweight state side file for external polling. Not part of the
/// attempt history itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackerState {
    pub holding_golden: bool,
    pub chapter_completed: bool,
    /// Chapter was completed while holding the golden.
    pub golden_done: bool,
    pub death_tracking_paused: bool,
    pub recording_path: bool,
    pub chapter_has_path: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Output views
// ─────────────────────────────────────────────────────────────────────────────

/// Per-room view for rendering consumers.
///
/// Optional fields degrade to `None` when no path is recorded for the chapter
/// or the room is not on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomView {
    pub debug_name: String,
    /// Display name: custom name when set, debug name otherwise.
    pub name: String,
    /// Success rate over the trailing attempt window; `None` with no attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f32>,
    /// 1-based position on the path, `None` when not on the path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_number: Option<usize>,
    pub golden_deaths: u32,
    pub golden_deaths_session: u32,
    pub deaths_in_current_run: u32,
}

/// Per-checkpoint aggregate included in the chapter view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointView {
    pub name: String,
    pub abbreviation: String,
    /// Product of trailing success rates across the checkpoint's rooms.
    pub golden_chance: f64,
    pub golden_deaths: u32,
    pub golden_deaths_session: u32,
}

/// One rolling-average series of golden-run distances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingAverageSeries {
    pub window: usize,
    /// One data point per full window; empty with fewer runs than `window`.
    pub points: Vec<f64>,
}

/// A single historical golden run, most recent first in `ChapterView::last_runs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastRun {
    /// Room the run ended in.
    pub room: String,
    /// 1-based distance reached, `None` when the room is not on the path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<usize>,
}

/// Chapter-level view for rendering consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterView {
    pub chapter_key: String,
    /// `None` when no path is recorded (raw counters still populated).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub golden_chance: Option<f64>,
    pub golden_deaths: u32,
    pub golden_deaths_session: u32,
    pub golden_collected: u32,
    pub golden_collected_session: u32,
    /// Total gameplay rooms on the path, 0 without a path.
    pub room_count: usize,
    pub checkpoints: Vec<CheckpointView>,
    pub rolling_averages: Vec<RollingAverageSeries>,
    pub last_runs: Vec<LastRun>,
}

/// Binary pace risk indicator for a room, emitted on room entry during
/// golden runs and queryable on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaceSignal {
    pub room: String,
    pub at_risk: bool,
    /// Share of historical golden deaths concentrated in this room,
    /// `None` below the minimum run count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_share: Option<f64>,
}
