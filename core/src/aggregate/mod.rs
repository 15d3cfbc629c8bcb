//! Derived statistics: pure functions over a `(path, stats)` snapshot.
//!
//! Nothing here mutates state; callers take a consistent snapshot (or hold
//! the single-writer context) before computing views, so a mid-append
//! attempt sequence can never be observed.

use goldpath_types::{ChapterView, CheckpointView, LastRun, RollingAverageSeries, RoomView};

use crate::path::{CheckpointInfo, PathInfo};
use crate::stats::{ChapterStats, RoomStats};


/// Success rate over the trailing `window` attempts, `None` with no history.
pub fn success_rate_last_n(room: &RoomStats, window: usize) -> Option<f32> {
    room.success_rate(window)
}

/// Golden chance across one checkpoint: product of each room's trailing
/// success rate. Rooms without any recorded attempt are not yet informative
/// and are excluded from the product rather than zeroing the chain.
pub fn checkpoint_golden_chance(
    checkpoint: &CheckpointInfo,
    stats: &ChapterStats,
    window: usize,
) -> f64 {
    checkpoint
        .rooms
        .iter()
        .filter_map(|room| stats.room(&room.debug_name))
        .filter_map(|room| room.success_rate(window))
        .map(f64::from)
        .product()
}

/// Golden chance across the whole path: product of the checkpoint chances.
pub fn chapter_golden_chance(path: &PathInfo, stats: &ChapterStats, window: usize) -> f64 {
    path.checkpoints
        .iter()
        .map(|cp| checkpoint_golden_chance(cp, stats, window))
        .product()
}

/// Convert golden-run end rooms into 1-based distances along the path.
/// Rooms that no longer resolve to the path count as distance 0 so window
/// math over the run history stays stable.
pub fn run_distances(path: &PathInfo, runs: &[String]) -> Vec<usize> {
    runs.iter()
        .map(|room| path.room_number(room).unwrap_or(0))
        .collect()
}

/// Simple moving average at a fixed window over run distances.
///
/// Windows shorter than `window` produce no data point: with fewer runs than
/// the window the result is empty, with exactly `window` runs it holds one
/// point.
pub fn rolling_averages(distances: &[usize], window: usize) -> Vec<f64> {
    if window == 0 || distances.len() < window {
        return Vec::new();
    }
    distances
        .windows(window)
        .map(|w| w.iter().sum::<usize>() as f64 / window as f64)
        .collect()
}

/// Per-room golden-run survival data, used to rank rooms by how
/// disproportionately they end golden runs.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomChokeRate {
    pub debug_name: String,
    /// 1-based position on the path.
    pub room_number: usize,
    /// Golden runs that reached at least this room (collected goldens passed
    /// every room).
    pub runs_reaching: u32,
    /// Golden runs that ended in this room.
    pub golden_deaths: u32,
    /// Survival rate of runs reaching this room, `None` when none have.
    pub survival_rate: Option<f32>,
}

/// Walk the path and compute choke data for every room.
pub fn choke_rates(path: &PathInfo, stats: &ChapterStats) -> Vec<RoomChokeRate> {
    let distances = run_distances(path, &stats.last_golden_runs);

    path.rooms()
        .enumerate()
        .map(|(idx, room)| {
            let room_number = idx + 1;
            let died_here_or_later = distances.iter().filter(|&&d| d >= room_number).count() as u32;
            let runs_reaching = died_here_or_later + stats.golden_collected;
            let golden_deaths = stats
                .room(&room.debug_name)
                .map(|r| r.golden_deaths)
                .unwrap_or(0);
            let survival_rate = (runs_reaching > 0).then(|| {
                (runs_reaching.saturating_sub(golden_deaths)) as f32 / runs_reaching as f32
            });
            RoomChokeRate {
                debug_name: room.debug_name.clone(),
                room_number,
                runs_reaching,
                golden_deaths,
                survival_rate,
            }
        })
        .collect()
}

/// Per-room view. Degrades to raw counters when there is no path or the room
/// is not on it.
pub fn room_view(
    path: Option<&PathInfo>,
    stats: &ChapterStats,
    debug_name: &str,
    window: usize,
) -> RoomView {
    let resolved = path
        .map(|p| p.resolve_grouped(debug_name))
        .unwrap_or(debug_name);
    let info = path.and_then(|p| p.room(resolved));
    let room = stats.room(resolved);

    RoomView {
        debug_name: resolved.to_string(),
        name: info
            .map(|i| i.display_name().to_string())
            .unwrap_or_else(|| resolved.to_string()),
        success_rate: room.and_then(|r| r.success_rate(window)),
        room_number: path.and_then(|p| p.room_number(resolved)),
        golden_deaths: room.map(|r| r.golden_deaths).unwrap_or(0),
        golden_deaths_session: room.map(|r| r.golden_deaths_session).unwrap_or(0),
        deaths_in_current_run: room.map(|r| r.deaths_in_current_run).unwrap_or(0),
    }
}

/// Chapter-level view. With no recorded path, chance and distance data are
/// absent while raw counters still populate.
pub fn chapter_view(
    path: Option<&PathInfo>,
    stats: &ChapterStats,
    window: usize,
    rolling_windows: &[usize],
) -> ChapterView {
    let checkpoints = path
        .map(|p| {
            p.checkpoints
                .iter()
                .map(|cp| {
                    let (deaths, deaths_session) = cp
                        .rooms
                        .iter()
                        .filter_map(|r| stats.room(&r.debug_name))
                        .fold((0, 0), |(d, s), r| {
                            (d + r.golden_deaths, s + r.golden_deaths_session)
                        });
                    CheckpointView {
                        name: cp.name.clone(),
                        abbreviation: cp.abbreviation.clone(),
                        golden_chance: checkpoint_golden_chance(cp, stats, window),
                        golden_deaths: deaths,
                        golden_deaths_session: deaths_session,
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let rolling = path
        .map(|p| {
            let distances = run_distances(p, &stats.last_golden_runs);
            rolling_windows
                .iter()
                .map(|&w| RollingAverageSeries {
                    window: w,
                    points: rolling_averages(&distances, w),
                })
                .collect()
        })
        .unwrap_or_default();

    let last_runs = stats
        .last_golden_runs
        .iter()
        .rev()
        .map(|room| LastRun {
            room: room.clone(),
            distance: path.and_then(|p| p.room_number(room)),
        })
        .collect();

    ChapterView {
        chapter_key: stats.chapter_key.clone(),
        golden_chance: path.map(|p| chapter_golden_chance(p, stats, window)),
        golden_deaths: stats.golden_deaths_total(),
        golden_deaths_session: stats.golden_deaths_session_total(),
        golden_collected: stats.golden_collected,
        golden_collected_session: stats.golden_collected_session,
        room_count: path.map(PathInfo::room_count).unwrap_or(0),
        checkpoints,
        rolling_averages: rolling,
        last_runs,
    }
}
