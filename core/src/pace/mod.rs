//! Pace prediction: a binary "at risk" signal per room entered during a
//! golden run.
//!
//! The risk function is policy, not structure: a room is flagged when its
//! share of historical golden deaths reaches a threshold, once enough runs
//! exist to be informative. The function is monotonic in the room's failure
//! concentration. At most one signal is surfaced per room per run.

use hashbrown::HashSet;

use goldpath_types::PaceSignal;

use crate::path::PathInfo;
use crate::stats::ChapterStats;

/// Thresholds for the risk function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacePolicy {
    /// Golden runs required before any room is flagged.
    pub min_runs: usize,
    /// Death share at which a room counts as "at risk".
    pub risk_threshold: f64,
}

impl Default for PacePolicy {
    fn default() -> Self {
        Self {
            min_runs: 5,
            risk_threshold: 0.2,
        }
    }
}

/// Run-scoped pace state. `reset_run` clears it; the golden-death and
/// golden-collect hooks finalize a run and reset implicitly.
#[derive(Debug, Default)]
pub struct PacePredictor {
    policy: PacePolicy,
    pinged_rooms: HashSet<String>,
}

impl PacePredictor {
    pub fn new(policy: PacePolicy) -> Self {
        Self {
            policy,
            pinged_rooms: HashSet::new(),
        }
    }

    /// Clear run-local state at the start of a new run.
    pub fn reset_run(&mut self) {
        self.pinged_rooms.clear();
    }

    /// Called on every room entry. Returns a signal for the room just
    /// entered at most once per room per run, and only while the player is
    /// actually at risk there.
    pub fn check_pace_ping(
        &mut self,
        path: Option<&PathInfo>,
        stats: &ChapterStats,
    ) -> Option<PaceSignal> {
        let signal = self.signal_for(path, stats, &stats.current_room)?;
        if !signal.at_risk {
            return None;
        }
        if !self.pinged_rooms.insert(signal.room.clone()) {
            return None;
        }
        tracing::debug!(room = %signal.room, share = ?signal.death_share, "pace ping");
        Some(signal)
    }

    /// A golden run ended in a death; history bookkeeping already happened in
    /// the stats store.
    pub fn died_with_golden(&mut self, _path: Option<&PathInfo>, _stats: &ChapterStats) {
        self.reset_run();
    }

    /// A golden run ended in a collect.
    pub fn collected_golden(&mut self, _path: Option<&PathInfo>, _stats: &ChapterStats) {
        self.reset_run();
    }

    /// Query the risk indicator for a room without consuming its per-run
    /// ping budget.
    pub fn signal_for(
        &self,
        path: Option<&PathInfo>,
        stats: &ChapterStats,
        room: &str,
    ) -> Option<PaceSignal> {
        let resolved = path.map(|p| p.resolve_grouped(room)).unwrap_or(room);

        let total_runs = stats.golden_deaths_total() as usize + stats.golden_collected as usize;
        if total_runs < self.policy.min_runs {
            return Some(PaceSignal {
                room: resolved.to_string(),
                at_risk: false,
                death_share: None,
            });
        }

        let deaths_here = stats.room(resolved).map(|r| r.golden_deaths).unwrap_or(0);
        let share = f64::from(deaths_here) / total_runs as f64;
        Some(PaceSignal {
            room: resolved.to_string(),
            at_risk: share >= self.policy.risk_threshold,
            death_share: Some(share),
        })
    }
}
