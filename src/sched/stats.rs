// src/sched/stats.rs

use std::fmt;

/// Point-in-time snapshot of the scheduler counters.
///
/// Each field is read independently, so a snapshot taken while work is
/// completing may mix values from adjacent instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    /// Ids minted so far, including skipped submissions.
    pub total: u64,
    pub active: usize,
    /// Highest `active` value ever observed.
    pub peak_active: usize,
    pub finished: u64,
    pub failed: u64,
    /// Submissions that never ran because cancellation fired first.
    pub skipped: u64,
    pub pending: usize,
}

impl SchedulerStats {
    /// Submissions that reached a terminal state.
    pub fn completed(&self) -> u64 {
        self.finished + self.failed + self.skipped
    }

    pub fn all_accounted_for(&self) -> bool {
        self.completed() == self.total
    }
}

impl fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total: {}, finished: {}, failed: {}, skipped: {}",
            self.total, self.finished, self.failed, self.skipped
        )
    }
}
