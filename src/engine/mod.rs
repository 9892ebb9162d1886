// src/engine/mod.rs

//! Driver loop tying the scheduler and the output stream together.
//!
//! The driver contract is: pump repeatedly until the scheduler reports all
//! work complete, then pump once more to flush. [`runner::Runner`]
//! implements it.

use std::fmt;
use std::time::Duration;

pub mod runner;

pub use runner::{Runner, SUMMARY_ACTIVITY_ID};

/// Options for [`Runner::run`].
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// How long each completion wait lasts before the next pump.
    pub poll_interval: Duration,
    /// Emit a summary progress record before the final flush.
    pub emit_summary: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            emit_summary: true,
        }
    }
}

/// Final counts of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub total: u64,
    pub finished: u64,
    pub failed: u64,
    pub skipped: u64,
    /// The shared cancellation token was set by the end of the run.
    pub cancelled: bool,
    /// The sink stopped the pipeline before everything was replayed.
    pub stopped_early: bool,
}

impl RunSummary {
    /// Every submission ran and succeeded, and all output was replayed.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0 && !self.stopped_early
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total: {}, finished: {}, failed: {}, skipped: {}",
            self.total, self.finished, self.failed, self.skipped
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
