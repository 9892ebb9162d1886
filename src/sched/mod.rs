// src/sched/mod.rs

//! Bounded-concurrency scheduling.
//!
//! - [`scheduler`] admits work items up to a concurrency limit, queues the
//!   rest, and tracks per-task completion.
//! - [`latch`] is the completion latch behind `await_all_complete`.
//! - [`stats`] holds the counter snapshot type.

pub mod latch;
pub mod scheduler;
pub mod stats;

pub use latch::CompletionLatch;
pub use scheduler::{BoundedScheduler, FailureObserver, WorkFuture};
pub use stats::SchedulerStats;
