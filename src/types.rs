// src/types.rs

//! Types shared between the scheduler and the output stream.

use std::fmt;

/// Submission-order identifier of a work item.
///
/// Minted by [`BoundedScheduler::submit`](crate::sched::BoundedScheduler::submit)
/// starting at 0. Ids are never reused and are the only ordering key for
/// data output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TaskId(pub u64);

impl TaskId {
    pub const ZERO: TaskId = TaskId(0);

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> TaskId {
        TaskId(self.0 + 1)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Terminal outcome of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed,
    /// Submitted or queued, but never started because cancellation fired.
    Skipped,
}

/// Lifecycle of a single submission as tracked by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting in the pending queue for a free slot.
    Queued,
    Running,
    Done(TaskOutcome),
}

impl TaskState {
    pub fn is_done(self) -> bool {
        matches!(self, TaskState::Done(_))
    }
}

/// Read-only completion query used by the output stream to decide when the
/// cursor may move past a task.
pub trait CompletionSource {
    /// Whether `id` has reached a terminal state. Unknown ids are not done.
    fn is_done(&self, id: TaskId) -> bool;
}

impl<C: CompletionSource + ?Sized> CompletionSource for &C {
    fn is_done(&self, id: TaskId) -> bool {
        (**self).is_done(id)
    }
}

impl<C: CompletionSource + ?Sized> CompletionSource for std::sync::Arc<C> {
    fn is_done(&self, id: TaskId) -> bool {
        (**self).is_done(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_orders_by_submission() {
        let a = TaskId(3);
        assert!(a < a.next());
        assert_eq!(a.next().get(), 4);
        assert_eq!(a.to_string(), "#3");
    }

    #[test]
    fn only_done_states_are_terminal() {
        assert!(!TaskState::Queued.is_done());
        assert!(!TaskState::Running.is_done());
        assert!(TaskState::Done(TaskOutcome::Skipped).is_done());
    }
}
