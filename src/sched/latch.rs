// src/sched/latch.rs

//! Completion latch with an initial bias of one.
//!
//! The count starts at 1, held on behalf of the driver. Every admitted or
//! queued work item adds one and releases one when it reaches a terminal
//! state. The driver calls [`CompletionLatch::arm`] once it has finished
//! submitting, dropping the bias. Until then the count cannot reach zero, so
//! a wait that starts before the first submission does not return early.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Notify;
use tracing::trace;

#[derive(Debug)]
pub struct CompletionLatch {
    count: AtomicUsize,
    armed: AtomicBool,
    zero: Notify,
}

impl CompletionLatch {
    pub fn new() -> Self {
        Self {
            count: AtomicUsize::new(1),
            armed: AtomicBool::new(false),
            zero: Notify::new(),
        }
    }

    /// Register one more outstanding unit.
    pub fn add(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Release one outstanding unit, waking waiters if the count hits zero.
    pub fn release(&self) {
        let prev = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "completion latch released more often than added");
        if prev == 1 {
            trace!("completion latch reached zero");
            self.zero.notify_waiters();
        }
    }

    /// Drop the driver's bias. Only the first call has an effect.
    ///
    /// Returns `true` if this call armed the latch.
    pub fn arm(&self) -> bool {
        if self.armed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.release();
        true
    }

    /// Outstanding units, including the bias while unarmed.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_zero(&self) -> bool {
        self.count() == 0
    }

    /// Wait until the count reaches zero.
    pub async fn wait(&self) {
        loop {
            // Register interest before checking, so a release between the
            // check and the await is not missed.
            let notified = self.zero.notified();
            if self.is_zero() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CompletionLatch {
    fn default() -> Self {
        Self::new()
    }
}
