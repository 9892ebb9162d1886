// src/sched/scheduler.rs

//! Bounded-concurrency scheduler.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::sched::latch::CompletionLatch;
use crate::sched::stats::SchedulerStats;
use crate::types::{CompletionSource, TaskId, TaskOutcome, TaskState};

/// Future produced by a work item.
pub type WorkFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

type WorkFactory = Box<dyn FnOnce(TaskId) -> WorkFuture + Send + 'static>;

/// Receives work-item failures.
///
/// Called on the completing worker, after the failure has been counted.
/// A panic inside `on_failure` is caught and logged; it never reaches the
/// scheduler.
pub trait FailureObserver: Send + Sync {
    fn on_failure(&self, id: TaskId, error: &anyhow::Error);
}

impl<F> FailureObserver for F
where
    F: Fn(TaskId, &anyhow::Error) + Send + Sync,
{
    fn on_failure(&self, id: TaskId, error: &anyhow::Error) {
        self(id, error)
    }
}

struct PendingWork {
    id: TaskId,
    factory: WorkFactory,
}

/// Runs asynchronous work items on the tokio runtime with at most
/// `max_concurrency` of them in flight.
///
/// Submissions beyond the limit wait in a FIFO queue and are admitted one by
/// one as running items complete. Cloning yields another handle to the same
/// scheduler.
///
/// `submit` is single-writer: only the driver should submit. Completion
/// bookkeeping may run on any worker thread.
#[derive(Clone)]
pub struct BoundedScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    max_concurrency: usize,
    cancel: CancellationToken,
    runtime: Handle,

    total: AtomicU64,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    finished: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,

    pending: Mutex<VecDeque<PendingWork>>,
    states: DashMap<TaskId, TaskState>,
    latch: CompletionLatch,
    observer: RwLock<Option<Arc<dyn FailureObserver>>>,
}

impl fmt::Debug for BoundedScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedScheduler")
            .field("max_concurrency", &self.inner.max_concurrency)
            .field("stats", &self.stats())
            .field("cancelled", &self.inner.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl BoundedScheduler {
    /// Create a scheduler that spawns onto the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, like `tokio::spawn`.
    pub fn new(max_concurrency: NonZeroUsize, cancel: CancellationToken) -> Self {
        Self::with_runtime(max_concurrency, cancel, Handle::current())
    }

    /// Create a scheduler that spawns onto the given runtime.
    pub fn with_runtime(
        max_concurrency: NonZeroUsize,
        cancel: CancellationToken,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_concurrency: max_concurrency.get(),
                cancel,
                runtime,
                total: AtomicU64::new(0),
                active: AtomicUsize::new(0),
                peak_active: AtomicUsize::new(0),
                finished: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
                pending: Mutex::new(VecDeque::new()),
                states: DashMap::new(),
                latch: CompletionLatch::new(),
                observer: RwLock::new(None),
            }),
        }
    }

    /// Register the failure observer, replacing any previous one.
    pub fn set_failure_observer(&self, observer: impl FailureObserver + 'static) {
        *self.inner.observer.write() = Some(Arc::new(observer));
    }

    pub fn max_concurrency(&self) -> usize {
        self.inner.max_concurrency
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Cancel the shared token and discard everything still queued.
    ///
    /// Running work is not aborted; it is expected to observe the token.
    pub fn cancel(&self) {
        info!("scheduler: cancellation requested");
        self.inner.cancel.cancel();
        self.inner.discard_pending();
    }

    /// Submit a work item and return its id.
    ///
    /// The item starts at once if a slot is free, otherwise it is queued.
    /// If cancellation has already been requested the id is still minted but
    /// the item is dropped unrun and recorded as [`TaskOutcome::Skipped`].
    pub fn submit<F, Fut>(&self, factory: F) -> TaskId
    where
        F: FnOnce(TaskId) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let inner = &self.inner;
        let id = TaskId(inner.total.fetch_add(1, Ordering::AcqRel));

        if inner.cancel.is_cancelled() {
            debug!(task_id = id.get(), "cancellation requested; submission skipped");
            inner.states.insert(id, TaskState::Done(TaskOutcome::Skipped));
            inner.skipped.fetch_add(1, Ordering::AcqRel);
            return id;
        }

        inner.latch.add();
        inner.states.insert(id, TaskState::Queued);

        let factory: WorkFactory = Box::new(move |id| Box::pin(factory(id)));
        inner.pending.lock().push_back(PendingWork { id, factory });
        trace!(task_id = id.get(), "work item queued for admission");

        inner.admit();
        id
    }

    /// Wait until every submitted item has reached a terminal state, the
    /// timeout elapses, or `cancel` fires.
    ///
    /// The first call arms the completion latch; call it only once all
    /// submissions are done. Returns `true` if completion was reached.
    pub async fn await_all_complete(&self, timeout: Duration, cancel: &CancellationToken) -> bool {
        let inner = &self.inner;
        if inner.latch.arm() {
            debug!(outstanding = inner.latch.count(), "scheduler: completion latch armed");
        }
        if inner.cancel.is_cancelled() {
            inner.discard_pending();
        }

        tokio::select! {
            biased;
            _ = inner.latch.wait() => true,
            _ = cancel.cancelled() => inner.latch.is_zero(),
            _ = tokio::time::sleep(timeout) => inner.latch.is_zero(),
        }
    }

    pub fn state_of(&self, id: TaskId) -> Option<TaskState> {
        self.inner.states.get(&id).map(|s| *s)
    }

    /// Ids currently running, in ascending order.
    pub fn running(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .inner
            .states
            .iter()
            .filter(|e| *e.value() == TaskState::Running)
            .map(|e| *e.key())
            .collect();
        ids.sort();
        ids
    }

    /// Ids waiting for admission, in queue order.
    pub fn pending(&self) -> Vec<TaskId> {
        self.inner.pending.lock().iter().map(|w| w.id).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn stats(&self) -> SchedulerStats {
        let inner = &self.inner;
        SchedulerStats {
            total: inner.total.load(Ordering::Acquire),
            active: inner.active.load(Ordering::Acquire),
            peak_active: inner.peak_active.load(Ordering::Acquire),
            finished: inner.finished.load(Ordering::Acquire),
            failed: inner.failed.load(Ordering::Acquire),
            skipped: inner.skipped.load(Ordering::Acquire),
            pending: self.pending_len(),
        }
    }
}

impl CompletionSource for BoundedScheduler {
    fn is_done(&self, id: TaskId) -> bool {
        self.state_of(id).is_some_and(TaskState::is_done)
    }
}

impl Inner {
    /// Move queued work into free slots until either runs out.
    fn admit(self: &Arc<Self>) {
        loop {
            if self.cancel.is_cancelled() {
                self.discard_pending();
                return;
            }
            if !self.try_reserve_slot() {
                return;
            }

            let next = self.pending.lock().pop_front();
            match next {
                Some(work) => self.start(work),
                None => {
                    self.active.fetch_sub(1, Ordering::AcqRel);
                    // A submit may have queued work while we held the slot and
                    // found no room for itself; recheck before giving up.
                    if self.pending.lock().is_empty() {
                        return;
                    }
                }
            }
        }
    }

    fn try_reserve_slot(&self) -> bool {
        let max = self.max_concurrency;
        match self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |a| (a < max).then_some(a + 1))
        {
            Ok(prev) => {
                self.peak_active.fetch_max(prev + 1, Ordering::AcqRel);
                true
            }
            Err(_) => false,
        }
    }

    fn start(self: &Arc<Self>, work: PendingWork) {
        let PendingWork { id, factory } = work;
        self.states.insert(id, TaskState::Running);
        debug!(
            task_id = id.get(),
            active = self.active.load(Ordering::Acquire),
            "starting work item"
        );

        let handle = self.runtime.spawn(async move { factory(id).await });
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) if err.is_panic() => Err(anyhow!(
                    "work item {id} panicked: {}",
                    panic_message(err.into_panic())
                )),
                Err(err) => Err(anyhow!("work item {id} was aborted: {err}")),
            };
            inner.complete(id, result);
        });
    }

    fn complete(self: &Arc<Self>, id: TaskId, result: anyhow::Result<()>) {
        self.active.fetch_sub(1, Ordering::AcqRel);

        let outcome = match result {
            Ok(()) => {
                self.finished.fetch_add(1, Ordering::AcqRel);
                debug!(task_id = id.get(), "work item finished");
                TaskOutcome::Succeeded
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::AcqRel);
                warn!(task_id = id.get(), error = %err, "work item failed");
                self.notify_failure(id, &err);
                TaskOutcome::Failed
            }
        };

        self.states.insert(id, TaskState::Done(outcome));
        self.latch.release();
        self.admit();
    }

    fn notify_failure(&self, id: TaskId, error: &anyhow::Error) {
        let observer = self.observer.read().clone();
        let Some(observer) = observer else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| observer.on_failure(id, error))).is_err() {
            warn!(task_id = id.get(), "failure observer panicked; ignoring");
        }
    }

    /// Drop all queued work unrun, recording it as skipped.
    fn discard_pending(&self) {
        let drained: Vec<PendingWork> = self.pending.lock().drain(..).collect();
        if drained.is_empty() {
            return;
        }
        debug!(count = drained.len(), "discarding queued work after cancellation");
        for work in drained {
            self.states
                .insert(work.id, TaskState::Done(TaskOutcome::Skipped));
            self.skipped.fetch_add(1, Ordering::AcqRel);
            self.latch.release();
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
