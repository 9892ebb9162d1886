//! A one-shot barrier for holding work items until the test releases them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    open: AtomicBool,
    notify: Notify,
}

/// Cloneable gate. Work items `wait()` on it; the test `open()`s it.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    inner: Arc<Inner>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `n` independent gates, one per work item.
    pub fn many(n: usize) -> Vec<Gate> {
        (0..n).map(|_| Gate::new()).collect()
    }

    pub fn open(&self) {
        self.inner.open.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    pub async fn wait(&self) {
        loop {
            // Register before checking so an `open` in between is not missed.
            let notified = self.inner.notify.notified();
            if self.is_open() {
                break;
            }
            notified.await;
        }
    }
}

/// Poll `cond` until it holds, yielding to the runtime in between.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    while !cond() {
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
}
