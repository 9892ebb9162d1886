// src/engine/runner.rs

use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::errors::Result;
use crate::output::{DrainHalt, OutputSink, OutputStream, ProgressRecord, PumpReport, TaskWriter};
use crate::sched::BoundedScheduler;
use crate::types::TaskId;

use super::{RunOptions, RunSummary};

/// Activity id used for the end-of-run summary progress record.
pub const SUMMARY_ACTIVITY_ID: u64 = u64::MAX;

/// Drives a [`BoundedScheduler`] and an [`OutputStream`] together.
///
/// Work is submitted with [`Runner::submit`]; [`Runner::run`] then pumps the
/// stream into a sink until every submission has completed, and flushes
/// whatever is left.
pub struct Runner<T> {
    scheduler: BoundedScheduler,
    stream: Arc<OutputStream<T>>,
    options: RunOptions,
}

impl<T> fmt::Debug for Runner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("scheduler", &self.scheduler)
            .field("stream", &self.stream)
            .field("options", &self.options)
            .finish()
    }
}

impl<T: Send + Sync + 'static> Runner<T> {
    /// Build a runner on the current tokio runtime.
    pub fn new(max_concurrency: NonZeroUsize, cancel: CancellationToken, options: RunOptions) -> Self {
        Self::from_parts(
            BoundedScheduler::new(max_concurrency, cancel),
            Arc::new(OutputStream::new()),
            options,
        )
    }

    pub fn from_parts(
        scheduler: BoundedScheduler,
        stream: Arc<OutputStream<T>>,
        options: RunOptions,
    ) -> Self {
        Self {
            scheduler,
            stream,
            options,
        }
    }

    pub fn scheduler(&self) -> &BoundedScheduler {
        &self.scheduler
    }

    pub fn stream(&self) -> &Arc<OutputStream<T>> {
        &self.stream
    }

    /// Submit a work item that writes through a [`TaskWriter`] bound to its
    /// own id.
    pub fn submit<F, Fut>(&self, work: F) -> TaskId
    where
        F: FnOnce(TaskWriter<T>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let stream = Arc::clone(&self.stream);
        self.scheduler.submit(move |id| work(stream.writer(id)))
    }

    /// Cancel the shared token: queued work is dropped, running work is
    /// expected to wind down.
    pub fn cancel(&self) {
        self.scheduler.cancel();
    }

    /// A single pump against this runner's scheduler.
    pub fn pump<S>(&self, sink: &mut S) -> Result<PumpReport>
    where
        S: OutputSink<T> + ?Sized,
    {
        Ok(self.stream.pump(&self.scheduler, sink)?)
    }

    /// Pump until all submitted work has completed, then flush.
    ///
    /// Call after the last `submit`: the first completion wait arms the
    /// scheduler's completion latch.
    pub async fn run<S>(&self, sink: &mut S) -> Result<RunSummary>
    where
        S: OutputSink<T> + ?Sized,
    {
        info!(
            max_concurrency = self.scheduler.max_concurrency(),
            submitted = self.scheduler.stats().total,
            "runner started"
        );

        // Completion waits only end on completion or the poll timeout.
        let keep_waiting = CancellationToken::new();
        let mut stopped_early = false;

        loop {
            let report = self.pump(sink)?;
            trace!(?report, "pump finished");

            if report.halted == Some(DrainHalt::Stopped) {
                info!("sink stopped the pipeline; cancelling remaining work");
                self.scheduler.cancel();
                stopped_early = true;
                break;
            }

            if self
                .scheduler
                .await_all_complete(self.options.poll_interval, &keep_waiting)
                .await
            {
                debug!("all submitted work completed");
                break;
            }
        }

        let stats = self.scheduler.stats();
        if !stopped_early {
            if self.options.emit_summary {
                self.stream.write_progress(
                    ProgressRecord::new(SUMMARY_ACTIVITY_ID, "summary", stats.to_string()).completed(),
                );
            }
            stopped_early = self.flush(sink)?;
        }

        let summary = RunSummary {
            total: stats.total,
            finished: stats.finished,
            failed: stats.failed,
            skipped: stats.skipped,
            cancelled: self.scheduler.cancel_token().is_cancelled(),
            stopped_early,
        };
        info!(%summary, "runner finished");
        Ok(summary)
    }

    /// Pump until nothing more can be delivered. Returns `true` if the sink
    /// stopped the pipeline.
    fn flush<S>(&self, sink: &mut S) -> Result<bool>
    where
        S: OutputSink<T> + ?Sized,
    {
        loop {
            let report = self.pump(sink)?;
            match report.halted {
                None => return Ok(false),
                Some(DrainHalt::Stopped) => return Ok(true),
                // Each failed pump drops the payload that failed, so this
                // terminates.
                Some(DrainHalt::SinkFailed) => continue,
            }
        }
    }
}
