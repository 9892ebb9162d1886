// src/output/stream.rs

//! Ordered output multiplexer.
//!
//! Many tasks write into the stream concurrently; one consumer calls
//! [`OutputStream::pump`] to replay the output into an [`OutputSink`].
//!
//! Data output (objects, errors, verbose messages) is buffered per task and
//! replayed in strict task-id order. The cursor only moves past an id once
//! the [`CompletionSource`] reports that task done, so output of a later task
//! waits behind an earlier one that is still running.
//!
//! Debug messages, progress records and confirmation requests bypass the
//! cursor and are replayed in arrival order on every pump.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::output::confirm::{ConfirmationHandle, ConfirmationRequest};
use crate::output::progress::ProgressRecord;
use crate::output::sink::{OutputSink, SinkError, deliver};
use crate::output::unit::{OutputPayload, OutputUnit};
use crate::output::writer::TaskWriter;
use crate::types::{CompletionSource, TaskId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutputError {
    /// `pump` was called while another pump was still running.
    #[error("output stream is already being pumped")]
    PumpInProgress,
}

/// Why a pump stopped before running out of completed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainHalt {
    /// The sink signalled [`SinkError::PipelineStopped`].
    Stopped,
    /// The sink failed with an unexpected error.
    SinkFailed,
}

/// What a single pump did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpReport {
    pub confirmations: usize,
    pub debug: usize,
    pub progress: usize,
    /// Data payloads delivered.
    pub delivered: usize,
    /// How far the cursor moved.
    pub advanced: u64,
    /// Cursor after the pump.
    pub cursor: TaskId,
    /// Set when draining stopped at a task that is not done yet.
    pub blocked_at: Option<TaskId>,
    pub halted: Option<DrainHalt>,
}

struct PumpState {
    cursor: TaskId,
    debug_rx: mpsc::UnboundedReceiver<String>,
    progress_rx: mpsc::UnboundedReceiver<ProgressRecord>,
    confirm_rx: mpsc::UnboundedReceiver<ConfirmationRequest>,
}

pub struct OutputStream<T> {
    units: DashMap<TaskId, OutputUnit<T>>,
    /// Mirror of the pump cursor, readable without taking the pump lock.
    cursor: AtomicU64,
    debug_tx: mpsc::UnboundedSender<String>,
    progress_tx: mpsc::UnboundedSender<ProgressRecord>,
    confirm_tx: mpsc::UnboundedSender<ConfirmationRequest>,
    pump: Mutex<PumpState>,
}

impl<T> fmt::Debug for OutputStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream")
            .field("cursor", &self.cursor())
            .field("buffered_units", &self.units.len())
            .finish_non_exhaustive()
    }
}

impl<T> Default for OutputStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OutputStream<T> {
    pub fn new() -> Self {
        let (debug_tx, debug_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (confirm_tx, confirm_rx) = mpsc::unbounded_channel();

        Self {
            units: DashMap::new(),
            cursor: AtomicU64::new(0),
            debug_tx,
            progress_tx,
            confirm_tx,
            pump: Mutex::new(PumpState {
                cursor: TaskId::ZERO,
                debug_rx,
                progress_rx,
                confirm_rx,
            }),
        }
    }

    /// A writer bound to `id`, for handing to the task's work item.
    pub fn writer(self: &Arc<Self>, id: TaskId) -> TaskWriter<T> {
        TaskWriter::new(id, Arc::clone(self))
    }

    /// Next task id eligible for data output.
    pub fn cursor(&self) -> TaskId {
        TaskId(self.cursor.load(Ordering::Acquire))
    }

    /// Number of tasks with data output waiting to be pumped.
    pub fn buffered_units(&self) -> usize {
        self.units.len()
    }

    /// Payloads buffered for `id`.
    pub fn buffered_len(&self, id: TaskId) -> usize {
        self.units.get(&id).map(|u| u.len()).unwrap_or(0)
    }

    pub fn write_object(&self, id: TaskId, value: T) {
        self.push(id, OutputPayload::Object(value));
    }

    pub fn write_error(&self, id: TaskId, error: anyhow::Error) {
        self.push(id, OutputPayload::Error(error));
    }

    pub fn write_verbose(&self, id: TaskId, message: impl Into<String>) {
        self.push(id, OutputPayload::Verbose(message.into()));
    }

    pub fn write_debug(&self, message: impl Into<String>) {
        // The receiver lives as long as `self`, so sending cannot fail.
        let _ = self.debug_tx.send(message.into());
    }

    pub fn write_progress(&self, record: ProgressRecord) {
        let _ = self.progress_tx.send(record);
    }

    /// Queue a confirmation for the next pump to answer through
    /// [`OutputSink::confirm`].
    pub fn request_confirmation(
        &self,
        caption: impl Into<String>,
        message: impl Into<String>,
    ) -> ConfirmationHandle {
        let (reply, rx) = oneshot::channel();
        let _ = self.confirm_tx.send(ConfirmationRequest {
            caption: caption.into(),
            message: message.into(),
            reply,
        });
        ConfirmationHandle::new(rx)
    }

    fn push(&self, id: TaskId, payload: OutputPayload<T>) {
        if id < self.cursor() {
            warn!(
                task_id = id.get(),
                kind = ?payload.kind(),
                "output for a task that was already replayed; dropping"
            );
            return;
        }
        self.units.entry(id).or_default().push(payload);

        // The cursor may have passed `id` while we were inserting.
        if id < self.cursor() && self.units.remove(&id).is_some() {
            warn!(task_id = id.get(), "output raced past the cursor; dropping");
        }
    }

    /// Replay everything that is ready into `sink`.
    ///
    /// In order: answer confirmations, forward debug messages, forward
    /// progress records, then drain data output from the cursor until a task
    /// that is not done yet.
    ///
    /// Only one pump may run at a time; a concurrent call gets
    /// [`OutputError::PumpInProgress`].
    pub fn pump<C, S>(&self, source: &C, sink: &mut S) -> Result<PumpReport, OutputError>
    where
        C: CompletionSource + ?Sized,
        S: OutputSink<T> + ?Sized,
    {
        let mut state = self.pump.try_lock().ok_or(OutputError::PumpInProgress)?;
        let mut report = PumpReport::default();

        while let Ok(request) = state.confirm_rx.try_recv() {
            let answer = sink.confirm(&request.caption, &request.message);
            report.confirmations += 1;
            if request.reply.send(answer).is_err() {
                debug!(caption = %request.caption, "confirmation requester went away before the answer");
            }
        }

        while let Ok(message) = state.debug_rx.try_recv() {
            match sink.write_debug(message) {
                Ok(()) => report.debug += 1,
                Err(err) => {
                    if let Some(halt) = side_channel_failure("debug", err) {
                        report.halted = Some(halt);
                        report.cursor = state.cursor;
                        return Ok(report);
                    }
                }
            }
        }

        while let Ok(record) = state.progress_rx.try_recv() {
            match sink.write_progress(record) {
                Ok(()) => report.progress += 1,
                Err(err) => {
                    if let Some(halt) = side_channel_failure("progress", err) {
                        report.halted = Some(halt);
                        report.cursor = state.cursor;
                        return Ok(report);
                    }
                }
            }
        }

        self.drain_ordered(&mut state, source, sink, &mut report);
        self.sweep_below(state.cursor);
        report.cursor = state.cursor;
        Ok(report)
    }

    /// Drop units stranded below the cursor by a write that raced the drain.
    fn sweep_below(&self, cursor: TaskId) {
        self.units.retain(|id, unit| {
            if *id < cursor {
                warn!(
                    task_id = id.get(),
                    dropped = unit.len(),
                    "output for a task that was already replayed; dropping"
                );
                false
            } else {
                true
            }
        });
    }

    fn drain_ordered<C, S>(
        &self,
        state: &mut PumpState,
        source: &C,
        sink: &mut S,
        report: &mut PumpReport,
    ) where
        C: CompletionSource + ?Sized,
        S: OutputSink<T> + ?Sized,
    {
        loop {
            let cursor = state.cursor;
            if !source.is_done(cursor) {
                trace!(cursor = cursor.get(), "cursor task not done; output blocked");
                report.blocked_at = Some(cursor);
                return;
            }

            if let Some((_, mut unit)) = self.units.remove(&cursor) {
                while let Some(payload) = unit.pop_front() {
                    let kind = payload.kind();
                    match deliver(sink, payload) {
                        Ok(()) => report.delivered += 1,
                        Err(err) => {
                            let remaining = unit.len();
                            self.restore(cursor, unit);
                            report.halted = Some(match err {
                                SinkError::PipelineStopped => {
                                    debug!(
                                        cursor = cursor.get(),
                                        remaining,
                                        "sink stopped the pipeline; draining halted"
                                    );
                                    DrainHalt::Stopped
                                }
                                SinkError::Failed(e) => {
                                    warn!(
                                        cursor = cursor.get(),
                                        ?kind,
                                        remaining,
                                        error = %e,
                                        "sink failed while replaying output; payload dropped, draining halted"
                                    );
                                    DrainHalt::SinkFailed
                                }
                            });
                            return;
                        }
                    }
                }
            }

            // Output written between the remove and now belongs to this id
            // too; replay it before moving on.
            if self.units.contains_key(&cursor) {
                continue;
            }

            state.cursor = cursor.next();
            self.cursor.store(state.cursor.get(), Ordering::Release);
            report.advanced += 1;
        }
    }

    fn restore(&self, id: TaskId, remainder: OutputUnit<T>) {
        if remainder.is_empty() {
            return;
        }
        match self.units.entry(id) {
            Entry::Occupied(mut e) => e.get_mut().prepend(remainder),
            Entry::Vacant(e) => {
                e.insert(remainder);
            }
        }
    }
}

/// Decide whether a side-channel sink error halts the pump.
fn side_channel_failure(channel: &'static str, err: SinkError) -> Option<DrainHalt> {
    match err {
        SinkError::PipelineStopped => {
            debug!(channel, "sink stopped the pipeline while forwarding side-channel output");
            Some(DrainHalt::Stopped)
        }
        SinkError::Failed(e) => {
            warn!(channel, error = %e, "sink failed on side-channel message; skipping it");
            None
        }
    }
}
