// src/output/sink.rs

//! The consumer side of the output stream.

use thiserror::Error;

use crate::output::progress::ProgressRecord;
use crate::output::unit::OutputPayload;

/// Failure reported by a sink while forwarding one item.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The consumer is shutting down; stop draining and keep what is left.
    #[error("output pipeline stopped")]
    PipelineStopped,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Where pumped output ends up.
///
/// Only the pumping thread calls into the sink, so implementations need no
/// internal synchronisation.
pub trait OutputSink<T> {
    fn write_object(&mut self, value: T) -> Result<(), SinkError>;

    fn write_error(&mut self, error: anyhow::Error) -> Result<(), SinkError>;

    fn write_verbose(&mut self, message: String) -> Result<(), SinkError>;

    fn write_debug(&mut self, message: String) -> Result<(), SinkError>;

    fn write_progress(&mut self, record: ProgressRecord) -> Result<(), SinkError>;

    /// Answer a confirmation request. `false` declines.
    fn confirm(&mut self, caption: &str, message: &str) -> bool;
}

/// Route a data payload to the sink method matching its kind.
pub(crate) fn deliver<T, S>(sink: &mut S, payload: OutputPayload<T>) -> Result<(), SinkError>
where
    S: OutputSink<T> + ?Sized,
{
    match payload {
        OutputPayload::Object(v) => sink.write_object(v),
        OutputPayload::Error(e) => sink.write_error(e),
        OutputPayload::Verbose(m) => sink.write_verbose(m),
    }
}
