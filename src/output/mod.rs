// src/output/mod.rs

//! Ordered output replay.
//!
//! - [`stream`] holds the multiplexer and its `pump`.
//! - [`unit`] is the per-task payload buffer.
//! - [`sink`] defines the consumer trait and its error type.
//! - [`writer`] gives work items a handle bound to their task id.
//! - [`confirm`] and [`progress`] are the side-channel record types.

pub mod confirm;
pub mod progress;
pub mod sink;
pub mod stream;
pub mod unit;
pub mod writer;

pub use confirm::ConfirmationHandle;
pub use progress::ProgressRecord;
pub use sink::{OutputSink, SinkError};
pub use stream::{DrainHalt, OutputError, OutputStream, PumpReport};
pub use unit::{OutputKind, OutputPayload, OutputUnit};
pub use writer::TaskWriter;
