// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] runs shell commands as scheduler work items, turning their
//!   stdout and stderr into ordered output.
//! - [`console`] is the terminal [`OutputSink`](crate::output::OutputSink)
//!   used by the binary.

pub mod command;
pub mod console;

pub use command::{CommandJob, progress_from_line, run_command};
pub use console::{ConfirmMode, ConsoleSink};
