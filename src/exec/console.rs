// src/exec/console.rs

//! Terminal sink: objects to stdout, everything else to stderr.

use std::io::{self, BufRead, Stderr, Stdin, Stdout, Write};

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

use crate::output::{OutputSink, ProgressRecord, SinkError};

/// How confirmation requests are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmMode {
    /// Ask on the input stream.
    Prompt,
    AlwaysYes,
    AlwaysNo,
}

/// Writes replayed output to a pair of streams.
///
/// Objects go to `out`, one per line, so the output of a run can be piped.
/// Errors, verbose messages, progress and prompts go to `err`. A broken pipe
/// on `out` stops the pipeline.
pub struct ConsoleSink<W, E, R> {
    out: W,
    err: E,
    input: R,
    verbose: bool,
    confirm: ConfirmMode,
}

impl ConsoleSink<Stdout, Stderr, io::StdinLock<'static>> {
    /// Sink on the process's standard streams.
    ///
    /// Prompts block on stdin. On a multi-thread tokio runtime the read runs
    /// under `block_in_place`; on a `current_thread` runtime nothing else
    /// makes progress until the user answers.
    pub fn stdio(verbose: bool, confirm: ConfirmMode) -> Self {
        let stdin: Stdin = io::stdin();
        Self::new(io::stdout(), io::stderr(), stdin.lock(), verbose, confirm)
    }
}

impl<W: Write, E: Write, R: BufRead> ConsoleSink<W, E, R> {
    pub fn new(out: W, err: E, input: R, verbose: bool, confirm: ConfirmMode) -> Self {
        Self {
            out,
            err,
            input,
            verbose,
            confirm,
        }
    }

    pub fn into_parts(self) -> (W, E) {
        (self.out, self.err)
    }

    fn prompt(&mut self, caption: &str, message: &str) -> io::Result<bool> {
        write!(self.err, "{caption} {message} [y/N] ")?;
        self.err.flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

/// Run a blocking read without starving other tasks on a multi-thread
/// runtime.
fn blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

fn map_io(err: io::Error) -> SinkError {
    if err.kind() == io::ErrorKind::BrokenPipe {
        SinkError::PipelineStopped
    } else {
        SinkError::Failed(err.into())
    }
}

impl<W: Write, E: Write, R: BufRead> OutputSink<String> for ConsoleSink<W, E, R> {
    fn write_object(&mut self, value: String) -> Result<(), SinkError> {
        writeln!(self.out, "{value}").map_err(map_io)
    }

    fn write_error(&mut self, error: anyhow::Error) -> Result<(), SinkError> {
        writeln!(self.err, "error: {error:#}").map_err(map_io)
    }

    fn write_verbose(&mut self, message: String) -> Result<(), SinkError> {
        if !self.verbose {
            return Ok(());
        }
        writeln!(self.err, "verbose: {message}").map_err(map_io)
    }

    fn write_debug(&mut self, message: String) -> Result<(), SinkError> {
        debug!(target: "orderly::task", "{message}");
        Ok(())
    }

    fn write_progress(&mut self, record: ProgressRecord) -> Result<(), SinkError> {
        writeln!(self.err, "{record}").map_err(map_io)
    }

    fn confirm(&mut self, caption: &str, message: &str) -> bool {
        match self.confirm {
            ConfirmMode::AlwaysYes => true,
            ConfirmMode::AlwaysNo => false,
            ConfirmMode::Prompt => blocking(|| self.prompt(caption, message)).unwrap_or_else(|e| {
                debug!(error = %e, "reading confirmation failed; declining");
                false
            }),
        }
    }
}
