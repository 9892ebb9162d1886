// src/exec/command.rs

//! Shell commands as work items.

use std::process::Stdio;

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::output::{ProgressRecord, TaskWriter};
use crate::types::TaskId;

/// A command to run under the scheduler.
#[derive(Debug, Clone)]
pub struct CommandJob {
    pub cmd: String,
    /// Stdout lines matching this become progress records instead of output.
    pub progress_on_stdout: Option<Regex>,
    /// Ask for confirmation before running.
    pub confirm: bool,
}

impl CommandJob {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            progress_on_stdout: None,
            confirm: false,
        }
    }
}

/// Run `job` in a shell, writing its output through `writer`.
///
/// - stdout lines become ordered objects (or progress records, see
///   [`CommandJob::progress_on_stdout`]);
/// - stderr lines become verbose messages;
/// - a non-zero exit, a spawn failure or cancellation is written as an
///   ordered error and returned as `Err` so the scheduler counts a failure.
///
/// If `cancel` fires while the command runs, the process is killed.
pub async fn run_command(
    job: CommandJob,
    writer: TaskWriter<String>,
    cancel: CancellationToken,
) -> Result<()> {
    let task_id = writer.id();
    let cmd = job.cmd.clone();
    match run_command_inner(job, &writer, cancel).await {
        Ok(()) => Ok(()),
        Err(err) => {
            error!(task_id = task_id.get(), cmd = %cmd, error = %err, "command failed");
            writer.write_error(anyhow!("{err:#}"));
            Err(err)
        }
    }
}

async fn run_command_inner(
    job: CommandJob,
    writer: &TaskWriter<String>,
    cancel: CancellationToken,
) -> Result<()> {
    let task_id = writer.id();

    if job.confirm {
        let approved = writer
            .request_confirmation("Run command?", job.cmd.clone())
            .confirmed()
            .await;
        if !approved {
            info!(task_id = task_id.get(), cmd = %job.cmd, "command declined; not running");
            writer.write_verbose(format!("skipped: {}", job.cmd));
            return Ok(());
        }
    }

    info!(task_id = task_id.get(), cmd = %job.cmd, "starting command");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&job.cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&job.cmd);
        c
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning `{}`", job.cmd))?;

    let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_stdout(
            stdout,
            writer.clone(),
            job.cmd.clone(),
            job.progress_on_stdout.clone(),
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_stderr(stderr, writer.clone())));
    }

    // Either the process exits on its own, or the run is cancelled.
    let waited = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancel.cancelled() => {
            info!(task_id = task_id.get(), cmd = %job.cmd, "cancellation requested; killing process");
            if let Err(e) = child.kill().await {
                warn!(task_id = task_id.get(), error = %e, "failed to kill process on cancellation");
            }
            None
        }
    };

    let Some(status) = waited else {
        // Grandchildren may still hold the pipes open.
        for reader in readers {
            reader.abort();
        }
        bail!("`{}` cancelled", job.cmd);
    };

    // Output must be buffered before the task is reported done, or the
    // stream would treat it as late.
    for reader in readers {
        if let Err(e) = reader.await {
            warn!(task_id = task_id.get(), error = %e, "output reader task failed");
        }
    }

    let status = status.with_context(|| format!("waiting for `{}`", job.cmd))?;

    let code = status.code().unwrap_or(-1);
    info!(
        task_id = task_id.get(),
        cmd = %job.cmd,
        exit_code = code,
        success = status.success(),
        "command exited"
    );

    if !status.success() {
        bail!("`{}` exited with code {code}", job.cmd);
    }
    Ok(())
}

async fn forward_stdout<R>(
    stdout: R,
    writer: TaskWriter<String>,
    cmd: String,
    progress: Option<Regex>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    while let Some(line) = next_lossy_line(&mut reader, &mut buf, writer.id()).await {
        match progress {
            Some(ref re) if re.is_match(&line) => {
                writer.write_progress(progress_from_line(writer.id().get(), &cmd, &line, re));
            }
            _ => writer.write_object(line),
        }
    }
}

async fn forward_stderr<R>(stderr: R, writer: TaskWriter<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    while let Some(line) = next_lossy_line(&mut reader, &mut buf, writer.id()).await {
        debug!(task_id = writer.id().get(), "stderr: {}", line);
        writer.write_verbose(line);
    }
}

/// Read one line, replacing invalid UTF-8 instead of giving up on the pipe.
/// The trailing `\n` or `\r\n` is stripped. `None` at EOF or on a read error.
async fn next_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>, task_id: TaskId) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    match reader.read_until(b'\n', buf).await {
        Ok(0) => None,
        Ok(_) => {
            if buf.last() == Some(&b'\n') {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }
            Some(String::from_utf8_lossy(buf).into_owned())
        }
        Err(e) => {
            warn!(task_id = task_id.get(), error = %e, "reading command output failed");
            None
        }
    }
}

/// Build a progress record from a matching stdout line. A named capture
/// `pct` supplies the percentage.
pub fn progress_from_line(activity_id: u64, activity: &str, line: &str, re: &Regex) -> ProgressRecord {
    let record = ProgressRecord::new(activity_id, activity, line.trim());
    let pct = re
        .captures(line)
        .and_then(|caps| caps.name("pct"))
        .and_then(|m| m.as_str().parse::<u8>().ok());
    match pct {
        Some(p) => record.with_percent(p),
        None => record,
    }
}
