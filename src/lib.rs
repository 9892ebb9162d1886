// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod output;
pub mod sched;
pub mod types;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, JobConfig, RawConfigFile, default_config_path, load_from_path};
use crate::engine::{RunOptions, RunSummary, Runner};
use crate::exec::{CommandJob, ConfirmMode, ConsoleSink, run_command};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the bounded scheduler and ordered output stream
/// - one shell command per job
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<RunSummary> {
    let mut raw = load_raw_config(&args)?;
    apply_cli_overrides(&mut raw, &args);
    let cfg = ConfigFile::try_from(raw)?;

    if cfg.job.is_empty() {
        bail!("nothing to run: no [[job]] entries in the config and no commands given");
    }

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(RunSummary::default());
    }

    let jobs = build_jobs(&cfg)?;
    let cancel = CancellationToken::new();
    let options = RunOptions {
        poll_interval: cfg.poll_interval(),
        emit_summary: cfg.config.summary,
    };
    let runner: Runner<String> = Runner::new(cfg.max_concurrency(), cancel.clone(), options);

    // Ctrl-C → cancel queued and running jobs.
    {
        let scheduler = runner.scheduler().clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received; cancelling");
            scheduler.cancel();
        });
    }

    for job in jobs {
        let cancel = cancel.clone();
        let id = runner.submit(move |writer| run_command(job, writer, cancel));
        debug!(task_id = id.get(), "job submitted");
    }

    let confirm = if cfg.config.auto_confirm {
        ConfirmMode::AlwaysYes
    } else {
        ConfirmMode::Prompt
    };
    let mut sink = ConsoleSink::stdio(cfg.config.verbose, confirm);

    let summary = runner.run(&mut sink).await?;
    Ok(summary)
}

/// An explicit `--config` must exist; the default path is optional.
fn load_raw_config(args: &CliArgs) -> Result<RawConfigFile> {
    if let Some(ref path) = args.config {
        return load_from_path(path)
            .with_context(|| format!("loading config from {}", path.display()));
    }

    let path = default_config_path();
    if path.exists() {
        debug!(path = %path.display(), "using default config file");
        return load_from_path(&path)
            .with_context(|| format!("loading config from {}", path.display()));
    }

    debug!("no config file; using defaults");
    Ok(RawConfigFile::default())
}

fn apply_cli_overrides(raw: &mut RawConfigFile, args: &CliArgs) {
    if let Some(n) = args.max_concurrency {
        raw.config.max_concurrency = n;
    }
    if let Some(ms) = args.poll_interval_ms {
        raw.config.poll_interval_ms = ms;
    }
    if args.confirm {
        raw.config.confirm = true;
    }
    if args.yes {
        raw.config.auto_confirm = true;
    }
    if args.verbose {
        raw.config.verbose = true;
    }
    raw.job
        .extend(args.commands.iter().map(|cmd| JobConfig::new(cmd.as_str())));
}

/// Resolve per-job settings against `[config]` and compile progress patterns.
fn build_jobs(cfg: &ConfigFile) -> Result<Vec<CommandJob>> {
    cfg.job
        .iter()
        .map(|job| {
            let progress_on_stdout = job
                .effective_progress_pattern(&cfg.config)
                .map(Regex::new)
                .transpose()
                .with_context(|| format!("compiling progress pattern for `{}`", job.cmd))?;
            Ok(CommandJob {
                cmd: job.cmd.clone(),
                progress_on_stdout,
                confirm: job.effective_confirm(&cfg.config),
            })
        })
        .collect()
}

/// Simple dry-run output: print settings and jobs in submission order.
fn print_dry_run(cfg: &ConfigFile) {
    println!("orderly dry-run");
    println!("  config.max_concurrency = {}", cfg.config.max_concurrency);
    println!("  config.poll_interval_ms = {}", cfg.config.poll_interval_ms);
    println!();

    println!("jobs ({}):", cfg.job.len());
    for (idx, job) in cfg.job.iter().enumerate() {
        println!("  #{idx}: {}", job.cmd);
        if let Some(pattern) = job.effective_progress_pattern(&cfg.config) {
            println!("      progress_on_stdout: {pattern}");
        }
        if job.effective_confirm(&cfg.config) {
            println!("      confirm: true");
        }
    }

    debug!("dry-run complete (no execution)");
}
