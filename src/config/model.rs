// src/config/model.rs

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// max_concurrency = 4
/// poll_interval_ms = 100
/// confirm = false
/// progress_on_stdout = "^(?P<pct>\\d+)%"
///
/// [[job]]
/// cmd = "echo A"
///
/// [[job]]
/// cmd = "./slow.sh"
/// confirm = true
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Global behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Jobs from `[[job]]`, in submission order.
    #[serde(default)]
    pub job: Vec<JobConfig>,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub job: Vec<JobConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, job: Vec<JobConfig>) -> Self {
        Self { config, job }
    }

    pub fn max_concurrency(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.config.max_concurrency).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// How many jobs may run at the same time (>= 1).
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// How long the driver waits for completion between pumps (>= 1).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Ask before running each job.
    #[serde(default)]
    pub confirm: bool,

    /// Answer every confirmation with "yes" instead of prompting.
    #[serde(default)]
    pub auto_confirm: bool,

    /// Print verbose messages (job stderr, skipped notes).
    #[serde(default)]
    pub verbose: bool,

    /// Regex for stdout lines that should become progress records instead
    /// of output. A named group `pct` is read as the percentage.
    #[serde(default)]
    pub progress_on_stdout: Option<String>,

    /// Print a summary line after the run.
    #[serde(default = "default_true")]
    pub summary: bool,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            confirm: false,
            auto_confirm: false,
            verbose: false,
            progress_on_stdout: None,
            summary: true,
        }
    }
}

/// `[[job]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Shell command to run.
    pub cmd: String,

    /// Per-job override of `[config].progress_on_stdout`.
    #[serde(default)]
    pub progress_on_stdout: Option<String>,

    /// Per-job override of `[config].confirm`.
    #[serde(default)]
    pub confirm: Option<bool>,
}

impl JobConfig {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            progress_on_stdout: None,
            confirm: None,
        }
    }

    pub fn effective_progress_pattern<'a>(&'a self, section: &'a ConfigSection) -> Option<&'a str> {
        self.progress_on_stdout
            .as_deref()
            .or(section.progress_on_stdout.as_deref())
    }

    pub fn effective_confirm(&self, section: &ConfigSection) -> bool {
        self.confirm.unwrap_or(section.confirm)
    }
}
