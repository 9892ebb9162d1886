// src/config/validate.rs

use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{OrderlyError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::OrderlyError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.job))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_global_config(cfg)?;
    validate_jobs(cfg)?;
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.max_concurrency == 0 {
        return Err(OrderlyError::ConfigError(
            "[config].max_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.config.poll_interval_ms == 0 {
        return Err(OrderlyError::ConfigError(
            "[config].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if let Some(ref pattern) = cfg.config.progress_on_stdout {
        check_regex("[config].progress_on_stdout", pattern)?;
    }

    Ok(())
}

fn validate_jobs(cfg: &RawConfigFile) -> Result<()> {
    for (idx, job) in cfg.job.iter().enumerate() {
        if job.cmd.trim().is_empty() {
            return Err(OrderlyError::ConfigError(format!(
                "job #{idx} has an empty `cmd`"
            )));
        }
        if let Some(ref pattern) = job.progress_on_stdout {
            check_regex(&format!("job #{idx} progress_on_stdout"), pattern)?;
        }
    }
    Ok(())
}

fn check_regex(what: &str, pattern: &str) -> Result<()> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| OrderlyError::ConfigError(format!("{what} is not a valid regex: {e}")))
}
