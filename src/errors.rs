// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::output::OutputError;

#[derive(Error, Debug)]
pub enum OrderlyError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Output error: {0}")]
    OutputError(#[from] OutputError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, OrderlyError>;
