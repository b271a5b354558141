//! Error types for the directory host

use std::{borrow::Cow, io, path::PathBuf, time::Duration};
use thiserror::Error;

/// Failures of a single status query. Every variant is recoverable: the
/// resolver turns them into an unavailable result.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid address `{0}`, expected host:port")]
    MalformedAddress(String),

    #[error("query timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("{0}")]
    Transport(#[from] io::Error),

    #[error("unexpected response: {0}")]
    Protocol(Cow<'static, str>),
}

impl QueryError {
    pub(crate) fn protocol<T: Into<Cow<'static, str>>>(msg: T) -> Self {
        Self::Protocol(msg.into())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DirectoryError {
    #[error("mode `{0}` is not in the directory")]
    UnknownMode(String),

    #[error("the directory has no usable servers")]
    EmptyDirectory,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config {0}: {1}")]
    Io(PathBuf, io::Error),

    #[error("Failed to parse config {0}: {1}")]
    Parse(PathBuf, serde_json::Error),

    #[error("Failed to serialize default config: {0}")]
    Serialize(serde_json::Error),

    #[error("adv_time must be a positive number of seconds, got {0}")]
    InvalidInterval(f32),

    #[error("mode `{0}` is defined more than once")]
    DuplicateMode(String),

    #[error("server `{server}` is defined more than once in mode `{mode}`")]
    DuplicateServer { mode: String, server: String },
}
