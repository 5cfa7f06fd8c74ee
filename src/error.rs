use std::io;
use std::net::SocketAddr;
use thiserror::Error;

use crate::json::JsonError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(#[source] io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },
    #[error("Request headers too large")]
    HeadersTooLarge,
    #[error("Panic: {0}")]
    PanicError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServerError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::PayloadTooLarge { .. } => 413,
            ServerError::HeadersTooLarge => 431,
            ServerError::IoError(_)
            | ServerError::Bind { .. }
            | ServerError::ThreadSpawn(_)
            | ServerError::Config(_)
            | ServerError::InternalError(_)
            | ServerError::PanicError(_) => 500,
        }
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Errors raised while loading or validating a [`Config`](crate::config::Config).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON config: {0}")]
    Json(#[from] JsonError),
    #[error("invalid config: {0}")]
    Invalid(String),
}
