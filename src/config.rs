//! Server configuration, loadable from TOML or JSON files.
//!
//! Every field has a default, so a file only needs the keys it changes:
//!
//! ```toml
//! [server]
//! port = 8080
//! thread_count = 8
//!
//! [server.timeouts]
//! read_ms = 5000
//! ```

use crate::error::ConfigError;
use crate::json;
use crate::middleware::RateLimitConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub middleware: MiddlewareConfig,
    pub paths: PathsConfig,
    pub app: AppInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Worker threads; `0` picks one per core.
    pub thread_count: usize,
    pub max_body_size: usize,
    #[serde(alias = "timeout")]
    pub timeout_seconds: u64,
    /// Handle connections on the accept thread instead of the pool.
    pub single_threaded: bool,
    pub rate_limit: RateLimitConfig,
    pub timeouts: Timeouts,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            thread_count: 0,
            max_body_size: 10 * 1024 * 1024,
            timeout_seconds: 60,
            single_threaded: false,
            rate_limit: RateLimitConfig::default(),
            timeouts: Timeouts::default(),
        }
    }
}

/// Socket timeouts in milliseconds; `0` disables one.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub read_ms: u64,
    pub write_ms: u64,
}

impl Timeouts {
    pub fn read(&self) -> Option<Duration> {
        (self.read_ms > 0).then(|| Duration::from_millis(self.read_ms))
    }

    pub fn write(&self) -> Option<Duration> {
        (self.write_ms > 0).then(|| Duration::from_millis(self.write_ms))
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read_ms: 30_000,
            write_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    pub cors: bool,
    pub logging: bool,
    pub log_level: String,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            cors: false,
            logging: true,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    #[serde(rename = "static")]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppInfo {
    pub title: String,
    pub description: String,
    pub version: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            title: "Crest API".to_string(),
            description: String::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Config {
    /// Loads and validates a config file. `.toml` and `.json` are read by
    /// extension; anything else is treated as JSON when it starts with `{`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let config = match extension.as_deref() {
            Some("toml") => Self::from_toml_str(&content)?,
            Some("json") => Self::from_json_str(&content)?,
            _ if content.trim_start().starts_with('{') => Self::from_json_str(&content)?,
            _ => Self::from_toml_str(&content)?,
        };
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses with the built-in JSON engine, then maps keys through serde.
    pub fn from_json_str(content: &str) -> Result<Config, ConfigError> {
        let document = json::parse(content)?;
        let value = serde_json::to_value(&document).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let config: Config = serde_json::from_value(value).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host must not be empty".into()));
        }
        if self.server.max_body_size == 0 {
            return Err(ConfigError::Invalid("server.max_body_size must be greater than zero".into()));
        }
        Ok(())
    }
}
