// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync client configuration.
//!
//! Configuration is read from `~/.config/cairn/config.toml` (or an explicit
//! path) and then overridden by environment variables:
//! - `CAIRN_ENDPOINT`: base URL of the memory store
//! - `CAIRN_API_KEY`: bearer token for HTTP and the realtime channel
//! - `CAIRN_LOG`: log filter for the CLI
//!
//! Every section and field is optional; a missing file yields defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::{
    ChannelConfig, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_DELAY,
};
use crate::queue::{QueueConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_QUEUE_SIZE};
use crate::retry::RetryPolicy;

const APP_DIR_NAME: &str = "cairn";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error.
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid endpoint '{0}'\n  hint: set [api] endpoint or CAIRN_ENDPOINT to an http:// or https:// URL")]
    InvalidEndpoint(String),

    #[error("invalid config value {key} = 0\n  hint: {key} must be at least 1")]
    Zero { key: &'static str },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub api: ApiSection,
    pub retry: RetrySection,
    pub queue: QueueSection,
    pub realtime: RealtimeSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    /// Base URL of the memory store, e.g. `https://memory.example.com`.
    pub endpoint: String,
    pub api_key: String,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        ApiSection {
            endpoint: "http://localhost:8080".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub backoff: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        RetrySection {
            max_attempts: policy.max_attempts,
            delay_ms: policy.delay.as_millis() as u64,
            backoff: policy.backoff,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    pub max_size: usize,
    pub max_attempts: u32,
    /// Directory for the persisted queue. Defaults to the user state dir.
    pub storage_dir: Option<PathBuf>,
}

impl Default for QueueSection {
    fn default() -> Self {
        QueueSection {
            max_size: DEFAULT_MAX_QUEUE_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            storage_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSection {
    /// Liveness probe interval in milliseconds. 0 = disabled.
    pub heartbeat_interval_ms: u64,
    /// Extra silence tolerated before the connection is declared dead.
    /// 0 = never.
    pub heartbeat_timeout_ms: u64,
    pub reconnect_base_delay_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for RealtimeSection {
    fn default() -> Self {
        RealtimeSection {
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 0,
            reconnect_base_delay_ms: DEFAULT_RECONNECT_BASE_DELAY.as_millis() as u64,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        LogSection {
            level: "warn".to_string(),
        }
    }
}

impl SyncConfig {
    /// Default config file location (`~/.config/cairn/config.toml`).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Default directory for persisted state (`~/.local/state/cairn`).
    pub fn default_state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    }

    /// Loads `path` if it exists, then applies environment overrides.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Loads `path` if it exists, without environment overrides.
    pub fn read_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(SyncConfig::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `CAIRN_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("CAIRN_ENDPOINT") {
            self.api.endpoint = val;
        }
        if let Some(val) = lookup("CAIRN_API_KEY") {
            self.api.api_key = val;
        }
        if let Some(val) = lookup("CAIRN_LOG") {
            self.log.level = val;
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            delay: Duration::from_millis(self.retry.delay_ms),
            backoff: self.retry.backoff,
        }
    }

    pub fn queue_config(&self) -> ConfigResult<QueueConfig> {
        if self.queue.max_size == 0 {
            return Err(ConfigError::Zero {
                key: "queue.max_size",
            });
        }
        if self.queue.max_attempts == 0 {
            return Err(ConfigError::Zero {
                key: "queue.max_attempts",
            });
        }
        Ok(QueueConfig {
            max_size: self.queue.max_size,
            max_attempts: self.queue.max_attempts,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.queue
            .storage_dir
            .clone()
            .unwrap_or_else(Self::default_state_dir)
    }

    /// Realtime URL: the endpoint with a ws/wss scheme, `/v1/ws` appended
    /// and the API key as `token` query parameter.
    pub fn realtime_url(&self) -> ConfigResult<String> {
        let invalid = || ConfigError::InvalidEndpoint(self.api.endpoint.clone());
        let base = self.api.endpoint.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/v1/ws")).map_err(|_| invalid())?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            _ => return Err(invalid()),
        };
        url.set_scheme(scheme).map_err(|()| invalid())?;
        url.query_pairs_mut().append_pair("token", &self.api.api_key);
        Ok(url.to_string())
    }

    pub fn channel_config(&self) -> ConfigResult<ChannelConfig> {
        let realtime = &self.realtime;
        Ok(ChannelConfig {
            heartbeat_interval: Duration::from_millis(realtime.heartbeat_interval_ms),
            heartbeat_timeout: (realtime.heartbeat_timeout_ms > 0)
                .then(|| Duration::from_millis(realtime.heartbeat_timeout_ms)),
            reconnect_base_delay: Duration::from_millis(realtime.reconnect_base_delay_ms),
            max_reconnect_attempts: realtime.max_reconnect_attempts,
            ..ChannelConfig::new(self.realtime_url()?)
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
