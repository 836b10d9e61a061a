//! Configuration loading and validation.
//!
//! Livechat reads `~/.livechat/config.toml`. Every section is optional; a
//! missing file means defaults. Secrets never live here, they go in
//! `~/.livechat/.env` (see [`crate::credentials`]).

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::engine::Pacing;

/// Name of the runtime directory under the user's home.
const RUNTIME_DIR_NAME: &str = ".livechat";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote API endpoints and HTTP timeouts.
    pub api: ApiConfig,

    /// Polling loop and lifecycle tuning.
    pub polling: PollingConfig,
}

/// Remote API endpoints and HTTP timeouts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the YouTube Data API v3.
    pub base_url: String,

    /// OAuth token endpoint used for refresh-token grants.
    pub token_url: String,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Whole-request timeout in seconds. Timed-out fetches are retried.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_url: default_token_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Polling loop and lifecycle tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Poll interval when the server suggests none, in milliseconds.
    pub default_interval_ms: u64,

    /// Consecutive transient failures retried before the loop gives up.
    pub max_retries: u32,

    /// Linear backoff step in milliseconds; retry `n` waits `n * step`.
    pub retry_step_ms: u64,

    /// Interval waits per iteration.
    pub pacing: Pacing,

    /// Upper bound on how long disconnect waits for the loop, in seconds.
    pub shutdown_timeout_secs: u64,

    /// Events buffered per subscriber before it starts lagging.
    pub event_capacity: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: default_interval_ms(),
            max_retries: default_max_retries(),
            retry_step_ms: default_retry_step_ms(),
            pacing: Pacing::default(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            event_capacity: default_event_capacity(),
        }
    }
}

// Default value functions for serde

fn default_base_url() -> String {
    crate::youtube::DEFAULT_API_BASE.to_owned()
}
fn default_token_url() -> String {
    crate::credentials::DEFAULT_TOKEN_URL.to_owned()
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_interval_ms() -> u64 {
    1000
}
fn default_max_retries() -> u32 {
    5
}
fn default_retry_step_ms() -> u64 {
    1000
}
fn default_shutdown_timeout_secs() -> u64 {
    10
}
fn default_event_capacity() -> usize {
    256
}

impl Config {
    /// Check values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.api.base_url)
            .with_context(|| format!("api.base_url is not a valid URL: {}", self.api.base_url))?;
        url::Url::parse(&self.api.token_url)
            .with_context(|| format!("api.token_url is not a valid URL: {}", self.api.token_url))?;

        if self.api.request_timeout_secs == 0 {
            anyhow::bail!("api.request_timeout_secs must be greater than zero");
        }
        if self.polling.shutdown_timeout_secs == 0 {
            anyhow::bail!("polling.shutdown_timeout_secs must be greater than zero");
        }
        if self.polling.event_capacity == 0 {
            anyhow::bail!("polling.event_capacity must be greater than zero");
        }
        Ok(())
    }
}

/// Load and validate the config from a TOML file.
///
/// A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = match std::fs::read_to_string(path) {
        Ok(contents) => {
            tracing::debug!(path = %path.display(), "loading config from file");
            toml::from_str::<Config>(&contents)
                .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file found, using defaults");
            Config::default()
        }
        Err(e) => {
            return Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            ))
        }
    };
    config.validate()?;
    Ok(config)
}

/// Resolve the default config directory (`~/.livechat/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(RUNTIME_DIR_NAME))
}

/// Files and directories used at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Runtime root (`~/.livechat`).
    pub root: PathBuf,
    /// `config.toml`.
    pub config_toml: PathBuf,
    /// `.env` holding OAuth secrets.
    pub env_file: PathBuf,
    /// Directory for rotated JSON logs.
    pub logs_dir: PathBuf,
}

impl RuntimePaths {
    /// Lay out runtime paths under `root`.
    pub fn under(root: PathBuf) -> Self {
        Self {
            config_toml: root.join("config.toml"),
            env_file: root.join(".env"),
            logs_dir: root.join("logs"),
            root,
        }
    }
}

/// Resolve runtime paths under `~/.livechat`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn runtime_paths() -> anyhow::Result<RuntimePaths> {
    Ok(RuntimePaths::under(config_dir()?))
}
