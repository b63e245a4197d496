//! Client configuration.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::BdkError;

/// Configuration loading error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("missing field: {0}")]
    Missing(&'static str),
}

impl From<ConfigError> for BdkError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Retry and backoff settings.
///
/// Immutable once built; shared by every operation that uses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Total attempts including the first one. `None` retries until a
    /// non-retryable failure.
    pub max_attempts: Option<u32>,
    /// Delay before the first retry, in milliseconds.
    pub initial_interval_ms: u64,
    /// Growth factor applied to the delay after each retry.
    pub multiplier: f64,
    /// Upper bound for a single delay, in milliseconds.
    pub max_interval_ms: u64,
    /// Fraction of the delay added at random, in `[0, 1]`.
    pub jitter: f64,
    /// Deadline for a single attempt, in milliseconds.
    pub attempt_timeout_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(10),
            initial_interval_ms: 2_000,
            multiplier: 2.0,
            max_interval_ms: 300_000,
            jitter: 0.25,
            attempt_timeout_ms: None,
        }
    }
}

impl RetryConfig {
    /// Create a retry configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total number of attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Retry until a non-retryable failure occurs.
    #[must_use]
    pub const fn unbounded(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    /// Set the delay before the first retry.
    #[must_use]
    pub fn with_initial_interval(mut self, delay: Duration) -> Self {
        self.initial_interval_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the maximum delay between attempts.
    #[must_use]
    pub fn with_max_interval(mut self, delay: Duration) -> Self {
        self.max_interval_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the jitter fraction (clamped to `[0, 1]`).
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Bound every attempt by `timeout`.
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Delay before the first retry.
    #[must_use]
    pub const fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    /// Upper bound for a single delay.
    #[must_use]
    pub const fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    /// Deadline for a single attempt, if any.
    #[must_use]
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }

    /// Whether `attempts_made` attempts leave room for another one.
    #[must_use]
    pub fn allows_another(&self, attempts_made: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts_made < max)
    }
}

/// Bot service account settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    pub username: String,
    /// PEM-encoded RSA private key used to sign authentication JWTs.
    pub private_key_path: Option<PathBuf>,
    /// PEM bundle (certificate + key) for certificate authentication.
    pub certificate_path: Option<PathBuf>,
}

/// Extension application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub app_id: String,
    pub private_key_path: Option<PathBuf>,
    pub certificate_path: Option<PathBuf>,
}

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BdkConfig {
    /// Pod base URL, also the default for every other service.
    pub pod_url: String,
    #[serde(default)]
    pub agent_url: Option<String>,
    #[serde(default)]
    pub key_manager_url: Option<String>,
    #[serde(default)]
    pub session_auth_url: Option<String>,
    #[serde(default)]
    pub bot: Option<BotConfig>,
    #[serde(default)]
    pub app: Option<AppConfig>,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Transport-level timeout for a single HTTP request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

const fn default_request_timeout_ms() -> u64 {
    30_000
}

impl BdkConfig {
    /// Create a configuration pointing every service at `pod_url`.
    #[must_use]
    pub fn new(pod_url: impl Into<String>) -> Self {
        Self {
            pod_url: pod_url.into(),
            agent_url: None,
            key_manager_url: None,
            session_auth_url: None,
            bot: None,
            app: None,
            retry: RetryConfig::default(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    /// Returns error if the document is not a valid configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn agent_url(&self) -> &str {
        self.agent_url.as_deref().unwrap_or(&self.pod_url)
    }

    #[must_use]
    pub fn key_manager_url(&self) -> &str {
        self.key_manager_url.as_deref().unwrap_or(&self.pod_url)
    }

    #[must_use]
    pub fn session_auth_url(&self) -> &str {
        self.session_auth_url.as_deref().unwrap_or(&self.pod_url)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Bot settings, required by bot authentication.
    ///
    /// # Errors
    /// Returns error if no `bot` section is configured.
    pub fn bot(&self) -> Result<&BotConfig, ConfigError> {
        self.bot.as_ref().ok_or(ConfigError::Missing("bot"))
    }

    /// Application settings, required by OBO and extension app flows.
    ///
    /// # Errors
    /// Returns error if no `app` section is configured.
    pub fn app(&self) -> Result<&AppConfig, ConfigError> {
        self.app.as_ref().ok_or(ConfigError::Missing("app"))
    }
}
