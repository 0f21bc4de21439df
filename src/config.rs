//! Service configuration
//!
//! This module contains the configuration structures for the harvester,
//! loaded from YAML and overridable from the environment.

use crate::error::{Error, Result};
use crate::harvest::{HarvestConfig, DEFAULT_BATCH_SIZE};
use crate::http::{HttpClientConfig, Resource};
use crate::store::IN_MEMORY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP surface settings
    #[serde(default)]
    pub app: ServerConfig,

    /// Remote provider settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Document store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Harvest schedule settings
    #[serde(default)]
    pub harvest: ScheduleConfig,
}

impl AppConfig {
    /// Load from an optional YAML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Parse a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config '{}': {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("APP_NAME") {
            self.app.name = v;
        }
        if let Some(v) = lookup("APP_HOST") {
            self.app.host = v;
        }
        if let Some(v) = lookup("APP_PORT") {
            self.app.port = parse_var("APP_PORT", &v)?;
        }
        if let Some(v) = lookup("CORS_ORIGIN") {
            self.app.cors_origin = Some(v);
        }
        if let Some(v) = lookup("REMOTE_API_BASE_URL") {
            self.remote.base_url = Some(v);
        }
        if let Some(v) = lookup("REMOTE_API_REQUEST_TIMEOUT_MS") {
            self.remote.request_timeout_ms = parse_var("REMOTE_API_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("REMOTE_API_RETRY_ATTEMPTS") {
            self.remote.retry_attempts = parse_var("REMOTE_API_RETRY_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("STORE_PATH") {
            self.store.path = v;
        }
        if let Some(v) = lookup("HARVEST_INTERVAL_SECS") {
            self.harvest.interval_secs = parse_var("HARVEST_INTERVAL_SECS", &v)?;
        }
        Ok(())
    }

    /// Build the remote client configuration.
    ///
    /// Fails if no base URL is configured.
    pub fn to_http_config(&self) -> Result<HttpClientConfig> {
        let base_url = self
            .remote
            .base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| Error::missing_field("remote.base_url"))?;
        url::Url::parse(base_url)?;

        let timeout = Duration::from_millis(self.remote.request_timeout_ms);
        let builder = HttpClientConfig::builder()
            .base_url(base_url)
            .timeout(timeout)
            .max_retries(self.remote.retry_attempts)
            .backoff(
                Duration::from_millis(self.remote.initial_backoff_ms),
                Duration::from_millis(self.remote.max_backoff_ms),
            )
            .resource_path(Resource::Profiles, &self.remote.profiles_path)
            .resource_path(Resource::Summaries, &self.remote.summaries_path)
            .user_agent(&self.app.name);

        Ok(builder.build())
    }

    /// Harvest pipeline configuration
    pub fn to_harvest_config(&self) -> HarvestConfig {
        HarvestConfig::new().with_batch_size(self.harvest.batch_size)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::invalid_config(name, format!("'{value}': {e}")))
}

// ============================================================================
// Sections
// ============================================================================

/// Inbound HTTP surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Service name, also sent as the user agent
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Comma-separated allowed origins; absent or `*` allows any
    #[serde(default)]
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            host: default_host(),
            port: default_port(),
            cors_origin: None,
        }
    }
}

impl ServerConfig {
    /// Socket address to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_name() -> String {
    format!("stay-harvester/{}", env!("CARGO_PKG_VERSION"))
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Remote provider client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the provider
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Retries after the first attempt
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// First retry delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound on the retry delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_profiles_path")]
    pub profiles_path: String,

    #[serde(default = "default_summaries_path")]
    pub summaries_path: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_ms: default_request_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            profiles_path: default_profiles_path(),
            summaries_path: default_summaries_path(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_profiles_path() -> String {
    Resource::Profiles.default_path().to_string()
}

fn default_summaries_path() -> String {
    Resource::Summaries.default_path().to_string()
}

/// Document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// DuckDB file, or `:memory:`
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY
    }
}

fn default_store_path() -> String {
    "stays.duckdb".to_string()
}

/// Harvest schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between harvest cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Records per bulk write
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Run a cycle as soon as the service starts
    #[serde(default)]
    pub run_on_startup: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            batch_size: default_batch_size(),
            run_on_startup: false,
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_interval_secs() -> u64 {
    4 * 60 * 60
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
