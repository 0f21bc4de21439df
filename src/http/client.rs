//! HTTP client for the remote provider
//!
//! Provides a streaming HTTP client that handles:
//! - Automatic retries with exponential backoff and jitter
//! - `Retry-After` hints from the server
//! - A fresh trace id header on every attempt
//! - Error classification for retry decisions

use super::retry::{parse_retry_after, RetryPolicy};
use super::types::{ByteStream, RemoteSource, Resource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Header carrying the per-request correlation id
pub const TRACE_ID_HEADER: &str = "X-Request-Trace-ID";

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: Option<String>,
    /// Request timeout, covering the whole transfer
    pub timeout: Duration,
    /// Retry behaviour
    pub retry: RetryPolicy,
    /// Path of each resource relative to the base URL
    pub resource_paths: HashMap<Resource, String>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            resource_paths: Resource::ALL
                .iter()
                .map(|r| (*r, r.default_path().to_string()))
                .collect(),
            default_headers: HashMap::new(),
            user_agent: format!("stay-harvester/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }

    /// Path configured for a resource
    pub fn path_for(&self, resource: Resource) -> &str {
        self.resource_paths
            .get(&resource)
            .map_or_else(|| resource.default_path(), String::as_str)
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    ///
    /// `Retry-After` hints are capped at the same value.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self.config.retry.max_retry_after = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.retry.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.config.retry.initial_backoff = initial;
        self.config.retry.max_backoff = max;
        self
    }

    /// Set the jitter window half-width
    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.retry.jitter = jitter;
        self
    }

    /// Set the path of a resource
    pub fn resource_path(mut self, resource: Resource, path: impl Into<String>) -> Self {
        self.config.resource_paths.insert(resource, path.into());
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP client with retry for the remote provider
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Open a resource as a byte stream
    ///
    /// Retries apply until the response headers arrive; once the body starts
    /// streaming, failures surface through the stream instead.
    pub async fn fetch_stream(&self, resource: Resource) -> Result<ByteStream> {
        let (response, trace_id) = self.send_with_retry(resource).await?;

        debug!(
            resource = %resource,
            trace_id = %trace_id,
            status = response.status().as_u16(),
            content_length = ?response.content_length(),
            "Response received"
        );

        let body = response.bytes_stream().map(|chunk| chunk.map_err(Error::Http));
        Ok(ByteStream::new(resource, trace_id, body))
    }

    /// Fetch a whole resource and parse it as JSON
    pub async fn fetch_json<T: DeserializeOwned>(&self, resource: Resource) -> Result<T> {
        let (response, _) = self.send_with_retry(resource).await?;
        let body = response.bytes().await.map_err(Error::Http)?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Issue a GET for a resource, retrying transient failures
    async fn send_with_retry(&self, resource: Resource) -> Result<(Response, String)> {
        let url = self.build_url(self.config.path_for(resource));
        let policy = &self.config.retry;
        let max_attempts = policy.max_retries + 1;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let trace_id = Uuid::new_v4().to_string();

            let mut req = self
                .client
                .get(&url)
                .header(TRACE_ID_HEADER, &trace_id)
                .timeout(self.config.timeout);

            for (key, value) in &self.config.default_headers {
                req = req.header(key.as_str(), value.as_str());
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok((response, trace_id));
                    }

                    let code = status.as_u16();
                    if policy.should_retry_status(code) && attempt < max_attempts {
                        let delay = policy.delay_for(attempt, parse_retry_after(response.headers()));
                        warn!(
                            resource = %resource,
                            trace_id = %trace_id,
                            status = code,
                            "Request failed, attempt {}/{}, retrying in {:?}",
                            attempt,
                            max_attempts,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let body = response.text().await.unwrap_or_default();
                    error!(
                        resource = %resource,
                        trace_id = %trace_id,
                        status = code,
                        attempts = attempt,
                        "Remote fetch failed"
                    );
                    return Err(Error::RemoteFetch {
                        resource: resource.to_string(),
                        attempts: attempt,
                        status: Some(code),
                        message: Error::http_status(code, body).to_string(),
                    });
                }
                Err(e) => {
                    if policy.should_retry_error(&e) && attempt < max_attempts {
                        let delay = policy.delay_for(attempt, None);
                        warn!(
                            resource = %resource,
                            trace_id = %trace_id,
                            error = %e,
                            "Transport error, attempt {}/{}, retrying in {:?}",
                            attempt,
                            max_attempts,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    error!(
                        resource = %resource,
                        trace_id = %trace_id,
                        error = %e,
                        attempts = attempt,
                        "Remote fetch failed"
                    );
                    let message = if e.is_timeout() {
                        Error::Timeout {
                            timeout_ms: self.config.timeout.as_millis() as u64,
                        }
                        .to_string()
                    } else {
                        Error::Http(e).to_string()
                    };
                    return Err(Error::RemoteFetch {
                        resource: resource.to_string(),
                        attempts: attempt,
                        status: None,
                        message,
                    });
                }
            }
        }
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }
}

#[async_trait]
impl RemoteSource for HttpClient {
    async fn fetch_stream(&self, resource: Resource) -> Result<ByteStream> {
        HttpClient::fetch_stream(self, resource).await
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
