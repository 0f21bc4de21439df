//! Error types for the stay harvester
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for the stay harvester
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Remote Fetch Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Fetching '{resource}' failed after {attempts} attempt(s): {message}")]
    RemoteFetch {
        resource: String,
        attempts: u32,
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Decode Errors
    // ============================================================================
    #[error("Failed to decode stream: {message}")]
    Decode { message: String },

    // ============================================================================
    // Store Errors
    // ============================================================================
    #[error("Store error: {0}")]
    Store(#[from] duckdb::Error),

    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Bulk write of {batch_size} '{resource}' record(s) failed: {message}")]
    BulkWrite {
        resource: String,
        batch_size: usize,
        message: String,
    },

    #[error("Invalid value for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Stored record '{external_id}' is unreadable: {message}")]
    CorruptRecord {
        external_id: String,
        message: String,
    },

    // ============================================================================
    // Query Errors
    // ============================================================================
    #[error("Invalid query parameter '{field}': {message}")]
    InvalidQuery { field: String, message: String },

    // ============================================================================
    // Harvest Errors
    // ============================================================================
    #[error("Harvest cancelled")]
    Cancelled,

}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a document validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a query validation error
    pub fn invalid_query(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a store-unavailable error
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Whether the error was caused by the caller's input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidQuery { .. } | Error::Validation { .. })
    }
}

/// Check if an HTTP status code is retryable
///
/// Covers request timeout, payload too large, rate limiting, the 5xx family
/// and the Cloudflare origin codes.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(
        status,
        408 | 413 | 429 | 500 | 502 | 503 | 504 | 521 | 522 | 524
    )
}

/// Check if a transport failure is transient
///
/// Covers connect failures and timeouts, plus failures on an established
/// connection: the peer resetting or aborting it, a broken pipe, local
/// address exhaustion, an unreachable network or host, and the connection
/// closing before a complete response arrived.
pub fn is_retryable_transport(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || has_transient_cause(error)
}

/// Walk an error's source chain looking for a transient connection failure
pub fn has_transient_cause(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if is_retryable_io_kind(io.kind()) {
                return true;
            }
        }
        if let Some(hyper) = err.downcast_ref::<hyper::Error>() {
            if hyper.is_incomplete_message() {
                return true;
            }
        }
        current = err.source();
    }
    false
}

fn is_retryable_io_kind(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind;
    matches!(
        kind,
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionRefused
            | ErrorKind::BrokenPipe
            | ErrorKind::AddrInUse
            | ErrorKind::AddrNotAvailable
            | ErrorKind::NetworkUnreachable
            | ErrorKind::HostUnreachable
            | ErrorKind::TimedOut
            | ErrorKind::UnexpectedEof
    )
}

/// Result type alias for the stay harvester
pub type Result<T> = std::result::Result<T, Error>;
