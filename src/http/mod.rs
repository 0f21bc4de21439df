//! HTTP client module
//!
//! Fetches provider resources as byte streams, with retry and backoff.
//!
//! # Features
//!
//! - **Automatic Retries**: transient statuses and transport failures
//! - **Backoff**: exponential with ±jitter, capped, `Retry-After` aware
//! - **Tracing**: a unique `X-Request-Trace-ID` header per attempt
//! - **Byte Counting**: received bytes are counted and logged per stream

mod client;
mod retry;
mod types;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, TRACE_ID_HEADER};
pub use retry::{parse_retry_after, RetryPolicy};
pub use types::{ByteCounter, ByteStream, RemoteSource, Resource};

#[cfg(test)]
mod tests;
