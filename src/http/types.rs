//! Remote source types
//!
//! Resources served by the provider, the counted byte stream handed to the
//! decoder, and the `RemoteSource` seam the harvester pulls from.

use crate::error::Result;
use crate::types::StayKind;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::Stream;
use pin_project_lite::pin_project;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tracing::debug;

/// A named dataset exposed by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    /// Detailed stay profiles
    Profiles,
    /// Compact stay summaries
    Summaries,
}

impl Resource {
    /// Every resource, in harvest order
    pub const ALL: [Resource; 2] = [Resource::Profiles, Resource::Summaries];

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Profiles => "profiles",
            Resource::Summaries => "summaries",
        }
    }

    /// Record variant produced by this resource
    pub fn kind(self) -> StayKind {
        match self {
            Resource::Profiles => StayKind::Profile,
            Resource::Summaries => StayKind::Summary,
        }
    }

    /// Provider path used when none is configured
    pub fn default_path(self) -> &'static str {
        match self {
            Resource::Profiles => "structured_generated_data.json",
            Resource::Summaries => "large_generated_data.json",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "profiles" => Ok(Resource::Profiles),
            "summaries" => Ok(Resource::Summaries),
            other => Err(crate::error::Error::config(format!(
                "unknown resource '{other}', expected 'profiles' or 'summaries'"
            ))),
        }
    }
}

/// Shared counter of bytes received on a stream
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }
}

pin_project! {
    /// Response body of a remote resource, delivered chunk by chunk
    ///
    /// Counts the bytes that pass through and logs the total once the
    /// underlying transfer ends.
    pub struct ByteStream {
        #[pin]
        inner: BoxStream<'static, Result<Bytes>>,
        resource: Resource,
        trace_id: String,
        counter: ByteCounter,
        ended: bool,
    }
}

impl ByteStream {
    /// Wrap a chunk stream for a resource
    pub fn new(
        resource: Resource,
        trace_id: impl Into<String>,
        inner: impl Stream<Item = Result<Bytes>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(inner),
            resource,
            trace_id: trace_id.into(),
            counter: ByteCounter::default(),
            ended: false,
        }
    }

    /// Build a stream from in-memory chunks
    pub fn from_chunks<I, B>(resource: Resource, chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let chunks: Vec<Result<Bytes>> = chunks.into_iter().map(|c| Ok(c.into())).collect();
        Self::new(resource, "local", futures::stream::iter(chunks))
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Handle to the byte count, readable after the stream has been consumed
    pub fn counter(&self) -> ByteCounter {
        self.counter.clone()
    }
}

impl Stream for ByteStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match ready!(this.inner.poll_next(cx)) {
            Some(Ok(chunk)) => {
                this.counter.add(chunk.len() as u64);
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => Poll::Ready(Some(Err(e))),
            None => {
                if !*this.ended {
                    *this.ended = true;
                    debug!(
                        resource = %this.resource,
                        trace_id = %this.trace_id,
                        total_bytes = this.counter.get(),
                        "Stream transfer ended"
                    );
                }
                Poll::Ready(None)
            }
        }
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream")
            .field("resource", &self.resource)
            .field("trace_id", &self.trace_id)
            .field("bytes_received", &self.counter.get())
            .finish_non_exhaustive()
    }
}

/// Source of raw resource bodies
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Open the body of a resource as a byte stream
    async fn fetch_stream(&self, resource: Resource) -> Result<ByteStream>;
}
