//! Batch accumulation
//!
//! Groups a decoded record stream into fixed-size batches and hands each one
//! to a [`BatchFlush`], awaiting it before reading further.

use crate::error::{Error, Result};
use crate::types::DecodedRecord;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default number of records per batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Receiver of full batches
#[async_trait]
pub trait BatchFlush: Send {
    /// Persist one batch. An error stops accumulation.
    async fn flush(&mut self, batch: Vec<DecodedRecord>) -> Result<()>;
}

/// Counts from one accumulation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Records read from the stream
    pub records: usize,
    /// Flushes performed
    pub batches: usize,
}

/// Fixed-threshold batcher
#[derive(Debug, Clone)]
pub struct BatchAccumulator {
    batch_size: usize,
    cancel: Option<CancellationToken>,
}

impl Default for BatchAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl BatchAccumulator {
    /// Create an accumulator flushing every `batch_size` records (at least 1)
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            cancel: None,
        }
    }

    /// Stop between records once `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Drain `records` into `flush`.
    ///
    /// Every full batch is flushed as soon as it fills; a trailing partial
    /// batch is flushed at the end. Stream and flush errors stop the run and
    /// propagate. Batches flushed before the error are not rolled back.
    pub async fn run<St, F>(&self, records: St, flush: &mut F) -> Result<BatchStats>
    where
        St: Stream<Item = Result<DecodedRecord>>,
        F: BatchFlush + ?Sized,
    {
        tokio::pin!(records);
        let mut stats = BatchStats::default();
        let mut buffer = Vec::with_capacity(self.batch_size);

        loop {
            let next = match &self.cancel {
                Some(token) => tokio::select! {
                    biased;
                    () = token.cancelled() => return Err(Error::Cancelled),
                    item = records.next() => item,
                },
                None => records.next().await,
            };

            let Some(item) = next else {
                break;
            };
            buffer.push(item?);
            stats.records += 1;

            if buffer.len() >= self.batch_size {
                let batch = std::mem::replace(&mut buffer, Vec::with_capacity(self.batch_size));
                self.flush_batch(flush, batch, &mut stats).await?;
            }
        }

        if !buffer.is_empty() {
            self.flush_batch(flush, buffer, &mut stats).await?;
        }

        Ok(stats)
    }

    async fn flush_batch<F>(
        &self,
        flush: &mut F,
        batch: Vec<DecodedRecord>,
        stats: &mut BatchStats,
    ) -> Result<()>
    where
        F: BatchFlush + ?Sized,
    {
        debug!(
            batch = stats.batches + 1,
            batch_size = batch.len(),
            "Flushing batch"
        );
        flush.flush(batch).await?;
        stats.batches += 1;
        Ok(())
    }
}
