//! Harvest module
//!
//! Pulls each resource from the remote source and upserts it into the store.
//!
//! # Overview
//!
//! One harvest cycle runs the resources in order (profiles, then summaries).
//! Each resource is a pipeline:
//!
//! ```text
//! RemoteSource ──bytes──▶ JsonArrayStream ──records──▶ BatchAccumulator ──batches──▶ UpsertSink
//! ```
//!
//! A failure in any stage aborts the cycle. Batches written before the
//! failure stay in the store; the next cycle re-upserts everything.

mod batch;
mod types;

pub use batch::{BatchAccumulator, BatchFlush, BatchStats, DEFAULT_BATCH_SIZE};
pub use types::{HarvestConfig, HarvestReport, HarvestStats, WriteTally, FAILURE_SAMPLE_LIMIT};

use crate::decode::JsonArrayStream;
use crate::error::{Error, Result};
use crate::http::{RemoteSource, Resource};
use crate::sink::UpsertSink;
use crate::store::StayStore;
use crate::types::DecodedRecord;
use async_trait::async_trait;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Harvest entry point
pub struct Harvester<R, S> {
    source: R,
    sink: UpsertSink<S>,
    config: HarvestConfig,
    cancel: CancellationToken,
}

impl<R, S> Harvester<R, S>
where
    R: RemoteSource,
    S: StayStore,
{
    pub fn new(source: R, store: S) -> Self {
        Self {
            source,
            sink: UpsertSink::new(store),
            config: HarvestConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Set harvest configuration
    #[must_use]
    pub fn with_config(mut self, config: HarvestConfig) -> Self {
        self.config = config;
        self
    }

    /// Abort in-flight harvests when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn sink(&self) -> &UpsertSink<S> {
        &self.sink
    }

    /// Run one cycle over the configured resources, in order
    pub async fn harvest(&self) -> Result<HarvestReport> {
        let started = Instant::now();
        let mut report = HarvestReport::default();

        for &resource in &self.config.resources {
            report.resources.push(self.harvest_resource(resource).await?);
        }

        report.duration_ms = elapsed_ms(started);
        Ok(report)
    }

    /// Harvest a single resource
    pub async fn harvest_resource(&self, resource: Resource) -> Result<HarvestStats> {
        let started = Instant::now();
        info!(resource = %resource, "Harvest started");

        match self.run_pipeline(resource, started).await {
            Ok(stats) => {
                info!(
                    resource = %resource,
                    records = stats.records,
                    batches = stats.batches,
                    inserted = stats.inserted,
                    updated = stats.updated,
                    failed = stats.failed,
                    bytes = stats.bytes_received,
                    duration_ms = stats.duration_ms,
                    "Harvest finished"
                );
                Ok(stats)
            }
            Err(e) => {
                error!(
                    resource = %resource,
                    error = %e,
                    duration_ms = elapsed_ms(started),
                    "Harvest failed"
                );
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, resource: Resource, started: Instant) -> Result<HarvestStats> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let body = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(Error::Cancelled),
            body = self.source.fetch_stream(resource) => body?,
        };
        let counter = body.counter();

        let mut flush = SinkFlush {
            sink: &self.sink,
            resource,
            tally: WriteTally::default(),
        };
        let batches = BatchAccumulator::new(self.config.batch_size)
            .with_cancellation(self.cancel.clone())
            .run(JsonArrayStream::new(body), &mut flush)
            .await?;

        Ok(HarvestStats {
            resource,
            records: batches.records,
            batches: batches.batches,
            inserted: flush.tally.inserted,
            updated: flush.tally.updated,
            failed: flush.tally.failed,
            failure_samples: flush.tally.samples,
            bytes_received: counter.get(),
            duration_ms: elapsed_ms(started),
        })
    }
}

/// Flushes batches of one resource into the sink, tallying outcomes
struct SinkFlush<'a, S> {
    sink: &'a UpsertSink<S>,
    resource: Resource,
    tally: WriteTally,
}

#[async_trait]
impl<'a, S: StayStore> BatchFlush for SinkFlush<'a, S> {
    async fn flush(&mut self, batch: Vec<DecodedRecord>) -> Result<()> {
        let outcome = self.sink.bulk_upsert(self.resource, batch).await?;
        self.tally.add(outcome);
        Ok(())
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
