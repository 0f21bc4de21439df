//! Harvest types
//!
//! Configuration and statistics for harvest cycles.

use super::batch::DEFAULT_BATCH_SIZE;
use crate::http::Resource;
use crate::store::{BulkWriteOutcome, OperationFailure};
use serde::Serialize;

/// Failures kept verbatim per resource; the rest are only counted
pub const FAILURE_SAMPLE_LIMIT: usize = 10;

/// Configuration for a harvest cycle
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Records per bulk write
    pub batch_size: usize,
    /// Resources harvested per cycle, in order
    pub resources: Vec<Resource>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            resources: Resource::ALL.to_vec(),
        }
    }
}

impl HarvestConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set batch size
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Restrict the cycle to the given resources
    #[must_use]
    pub fn with_resources(mut self, resources: impl Into<Vec<Resource>>) -> Self {
        self.resources = resources.into();
        self
    }
}

/// Statistics from harvesting one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestStats {
    pub resource: Resource,
    /// Records decoded from the body
    pub records: usize,
    /// Bulk writes issued
    pub batches: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Operations the store did not apply
    pub failed: usize,
    /// The first few failures, at most [`FAILURE_SAMPLE_LIMIT`]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failure_samples: Vec<OperationFailure>,
    pub bytes_received: u64,
    pub duration_ms: u64,
}

/// Running totals over the bulk writes of one resource
///
/// Memory stays flat however many batches fail: failures are counted and
/// only the first [`FAILURE_SAMPLE_LIMIT`] are retained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteTally {
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
    pub samples: Vec<OperationFailure>,
}

impl WriteTally {
    pub fn add(&mut self, outcome: BulkWriteOutcome) {
        self.inserted += outcome.inserted;
        self.updated += outcome.updated;
        self.failed += outcome.failed.len();

        let room = FAILURE_SAMPLE_LIMIT.saturating_sub(self.samples.len());
        self.samples.extend(outcome.failed.into_iter().take(room));
    }
}

/// Statistics from one harvest cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub resources: Vec<HarvestStats>,
    pub duration_ms: u64,
}

impl HarvestReport {
    /// Stats for one resource, if it was harvested
    pub fn get(&self, resource: Resource) -> Option<&HarvestStats> {
        self.resources.iter().find(|s| s.resource == resource)
    }

    /// Records decoded across all resources
    pub fn total_records(&self) -> usize {
        self.resources.iter().map(|s| s.records).sum()
    }

    /// Failed operations across all resources
    pub fn total_failed(&self) -> usize {
        self.resources.iter().map(|s| s.failed).sum()
    }
}
