//! Upsert sink
//!
//! Normalizes raw provider records into [`StayRecord`]s and writes them to a
//! [`StayStore`].
//!
//! # Features
//!
//! - Bulk path: one unordered bulk write per batch; a failed batch aborts
//!   the caller
//! - Single path: failures are logged and swallowed
//! - Records that do not match the resource's raw shape are counted as
//!   failed operations rather than aborting the batch

use crate::error::{Error, Result};
use crate::http::Resource;
use crate::store::{BulkWriteOutcome, OperationFailure, StayStore, UpsertOutcome};
use crate::types::{DecodedRecord, JsonValue, RawStayProfile, RawStaySummary, StayRecord};
use tracing::{debug, error, warn};

/// Writes harvested records to the store
#[derive(Debug, Clone)]
pub struct UpsertSink<S> {
    store: S,
}

impl<S: StayStore> UpsertSink<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Upsert a batch of decoded records.
    ///
    /// Per-record failures are returned in the outcome. An error means the
    /// store rejected the batch as a whole; batches written earlier stay.
    pub async fn bulk_upsert(
        &self,
        resource: Resource,
        batch: Vec<DecodedRecord>,
    ) -> Result<BulkWriteOutcome> {
        if batch.is_empty() {
            return Ok(BulkWriteOutcome::default());
        }

        let batch_size = batch.len();
        let mut rejected = Vec::new();
        let mut records = Vec::with_capacity(batch_size);
        let mut positions = Vec::with_capacity(batch_size);

        for (index, value) in batch {
            let external_id = raw_id(&value);
            match normalize(resource, value) {
                Ok(record) => {
                    records.push(record);
                    positions.push(index);
                }
                Err(e) => rejected.push(OperationFailure {
                    index,
                    external_id,
                    message: e.to_string(),
                }),
            }
        }

        let mut outcome = match self.store.bulk_upsert(records).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    resource = %resource,
                    batch_size,
                    error = %e,
                    "Bulk upsert failed"
                );
                return Err(Error::BulkWrite {
                    resource: resource.to_string(),
                    batch_size,
                    message: e.to_string(),
                });
            }
        };

        // Report failures by their position in the source array
        for failure in &mut outcome.failed {
            if let Some(&index) = positions.get(failure.index) {
                failure.index = index;
            }
        }
        outcome.failed.extend(rejected);
        outcome.failed.sort_by_key(|f| f.index);

        if outcome.is_complete() {
            debug!(
                resource = %resource,
                inserted = outcome.inserted,
                updated = outcome.updated,
                "Bulk upsert applied"
            );
        } else {
            warn!(
                resource = %resource,
                batch_size,
                applied = outcome.applied(),
                failed = outcome.failed_count(),
                first_failure = %outcome.failed[0].message,
                "Bulk upsert partially applied"
            );
        }

        Ok(outcome)
    }

    /// Upsert one raw record, logging instead of returning failures
    pub async fn upsert(&self, resource: Resource, value: JsonValue) -> Option<UpsertOutcome> {
        let external_id = raw_id(&value);
        let result = match normalize(resource, value) {
            Ok(record) => self.store.upsert(record).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(
                    resource = %resource,
                    external_id = %external_id,
                    error = %e,
                    "Single upsert failed"
                );
                None
            }
        }
    }
}

/// Map a raw provider record of `resource` to its persisted shape
pub fn normalize(resource: Resource, value: JsonValue) -> Result<StayRecord> {
    let record = match resource {
        Resource::Profiles => StayRecord::from(serde_json::from_value::<RawStayProfile>(value)?),
        Resource::Summaries => StayRecord::from(serde_json::from_value::<RawStaySummary>(value)?),
    };
    Ok(record)
}

/// Best-effort id of a raw record, for failure reports
fn raw_id(value: &JsonValue) -> String {
    match value.get("id") {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests;
