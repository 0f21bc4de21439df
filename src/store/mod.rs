//! Document store
//!
//! Persists stays in a single collection keyed by external id and serves
//! filtered, sorted pages back to the query engine.
//!
//! # Features
//!
//! - Unordered bulk upsert with per-operation failure reporting
//! - Immutable `kind` discriminator per external id
//! - `createdAt`/`updatedAt` bookkeeping
//! - Count and page reads over the same [`StayFilter`]

mod engine;
mod types;

pub use engine::{DuckDbStore, IN_MEMORY};
pub use types::{
    BulkWriteOutcome, FilterValue, OperationFailure, Predicate, SortDirection, SortField,
    SortKey, StayField, StayFilter, StayQuery, UpsertOutcome,
};

use crate::error::Result;
use crate::types::{StayRecord, StoredStay};
use async_trait::async_trait;

/// Storage seam shared by the harvest and query paths
#[async_trait]
pub trait StayStore: Send + Sync {
    /// Create the collection if it does not exist
    async fn ensure_schema(&self) -> Result<()>;

    /// Upsert every record independently, keyed by external id.
    ///
    /// Per-operation failures are reported in the outcome; `Err` means the
    /// batch as a whole could not be written.
    async fn bulk_upsert(&self, records: Vec<StayRecord>) -> Result<BulkWriteOutcome>;

    /// Upsert a single record
    async fn upsert(&self, record: StayRecord) -> Result<UpsertOutcome>;

    /// Number of stays matching `filter`
    async fn count(&self, filter: &StayFilter) -> Result<u64>;

    /// One sorted page of stays
    async fn find(&self, query: &StayQuery) -> Result<Vec<StoredStay>>;
}
