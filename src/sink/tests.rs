//! Tests for sink module

use super::*;
use crate::store::{DuckDbStore, StayFilter, StayQuery};
use crate::types::{PriceSegment, StayKind, StoredStay};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;

fn raw_profile(id: u64, name: &str, available: bool, price: f64) -> JsonValue {
    json!({
        "id": id,
        "name": name,
        "address": {"city": "Paris", "country": "France"},
        "isAvailable": available,
        "priceForNight": price
    })
}

fn raw_summary(id: &str, segment: &str, price: f64) -> JsonValue {
    json!({
        "id": id,
        "city": "Lyon",
        "availability": true,
        "priceSegment": segment,
        "pricePerNight": price
    })
}

/// Store whose writes always fail as a whole
struct UnavailableStore;

#[async_trait]
impl StayStore for UnavailableStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn bulk_upsert(&self, _records: Vec<StayRecord>) -> Result<BulkWriteOutcome> {
        Err(Error::store_unavailable("connection lost"))
    }

    async fn upsert(&self, _record: StayRecord) -> Result<UpsertOutcome> {
        Err(Error::store_unavailable("connection lost"))
    }

    async fn count(&self, _filter: &StayFilter) -> Result<u64> {
        Ok(0)
    }

    async fn find(&self, _query: &StayQuery) -> Result<Vec<StoredStay>> {
        Ok(Vec::new())
    }
}

#[test]
fn test_normalize_profile() {
    let record = normalize(Resource::Profiles, raw_profile(1, "A", true, 120.5)).unwrap();
    assert_eq!(record.kind(), StayKind::Profile);
    assert_eq!(record.external_id(), "1");
    assert_eq!(record.base().city, "Paris");
}

#[test]
fn test_normalize_summary() {
    let record = normalize(Resource::Summaries, raw_summary("x9", "high", 300.0)).unwrap();
    match record {
        StayRecord::Summary(s) => {
            assert_eq!(s.price_segment, PriceSegment::High);
            assert_eq!(s.base.external_id, "x9");
        }
        StayRecord::Profile(_) => panic!("expected summary"),
    }
}

#[test]
fn test_normalize_wrong_shape() {
    // A summary does not carry an address block
    assert!(normalize(Resource::Profiles, raw_summary("x9", "high", 1.0)).is_err());
}

#[tokio::test]
async fn test_bulk_upsert_is_idempotent() {
    let sink = UpsertSink::new(DuckDbStore::in_memory().unwrap());

    sink.bulk_upsert(
        Resource::Profiles,
        vec![(0, raw_profile(1, "A", true, 120.5))],
    )
    .await
    .unwrap();
    let outcome = sink
        .bulk_upsert(
            Resource::Profiles,
            vec![(0, raw_profile(1, "A2", false, 99.99))],
        )
        .await
        .unwrap();

    assert_eq!(outcome.updated, 1);
    assert_eq!(sink.store().count(&StayFilter::new()).await.unwrap(), 1);

    let stored = sink.store().get("1").await.unwrap().unwrap();
    match stored.record {
        StayRecord::Profile(p) => {
            assert_eq!(p.name.as_deref(), Some("A2"));
            assert!(!p.base.is_available);
            assert_eq!(p.base.price_per_night, 99.99);
        }
        StayRecord::Summary(_) => panic!("expected profile"),
    }
}

#[tokio::test]
async fn test_bulk_upsert_reports_source_positions() {
    let sink = UpsertSink::new(DuckDbStore::in_memory().unwrap());

    let outcome = sink
        .bulk_upsert(
            Resource::Summaries,
            vec![
                (1000, raw_summary("a1", "low", 10.0)),
                (1001, raw_summary("a2", "luxury", 10.0)),
                (1002, raw_summary("a3", "low", 10.555)),
                (1003, raw_summary("a4", "medium", 20.0)),
            ],
        )
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 2);
    let failed: Vec<(usize, &str)> = outcome
        .failed
        .iter()
        .map(|f| (f.index, f.external_id.as_str()))
        .collect();
    assert_eq!(failed, vec![(1001, "a2"), (1002, "a3")]);
}

#[tokio::test]
async fn test_bulk_upsert_empty_batch() {
    let sink = UpsertSink::new(UnavailableStore);
    let outcome = sink.bulk_upsert(Resource::Profiles, Vec::new()).await.unwrap();
    assert_eq!(outcome, BulkWriteOutcome::default());
}

#[tokio::test]
async fn test_bulk_upsert_failure_propagates_with_context() {
    let sink = UpsertSink::new(UnavailableStore);

    let err = sink
        .bulk_upsert(
            Resource::Summaries,
            vec![
                (0, raw_summary("a1", "low", 10.0)),
                (1, raw_summary("a2", "low", 10.0)),
            ],
        )
        .await
        .unwrap_err();

    match err {
        Error::BulkWrite {
            resource,
            batch_size,
            message,
        } => {
            assert_eq!(resource, "summaries");
            assert_eq!(batch_size, 2);
            assert!(message.contains("connection lost"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_single_upsert_swallows_errors() {
    let sink = UpsertSink::new(UnavailableStore);
    let outcome = sink
        .upsert(Resource::Profiles, raw_profile(5, "B", true, 10.0))
        .await;
    assert!(outcome.is_none());

    let sink = UpsertSink::new(DuckDbStore::in_memory().unwrap());
    assert!(sink
        .upsert(Resource::Profiles, json!({"id": "not-a-profile"}))
        .await
        .is_none());
    assert_eq!(
        sink.upsert(Resource::Profiles, raw_profile(5, "B", true, 10.0))
            .await,
        Some(UpsertOutcome::Inserted)
    );
}

#[test]
fn test_raw_id() {
    assert_eq!(raw_id(&json!({"id": 42})), "42");
    assert_eq!(raw_id(&json!({"id": "abc"})), "abc");
    assert_eq!(raw_id(&json!({"name": "x"})), "");
}
