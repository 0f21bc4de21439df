//! Query engine
//!
//! Turns a [`QuerySpec`] into a store filter, sort key and page, and runs
//! the count and page reads.
//!
//! # Overview
//!
//! Every supplied field adds one predicate; predicates are combined with
//! AND. `minPrice`/`maxPrice` form a single inclusive range clause. Results
//! are sorted by the requested field, ties broken by external id.

mod types;

pub use types::{QuerySpec, SearchParams, DEFAULT_LIMIT, MAX_LIMIT, MAX_SKIP, MAX_TEXT_LEN};

use crate::error::Result;
use crate::store::{Predicate, SortKey, StayField, StayFilter, StayQuery, StayStore};
use crate::types::SearchResult;
use tracing::debug;

/// Build the filter, sort and page for a spec.
///
/// The input is assumed validated; `skip` and `limit` are still clamped to
/// [`MAX_SKIP`] and [`MAX_LIMIT`].
pub fn build_query(spec: &QuerySpec) -> StayQuery {
    let mut filter = StayFilter::new();

    if let Some(text) = &spec.text {
        let terms: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        if !terms.is_empty() {
            filter = filter.and(Predicate::Text { terms });
        }
    }
    if let Some(name) = &spec.name {
        filter = filter.eq(StayField::Name, name.as_str());
    }
    if let Some(city) = &spec.city {
        filter = filter.eq(StayField::City, city.as_str());
    }
    if let Some(country) = &spec.country {
        filter = filter.eq(StayField::Country, country.as_str());
    }
    if let Some(segment) = spec.price_segment {
        filter = filter.eq(StayField::PriceSegment, segment);
    }
    if let Some(available) = spec.is_available {
        filter = filter.eq(StayField::IsAvailable, available);
    }
    if spec.min_price.is_some() || spec.max_price.is_some() {
        filter = filter.and(Predicate::PriceRange {
            min: spec.min_price.map(|p| p as f64),
            max: spec.max_price.map(|p| p as f64),
        });
    }

    StayQuery {
        filter,
        sort: SortKey {
            field: spec.sort_by,
            direction: spec.sort_direction,
        },
        skip: spec.skip.min(MAX_SKIP),
        limit: spec.limit.min(MAX_LIMIT),
    }
}

/// Runs searches against a store
#[derive(Debug, Clone)]
pub struct QueryEngine<S> {
    store: S,
}

impl<S: StayStore> QueryEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Count and fetch one page.
    ///
    /// The two reads run concurrently and are not a single snapshot, so
    /// `total` may drift under concurrent writes.
    pub async fn search(&self, spec: &QuerySpec) -> Result<SearchResult> {
        let query = build_query(spec);
        debug!(
            filter = ?query.filter,
            sort = ?query.sort,
            skip = query.skip,
            limit = query.limit,
            "Executing search"
        );

        let (total, data) = tokio::try_join!(
            self.store.count(&query.filter),
            self.store.find(&query)
        )?;

        Ok(SearchResult { total, data })
    }
}
