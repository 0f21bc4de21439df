//! Store types
//!
//! Filters, sort keys and write outcomes exchanged between the store and
//! its callers.

use crate::error::{Error, Result};
use crate::types::PriceSegment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Fields
// ============================================================================

/// A filterable stay field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StayField {
    Kind,
    Name,
    City,
    Country,
    PriceSegment,
    IsAvailable,
}

impl StayField {
    /// Column holding this field
    pub fn column(self) -> &'static str {
        match self {
            StayField::Kind => "kind",
            StayField::Name => "name",
            StayField::City => "city",
            StayField::Country => "country",
            StayField::PriceSegment => "price_segment",
            StayField::IsAvailable => "is_available",
        }
    }
}

/// Right-hand side of an equality predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Text(String),
    Bool(bool),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<PriceSegment> for FilterValue {
    fn from(value: PriceSegment) -> Self {
        FilterValue::Text(value.as_str().to_string())
    }
}

// ============================================================================
// Filter
// ============================================================================

/// One clause of a filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "op")]
pub enum Predicate {
    /// Any term occurs as whole words, case-insensitively, in name, city or country
    Text { terms: Vec<String> },
    /// Exact match
    Eq { field: StayField, value: FilterValue },
    /// Inclusive bounds on the nightly price
    PriceRange { min: Option<f64>, max: Option<f64> },
}

/// Conjunction of predicates; empty matches everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StayFilter {
    pub predicates: Vec<Predicate>,
}

impl StayFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate
    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Add an equality predicate
    pub fn eq(self, field: StayField, value: impl Into<FilterValue>) -> Self {
        self.and(Predicate::Eq {
            field,
            value: value.into(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

// ============================================================================
// Sorting
// ============================================================================

/// Sortable fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    City,
    #[default]
    PricePerNight,
    Name,
    Country,
    PriceSegment,
}

impl SortField {
    pub const ALL: [SortField; 5] = [
        SortField::City,
        SortField::PricePerNight,
        SortField::Name,
        SortField::Country,
        SortField::PriceSegment,
    ];

    /// Request-facing name
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::City => "city",
            SortField::PricePerNight => "pricePerNight",
            SortField::Name => "name",
            SortField::Country => "country",
            SortField::PriceSegment => "priceSegment",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            SortField::City => "city",
            SortField::PricePerNight => "price_per_night",
            SortField::Name => "name",
            SortField::Country => "country",
            SortField::PriceSegment => "price_segment",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SortField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| {
                Error::invalid_query(
                    "sortBy",
                    format!(
                        "'{s}' is not one of city, pricePerNight, name, country, priceSegment"
                    ),
                )
            })
    }
}

/// Sort order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(Error::invalid_query(
                "sortDirection",
                format!("'{other}' is not one of ASC, DESC"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

/// A filter with sort and bounded pagination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StayQuery {
    pub filter: StayFilter,
    pub sort: SortKey,
    pub skip: u64,
    pub limit: u64,
}

// ============================================================================
// Write Outcomes
// ============================================================================

/// Result of a single applied upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// An operation of a bulk write that was not applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFailure {
    /// Position of the operation within the batch
    pub index: usize,
    pub external_id: String,
    pub message: String,
}

/// Per-operation tally of an unordered bulk write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkWriteOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub failed: Vec<OperationFailure>,
}

impl BulkWriteOutcome {
    /// Operations that were applied
    pub fn applied(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Whether every operation was applied
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }
}
