//! Common types used throughout the stay harvester
//!
//! This module contains the stay record model shared by the harvest pipeline,
//! the store and the query engine, together with the raw shapes the remote
//! provider serves and the validation rules enforced at the document boundary.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// A decoded array element together with its position in the source array
pub type DecodedRecord = (usize, JsonValue);

// ============================================================================
// Field Limits
// ============================================================================

/// Maximum length of `city`
pub const MAX_CITY_LEN: usize = 150;

/// Maximum length of `name`
pub const MAX_NAME_LEN: usize = 150;

/// Maximum length of `country`
pub const MAX_COUNTRY_LEN: usize = 60;

static EXTERNAL_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("valid external id regex"));

static MONEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d{1,2})?$").expect("valid money regex"));

// ============================================================================
// Discriminator
// ============================================================================

/// Record variant discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StayKind {
    Profile,
    Summary,
}

impl StayKind {
    /// Value stored in the `kind` column
    pub fn as_str(self) -> &'static str {
        match self {
            StayKind::Profile => "Profile",
            StayKind::Summary => "Summary",
        }
    }
}

impl fmt::Display for StayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StayKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Profile" => Ok(StayKind::Profile),
            "Summary" => Ok(StayKind::Summary),
            other => Err(Error::validation("kind", format!("unknown kind '{other}'"))),
        }
    }
}

// ============================================================================
// Price Segment
// ============================================================================

/// Price bucket attached to summary records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSegment {
    Low,
    Medium,
    High,
}

impl PriceSegment {
    pub fn as_str(self) -> &'static str {
        match self {
            PriceSegment::Low => "low",
            PriceSegment::Medium => "medium",
            PriceSegment::High => "high",
        }
    }
}

impl fmt::Display for PriceSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceSegment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(PriceSegment::Low),
            "medium" => Ok(PriceSegment::Medium),
            "high" => Ok(PriceSegment::High),
            other => Err(Error::validation(
                "priceSegment",
                format!("'{other}' is not one of low, medium, high"),
            )),
        }
    }
}

// ============================================================================
// Stay Records
// ============================================================================

/// Fields shared by every stay variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayBase {
    /// Provider-assigned identifier, unique across both variants
    pub external_id: String,
    pub city: String,
    pub is_available: bool,
    pub price_per_night: f64,
}

/// Detailed stay listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayProfile {
    #[serde(flatten)]
    pub base: StayBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Compact stay listing with a price bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaySummary {
    #[serde(flatten)]
    pub base: StayBase,
    pub price_segment: PriceSegment,
}

/// A persisted stay, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StayRecord {
    Profile(StayProfile),
    Summary(StaySummary),
}

impl StayRecord {
    /// The discriminator of this record
    pub fn kind(&self) -> StayKind {
        match self {
            StayRecord::Profile(_) => StayKind::Profile,
            StayRecord::Summary(_) => StayKind::Summary,
        }
    }

    /// Shared fields
    pub fn base(&self) -> &StayBase {
        match self {
            StayRecord::Profile(p) => &p.base,
            StayRecord::Summary(s) => &s.base,
        }
    }

    pub fn external_id(&self) -> &str {
        &self.base().external_id
    }

    /// Validate the record against the document-boundary rules.
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<()> {
        let base = self.base();

        if !EXTERNAL_ID_RE.is_match(&base.external_id) {
            return Err(Error::validation(
                "externalId",
                format!("'{}' is not an alphanumeric string", base.external_id),
            ));
        }

        if base.city.is_empty() {
            return Err(Error::validation("city", "must not be empty"));
        }
        check_len("city", &base.city, MAX_CITY_LEN)?;
        validate_money("pricePerNight", base.price_per_night)?;

        if let StayRecord::Profile(profile) = self {
            if let Some(name) = &profile.name {
                check_len("name", name, MAX_NAME_LEN)?;
            }
            if let Some(country) = &profile.country {
                check_len("country", country, MAX_COUNTRY_LEN)?;
            }
        }

        Ok(())
    }
}

/// A stay as read back from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredStay {
    #[serde(flatten)]
    pub record: StayRecord,
    pub created_at: String,
    pub updated_at: String,
}

/// A page of search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Number of documents matching the filter, ignoring pagination
    pub total: u64,
    pub data: Vec<StoredStay>,
}

fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len > max {
        return Err(Error::validation(
            field,
            format!("length {len} exceeds maximum of {max}"),
        ));
    }
    Ok(())
}

/// Check that a value is a finite, non-negative amount with at most two
/// fractional digits.
pub fn validate_money(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::validation(
            field,
            format!("{value} is not a finite non-negative amount"),
        ));
    }

    if !MONEY_RE.is_match(&value.to_string()) {
        return Err(Error::validation(
            field,
            format!("{value} has more than 2 decimal places"),
        ));
    }

    Ok(())
}

// ============================================================================
// Raw Provider Shapes
// ============================================================================

/// Address block of a raw profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAddress {
    #[serde(default)]
    pub country: Option<String>,
    pub city: String,
}

/// Profile as served by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStayProfile {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    pub address: RawAddress,
    pub is_available: bool,
    pub price_for_night: f64,
}

/// Summary as served by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStaySummary {
    pub id: String,
    pub city: String,
    pub availability: bool,
    pub price_segment: PriceSegment,
    pub price_per_night: f64,
}

impl From<RawStayProfile> for StayRecord {
    fn from(raw: RawStayProfile) -> Self {
        StayRecord::Profile(StayProfile {
            base: StayBase {
                external_id: raw.id.to_string(),
                city: raw.address.city,
                is_available: raw.is_available,
                price_per_night: raw.price_for_night,
            },
            name: raw.name,
            country: raw.address.country,
        })
    }
}

impl From<RawStaySummary> for StayRecord {
    fn from(raw: RawStaySummary) -> Self {
        StayRecord::Summary(StaySummary {
            base: StayBase {
                external_id: raw.id,
                city: raw.city,
                is_available: raw.availability,
                price_per_night: raw.price_per_night,
            },
            price_segment: raw.price_segment,
        })
    }
}
