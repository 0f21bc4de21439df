//! Query types
//!
//! `SearchParams` is the raw, untrusted request; `QuerySpec` is the
//! validated form the engine consumes.

use crate::error::{Error, Result};
use crate::store::{SortDirection, SortField};
use crate::types::PriceSegment;
use serde::{Deserialize, Serialize};

/// Default page size
pub const DEFAULT_LIMIT: u64 = 25;

/// Largest page a single search may return
pub const MAX_LIMIT: u64 = 100;

/// Maximum length of any text parameter
pub const MAX_TEXT_LEN: usize = 150;

/// Largest offset the store accepts (a signed 64-bit value)
pub const MAX_SKIP: u64 = i64::MAX as u64;

/// Search request as received, every field still a string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub text: Option<String>,
    pub name: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub price_segment: Option<String>,
    pub is_available: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
    pub skip: Option<String>,
    pub limit: Option<String>,
}

impl SearchParams {
    /// Validate and convert into a [`QuerySpec`].
    ///
    /// String values are trimmed first. The first violation is returned as
    /// [`Error::InvalidQuery`].
    pub fn validate(self) -> Result<QuerySpec> {
        let spec = QuerySpec {
            text: text_param("text", self.text)?,
            name: text_param("name", self.name)?,
            city: text_param("city", self.city)?,
            country: text_param("country", self.country)?,
            price_segment: trimmed(self.price_segment)
                .map(|s| {
                    s.parse::<PriceSegment>().map_err(|_| {
                        Error::invalid_query(
                            "priceSegment",
                            format!("'{s}' is not one of low, medium, high"),
                        )
                    })
                })
                .transpose()?,
            is_available: trimmed(self.is_available)
                .map(|s| parse_bool("isAvailable", &s))
                .transpose()?,
            min_price: trimmed(self.min_price)
                .map(|s| parse_positive("minPrice", &s))
                .transpose()?,
            max_price: trimmed(self.max_price)
                .map(|s| parse_positive("maxPrice", &s))
                .transpose()?,
            sort_by: trimmed(self.sort_by)
                .map(|s| s.parse::<SortField>())
                .transpose()?
                .unwrap_or_default(),
            sort_direction: trimmed(self.sort_direction)
                .map(|s| s.parse::<SortDirection>())
                .transpose()?
                .unwrap_or_default(),
            skip: trimmed(self.skip)
                .map(|s| parse_int("skip", &s))
                .transpose()?
                .unwrap_or(0),
            limit: trimmed(self.limit)
                .map(|s| parse_positive("limit", &s))
                .transpose()?
                .unwrap_or(DEFAULT_LIMIT),
        };

        spec.validate()?;
        Ok(spec)
    }
}

/// A validated search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub text: Option<String>,
    pub name: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub price_segment: Option<PriceSegment>,
    pub is_available: Option<bool>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub sort_by: SortField,
    pub sort_direction: SortDirection,
    pub skip: u64,
    pub limit: u64,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            text: None,
            name: None,
            city: None,
            country: None,
            price_segment: None,
            is_available: None,
            min_price: None,
            max_price: None,
            sort_by: SortField::default(),
            sort_direction: SortDirection::default(),
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl QuerySpec {
    /// Check bounds on an already-typed query
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("text", &self.text),
            ("name", &self.name),
            ("city", &self.city),
            ("country", &self.country),
        ] {
            if let Some(value) = value {
                check_text(field, value)?;
            }
        }

        if self.min_price == Some(0) {
            return Err(Error::invalid_query("minPrice", "must be a positive integer"));
        }
        if self.max_price == Some(0) {
            return Err(Error::invalid_query("maxPrice", "must be a positive integer"));
        }
        if self.skip > MAX_SKIP {
            return Err(Error::invalid_query(
                "skip",
                format!("must be at most {MAX_SKIP}"),
            ));
        }
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(Error::invalid_query(
                "limit",
                format!("must be between 1 and {MAX_LIMIT}"),
            ));
        }
        Ok(())
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string())
}

fn text_param(field: &str, value: Option<String>) -> Result<Option<String>> {
    let Some(value) = trimmed(value) else {
        return Ok(None);
    };
    check_text(field, &value)?;
    Ok(Some(value))
}

fn check_text(field: &str, value: &str) -> Result<()> {
    let len = value.chars().count();
    if len == 0 || len > MAX_TEXT_LEN {
        return Err(Error::invalid_query(
            field,
            format!("length must be between 1 and {MAX_TEXT_LEN}, got {len}"),
        ));
    }
    Ok(())
}

fn parse_bool(field: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(Error::invalid_query(
            field,
            format!("'{other}' is not a boolean"),
        )),
    }
}

fn parse_int(field: &str, value: &str) -> Result<u64> {
    value.parse::<u64>().map_err(|_| {
        Error::invalid_query(field, format!("'{value}' is not a non-negative integer"))
    })
}

fn parse_positive(field: &str, value: &str) -> Result<u64> {
    match parse_int(field, value)? {
        0 => Err(Error::invalid_query(field, "must be a positive integer")),
        n => Ok(n),
    }
}
