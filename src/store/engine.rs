//! DuckDB-backed stay store
//!
//! Holds the `stays` collection in a single DuckDB database (file-backed or
//! in-memory). The connection is shared behind a mutex and every call runs
//! on the blocking thread pool.

use super::types::{
    BulkWriteOutcome, FilterValue, OperationFailure, Predicate, SortDirection, StayFilter,
    StayQuery, UpsertOutcome,
};
use super::StayStore;
use crate::error::{Error, Result};
use crate::types::{
    PriceSegment, StayBase, StayKind, StayProfile, StayRecord, StaySummary, StoredStay,
};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use duckdb::types::Value;
use duckdb::{params, params_from_iter, Connection, Row};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// In-memory database marker
pub const IN_MEMORY: &str = ":memory:";

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS stays (
    external_id     VARCHAR PRIMARY KEY,
    kind            VARCHAR NOT NULL,
    city            VARCHAR NOT NULL,
    is_available    BOOLEAN NOT NULL,
    price_per_night DOUBLE  NOT NULL,
    name            VARCHAR,
    country         VARCHAR,
    price_segment   VARCHAR,
    created_at      VARCHAR NOT NULL,
    updated_at      VARCHAR NOT NULL
);";

const COLUMNS: &str = "external_id, kind, city, is_available, price_per_night, \
                       name, country, price_segment, created_at, updated_at";

const INSERT_SQL: &str = "INSERT INTO stays (external_id, kind, city, is_available, \
     price_per_night, name, country, price_segment, created_at, updated_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const UPDATE_SQL: &str = "UPDATE stays SET city = ?, is_available = ?, price_per_night = ?, \
     name = ?, country = ?, price_segment = ?, updated_at = ? WHERE external_id = ?";

/// Stay store on top of an embedded DuckDB database
#[derive(Clone)]
pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
    path: String,
}

impl DuckDbStore {
    /// Open (or create) a store at `path`; `:memory:` opens an in-memory one.
    ///
    /// The `stays` table is created if it does not exist.
    pub fn open(path: &str) -> Result<Self> {
        let conn = if path == IN_MEMORY {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| Error::store_unavailable(format!("failed to open '{path}': {e}")))?;

        conn.execute_batch(SCHEMA_SQL)?;
        info!(path, "Opened stay store");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_string(),
        })
    }

    /// Open a fresh in-memory store
    pub fn in_memory() -> Result<Self> {
        Self::open(IN_MEMORY)
    }

    /// Location of the database
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Look up a single stay by external id
    pub async fn get(&self, external_id: &str) -> Result<Option<StoredStay>> {
        let external_id = external_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {COLUMNS} FROM stays WHERE external_id = ?");
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt
                .query_map(params![external_id], StayRow::from_row)?
                .next()
                .transpose()?;
            row.map(StayRow::into_stored).transpose()
        })
        .await
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| Error::store_unavailable("connection lock poisoned"))?;
            f(&guard)
        })
        .await
        .map_err(|e| Error::store_unavailable(format!("store task failed: {e}")))?
    }
}

impl fmt::Debug for DuckDbStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuckDbStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StayStore for DuckDbStore {
    async fn ensure_schema(&self) -> Result<()> {
        self.with_conn(|conn| Ok(conn.execute_batch(SCHEMA_SQL)?))
            .await
    }

    async fn bulk_upsert(&self, records: Vec<StayRecord>) -> Result<BulkWriteOutcome> {
        if records.is_empty() {
            return Ok(BulkWriteOutcome::default());
        }
        self.with_conn(move |conn| bulk_upsert_rows(conn, &records))
            .await
    }

    async fn upsert(&self, record: StayRecord) -> Result<UpsertOutcome> {
        record.validate()?;
        self.with_conn(move |conn| {
            let existing = existing_kinds(conn, &[record.external_id()])?;
            upsert_row(conn, &record, existing.get(record.external_id()).copied(), &now())
        })
        .await
    }

    async fn count(&self, filter: &StayFilter) -> Result<u64> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let (clause, params) = where_clause(&filter);
            let sql = format!("SELECT COUNT(*) FROM stays{clause}");
            let total: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| {
                row.get(0)
            })?;
            Ok(u64::try_from(total).unwrap_or_default())
        })
        .await
    }

    async fn find(&self, query: &StayQuery) -> Result<Vec<StoredStay>> {
        let query = query.clone();
        self.with_conn(move |conn| {
            let (clause, params) = where_clause(&query.filter);
            let sql = format!(
                "SELECT {COLUMNS} FROM stays{clause} ORDER BY {} {}, external_id ASC \
                 LIMIT {} OFFSET {}",
                query.sort.field.column(),
                order(query.sort.direction),
                query.limit,
                query.skip
            );
            debug!(sql = %sql, params = params.len(), "Executing find");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), StayRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(StayRow::into_stored).collect()
        })
        .await
    }
}

// ============================================================================
// Writes
// ============================================================================

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Apply every operation independently and tally the outcome
fn bulk_upsert_rows(conn: &Connection, records: &[StayRecord]) -> Result<BulkWriteOutcome> {
    let ids: Vec<&str> = records.iter().map(StayRecord::external_id).collect();
    let mut kinds = existing_kinds(conn, &ids)?;
    let timestamp = now();
    let mut outcome = BulkWriteOutcome::default();

    for (index, record) in records.iter().enumerate() {
        let external_id = record.external_id();
        let result = record.validate().and_then(|()| {
            upsert_row(conn, record, kinds.get(external_id).copied(), &timestamp)
        });

        match result {
            Ok(applied) => {
                kinds.insert(external_id.to_string(), record.kind());
                outcome.record(applied);
            }
            Err(e) => outcome.failed.push(OperationFailure {
                index,
                external_id: external_id.to_string(),
                message: e.to_string(),
            }),
        }
    }

    Ok(outcome)
}

/// Kinds already stored for the given ids
fn existing_kinds(conn: &Connection, ids: &[&str]) -> Result<HashMap<String, StayKind>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("SELECT external_id, kind FROM stays WHERE external_id IN ({placeholders})");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, kind)| {
            let kind = parse_column::<StayKind>(&id, &kind)?;
            Ok((id, kind))
        })
        .collect()
}

fn upsert_row(
    conn: &Connection,
    record: &StayRecord,
    existing: Option<StayKind>,
    timestamp: &str,
) -> Result<UpsertOutcome> {
    let base = record.base();
    let (name, country, segment) = match record {
        StayRecord::Profile(p) => (p.name.as_deref(), p.country.as_deref(), None),
        StayRecord::Summary(s) => (None, None, Some(s.price_segment.as_str())),
    };

    match existing {
        None => {
            let mut stmt = conn.prepare_cached(INSERT_SQL)?;
            stmt.execute(params![
                base.external_id,
                record.kind().as_str(),
                base.city,
                base.is_available,
                base.price_per_night,
                name,
                country,
                segment,
                timestamp,
                timestamp,
            ])?;
            Ok(UpsertOutcome::Inserted)
        }
        Some(kind) if kind == record.kind() => {
            let mut stmt = conn.prepare_cached(UPDATE_SQL)?;
            stmt.execute(params![
                base.city,
                base.is_available,
                base.price_per_night,
                name,
                country,
                segment,
                timestamp,
                base.external_id,
            ])?;
            Ok(UpsertOutcome::Updated)
        }
        Some(kind) => Err(Error::validation(
            "kind",
            format!(
                "'{}' is stored as {kind} and cannot become {}",
                base.external_id,
                record.kind()
            ),
        )),
    }
}

// ============================================================================
// Reads
// ============================================================================

fn order(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => "ASC NULLS FIRST",
        SortDirection::Desc => "DESC NULLS LAST",
    }
}

/// RE2 pattern matching `term` as whole words, case-folded
///
/// A word is a run of letters and digits, so `par` does not match `Paris`
/// while `stay p3` matches `Stay P3 (garden)`.
fn word_pattern(term: &str) -> String {
    format!(
        r"(^|[^\pL\pN]){}($|[^\pL\pN])",
        regex::escape(&term.to_lowercase())
    )
}

/// Render a filter as a `WHERE` clause with positional parameters
fn where_clause(filter: &StayFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::with_capacity(filter.predicates.len());
    let mut params = Vec::new();

    for predicate in &filter.predicates {
        match predicate {
            Predicate::Text { terms } => {
                if terms.is_empty() {
                    continue;
                }
                let mut alternatives = Vec::with_capacity(terms.len() * 3);
                for term in terms {
                    let pattern = word_pattern(term);
                    for column in ["name", "city", "country"] {
                        alternatives.push(format!(
                            "regexp_matches(lower(coalesce({column}, '')), ?)"
                        ));
                        params.push(Value::Text(pattern.clone()));
                    }
                }
                clauses.push(format!("({})", alternatives.join(" OR ")));
            }
            Predicate::Eq { field, value } => {
                clauses.push(format!("{} = ?", field.column()));
                params.push(match value {
                    FilterValue::Text(s) => Value::Text(s.clone()),
                    FilterValue::Bool(b) => Value::Boolean(*b),
                });
            }
            Predicate::PriceRange { min, max } => {
                let mut bounds = Vec::with_capacity(2);
                if let Some(min) = min {
                    bounds.push("price_per_night >= ?");
                    params.push(Value::Double(*min));
                }
                if let Some(max) = max {
                    bounds.push("price_per_night <= ?");
                    params.push(Value::Double(*max));
                }
                if !bounds.is_empty() {
                    clauses.push(format!("({})", bounds.join(" AND ")));
                }
            }
        }
    }

    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

/// Raw column values of one `stays` row
struct StayRow {
    external_id: String,
    kind: String,
    city: String,
    is_available: bool,
    price_per_night: f64,
    name: Option<String>,
    country: Option<String>,
    price_segment: Option<String>,
    created_at: String,
    updated_at: String,
}

impl StayRow {
    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            external_id: row.get(0)?,
            kind: row.get(1)?,
            city: row.get(2)?,
            is_available: row.get(3)?,
            price_per_night: row.get(4)?,
            name: row.get(5)?,
            country: row.get(6)?,
            price_segment: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_stored(self) -> Result<StoredStay> {
        let base = StayBase {
            external_id: self.external_id,
            city: self.city,
            is_available: self.is_available,
            price_per_night: self.price_per_night,
        };

        let record = match parse_column::<StayKind>(&base.external_id, &self.kind)? {
            StayKind::Profile => StayRecord::Profile(StayProfile {
                base,
                name: self.name,
                country: self.country,
            }),
            StayKind::Summary => {
                let segment = self.price_segment.ok_or_else(|| Error::CorruptRecord {
                    external_id: base.external_id.clone(),
                    message: "summary has no price segment".to_string(),
                })?;
                let price_segment = parse_column::<PriceSegment>(&base.external_id, &segment)?;
                StayRecord::Summary(StaySummary {
                    base,
                    price_segment,
                })
            }
        };

        Ok(StoredStay {
            record,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Parse a stored enum column; bad values are a store fault, not caller input
fn parse_column<T>(external_id: &str, value: &str) -> Result<T>
where
    T: FromStr<Err = Error>,
{
    value.parse::<T>().map_err(|e| Error::CorruptRecord {
        external_id: external_id.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::StayField;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_where_clause_empty() {
        let (clause, params) = where_clause(&StayFilter::new());
        assert_eq!(clause, "");
        assert!(params.is_empty());
    }

    #[test]
    fn test_where_clause_combines_with_and() {
        let filter = StayFilter::new()
            .eq(StayField::City, "Paris")
            .eq(StayField::IsAvailable, true)
            .and(Predicate::PriceRange {
                min: Some(100.0),
                max: Some(200.0),
            });

        let (clause, params) = where_clause(&filter);
        assert_eq!(
            clause,
            " WHERE city = ? AND is_available = ? AND \
             (price_per_night >= ? AND price_per_night <= ?)"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_where_clause_text_terms() {
        let filter = StayFilter::new().and(Predicate::Text {
            terms: vec!["Loft".to_string(), "paris".to_string()],
        });

        let (clause, params) = where_clause(&filter);
        assert_eq!(clause.matches("regexp_matches(").count(), 6);
        assert_eq!(clause.matches(" OR ").count(), 5);
        assert_eq!(
            params[0],
            Value::Text(r"(^|[^\pL\pN])loft($|[^\pL\pN])".to_string())
        );
    }

    #[test]
    fn test_word_pattern_escapes_terms() {
        let pattern = regex::Regex::new(&word_pattern("St.Tropez")).unwrap();
        assert!(pattern.is_match("villa st.tropez"));
        assert!(!pattern.is_match("villa st-tropez"));

        let pattern = regex::Regex::new(&word_pattern("par")).unwrap();
        assert!(pattern.is_match("par avion"));
        assert!(!pattern.is_match("paris"));
        assert!(!pattern.is_match("compare"));
    }

    #[test]
    fn test_where_clause_open_range() {
        let filter = StayFilter::new().and(Predicate::PriceRange {
            min: None,
            max: Some(50.0),
        });
        let (clause, params) = where_clause(&filter);
        assert_eq!(clause, " WHERE (price_per_night <= ?)");
        assert_eq!(params, vec![Value::Double(50.0)]);
    }

    #[tokio::test]
    async fn test_unreadable_row_is_a_store_fault() {
        let store = DuckDbStore::in_memory().unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO stays (external_id, kind, city, is_available, price_per_night, \
                     created_at, updated_at) VALUES ('x1', 'Listing', 'Paris', true, 10, 'now', 'now')",
                    params![],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store.get("x1").await.unwrap_err();
        assert!(matches!(
            &err,
            Error::CorruptRecord { external_id, .. } if external_id == "x1"
        ));
        assert!(!err.is_client_error());

        let query = crate::query::build_query(&crate::query::QuerySpec::default());
        let err = store.find(&query).await.unwrap_err();
        assert!(matches!(err, Error::CorruptRecord { .. }));
    }

    #[test]
    fn test_store_debug() {
        let store = DuckDbStore::in_memory().unwrap();
        let debug_str = format!("{store:?}");
        assert!(debug_str.contains("DuckDbStore"));
        assert!(debug_str.contains(":memory:"));
    }
}
