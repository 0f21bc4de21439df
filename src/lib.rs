// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Stay Harvester
//!
//! Streams stay listings from a remote provider into a local DuckDB store
//! and serves filtered, paginated search over them.
//!
//! ## Features
//!
//! - **Streaming Ingest**: top-level JSON arrays are decoded element by element
//! - **Resilient Fetch**: retries with exponential backoff, jitter and `Retry-After`
//! - **Idempotent Upserts**: records are keyed by external id, re-harvests update in place
//! - **Search**: filters, free text, sorting and pagination over stored stays
//! - **Scheduling**: fixed-interval harvest cycles with cancellation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stay_harvester::harvest::Harvester;
//! use stay_harvester::http::{HttpClient, HttpClientConfig};
//! use stay_harvester::query::{QueryEngine, SearchParams};
//! use stay_harvester::store::DuckDbStore;
//!
//! #[tokio::main]
//! async fn main() -> stay_harvester::Result<()> {
//!     let store = DuckDbStore::open("stays.duckdb")?;
//!     let client = HttpClient::with_config(
//!         HttpClientConfig::builder()
//!             .base_url("https://provider.example.com/data")
//!             .build(),
//!     )?;
//!
//!     let report = Harvester::new(client, store.clone()).harvest().await?;
//!     println!("harvested {} records", report.total_records());
//!
//!     let spec = SearchParams {
//!         city: Some("Paris".into()),
//!         ..SearchParams::default()
//!     }
//!     .validate()?;
//!     let page = QueryEngine::new(store).search(&spec).await?;
//!     println!("{} matches", page.total);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   bytes   ┌──────────┐ elements ┌───────────┐ batches ┌──────────┐
//! │   http   │ ────────▶ │  decode  │ ───────▶ │  harvest  │ ──────▶ │   sink   │
//! │  (fetch) │           │ (array)  │          │  (batch)  │         │ (upsert) │
//! └──────────┘           └──────────┘          └───────────┘         └────┬─────┘
//!                                                                         │
//! ┌──────────┐  request  ┌──────────┐   read   ┌───────────┐              │
//! │  server  │ ────────▶ │  query   │ ───────▶ │   store   │ ◀────────────┘
//! │  (axum)  │           │ (engine) │          │ (DuckDB)  │
//! └──────────┘           └──────────┘          └───────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the harvester
pub mod error;

/// Stay records and raw provider shapes
pub mod types;

/// Remote provider client with retry
pub mod http;

/// Streaming JSON array decoder
pub mod decode;

/// Batch accumulation and the harvest entry point
pub mod harvest;

/// Document store backed by DuckDB
pub mod store;

/// Normalization and upserts into the store
pub mod sink;

/// Search over stored stays
pub mod query;

/// Fixed-interval harvest trigger
pub mod scheduler;

/// Service configuration
pub mod config;

/// HTTP query surface
pub mod server;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use config::AppConfig;
pub use harvest::{HarvestReport, HarvestStats, Harvester};
pub use query::{QueryEngine, QuerySpec, SearchParams};
pub use store::{DuckDbStore, StayStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
