//! CLI module
//!
//! Command-line interface for the harvester.
//!
//! # Commands
//!
//! - `serve` - Serve the search API and run scheduled harvests
//! - `harvest` - Run one harvest cycle
//! - `search` - Query the local store
//! - `init-store` - Create the stays table

mod commands;
mod runner;

pub use commands::{Cli, Commands, ResourceArg, SearchArgs};
pub use runner::Runner;
