//! Streaming decoder module
//!
//! Decodes a top-level JSON array from a byte stream one element at a time.
//!
//! # Overview
//!
//! The provider serves each resource as a single JSON array of unknown
//! length. [`JsonArrayStream`] yields each element as soon as its last byte
//! arrives, handling elements split across chunk boundaries, and never holds
//! sibling elements in memory.

mod scanner;
mod stream;

pub use scanner::ArrayScanner;
pub use stream::JsonArrayStream;
