//! Data models
//!
//! Records as the store hands them out. Field names follow the store's
//! column names; every field is optional because partial and stale reads
//! are normal (realtime payloads, offline caches).

pub mod dining_table;
pub mod order;

// Re-exports
pub use dining_table::*;
pub use order::*;
