//! Shared types for the table-guard workspace
//!
//! Record types for tables and orders as they arrive from the store,
//! the error-code system, and small time/serde utilities used by every
//! crate that reads or writes those records.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{AppError, AppResult, ErrorCategory, ErrorCode};
pub use models::{EmbeddedOrder, Order, OrderStatus, Table, TableStatus};
