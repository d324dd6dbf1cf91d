//! Store access for reconciliation passes
//!
//! The reconciler reads tables (with the store's join of the current order)
//! and open orders, then writes field-level patches back. Writes may carry
//! the `updated_at` value seen in the snapshot; a store that supports it
//! rejects the write when the record changed in between.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use shared::error::AppError;
use shared::models::{Order, Table};
use thiserror::Error;

use crate::reconcile::{OrderPatch, OrderTarget, Snapshot, TablePatch, TableTarget};

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("{kind} {id} changed since snapshot")]
    Stale { kind: &'static str, id: String },

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TableNotFound(id) => AppError::table_not_found(id),
            StoreError::OrderNotFound(id) => AppError::order_not_found(id),
            StoreError::Stale { kind, id } => AppError::stale_write(kind, id),
            StoreError::Database(msg) => AppError::database(msg),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Tables and orders of one or more businesses
///
/// `business_id = None` means every business the store holds.
#[async_trait]
pub trait TableOrderStore: Send + Sync {
    /// Tables with the current order joined into `orders`
    async fn list_tables(&self, business_id: Option<&str>) -> StoreResult<Vec<Table>>;

    /// Orders whose status is open
    async fn list_open_orders(&self, business_id: Option<&str>) -> StoreResult<Vec<Order>>;

    /// Apply a table patch. With `expected_updated_at`, the write only
    /// happens if the record still carries that value.
    async fn update_table(
        &self,
        target: &TableTarget,
        patch: &TablePatch,
        expected_updated_at: Option<&str>,
    ) -> StoreResult<()>;

    /// Apply an order patch, guarded like [`update_table`](Self::update_table)
    async fn update_order(
        &self,
        target: &OrderTarget,
        patch: &OrderPatch,
        expected_updated_at: Option<&str>,
    ) -> StoreResult<()>;

    /// Read a snapshot for one detection pass
    async fn snapshot(&self, business_id: Option<&str>) -> StoreResult<Snapshot> {
        let tables = self.list_tables(business_id).await?;
        let open_orders = self.list_open_orders(business_id).await?;
        Ok(Snapshot::new(tables, open_orders))
    }
}
