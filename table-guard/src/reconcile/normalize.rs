//! Table status normalizer
//!
//! Decides what a single table record should render as when it arrives on
//! its own (realtime payload, cache hydration). Pure; malformed input
//! degrades to an available table without an order.

use serde::{Deserialize, Serialize};
use shared::models::{EmbeddedOrder, OrderStatus, Table, TableStatus};

/// Render-ready view of a table
///
/// Never carries an order pointer or snapshot while `Available`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub id: Option<String>,
    pub business_id: Option<String>,
    pub status: TableStatus,
    pub current_order_id: Option<String>,
    pub orders: Option<EmbeddedOrder>,
}

impl NormalizedTable {
    pub fn is_occupied(&self) -> bool {
        self.status == TableStatus::Occupied
    }
}

/// Normalize one table record.
///
/// The order is dropped when any of these hold:
/// - the stored status already says available (a freed table must not get
///   its order back from a stale local snapshot)
/// - there is no usable `current_order_id`
/// - the embedded order is closed or cancelled
/// - the embedded order was loaded with zero items and is not reported open
pub fn normalize(table: &Table) -> NormalizedTable {
    let raw_status = TableStatus::normalize(table.status.as_deref());
    let order_ref = table.order_ref();

    let embedded_status = table.orders.as_ref().and_then(EmbeddedOrder::order_status);
    let has_explicit_empty_items = table
        .orders
        .as_ref()
        .is_some_and(EmbeddedOrder::has_explicit_empty_items);
    let is_closed_order = embedded_status.is_some_and(|s| s.is_terminal());
    let has_current_order = order_ref.is_some();

    // an order that was just opened has no items yet and stays on the table
    let empty_items_clear = has_explicit_empty_items && embedded_status != Some(OrderStatus::Open);

    let should_clear_order = raw_status == TableStatus::Available
        || !has_current_order
        || is_closed_order
        || empty_items_clear;

    if should_clear_order {
        NormalizedTable {
            id: table.id.clone(),
            business_id: table.business_id.clone(),
            status: TableStatus::Available,
            current_order_id: None,
            orders: None,
        }
    } else {
        NormalizedTable {
            id: table.id.clone(),
            business_id: table.business_id.clone(),
            status: TableStatus::Occupied,
            current_order_id: order_ref,
            orders: table.orders.clone(),
        }
    }
}
