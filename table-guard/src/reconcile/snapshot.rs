//! Point-in-time view of tables and open orders
//!
//! A snapshot may span several businesses; records are identified by
//! `(business_id, id)`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult};
use shared::models::{EmbeddedOrder, Order, Table};
use shared::util::normalize_ref;

use super::fix::Fix;

/// Input to the detector
///
/// `open_orders` is what the caller believes is open; the detector checks
/// each record's status again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default, rename = "openOrders", alias = "open_orders")]
    pub open_orders: Vec<Order>,
}

fn same_business(target: Option<&str>, record: Option<&str>) -> bool {
    target == record
}

impl Snapshot {
    pub fn new(tables: Vec<Table>, open_orders: Vec<Order>) -> Self {
        Self {
            tables,
            open_orders,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.open_orders.is_empty()
    }

    pub fn from_json(json: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a snapshot file
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::snapshot(format!("Failed to read {}: {}", path.display(), e))
                .with_detail("path", path.display().to_string())
        })?;
        Self::from_json(&raw)
    }

    /// Apply fixes in order, the way a store applying them one by one would.
    ///
    /// Records are matched by business and id.
    /// A table whose pointer changes gets its embedded order re-joined from
    /// `open_orders`; an order update is mirrored into embedded snapshots of
    /// tables pointing at it.
    pub fn apply_fixes(&mut self, fixes: &[Fix]) {
        for fix in fixes {
            match fix {
                Fix::UpdateTable { target, payload } => {
                    let orders = &self.open_orders;
                    let business = target.business_id.as_deref();
                    for table in self.tables.iter_mut().filter(|t| {
                        t.key().as_deref() == Some(target.table_id.as_str())
                            && same_business(target.business_id.as_deref(), t.business_id.as_deref())
                    }) {
                        if let Some(status) = payload.status {
                            table.status = Some(status.as_str().to_string());
                        }
                        if let Some(pointer) = &payload.current_order_id {
                            let next = normalize_ref(pointer.as_deref());
                            if next != table.order_ref() {
                                table.orders = next.as_deref().and_then(|id| {
                                    orders
                                        .iter()
                                        .find(|o| {
                                            o.key().as_deref() == Some(id)
                                                && same_business(business, o.business_id.as_deref())
                                        })
                                        .map(EmbeddedOrder::from)
                                });
                            }
                            table.current_order_id = pointer.clone();
                        }
                    }
                }
                Fix::UpdateOrder { target, payload } => {
                    for order in self.open_orders.iter_mut().filter(|o| {
                        o.key().as_deref() == Some(target.order_id.as_str())
                            && same_business(target.business_id.as_deref(), o.business_id.as_deref())
                    }) {
                        if let Some(status) = payload.status {
                            order.status = Some(status.as_str().to_string());
                        }
                        if let Some(closed_at) = &payload.closed_at {
                            order.closed_at = Some(closed_at.clone());
                        }
                        if let Some(table_id) = &payload.table_id {
                            order.table_id = table_id.clone();
                        }
                    }

                    let business = target.business_id.as_deref();
                    let Some(updated) = self.open_orders.iter().find(|o| {
                        o.key().as_deref() == Some(target.order_id.as_str())
                            && same_business(business, o.business_id.as_deref())
                    }) else {
                        continue;
                    };
                    for table in self.tables.iter_mut().filter(|t| {
                        t.order_ref().as_deref() == Some(target.order_id.as_str())
                            && same_business(business, t.business_id.as_deref())
                    }) {
                        if let Some(embedded) = table.orders.as_mut() {
                            embedded.status = updated.status.clone();
                            embedded.table_id = updated.table_id.clone();
                        }
                    }
                }
            }
        }
    }
}
