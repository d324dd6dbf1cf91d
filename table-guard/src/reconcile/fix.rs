//! Corrective operations
//!
//! A [`Fix`] is one field-level update against one record. Fixes compare
//! structurally (typed payloads, derived `Eq + Hash`), so the same update
//! detected from two angles collapses into a single entry regardless of
//! field order.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use shared::models::{OrderStatus, TableStatus};
use shared::util::double_option;

/// Addresses one table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableTarget {
    pub table_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
}

/// Addresses one order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTarget {
    pub order_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
}

/// Partial table update
///
/// `current_order_id`: `None` leaves the field alone, `Some(None)` writes null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TablePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TableStatus>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub current_order_id: Option<Option<String>>,
}

impl TablePatch {
    /// Only correct the stored status
    pub fn status(status: TableStatus) -> Self {
        Self {
            status: Some(status),
            current_order_id: None,
        }
    }

    /// Drop the order pointer and free the table
    pub fn release() -> Self {
        Self {
            status: Some(TableStatus::Available),
            current_order_id: Some(None),
        }
    }

    /// Point the table at `order_id` and mark it occupied
    pub fn occupy(order_id: impl Into<String>) -> Self {
        Self {
            status: Some(TableStatus::Occupied),
            current_order_id: Some(Some(order_id.into())),
        }
    }

    /// Overlay `later` on top of `self`
    pub fn merge(&mut self, later: &TablePatch) {
        if later.status.is_some() {
            self.status = later.status;
        }
        if later.current_order_id.is_some() {
            self.current_order_id = later.current_order_id.clone();
        }
    }
}

/// Partial order update
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub table_id: Option<Option<String>>,
}

impl OrderPatch {
    /// Force-close an order and detach it from its table
    pub fn cancel(closed_at: impl Into<String>) -> Self {
        Self {
            status: Some(OrderStatus::Cancelled),
            closed_at: Some(closed_at.into()),
            table_id: Some(None),
        }
    }

    /// Overlay `later` on top of `self`
    pub fn merge(&mut self, later: &OrderPatch) {
        if later.status.is_some() {
            self.status = later.status;
        }
        if later.closed_at.is_some() {
            self.closed_at = later.closed_at.clone();
        }
        if later.table_id.is_some() {
            self.table_id = later.table_id.clone();
        }
    }
}

/// One corrective operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fix {
    UpdateTable {
        target: TableTarget,
        payload: TablePatch,
    },
    UpdateOrder {
        target: OrderTarget,
        payload: OrderPatch,
    },
}

/// Record identity of a fix target, used for coalescing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FixKey {
    Table(Option<String>, String),
    Order(Option<String>, String),
}

impl Fix {
    pub fn update_table(table_id: &str, business_id: Option<&str>, payload: TablePatch) -> Self {
        Self::UpdateTable {
            target: TableTarget {
                table_id: table_id.to_string(),
                business_id: business_id.map(str::to_string),
            },
            payload,
        }
    }

    pub fn update_order(order_id: &str, business_id: Option<&str>, payload: OrderPatch) -> Self {
        Self::UpdateOrder {
            target: OrderTarget {
                order_id: order_id.to_string(),
                business_id: business_id.map(str::to_string),
            },
            payload,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpdateTable { .. } => "update_table",
            Self::UpdateOrder { .. } => "update_order",
        }
    }

    pub fn key(&self) -> FixKey {
        match self {
            Self::UpdateTable { target, .. } => {
                FixKey::Table(target.business_id.clone(), target.table_id.clone())
            }
            Self::UpdateOrder { target, .. } => {
                FixKey::Order(target.business_id.clone(), target.order_id.clone())
            }
        }
    }

    /// Id of the record this fix writes to
    pub fn target_id(&self) -> &str {
        match self {
            Self::UpdateTable { target, .. } => &target.table_id,
            Self::UpdateOrder { target, .. } => &target.order_id,
        }
    }
}

/// Insertion-ordered set of fixes
///
/// The first occurrence of a fix keeps its position; later identical ones
/// are dropped.
#[derive(Debug, Clone, Default)]
pub struct FixSet {
    fixes: Vec<Fix>,
    seen: HashSet<Fix>,
}

impl FixSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fix; returns false if an identical fix was already present
    pub fn push(&mut self, fix: Fix) -> bool {
        if self.seen.contains(&fix) {
            return false;
        }
        self.seen.insert(fix.clone());
        self.fixes.push(fix);
        true
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    pub fn into_vec(self) -> Vec<Fix> {
        self.fixes
    }
}

/// Merge all fixes on the same record into one update per record.
///
/// Fixes are meant to be applied in order; later fields win. The result
/// keeps the order in which each record was first targeted and can be
/// applied in any order, one write per record.
pub fn coalesce(fixes: &[Fix]) -> Vec<Fix> {
    let mut merged: Vec<Fix> = Vec::new();
    let mut index: HashMap<FixKey, usize> = HashMap::new();

    for fix in fixes {
        let key = fix.key();
        match index.get(&key) {
            Some(&pos) => match (&mut merged[pos], fix) {
                (Fix::UpdateTable { payload, .. }, Fix::UpdateTable { payload: later, .. }) => {
                    payload.merge(later)
                }
                (Fix::UpdateOrder { payload, .. }, Fix::UpdateOrder { payload: later, .. }) => {
                    payload.merge(later)
                }
                // keys encode the kind, so mismatched pairs cannot share a slot
                _ => {}
            },
            None => {
                index.insert(key, merged.len());
                merged.push(fix.clone());
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fix_wire_shape() {
        let fix = Fix::update_table("t1", Some("b1"), TablePatch::release());
        let value = serde_json::to_value(&fix).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "update_table",
                "target": {"tableId": "t1", "businessId": "b1"},
                "payload": {"status": "available", "current_order_id": null}
            })
        );
    }

    #[test]
    fn test_order_fix_wire_shape() {
        let fix = Fix::update_order("o1", None, OrderPatch::cancel("2024-05-01T12:00:00.000Z"));
        let value = serde_json::to_value(&fix).unwrap();
        assert_eq!(value["type"], "update_order");
        assert_eq!(value["target"]["orderId"], "o1");
        assert_eq!(value["payload"]["status"], "cancelled");
        assert_eq!(value["payload"]["table_id"], json!(null));
        assert_eq!(value["payload"]["closed_at"], "2024-05-01T12:00:00.000Z");
    }

    #[test]
    fn test_patch_null_vs_absent_roundtrip() {
        let status_only: TablePatch = serde_json::from_str(r#"{"status":"occupied"}"#).unwrap();
        assert_eq!(status_only, TablePatch::status(TableStatus::Occupied));

        let cleared: TablePatch =
            serde_json::from_str(r#"{"status":"available","current_order_id":null}"#).unwrap();
        assert_eq!(cleared, TablePatch::release());
    }

    #[test]
    fn test_fixset_dedup_is_structural() {
        let mut set = FixSet::new();
        assert!(set.push(Fix::update_table("t1", None, TablePatch::occupy("o1"))));
        // same fields, built in a different order
        let mut patch = TablePatch::default();
        patch.current_order_id = Some(Some("o1".to_string()));
        patch.status = Some(TableStatus::Occupied);
        assert!(!set.push(Fix::update_table("t1", None, patch)));
        assert!(set.push(Fix::update_table("t1", Some("b1"), TablePatch::occupy("o1"))));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_coalesce_later_fields_win() {
        let fixes = vec![
            Fix::update_table("t1", None, TablePatch::status(TableStatus::Occupied)),
            Fix::update_order("o9", None, OrderPatch::cancel("now")),
            Fix::update_table("t1", None, TablePatch::release()),
            Fix::update_table("t1", None, TablePatch::occupy("o2")),
        ];
        let merged = coalesce(&fixes);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], Fix::update_table("t1", None, TablePatch::occupy("o2")));
        assert_eq!(merged[1].kind(), "update_order");
    }

    #[test]
    fn test_coalesce_keeps_businesses_apart() {
        let fixes = vec![
            Fix::update_table("t1", Some("b1"), TablePatch::release()),
            Fix::update_table("t1", Some("b2"), TablePatch::occupy("o1")),
        ];
        assert_eq!(coalesce(&fixes).len(), 2);
    }
}
