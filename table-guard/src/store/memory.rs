//! In-memory store
//!
//! Backs `watch` mode and tests. Records are keyed by `(business_id, id)`
//! and listed in insertion order. Every successful write stamps a fresh
//! `updated_at`, so guarded writes against an older snapshot are rejected.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::DateTime;
use dashmap::DashMap;
use shared::models::{EmbeddedOrder, Order, Table};
use shared::util::{normalize_ref, now_millis, now_rfc3339, to_rfc3339};

use super::{StoreError, StoreResult, TableOrderStore};
use crate::reconcile::{OrderPatch, OrderTarget, Snapshot, TablePatch, TableTarget};

type RecordKey = (Option<String>, String);

#[derive(Debug, Clone)]
struct Stored<T> {
    seq: u64,
    record: T,
}

/// DashMap-backed [`TableOrderStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<RecordKey, Stored<Table>>,
    orders: DashMap<RecordKey, Stored<Order>>,
    seq: AtomicU64,
    last_write_millis: AtomicI64,
}

fn matches_business(filter: Option<&str>, business_id: &Option<String>) -> bool {
    filter.is_none_or(|b| business_id.as_deref() == Some(b))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a snapshot. The first record with a given key wins; records
    /// without an id are skipped.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let store = Self::new();
        for table in &snapshot.tables {
            store.insert_table(table.clone());
        }
        for order in &snapshot.open_orders {
            store.insert_order(order.clone());
        }
        store
    }

    /// Insert a table unless one with the same key exists
    pub fn insert_table(&self, table: Table) -> bool {
        let Some(id) = table.key() else {
            tracing::warn!(target: "reconcile", "Skipping table without id");
            return false;
        };
        let key = (table.business_id.clone(), id);
        if self.tables.contains_key(&key) {
            return false;
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.tables.insert(key, Stored { seq, record: table });
        true
    }

    /// Insert an order (any status) unless one with the same key exists
    pub fn insert_order(&self, order: Order) -> bool {
        let Some(id) = order.key() else {
            tracing::warn!(target: "reconcile", "Skipping order without id");
            return false;
        };
        let key = (order.business_id.clone(), id);
        if self.orders.contains_key(&key) {
            return false;
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.orders.insert(key, Stored { seq, record: order });
        true
    }

    /// Stored table as written, without the order join
    pub fn get_table(&self, business_id: Option<&str>, table_id: &str) -> Option<Table> {
        self.tables
            .get(&(business_id.map(str::to_string), table_id.to_string()))
            .map(|s| s.record.clone())
    }

    pub fn get_order(&self, business_id: Option<&str>, order_id: &str) -> Option<Order> {
        self.orders
            .get(&(business_id.map(str::to_string), order_id.to_string()))
            .map(|s| s.record.clone())
    }

    /// Current state as a snapshot, all businesses
    pub fn dump(&self) -> Snapshot {
        Snapshot::new(self.joined_tables(None), self.open_orders(None))
    }

    /// Strictly increasing `updated_at` value, one millisecond apart at least
    fn next_revision(&self) -> String {
        let now = now_millis();
        let prev = self
            .last_write_millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        DateTime::from_timestamp_millis(now.max(prev + 1))
            .map(to_rfc3339)
            .unwrap_or_else(now_rfc3339)
    }

    /// Re-join the order a table points at, the way the store's read query
    /// does: a pointer to a row that does not exist joins to nothing.
    fn join(&self, table: &mut Table) {
        let Some(order_id) = table.order_ref() else {
            return;
        };
        let Some(order) = self
            .orders
            .get(&(table.business_id.clone(), order_id.clone()))
            .map(|s| s.record.clone())
        else {
            table.orders = None;
            return;
        };

        let embedded = table
            .orders
            .take()
            .filter(|e| normalize_ref(e.id.as_deref()).is_none_or(|id| id == order_id));
        let mut embedded = embedded.unwrap_or_else(|| EmbeddedOrder::from(&order));
        embedded.id = order.id.clone();
        embedded.status = order.status.clone();
        embedded.table_id = order.table_id.clone();
        table.orders = Some(embedded);
    }

    fn joined_tables(&self, business_id: Option<&str>) -> Vec<Table> {
        let mut rows: Vec<(u64, Table)> = self
            .tables
            .iter()
            .filter(|e| matches_business(business_id, &e.key().0))
            .map(|e| (e.seq, e.record.clone()))
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter()
            .map(|(_, mut table)| {
                self.join(&mut table);
                table
            })
            .collect()
    }

    fn open_orders(&self, business_id: Option<&str>) -> Vec<Order> {
        let mut rows: Vec<(u64, Order)> = self
            .orders
            .iter()
            .filter(|e| matches_business(business_id, &e.key().0) && e.record.is_open())
            .map(|e| (e.seq, e.record.clone()))
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, order)| order).collect()
    }
}

#[async_trait]
impl TableOrderStore for MemoryStore {
    async fn list_tables(&self, business_id: Option<&str>) -> StoreResult<Vec<Table>> {
        Ok(self.joined_tables(business_id))
    }

    async fn list_open_orders(&self, business_id: Option<&str>) -> StoreResult<Vec<Order>> {
        Ok(self.open_orders(business_id))
    }

    async fn update_table(
        &self,
        target: &TableTarget,
        patch: &TablePatch,
        expected_updated_at: Option<&str>,
    ) -> StoreResult<()> {
        let key = (target.business_id.clone(), target.table_id.clone());
        let revision = self.next_revision();
        let mut entry = self
            .tables
            .get_mut(&key)
            .ok_or_else(|| StoreError::TableNotFound(target.table_id.clone()))?;
        let table = &mut entry.record;

        if let Some(expected) = expected_updated_at
            && table.updated_at.as_deref() != Some(expected)
        {
            return Err(StoreError::Stale {
                kind: "table",
                id: target.table_id.clone(),
            });
        }

        if let Some(status) = patch.status {
            table.status = Some(status.as_str().to_string());
        }
        if let Some(pointer) = &patch.current_order_id {
            if normalize_ref(pointer.as_deref()) != table.order_ref() {
                table.orders = None;
            }
            table.current_order_id = pointer.clone();
        }
        table.updated_at = Some(revision);
        Ok(())
    }

    async fn update_order(
        &self,
        target: &OrderTarget,
        patch: &OrderPatch,
        expected_updated_at: Option<&str>,
    ) -> StoreResult<()> {
        let key = (target.business_id.clone(), target.order_id.clone());
        let revision = self.next_revision();
        let mut entry = self
            .orders
            .get_mut(&key)
            .ok_or_else(|| StoreError::OrderNotFound(target.order_id.clone()))?;
        let order = &mut entry.record;

        if let Some(expected) = expected_updated_at
            && order.updated_at.as_deref() != Some(expected)
        {
            return Err(StoreError::Stale {
                kind: "order",
                id: target.order_id.clone(),
            });
        }

        if let Some(status) = patch.status {
            order.status = Some(status.as_str().to_string());
        }
        if let Some(closed_at) = &patch.closed_at {
            order.closed_at = Some(closed_at.clone());
        }
        if let Some(table_id) = &patch.table_id {
            order.table_id = table_id.clone();
        }
        order.updated_at = Some(revision);
        Ok(())
    }
}
