//! Table/order consistency detector
//!
//! Invariant restored by the returned fixes:
//! - a table pointing at order X has X open and X.table_id == table
//! - every open order's table points back at it
//! - at most one open order references a table
//!
//! Three scans over one snapshot append findings and fixes:
//! - A: each table against its own pointer
//! - B: each open order against the table it references
//! - C: tables referenced by several open orders
//!
//! Fixes are emitted in application order. Applying them (in order, or
//! after [`coalesce`](super::fix::coalesce)) and detecting again yields no
//! fixes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::models::{Order, OrderStatus, Table, TableStatus};
use shared::util::to_rfc3339;

use super::canonical::pick_canonical_open_order_for_table;
use super::finding::{Finding, FindingCode, Severity};
use super::fix::{Fix, FixSet, OrderPatch, TablePatch};
use super::snapshot::Snapshot;

/// Detector output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectReport {
    pub findings: Vec<Finding>,
    pub fixes: Vec<Fix>,
}

/// Finding counts per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl DetectReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty() && self.fixes.is_empty()
    }

    pub fn severity_counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for finding in &self.findings {
            match finding.severity {
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }

    pub fn has_code(&self, code: FindingCode) -> bool {
        self.findings.iter().any(|f| f.code == code)
    }
}

/// `(business_id, id)`: ids are only unique within a business
type RecordKey = (Option<String>, String);

/// Lookups over one snapshot. First occurrence of a duplicate key wins;
/// records without a usable id are left out.
struct SnapshotIndex<'a> {
    tables: Vec<(RecordKey, &'a Table)>,
    table_by_key: HashMap<RecordKey, &'a Table>,
    open_orders: Vec<(RecordKey, &'a Order)>,
    open_order_by_key: HashMap<RecordKey, &'a Order>,
    /// table key -> open orders referencing it, in input order
    open_orders_by_table: HashMap<RecordKey, Vec<&'a Order>>,
    /// table keys in the order their first open order appeared
    referenced_tables: Vec<RecordKey>,
}

impl<'a> SnapshotIndex<'a> {
    fn build(snapshot: &'a Snapshot) -> Self {
        let mut tables = Vec::with_capacity(snapshot.tables.len());
        let mut table_by_key = HashMap::with_capacity(snapshot.tables.len());
        for table in &snapshot.tables {
            let Some(id) = table.key() else { continue };
            let key = (table.business_id.clone(), id);
            if table_by_key.contains_key(&key) {
                continue;
            }
            table_by_key.insert(key.clone(), table);
            tables.push((key, table));
        }

        let mut open_orders = Vec::with_capacity(snapshot.open_orders.len());
        let mut open_order_by_key = HashMap::with_capacity(snapshot.open_orders.len());
        let mut open_orders_by_table: HashMap<RecordKey, Vec<&'a Order>> = HashMap::new();
        let mut referenced_tables = Vec::new();
        for order in &snapshot.open_orders {
            if order.order_status() != Some(OrderStatus::Open) {
                continue;
            }
            let Some(id) = order.key() else { continue };
            let key = (order.business_id.clone(), id);
            if open_order_by_key.contains_key(&key) {
                continue;
            }
            open_order_by_key.insert(key.clone(), order);
            open_orders.push((key, order));

            if let Some(table_id) = order.table_ref() {
                let table_key = (order.business_id.clone(), table_id);
                let group = open_orders_by_table.entry(table_key.clone()).or_default();
                if group.is_empty() {
                    referenced_tables.push(table_key);
                }
                group.push(order);
            }
        }

        Self {
            tables,
            table_by_key,
            open_orders,
            open_order_by_key,
            open_orders_by_table,
            referenced_tables,
        }
    }

    fn group_len(&self, table_key: &RecordKey) -> usize {
        self.open_orders_by_table
            .get(table_key)
            .map_or(0, Vec::len)
    }
}

struct Pass<'a> {
    index: SnapshotIndex<'a>,
    closed_at: String,
    findings: Vec<Finding>,
    fixes: FixSet,
    /// table key -> pointer after Scan A's repairs
    repaired_pointers: HashMap<RecordKey, Option<String>>,
}

impl<'a> Pass<'a> {
    fn emit(&mut self, finding: Finding, fixes: impl IntoIterator<Item = Fix>) {
        self.findings.push(finding);
        for fix in fixes {
            self.fixes.push(fix);
        }
    }

    /// Scan A: stored status vs pointer presence, then pointer validity
    fn scan_tables(&mut self) {
        let tables = std::mem::take(&mut self.index.tables);

        for (table_key, table) in &tables {
            let (business_id, table_id) = table_key;
            let business = business_id.as_deref();
            let pointer = table.order_ref();

            let desired = if pointer.is_some() {
                TableStatus::Occupied
            } else {
                TableStatus::Available
            };
            let stored = table.stored_status();
            if stored != desired.as_str() {
                self.emit(
                    Finding::new(FindingCode::TableStatusMismatch)
                        .business(business)
                        .table(table_id.as_str())
                        .statuses(stored, desired.as_str()),
                    [Fix::update_table(table_id, business, TablePatch::status(desired))],
                );
            }

            let Some(order_id) = pointer else {
                self.repaired_pointers.insert(table_key.clone(), None);
                continue;
            };

            let joined_open = table
                .orders
                .as_ref()
                .and_then(|o| o.order_status())
                == Some(OrderStatus::Open);

            let order_key = (business_id.clone(), order_id);
            let broken = match self.index.open_order_by_key.get(&order_key) {
                Some(order) if order.table_ref().as_deref() != Some(table_id.as_str()) => {
                    Some(FindingCode::TablePointsToForeignOrder)
                }
                Some(_) => None,
                None if !joined_open => Some(FindingCode::TablePointsToClosedOrMissingOrder),
                None => None,
            };
            let (_, order_id) = order_key;

            match broken {
                Some(code) => {
                    self.emit(
                        Finding::new(code)
                            .business(business)
                            .table(table_id.as_str())
                            .order(order_id),
                        [Fix::update_table(table_id, business, TablePatch::release())],
                    );
                    self.repaired_pointers.insert(table_key.clone(), None);
                }
                None => {
                    self.repaired_pointers.insert(table_key.clone(), Some(order_id));
                }
            }
        }

        self.index.tables = tables;
    }

    /// Scan B: each open order against the table it references
    fn scan_open_orders(&mut self) {
        let open_orders = std::mem::take(&mut self.index.open_orders);

        for ((business_id, order_id), order) in &open_orders {
            let Some(table_id) = order.table_ref() else { continue };
            let business = business_id.as_deref();
            let table_key = (business_id.clone(), table_id);

            if !self.index.table_by_key.contains_key(&table_key) {
                let (_, table_id) = table_key;
                self.emit(
                    Finding::new(FindingCode::OpenOrderPointsToMissingTable)
                        .business(business)
                        .table(table_id)
                        .order(order_id.as_str()),
                    [Fix::update_order(
                        order_id,
                        business,
                        OrderPatch::cancel(self.closed_at.clone()),
                    )],
                );
                continue;
            }

            // several contenders: Scan C decides
            if self.index.group_len(&table_key) > 1 {
                continue;
            }

            let code = match self.repaired_pointers.get(&table_key).cloned().flatten() {
                None => FindingCode::OpenOrderWithoutTablePointer,
                Some(pointer) if pointer != *order_id => FindingCode::OpenOrderTablePointerMismatch,
                Some(_) => continue,
            };
            let (_, table_id) = table_key;
            self.emit(
                Finding::new(code)
                    .business(business)
                    .table(table_id.as_str())
                    .order(order_id.as_str()),
                [Fix::update_table(&table_id, business, TablePatch::occupy(order_id.as_str()))],
            );
        }

        self.index.open_orders = open_orders;
    }

    /// Scan C: keep one canonical order per contested table, cancel the rest
    fn scan_conflicts(&mut self) {
        let referenced = std::mem::take(&mut self.index.referenced_tables);

        for table_key in &referenced {
            let Some(group) = self.index.open_orders_by_table.get(table_key) else {
                continue;
            };
            if group.len() < 2 {
                continue;
            }
            // missing tables were handled by Scan B
            let Some(table) = self.index.table_by_key.get(table_key).copied() else {
                continue;
            };
            let (business_id, table_id) = table_key;
            let business = business_id.as_deref();

            let pointer = table.order_ref();
            let Some(canonical) = pick_canonical_open_order_for_table(pointer.as_deref(), group)
            else {
                continue;
            };
            let Some(canonical_id) = canonical.key() else { continue };

            let contenders: Vec<String> = group.iter().filter_map(|o| o.key()).collect();

            let mut fixes = vec![Fix::update_table(
                table_id,
                business,
                TablePatch::occupy(canonical_id.as_str()),
            )];
            for loser in group.iter() {
                let Some(loser_id) = loser.key() else { continue };
                if loser_id == canonical_id {
                    continue;
                }
                fixes.push(Fix::update_order(
                    &loser_id,
                    business,
                    OrderPatch::cancel(self.closed_at.clone()),
                ));
            }

            self.emit(
                Finding::new(FindingCode::OrderTablePointerConflict)
                    .business(business)
                    .table(table_id.as_str())
                    .conflict(canonical_id, contenders),
                fixes,
            );
        }

        self.index.referenced_tables = referenced;
    }
}

/// Detect invariant violations, stamping cancellations with the current time
pub fn detect(snapshot: &Snapshot) -> DetectReport {
    detect_at(snapshot, Utc::now())
}

/// Detect invariant violations; cancelled orders get `closed_at = now`
pub fn detect_at(snapshot: &Snapshot, now: DateTime<Utc>) -> DetectReport {
    let mut pass = Pass {
        index: SnapshotIndex::build(snapshot),
        closed_at: to_rfc3339(now),
        findings: Vec::new(),
        fixes: FixSet::new(),
        repaired_pointers: HashMap::new(),
    };

    pass.scan_tables();
    pass.scan_open_orders();
    pass.scan_conflicts();

    DetectReport {
        findings: pass.findings,
        fixes: pass.fixes.into_vec(),
    }
}
