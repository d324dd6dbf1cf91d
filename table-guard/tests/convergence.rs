//! Property tests: detector convergence and normalizer invariants
//!
//! Snapshots are drawn from small id pools so that duplicates, conflicts,
//! dangling pointers and placeholder values show up often. Two businesses
//! share the same pools, so colliding ids across tenants are common.

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use serde_json::json;
use shared::models::{EmbeddedOrder, Order, Table};
use shared::TableStatus;
use table_guard::reconcile::{Fix, FixKey, Snapshot, coalesce, detect_at, normalize};

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn arb_opt_str(values: &'static [&'static str]) -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        1 => Just(None::<String>),
        4 => proptest::sample::select(values).prop_map(|s| Some(s.to_string())),
    ]
}

/// Two tenants plus unscoped records, sharing the same id pools
fn arb_business() -> impl Strategy<Value = Option<String>> {
    arb_opt_str(&["b1", "b2"])
}

fn fix_business(fix: &Fix) -> Option<String> {
    match fix.key() {
        FixKey::Table(business, _) | FixKey::Order(business, _) => business,
    }
}

fn scoped(snapshot: &Snapshot, business: Option<&str>) -> Snapshot {
    Snapshot::new(
        snapshot
            .tables
            .iter()
            .filter(|t| t.business_id.as_deref() == business)
            .cloned()
            .collect(),
        snapshot
            .open_orders
            .iter()
            .filter(|o| o.business_id.as_deref() == business)
            .cloned()
            .collect(),
    )
}

fn arb_embedded() -> impl Strategy<Value = Option<EmbeddedOrder>> {
    let items = prop_oneof![
        Just(None::<Vec<serde_json::Value>>),
        Just(Some(Vec::new())),
        Just(Some(vec![json!({"sku": 1})])),
    ];
    prop_oneof![
        1 => Just(None::<EmbeddedOrder>),
        2 => (
            arb_opt_str(&["o0", "o1", "o2", "o3", "ghost"]),
            arb_opt_str(&["open", "closed", "cancelled", "Canceled", "paid", ""]),
            items,
        )
            .prop_map(|(id, status, order_items)| {
                Some(EmbeddedOrder {
                    id,
                    status,
                    order_items,
                    ..Default::default()
                })
            }),
    ]
}

fn arb_table() -> impl Strategy<Value = Table> {
    (
        arb_opt_str(&["t0", "t1", "t2", "t3", " t1 ", ""]),
        arb_opt_str(&["available", "occupied", "open", "closed", "reserved", " Occupied ", ""]),
        arb_opt_str(&["o0", "o1", "o2", "o3", "o4", "ghost", "null", "undefined", " "]),
        arb_embedded(),
        arb_opt_str(&["v1", "v2"]),
        arb_business(),
    )
        .prop_map(|(id, status, current_order_id, orders, updated_at, business_id)| Table {
            id,
            business_id,
            status,
            current_order_id,
            orders,
            updated_at,
        })
}

fn arb_order() -> impl Strategy<Value = Order> {
    (
        arb_opt_str(&["o0", "o1", "o2", "o3", "o4", ""]),
        arb_opt_str(&["t0", "t1", "t2", "t3", "t9", "null"]),
        arb_opt_str(&["open", "open", "open", "OPEN", "closed", "cancelled", "paid"]),
        arb_opt_str(&[
            "2024-05-01T10:00:00Z",
            "2024-05-01T11:00:00Z",
            "2024-05-01 09:30:00",
            "1714550400000",
            "garbage",
        ]),
        arb_opt_str(&["2024-05-01T08:00:00Z", "v1"]),
        arb_business(),
    )
        .prop_map(|(id, table_id, status, opened_at, updated_at, business_id)| Order {
            id,
            business_id,
            table_id,
            status,
            opened_at,
            updated_at,
            closed_at: None,
        })
}

fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
    (
        proptest::collection::vec(arb_table(), 0..6),
        proptest::collection::vec(arb_order(), 0..8),
    )
        .prop_map(|(tables, open_orders)| Snapshot::new(tables, open_orders))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Applying the fixes in order leaves nothing to fix
    #[test]
    fn prop_fixes_converge(snapshot in arb_snapshot()) {
        let report = detect_at(&snapshot, now());

        let mut repaired = snapshot.clone();
        repaired.apply_fixes(&report.fixes);
        let again = detect_at(&repaired, now());

        prop_assert!(
            again.fixes.is_empty(),
            "second pass still has fixes: {:?}\nfirst pass: {:?}",
            again.fixes,
            report.fixes
        );
    }

    /// Coalesced fixes (one write per record) reach the same state
    #[test]
    fn prop_coalesced_fixes_converge(snapshot in arb_snapshot()) {
        let report = detect_at(&snapshot, now());

        let mut sequential = snapshot.clone();
        sequential.apply_fixes(&report.fixes);

        let mut merged = snapshot.clone();
        merged.apply_fixes(&coalesce(&report.fixes));

        prop_assert!(detect_at(&merged, now()).fixes.is_empty());
        for (a, b) in sequential.tables.iter().zip(&merged.tables) {
            prop_assert_eq!(a.order_ref(), b.order_ref());
            prop_assert_eq!(a.stored_status(), b.stored_status());
        }
        for (a, b) in sequential.open_orders.iter().zip(&merged.open_orders) {
            prop_assert_eq!(&a.status, &b.status);
            prop_assert_eq!(a.table_ref(), b.table_ref());
        }
    }

    /// Each business is reconciled as if it were alone in the snapshot
    #[test]
    fn prop_businesses_detected_independently(snapshot in arb_snapshot()) {
        let report = detect_at(&snapshot, now());
        for business in [Some("b1"), Some("b2"), None] {
            let alone = detect_at(&scoped(&snapshot, business), now());
            let in_report: Vec<&Fix> = report
                .fixes
                .iter()
                .filter(|f| fix_business(f).as_deref() == business)
                .collect();
            prop_assert_eq!(in_report, alone.fixes.iter().collect::<Vec<_>>());

            let mut repaired = scoped(&snapshot, business);
            repaired.apply_fixes(&alone.fixes);
            prop_assert!(detect_at(&repaired, now()).fixes.is_empty());
        }
    }

    /// Every emitted fix is unique
    #[test]
    fn prop_fixes_deduplicated(snapshot in arb_snapshot()) {
        let report = detect_at(&snapshot, now());
        for (i, fix) in report.fixes.iter().enumerate() {
            prop_assert!(!report.fixes[i + 1..].contains(fix), "duplicate fix {:?}", fix);
        }
    }

    /// Same snapshot, same report
    #[test]
    fn prop_detect_deterministic(snapshot in arb_snapshot()) {
        prop_assert_eq!(detect_at(&snapshot, now()), detect_at(&snapshot, now()));
    }

    /// Normalizing is deterministic and never yields an available table with an order
    #[test]
    fn prop_normalize_consistent(table in arb_table()) {
        let first = normalize(&table);
        prop_assert_eq!(&first, &normalize(&table));
        if first.status == TableStatus::Available {
            prop_assert!(first.current_order_id.is_none());
            prop_assert!(first.orders.is_none());
        } else {
            prop_assert!(first.current_order_id.is_some());
        }
    }

    /// A stored available status always wins over embedded order content
    #[test]
    fn prop_available_status_clears(table in arb_table()) {
        prop_assume!(TableStatus::normalize(table.status.as_deref()) == TableStatus::Available);
        let normalized = normalize(&table);
        prop_assert_eq!(normalized.status, TableStatus::Available);
        prop_assert!(normalized.current_order_id.is_none());
        prop_assert!(normalized.orders.is_none());
    }
}
