//! Canonical order selection for tables with several open orders
//!
//! The order is total and depends only on the records, so concurrent passes
//! over the same data pick the same winner:
//! 1. the order the table already points at, if it is among the candidates
//! 2. earliest `opened_at` (else `updated_at`; unparseable sorts last)
//! 3. smallest id

use std::cmp::Ordering;

use shared::models::Order;
use shared::util::parse_timestamp_millis;

/// Sort key used when neither timestamp parses
pub const UNKNOWN_OPENED_AT: i64 = i64::MAX;

/// Epoch millis the order was opened, for ordering candidates
pub fn opened_sort_key(order: &Order) -> i64 {
    order
        .opened_at
        .as_deref()
        .and_then(parse_timestamp_millis)
        .or_else(|| order.updated_at.as_deref().and_then(parse_timestamp_millis))
        .unwrap_or(UNKNOWN_OPENED_AT)
}

fn compare_candidates(a: &Order, b: &Order) -> Ordering {
    opened_sort_key(a)
        .cmp(&opened_sort_key(b))
        .then_with(|| a.key().cmp(&b.key()))
}

/// Pick the order that keeps the table.
///
/// `table_pointer` is the table's normalized `current_order_id`. Returns
/// `None` only for an empty candidate list.
pub fn pick_canonical_open_order_for_table<'a>(
    table_pointer: Option<&str>,
    candidates: &[&'a Order],
) -> Option<&'a Order> {
    if let Some(pointer) = table_pointer
        && let Some(pointed) = candidates
            .iter()
            .find(|o| o.key().as_deref() == Some(pointer))
    {
        return Some(*pointed);
    }

    candidates
        .iter()
        .copied()
        .min_by(|a, b| compare_candidates(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str, opened_at: Option<&str>, updated_at: Option<&str>) -> Order {
        Order {
            id: Some(id.to_string()),
            table_id: Some("t1".to_string()),
            status: Some("open".to_string()),
            opened_at: opened_at.map(str::to_string),
            updated_at: updated_at.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_pointer_wins_over_recency() {
        let a = order("order-a", Some("2024-05-01T10:00:00Z"), None);
        let b = order("order-b", Some("2024-05-01T11:00:00Z"), None);
        let picked = pick_canonical_open_order_for_table(Some("order-b"), &[&a, &b]).unwrap();
        assert_eq!(picked.id.as_deref(), Some("order-b"));
    }

    #[test]
    fn test_earliest_opened_wins_without_pointer() {
        let a = order("order-a", Some("2024-05-01T12:00:00Z"), None);
        let b = order("order-b", Some("2024-05-01T11:00:00Z"), None);
        let picked = pick_canonical_open_order_for_table(None, &[&a, &b]).unwrap();
        assert_eq!(picked.id.as_deref(), Some("order-b"));
    }

    #[test]
    fn test_pointer_outside_candidates_ignored() {
        let a = order("order-a", Some("2024-05-01T12:00:00Z"), None);
        let b = order("order-b", Some("2024-05-01T11:00:00Z"), None);
        let picked = pick_canonical_open_order_for_table(Some("order-z"), &[&a, &b]).unwrap();
        assert_eq!(picked.id.as_deref(), Some("order-b"));
    }

    #[test]
    fn test_updated_at_fallback() {
        let a = order("order-a", Some("garbage"), Some("2024-05-01T09:00:00Z"));
        let b = order("order-b", Some("2024-05-01T10:00:00Z"), None);
        let picked = pick_canonical_open_order_for_table(None, &[&b, &a]).unwrap();
        assert_eq!(picked.id.as_deref(), Some("order-a"));
    }

    #[test]
    fn test_unparseable_sorts_last() {
        let a = order("order-a", None, None);
        let b = order("order-b", Some("2030-01-01T00:00:00Z"), None);
        assert_eq!(opened_sort_key(&a), UNKNOWN_OPENED_AT);
        let picked = pick_canonical_open_order_for_table(None, &[&a, &b]).unwrap();
        assert_eq!(picked.id.as_deref(), Some("order-b"));
    }

    #[test]
    fn test_ties_break_on_id() {
        let a = order("order-b", Some("2024-05-01T10:00:00Z"), None);
        let b = order("order-a", Some("2024-05-01T10:00:00Z"), None);
        let c = order("order-c", None, None);
        let picked = pick_canonical_open_order_for_table(None, &[&a, &c, &b]).unwrap();
        assert_eq!(picked.id.as_deref(), Some("order-a"));

        let x = order("order-y", None, None);
        let y = order("order-x", None, None);
        let picked = pick_canonical_open_order_for_table(None, &[&x, &y]).unwrap();
        assert_eq!(picked.id.as_deref(), Some("order-x"));
    }

    #[test]
    fn test_empty_candidates() {
        assert!(pick_canonical_open_order_for_table(Some("o1"), &[]).is_none());
    }
}
