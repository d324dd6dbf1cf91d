//! Dining Table Model

use serde::{Deserialize, Serialize};

use super::order::{EmbeddedOrder, lenient_embedded};
use crate::util::{lenient_string, normalize_ref};

/// Canonical table status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    #[default]
    Available,
    Occupied,
}

impl TableStatus {
    /// Normalize a stored status string.
    ///
    /// Legacy values are still written by older clients: `open` means
    /// occupied, `closed` means available. Missing or unrecognized values
    /// fall back to `Available`.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("occupied") | Some("open") => Self::Occupied,
            _ => Self::Available,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
        }
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dining table record (桌台)
///
/// `orders` is the store's denormalized join of the order named by
/// `current_order_id`. It may be missing, stale, or describe an order that
/// has since been closed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub business_id: Option<String>,
    /// Raw stored status, legacy synonyms included
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub current_order_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_embedded")]
    pub orders: Option<EmbeddedOrder>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Table {
    /// Usable record id (trimmed, non-empty)
    pub fn key(&self) -> Option<String> {
        normalize_ref(self.id.as_deref())
    }

    /// Normalized `current_order_id`
    pub fn order_ref(&self) -> Option<String> {
        normalize_ref(self.current_order_id.as_deref())
    }

    /// Stored status, trimmed and lowercased, without synonym mapping
    pub fn stored_status(&self) -> String {
        self.status
            .as_deref()
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_normalize_legacy() {
        assert_eq!(TableStatus::normalize(Some("open")), TableStatus::Occupied);
        assert_eq!(TableStatus::normalize(Some("closed")), TableStatus::Available);
        assert_eq!(TableStatus::normalize(Some(" Occupied ")), TableStatus::Occupied);
        assert_eq!(TableStatus::normalize(Some("AVAILABLE")), TableStatus::Available);
    }

    #[test]
    fn test_status_normalize_unknown_defaults_available() {
        assert_eq!(TableStatus::normalize(None), TableStatus::Available);
        assert_eq!(TableStatus::normalize(Some("")), TableStatus::Available);
        assert_eq!(TableStatus::normalize(Some("reserved")), TableStatus::Available);
    }

    #[test]
    fn test_table_deserialize_lenient_ids() {
        let json = r#"{"id": 12, "business_id": "b1", "status": "open", "current_order_id": 7}"#;
        let table: Table = serde_json::from_str(json).unwrap();
        assert_eq!(table.id.as_deref(), Some("12"));
        assert_eq!(table.current_order_id.as_deref(), Some("7"));
        assert!(table.orders.is_none());
    }

    #[test]
    fn test_table_deserialize_sparse() {
        let table: Table = serde_json::from_str("{}").unwrap();
        assert_eq!(table, Table::default());
        assert_eq!(table.key(), None);
        assert_eq!(table.stored_status(), "");
    }

    #[test]
    fn test_table_embedded_join_shapes() {
        let json = r#"{"id":"t1","orders":[{"id":"o1","status":"open"}]}"#;
        let table: Table = serde_json::from_str(json).unwrap();
        assert_eq!(table.orders.unwrap().id.as_deref(), Some("o1"));

        let table: Table = serde_json::from_str(r#"{"id":"t1","orders":[]}"#).unwrap();
        assert!(table.orders.is_none());

        let table: Table = serde_json::from_str(r#"{"id":"t1","orders":null}"#).unwrap();
        assert!(table.orders.is_none());
    }

    #[test]
    fn test_order_ref_normalized() {
        let table = Table {
            current_order_id: Some("undefined".to_string()),
            ..Default::default()
        };
        assert_eq!(table.order_ref(), None);

        let table = Table {
            current_order_id: Some(" o-1 ".to_string()),
            ..Default::default()
        };
        assert_eq!(table.order_ref().as_deref(), Some("o-1"));
    }
}
