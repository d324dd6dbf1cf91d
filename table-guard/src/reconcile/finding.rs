//! Diagnostic findings
//!
//! Findings describe what was wrong with a snapshot. They are for logs and
//! reports only; fix application never reads them.

use serde::{Deserialize, Serialize};

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// What kind of invariant violation was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCode {
    /// Stored table status disagrees with pointer presence
    TableStatusMismatch,
    /// Table points at an order that is neither open nor in the open list
    TablePointsToClosedOrMissingOrder,
    /// Table points at an open order that belongs to a different table
    TablePointsToForeignOrder,
    /// Open order references a table that does not exist
    OpenOrderPointsToMissingTable,
    /// Open order references a table that has no pointer
    OpenOrderWithoutTablePointer,
    /// Open order references a table that points elsewhere
    OpenOrderTablePointerMismatch,
    /// Several open orders reference the same table
    OrderTablePointerConflict,
}

impl FindingCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TableStatusMismatch => "table_status_mismatch",
            Self::TablePointsToClosedOrMissingOrder => "table_points_to_closed_or_missing_order",
            Self::TablePointsToForeignOrder => "table_points_to_foreign_order",
            Self::OpenOrderPointsToMissingTable => "open_order_points_to_missing_table",
            Self::OpenOrderWithoutTablePointer => "open_order_without_table_pointer",
            Self::OpenOrderTablePointerMismatch => "open_order_table_pointer_mismatch",
            Self::OrderTablePointerConflict => "order_table_pointer_conflict",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::TableStatusMismatch => Severity::Low,
            Self::TablePointsToForeignOrder | Self::OpenOrderPointsToMissingTable => {
                Severity::Medium
            }
            Self::TablePointsToClosedOrMissingOrder
            | Self::OpenOrderWithoutTablePointer
            | Self::OpenOrderTablePointerMismatch
            | Self::OrderTablePointerConflict => Severity::High,
        }
    }
}

impl std::fmt::Display for FindingCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected invariant violation and the records involved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub code: FindingCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Stored table status, for status mismatches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Status the table should have, for status mismatches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<String>,
    /// Winner of a multi-order conflict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_order_id: Option<String>,
    /// Every open order contending for the table
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicting_order_ids: Vec<String>,
}

impl Finding {
    pub fn new(code: FindingCode) -> Self {
        Self {
            severity: code.severity(),
            code,
            business_id: None,
            table_id: None,
            order_id: None,
            status: None,
            expected_status: None,
            canonical_order_id: None,
            conflicting_order_ids: Vec::new(),
        }
    }

    pub fn business(mut self, business_id: Option<&str>) -> Self {
        self.business_id = business_id.map(str::to_string);
        self
    }

    pub fn table(mut self, table_id: impl Into<String>) -> Self {
        self.table_id = Some(table_id.into());
        self
    }

    pub fn order(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn statuses(mut self, stored: impl Into<String>, expected: impl Into<String>) -> Self {
        self.status = Some(stored.into());
        self.expected_status = Some(expected.into());
        self
    }

    pub fn conflict(mut self, canonical: impl Into<String>, contenders: Vec<String>) -> Self {
        self.canonical_order_id = Some(canonical.into());
        self.conflicting_order_ids = contenders;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_by_code() {
        assert_eq!(FindingCode::TableStatusMismatch.severity(), Severity::Low);
        assert_eq!(
            FindingCode::OpenOrderPointsToMissingTable.severity(),
            Severity::Medium
        );
        assert_eq!(
            FindingCode::OrderTablePointerConflict.severity(),
            Severity::High
        );
        assert!(Severity::High > Severity::Medium && Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_finding_serialize_sparse() {
        let finding = Finding::new(FindingCode::OpenOrderWithoutTablePointer)
            .table("table-3")
            .order("order-c");
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["severity"], "high");
        assert_eq!(json["code"], "open_order_without_table_pointer");
        assert_eq!(json["table_id"], "table-3");
        assert!(json.get("conflicting_order_ids").is_none());
        assert!(json.get("business_id").is_none());
    }

    #[test]
    fn test_code_names_match_serde() {
        for code in [
            FindingCode::TableStatusMismatch,
            FindingCode::TablePointsToClosedOrMissingOrder,
            FindingCode::TablePointsToForeignOrder,
            FindingCode::OpenOrderPointsToMissingTable,
            FindingCode::OpenOrderWithoutTablePointer,
            FindingCode::OpenOrderTablePointerMismatch,
            FindingCode::OrderTablePointerConflict,
        ] {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, code.as_str());
        }
    }
}
