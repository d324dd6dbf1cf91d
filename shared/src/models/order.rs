//! Order Model

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::util::{lenient_string, lenient_text, normalize_ref};

/// Order status
///
/// Only `Open` orders take part in table occupancy. `Unknown` covers any
/// value the store sends that is not one of the known states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Closed,
    Cancelled,
    Unknown,
}

impl OrderStatus {
    /// Parse a stored status (trimmed, case-insensitive)
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => Self::Open,
            "closed" => Self::Closed,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }

    /// Parse an optional stored status; a missing value is `None`
    pub fn parse_opt(raw: Option<&str>) -> Option<Self> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }
        Some(Self::parse(raw))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    /// Closed or cancelled
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub business_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub table_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub opened_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<String>,
}

impl Order {
    /// Usable record id (trimmed, non-empty)
    pub fn key(&self) -> Option<String> {
        normalize_ref(self.id.as_deref())
    }

    /// Normalized `table_id`
    pub fn table_ref(&self) -> Option<String> {
        normalize_ref(self.table_id.as_deref())
    }

    pub fn order_status(&self) -> Option<OrderStatus> {
        OrderStatus::parse_opt(self.status.as_deref())
    }

    pub fn is_open(&self) -> bool {
        self.order_status() == Some(OrderStatus::Open)
    }
}

/// Order snapshot embedded in a table record by the store's join.
///
/// The object is kept verbatim in `raw` so it can be handed back unchanged.
/// `id`, `status`, `table_id` and `order_items` are typed views over it; a
/// view that was changed is written back over the raw value on serialize.
/// Fields of the wrong JSON type read as absent and are passed through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct EmbeddedOrder {
    pub id: Option<String>,
    pub status: Option<String>,
    pub table_id: Option<String>,
    /// `None` means "items not loaded", `Some(vec![])` means "loaded, none"
    pub order_items: Option<Vec<Value>>,
    pub raw: Map<String, Value>,
}

impl EmbeddedOrder {
    pub fn order_status(&self) -> Option<OrderStatus> {
        OrderStatus::parse_opt(self.status.as_deref())
    }

    /// True only when the item list was loaded and is empty
    pub fn has_explicit_empty_items(&self) -> bool {
        self.order_items.as_ref().is_some_and(|items| items.is_empty())
    }
}

impl From<Map<String, Value>> for EmbeddedOrder {
    fn from(raw: Map<String, Value>) -> Self {
        let text = |key: &str| raw.get(key).and_then(lenient_text);
        let order_items = match raw.get("order_items") {
            Some(Value::Array(items)) => Some(items.clone()),
            _ => None,
        };
        Self {
            id: text("id"),
            status: text("status"),
            table_id: text("table_id"),
            order_items,
            raw,
        }
    }
}

/// Write `view` back unless the raw value already reads as it
fn write_back(out: &mut Map<String, Value>, key: &str, view: Option<String>) {
    let current = out.get(key).and_then(lenient_text);
    if current == view {
        return;
    }
    out.insert(key.to_string(), view.map_or(Value::Null, Value::String));
}

impl From<EmbeddedOrder> for Map<String, Value> {
    fn from(order: EmbeddedOrder) -> Self {
        let mut out = order.raw;
        write_back(&mut out, "id", order.id);
        write_back(&mut out, "status", order.status);
        write_back(&mut out, "table_id", order.table_id);
        if let Some(items) = order.order_items
            && !matches!(out.get("order_items"), Some(Value::Array(raw)) if *raw == items)
        {
            out.insert("order_items".to_string(), Value::Array(items));
        }
        out
    }
}

impl From<&Order> for EmbeddedOrder {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.clone(),
            status: order.status.clone(),
            table_id: order.table_id.clone(),
            order_items: None,
            raw: Map::new(),
        }
    }
}

/// Deserialize the joined order, tolerating the shapes joins come back in.
///
/// One-to-many joins return an array; the first element is used. Scalars
/// and empty arrays mean "no snapshot".
pub fn lenient_embedded<'de, D>(deserializer: D) -> Result<Option<EmbeddedOrder>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let object = match value {
        Some(serde_json::Value::Array(items)) => items.into_iter().next(),
        Some(v @ serde_json::Value::Object(_)) => Some(v),
        _ => None,
    };
    match object {
        Some(v @ serde_json::Value::Object(_)) => serde_json::from_value(v)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
