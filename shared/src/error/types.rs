//! Error types

use super::codes::ErrorCode;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Application error with structured error code and details
///
/// - Standardized error codes via [`ErrorCode`]
/// - Human-readable messages
/// - Optional structured details for debugging
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    /// The error code identifying the type of error
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (ids, expected versions, ...)
    pub details: Option<HashMap<String, Value>>,
}

impl AppError {
    /// Create a new error with the default message for the error code
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            details: None,
        }
    }

    /// Create a new error with a custom message
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Add a detail entry to this error
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Whether this error is a rejected guarded write
    pub fn is_stale_write(&self) -> bool {
        self.code == ErrorCode::StaleWrite
    }

    // ==================== Convenience constructors ====================

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        let r = resource.into();
        Self::with_message(ErrorCode::NotFound, format!("{} not found", r))
            .with_detail("resource", r)
    }

    /// Create a table not found error
    pub fn table_not_found(table_id: impl Into<String>) -> Self {
        let id = table_id.into();
        Self::with_message(ErrorCode::TableNotFound, format!("Table {} not found", id))
            .with_detail("table_id", id)
    }

    /// Create an order not found error
    pub fn order_not_found(order_id: impl Into<String>) -> Self {
        let id = order_id.into();
        Self::with_message(ErrorCode::OrderNotFound, format!("Order {} not found", id))
            .with_detail("order_id", id)
    }

    /// Create a stale write error for a guarded update
    pub fn stale_write(kind: &str, id: impl Into<String>) -> Self {
        let id = id.into();
        Self::with_message(
            ErrorCode::StaleWrite,
            format!("{} {} changed since snapshot", kind, id),
        )
        .with_detail("id", id)
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, msg)
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::DatabaseError, msg)
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ConfigError, msg)
    }

    /// Create a snapshot error
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::SnapshotInvalid, msg)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self::snapshot(format!("JSON error: {}", e))
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_new() {
        let err = AppError::new(ErrorCode::NotFound);
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "Resource not found");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_app_error_with_detail() {
        let err = AppError::validation("Missing required fields")
            .with_detail("field", "table_id")
            .with_detail("reason", "required");

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        let details = err.details.unwrap();
        assert_eq!(details.get("field").unwrap(), "table_id");
        assert_eq!(details.get("reason").unwrap(), "required");
    }

    #[test]
    fn test_domain_constructors() {
        let err = AppError::table_not_found("t-9");
        assert_eq!(err.code, ErrorCode::TableNotFound);
        assert_eq!(err.message, "Table t-9 not found");

        let err = AppError::order_not_found("o-9");
        assert_eq!(err.code, ErrorCode::OrderNotFound);

        let err = AppError::stale_write("order", "o-1");
        assert!(err.is_stale_write());
        assert_eq!(err.to_string(), "order o-1 changed since snapshot");

        let err = AppError::config("interval must be positive");
        assert_eq!(err.code, ErrorCode::ConfigError);
    }

    #[test]
    fn test_from_serde_error() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: AppError = parse.unwrap_err().into();
        assert_eq!(err.code, ErrorCode::SnapshotInvalid);
        assert!(err.message.starts_with("JSON error"));
    }
}
