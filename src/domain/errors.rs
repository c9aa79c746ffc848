//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Resource not found (or soft-deleted)
    NotFound(String),
    /// Validation error with message
    Validation(String),
    /// Uniqueness violation (duplicate SKU, reference...)
    Conflict(String),
    /// Operation not allowed in the current state of the record
    InvalidState(String),
    /// Stock would go below zero
    InsufficientStock {
        product_id: String,
        sku: String,
        available: i32,
        requested: i32,
    },
    /// Database/persistence error
    Database(String),
    /// External service error (remote sync server)
    External(String),
    /// Generic internal error
    Internal(String),
}

impl DomainError {
    pub fn not_found(what: &str, id: &str) -> Self {
        DomainError::NotFound(format!("{} {} not found", what, id))
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::NotFound(msg) => write!(f, "{}", msg),
            DomainError::Validation(msg) => write!(f, "Validation error: {}", msg),
            DomainError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            DomainError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            DomainError::InsufficientStock {
                sku,
                available,
                requested,
                ..
            } => write!(
                f,
                "Insufficient stock for {}: {} available, {} requested",
                sku, available, requested
            ),
            DomainError::Database(msg) => write!(f, "Database error: {}", msg),
            DomainError::External(msg) => write!(f, "External service error: {}", msg),
            DomainError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

impl DomainError {
    /// Storage faults that may succeed on a later attempt (busy, locked, I/O)
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Database(_) | DomainError::Internal(_))
    }
}

// Conversion from SeaORM errors (used in infrastructure layer).
// Constraint violations and bad JSON are caused by the data, not the store.
impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        match e.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(msg)) => DomainError::Conflict(msg),
            Some(sea_orm::SqlErr::ForeignKeyConstraintViolation(msg)) => {
                DomainError::Validation(format!("Unknown reference: {}", msg))
            }
            _ => match e {
                sea_orm::DbErr::Json(msg) => {
                    DomainError::Validation(format!("Malformed payload: {}", msg))
                }
                sea_orm::DbErr::RecordNotFound(msg) => DomainError::NotFound(msg),
                other => DomainError::Database(other.to_string()),
            },
        }
    }
}

// Returned by `TransactionTrait::transaction` closures
impl From<sea_orm::TransactionError<DomainError>> for DomainError {
    fn from(e: sea_orm::TransactionError<DomainError>) -> Self {
        match e {
            sea_orm::TransactionError::Connection(db) => db.into(),
            sea_orm::TransactionError::Transaction(inner) => inner,
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Validation(format!("Malformed payload: {}", e))
    }
}
