//! Store and service error types.

use thiserror::Error;

use stockroom_core::DomainError;
use stockroom_inventory::StockError;

/// Failure reported by a [`StockStore`](crate::store::StockStore).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The domain refused the command after the rows were locked and read.
    #[error(transparent)]
    Stock(#[from] StockError),

    /// Lock timeout, serialization failure or deadlock. Safe to retry.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// A unique constraint rejected a seeding insert (SKU, default location).
    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Error surfaced by the ledger services.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Still conflicting after the configured retries.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Stored state breaks a ledger invariant. Never corrected implicitly.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("storage error: {0}")]
    Storage(String),
}

impl InventoryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, InventoryError::ConcurrencyConflict(_))
    }
}

impl From<StockError> for InventoryError {
    fn from(value: StockError) -> Self {
        match value {
            StockError::InsufficientStock {
                requested,
                available,
            } => InventoryError::InsufficientStock {
                requested,
                available,
            },
            StockError::InvalidLocation(msg) => InventoryError::InvalidLocation(msg),
            StockError::NotFound(what) => InventoryError::NotFound(what),
            StockError::Validation(msg) => InventoryError::Validation(msg),
            StockError::IntegrityViolation(msg) => InventoryError::IntegrityViolation(msg),
        }
    }
}

impl From<StoreError> for InventoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Stock(err) => err.into(),
            StoreError::Concurrency(msg) => InventoryError::ConcurrencyConflict(msg),
            StoreError::Duplicate(msg) => InventoryError::Validation(msg),
            StoreError::Backend(msg) => InventoryError::Storage(msg),
        }
    }
}

impl From<DomainError> for InventoryError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Unauthorized => InventoryError::Unauthorized,
            other => StockError::from(other).into(),
        }
    }
}
