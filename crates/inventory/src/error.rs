use thiserror::Error;

use stockroom_core::DomainError;

/// Outcome of a rejected stock decision.
///
/// Every variant is returned before any state is written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// Requested amount exceeds what is available (unreserved quantity, or the
    /// source row of a transfer).
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// Source equals destination, or a referenced location does not exist.
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Loaded state breaks a ledger invariant (reserved out of range, stock sum drift).
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
}

impl StockError {
    pub fn insufficient(requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }
}

impl From<DomainError> for StockError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => StockError::Validation(msg),
            DomainError::InvariantViolation(msg) => StockError::IntegrityViolation(msg),
            DomainError::NotFound(what) => StockError::NotFound(what),
            DomainError::Unauthorized => StockError::Validation("unauthorized".to_string()),
        }
    }
}
