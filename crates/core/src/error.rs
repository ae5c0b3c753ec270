//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Covers deterministic failures that do not depend on stock state
/// (malformed input, identifiers, authorization). Stock decisions have their
/// own error type in the inventory crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. blank name, non-positive amount).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was found broken.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The actor lacks the role required for the operation.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

/// Reject amounts that are zero or negative.
pub fn ensure_positive(field: &str, amount: i64) -> DomainResult<()> {
    if amount <= 0 {
        return Err(DomainError::validation(format!(
            "{field} must be positive (got {amount})"
        )));
    }
    Ok(())
}

/// Reject blank strings, returning the trimmed value.
pub fn ensure_not_blank<'a>(field: &str, value: &'a str) -> DomainResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed)
}
