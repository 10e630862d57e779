//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::id::BatchId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// stock, invariants). Storage failures belong to the infra layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value or an order failed validation (raised before any mutation).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Discount percentage outside `[0, 100]`.
    #[error("invalid discount: {0}% is outside [0, 100]")]
    InvalidDiscount(Decimal),

    /// A deduction asked for more than a batch has left.
    ///
    /// Carries enough context for the caller to pick another batch or lower the quantity.
    #[error(
        "insufficient stock for '{descriptor}' in batch {batch_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        descriptor: String,
        batch_id: BatchId,
        requested: u64,
        available: u64,
    },

    /// The numeric suffix of a bill sequence overflowed.
    #[error("bill sequence exhausted for domain {domain}")]
    SequenceExhausted { domain: String },

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A state transition is not allowed from the current state.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// True for the errors raised by input checks before anything was touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidDiscount(_) | Self::InvalidId(_)
        )
    }
}
