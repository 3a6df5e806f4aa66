use thiserror::Error;

use crate::persistence::DatabaseError;

/// Validation errors for value objects and caller-supplied input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Value must be non-negative")]
    MustBeNonNegative,

    #[error("Value must be positive")]
    MustBePositive,

    #[error("Value must be finite")]
    MustBeFinite,

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),
}

impl From<ValidationError> for String {
    fn from(error: ValidationError) -> Self {
        error.to_string()
    }
}

/// Errors raised by the trade execution engine and order lifecycle.
///
/// Every variant except `Storage` is an expected, recoverable rejection that
/// leaves the ledger untouched. `Storage` means the commit itself failed; the
/// transaction guarantees trade, cash, and position roll back together.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Malformed quantity/price/side. Caller error, never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// One or more active risk rules rejected the proposed trade. Carries
    /// every violated rule's message, not just the first.
    #[error("Risk check failed: {}", reasons.join(", "))]
    RiskViolation { reasons: Vec<String> },

    #[error("Insufficient funds: required {required:.2}, available {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("Insufficient holdings: requested {requested}, held {held}")]
    InsufficientHoldings { requested: f64, held: f64 },

    /// Order lifecycle transition not allowed from the current status.
    #[error("Invalid order state: {0}")]
    InvalidState(String),

    /// No current price available for a market order's symbol.
    #[error("No price available for symbol: {symbol}")]
    PriceUnavailable { symbol: String },

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

impl ExecutionError {
    /// True when the error is a business rejection rather than a system
    /// failure; rejections guarantee zero ledger mutation.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, ExecutionError::Storage(_))
    }
}
