//! Error types for the ORM.

use thiserror::Error;

/// ORM-specific errors.
#[derive(Debug, Clone, Error)]
pub enum OrmError {
    /// Error from model extraction, SQL rendering, value mapping or the
    /// driver.
    #[error(transparent)]
    Sql(#[from] keel_sql_core::Error),

    /// A single-row query matched no row.
    #[error("object not found")]
    NotFound,

    /// The record's `validate` hook rejected it.
    #[error("validation error: {0}")]
    Validation(String),

    /// An update or delete had neither a primary key nor a condition.
    #[error("refusing to {0} without a condition")]
    MissingCondition(&'static str),

    /// Every session slot is taken and the limit policy is `Fail`.
    #[error("connection limit reached")]
    ConnectionLimit,

    /// `begin` was called inside an open transaction.
    #[error("a transaction is already in progress")]
    TransactionInProgress,

    /// `commit` or `rollback` was called without an open transaction.
    #[error("no transaction in progress")]
    NoTransaction,

    /// Dropping a table outside a test database.
    #[error("dropping tables is only allowed on databases whose name ends with `test` (got `{0}`)")]
    UnsafeDrop(String),
}

impl OrmError {
    /// Returns whether the error is [`OrmError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, OrmError>;
