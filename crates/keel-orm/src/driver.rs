//! Blocking driver interface.
//!
//! A driver hands out prepared statements, either against its pool or
//! inside a transaction. SQL reaching a driver has already been rendered
//! for its dialect, placeholders included.

use std::fmt;
use std::sync::Arc;

use keel_sql_core::executor::{ExecResult, Rows};
use keel_sql_core::{Result, SqlValue};

/// A prepared statement.
pub trait Statement: Send + Sync {
    /// Runs the statement.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn execute(&self, args: &[SqlValue]) -> Result<ExecResult>;

    /// Runs the statement and buffers its rows.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn query(&self, args: &[SqlValue]) -> Result<Rows>;
}

/// An open transaction. Dropping it without committing rolls it back.
pub trait Transaction: Send {
    /// Prepares a statement bound to this transaction.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn prepare(&mut self, sql: &str) -> Result<Arc<dyn Statement>>;

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn commit(self: Box<Self>) -> Result<()>;

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn rollback(self: Box<Self>) -> Result<()>;
}

/// A database connection pool.
pub trait Driver: Send + Sync + fmt::Debug {
    /// Prepares a statement outside any transaction.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn prepare(&self, sql: &str) -> Result<Arc<dyn Statement>>;

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn begin(&self) -> Result<Box<dyn Transaction>>;
}
