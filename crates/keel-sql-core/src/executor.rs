//! Blocking execution interface the dialects render against.

use crate::error::Result;
use crate::value::SqlValue;

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Key generated by the last insert, when the driver reports one.
    pub last_insert_id: Option<i64>,
}

/// A fully buffered result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl Rows {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the first value of the first row.
    #[must_use]
    pub fn first_value(&self) -> Option<&SqlValue> {
        self.rows.first().and_then(|row| row.first())
    }
}

/// Runs SQL already rendered for the target dialect.
pub trait Executor {
    /// Executes a statement.
    ///
    /// # Errors
    ///
    /// Returns the driver's error unchanged.
    fn execute(&mut self, sql: &str, args: &[SqlValue]) -> Result<ExecResult>;

    /// Runs a query and buffers its rows.
    ///
    /// # Errors
    ///
    /// Returns the driver's error unchanged.
    fn query(&mut self, sql: &str, args: &[SqlValue]) -> Result<Rows>;
}

/// An executor that also knows which database it is connected to.
pub trait Catalog: Executor {
    /// Name of the connected database, empty when the engine has none.
    fn database_name(&self) -> &str;
}
