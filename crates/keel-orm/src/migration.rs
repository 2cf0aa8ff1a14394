//! Table creation and additive schema changes.

use keel_sql_core::executor::Executor;
use keel_sql_core::migrate::{create_index_if_missing, reconcile};
use keel_sql_core::{Error, Record};
use tracing::{info, warn};

use crate::error::{OrmError, Result};
use crate::session::Session;

/// Runs schema changes on a dedicated session.
#[derive(Debug)]
pub struct Migration<'db> {
    session: Session<'db>,
}

impl<'db> Migration<'db> {
    pub(crate) const fn new(session: Session<'db>) -> Self {
        Self { session }
    }

    /// Creates `T`'s table unless it exists, then adds whatever columns
    /// and indexes the existing table lacks.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid declaration,
    /// [`Error::ColumnRenamed`] when the table has undeclared columns, or
    /// the driver's error. Errors the dialect reports as "already exists"
    /// are tolerated.
    pub fn create_table_if_not_exists<T: Record>(&mut self) -> Result<()> {
        let db = self.session.database();
        let mut record = T::default();
        let model = db.extractor().extract(&mut record, true, &[])?;
        info!(table = %model.table, "Creating table if not exists");
        for sql in db.dialect().create_table_sql(&model, true)? {
            match self.session.execute(&sql, &[]) {
                Ok(_) => {}
                Err(e) if db.dialect().is_benign_migration_error(&e) => {
                    warn!(table = %model.table, error = %e, "Ignoring migration error");
                }
                Err(e) => return Err(e.into()),
            }
        }
        reconcile(db.dialect(), &mut self.session, &model)?;
        Ok(())
    }

    /// Creates the index `{table}_{name}` unless it exists. Returns whether
    /// it was created.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    pub fn create_index_if_not_exists(
        &mut self,
        table: &str,
        name: &str,
        unique: bool,
        columns: &[&str],
    ) -> Result<bool> {
        let db = self.session.database();
        let columns: Vec<String> = columns.iter().map(ToString::to_string).collect();
        let created = create_index_if_missing(db.dialect(), &mut self.session, table, name, unique, &columns)?;
        Ok(created.is_some())
    }

    /// Drops `T`'s table.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::UnsafeDrop`] unless the configured database name
    /// ends with `test`, or the driver's error.
    pub fn drop_table<T: Record>(&mut self) -> Result<()> {
        let db = self.session.database();
        let database_name = &db.config().database_name;
        if !database_name.ends_with("test") {
            return Err(OrmError::UnsafeDrop(database_name.clone()));
        }
        let table = db.extractor().table_name(&T::default());
        info!(table = %table, "Dropping table");
        self.session.execute(&db.dialect().drop_table_sql(&table), &[])?;
        Ok(())
    }

    /// Adds the column of `T` named `column` to its table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownField`] when `T` maps no such column, or the
    /// driver's error.
    pub fn add_column<T: Record>(&mut self, column: &str) -> Result<()> {
        let db = self.session.database();
        let mut record = T::default();
        let model = db.extractor().extract(&mut record, false, &[])?;
        let field = model.field(column).ok_or_else(|| Error::UnknownField {
            type_name: record.type_name(),
            field: column.to_string(),
        })?;
        let sql = db.dialect().add_column_sql(&model.table, field)?;
        info!(table = %model.table, column = %column, "Adding column");
        self.session.execute(&sql, &[])?;
        Ok(())
    }

    /// The session statements run on.
    pub fn session(&mut self) -> &mut Session<'db> {
        &mut self.session
    }
}
