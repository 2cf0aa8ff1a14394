//! Sessions: criteria building, reads, writes and transactions.
//!
//! Criteria set through the builder methods apply to the next operation
//! only. Every operation takes them, whether it succeeds or not.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DurationRound, TimeDelta, Utc};
use keel_sql_core::condition::Condition;
use keel_sql_core::criteria::{Criteria, OrderBy};
use keel_sql_core::executor::{Catalog, ExecResult, Executor, Rows};
use keel_sql_core::mapper::RowMapper;
use keel_sql_core::model::{ModelField, Stamp};
use keel_sql_core::{Error, FromSqlValue, Record, Reflect, ScalarKind, SqlValue, ToSqlValue};
use tracing::{debug, error, warn};

use crate::database::Database;
use crate::driver::{Statement, Transaction};
use crate::error::{OrmError, Result};
use crate::limiter::Permit;

/// One row of a raw query keyed by column name.
pub type RowMap = BTreeMap<String, SqlValue>;

struct TxState {
    tx: Box<dyn Transaction>,
    statements: HashMap<String, Arc<dyn Statement>>,
    first_error: Option<OrmError>,
}

/// A unit of work against a [`Database`].
///
/// Dropping a session releases its connection slot and rolls back any
/// transaction left open.
pub struct Session<'db> {
    db: &'db Database,
    pending: Criteria,
    tx: Option<TxState>,
    _permit: Permit,
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("pending", &self.pending)
            .field("in_transaction", &self.in_transaction())
            .finish_non_exhaustive()
    }
}

impl<'db> Session<'db> {
    pub(crate) fn new(db: &'db Database, permit: Permit) -> Self {
        Self {
            db,
            pending: Criteria::default(),
            tx: None,
            _permit: permit,
        }
    }

    /// The database this session belongs to.
    #[must_use]
    pub const fn database(&self) -> &'db Database {
        self.db
    }

    // =========================================================================
    // Criteria
    // =========================================================================

    /// ANDs a raw expression with `?` placeholders onto the condition.
    ///
    /// Conditions accumulate: each call narrows what the previous ones
    /// set until the next operation takes them.
    pub fn where_clause(&mut self, expr: impl Into<String>, args: Vec<SqlValue>) -> &mut Self {
        self.condition(Condition::new(expr, args))
    }

    /// ANDs `column = value` onto the condition, keeping earlier ones. The
    /// column is used as is.
    pub fn where_equal(&mut self, column: &str, value: impl ToSqlValue) -> &mut Self {
        self.condition(Condition::equal(column, value.to_sql_value()))
    }

    /// ANDs `column IN (...)` onto the condition, keeping earlier ones.
    pub fn where_in(&mut self, column: &str, values: Vec<SqlValue>) -> &mut Self {
        self.condition(Condition::in_list(column, values))
    }

    /// ANDs a condition onto the current one.
    pub fn condition(&mut self, condition: Condition) -> &mut Self {
        self.pending.condition = Some(match self.pending.condition.take() {
            Some(current) => current.and_condition(condition),
            None => condition,
        });
        self
    }

    /// Orders by a column or `alias.column` path.
    pub fn order_by(&mut self, path: impl Into<String>) -> &mut Self {
        self.pending.order_bys.push(OrderBy {
            path: path.into(),
            descending: false,
        });
        self
    }

    pub fn order_by_desc(&mut self, path: impl Into<String>) -> &mut Self {
        self.pending.order_bys.push(OrderBy {
            path: path.into(),
            descending: true,
        });
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.pending.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.pending.offset = Some(offset);
        self
    }

    /// Leaves the named Rust fields out of the next operation.
    pub fn omit_fields(&mut self, fields: &[&str]) -> &mut Self {
        self.pending.omit_fields = fields.iter().map(ToString::to_string).collect();
        self
    }

    /// Skips reference joins in the next query.
    pub fn omit_join(&mut self) -> &mut Self {
        self.pending.omit_join = true;
        self
    }

    fn take_criteria(&mut self) -> Criteria {
        std::mem::take(&mut self.pending)
    }

    fn mapper(&self) -> RowMapper<'db> {
        RowMapper::new(self.db.dialect(), self.db.extractor().naming())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Loads one row into `record`.
    ///
    /// A non-zero primary key is ANDed with the condition. References are
    /// joined and filled in unless joins are omitted; a reference whose row
    /// is missing is left at `None`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotFound`] when no row matches.
    pub fn find<T: Record>(&mut self, record: &mut T) -> Result<()> {
        let db = self.db;
        let mut criteria = self.take_criteria();
        criteria.model = db
            .extractor()
            .extract(record, !criteria.omit_join, &criteria.omit_fields)?;
        criteria.limit = Some(1);
        let joined = !criteria.omit_join && !criteria.model.references.is_empty();
        criteria.merge_pk_condition(db.dialect(), joined);

        let (sql, args) = db.dialect().query_sql(&criteria);
        let Rows { columns, rows } = self.query(&sql, &args)?;
        let row = rows.into_iter().next().ok_or(OrmError::NotFound)?;
        self.mapper().scan_into(record, &columns, row)?;
        Ok(())
    }

    /// Loads every matching row.
    ///
    /// # Errors
    ///
    /// Returns the driver's error or a mapping error.
    pub fn find_all<T: Record>(&mut self) -> Result<Vec<T>> {
        let db = self.db;
        let mut criteria = self.take_criteria();
        let mut template = T::default();
        criteria.model = db
            .extractor()
            .extract(&mut template, !criteria.omit_join, &criteria.omit_fields)?;

        let (sql, args) = db.dialect().query_sql(&criteria);
        let Rows { columns, rows } = self.query(&sql, &args)?;
        let mapper = self.mapper();
        rows.into_iter()
            .map(|row| {
                let mut record = T::default();
                mapper.scan_into(&mut record, &columns, row)?;
                Ok(record)
            })
            .collect()
    }

    /// Loads matching rows one after another into `record` and calls `each`
    /// after every row. Stops at the first error `each` returns.
    ///
    /// # Errors
    ///
    /// Returns the driver's error, a mapping error or the error of `each`.
    pub fn iterate<T, F>(&mut self, record: &mut T, mut each: F) -> Result<()>
    where
        T: Record,
        F: FnMut(&T) -> Result<()>,
    {
        let db = self.db;
        let mut criteria = self.take_criteria();
        criteria.model = db
            .extractor()
            .extract(record, !criteria.omit_join, &criteria.omit_fields)?;

        let (sql, args) = db.dialect().query_sql(&criteria);
        let Rows { columns, rows } = self.query(&sql, &args)?;
        let mapper = self.mapper();
        for row in rows {
            mapper.scan_into(record, &columns, row)?;
            each(&*record)?;
        }
        Ok(())
    }

    /// Counts the rows of `T`'s table matching the condition.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    pub fn count<T: Record>(&mut self) -> Result<u64> {
        let table = self.db.extractor().table_name(&T::default());
        self.count_table(&table)
    }

    /// Counts the rows of `table` matching the condition.
    ///
    /// # Errors
    ///
    /// Returns the driver's error, or [`Error::Conversion`] when the count
    /// is missing, NULL or not a non-negative integer.
    pub fn count_table(&mut self, table: &str) -> Result<u64> {
        let criteria = self.take_criteria();
        let dialect = self.db.dialect();
        let mut sql = format!("SELECT COUNT(*) FROM {}", dialect.quote_identifier(table));
        let mut args = Vec::new();
        if let Some(condition) = &criteria.condition {
            let (expr, condition_args) = condition.merge();
            sql.push_str(" WHERE ");
            sql.push_str(&expr);
            args = condition_args;
        }
        let rows = self.query(&dialect.substitute_placeholders(&sql), &args)?;
        let value = rows.first_value().cloned().unwrap_or(SqlValue::Null);
        let count = dialect.coerce(value, ScalarKind::U64)?;
        Ok(u64::from_sql_value(count)?)
    }

    /// Returns whether any row of `T`'s table holds `value` in `column`.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    pub fn contains_value<T: Record>(&mut self, column: &str, value: impl ToSqlValue) -> Result<bool> {
        let table = self.db.extractor().table_name(&T::default());
        self.contains_value_in(&table, column, value)
    }

    /// Returns whether any row of `table` holds `value` in `column`.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    pub fn contains_value_in(&mut self, table: &str, column: &str, value: impl ToSqlValue) -> Result<bool> {
        let dialect = self.db.dialect();
        let column = dialect.quote_identifier(column);
        let sql = format!(
            "SELECT {column} FROM {} WHERE {column} = ?",
            dialect.quote_identifier(table)
        );
        let rows = self.query(&dialect.substitute_placeholders(&sql), &[value.to_sql_value()])?;
        Ok(!rows.is_empty())
    }

    /// Runs a raw query and returns its first row by column name.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotFound`] when there is no row.
    pub fn query_map(&mut self, sql: &str, args: &[SqlValue]) -> Result<RowMap> {
        self.query_map_slice(sql, args)?
            .into_iter()
            .next()
            .ok_or(OrmError::NotFound)
    }

    /// Runs a raw query and returns every row by column name. Blobs holding
    /// UTF-8 come back as text.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    pub fn query_map_slice(&mut self, sql: &str, args: &[SqlValue]) -> Result<Vec<RowMap>> {
        let Rows { columns, rows } = self.query_rows(sql, args)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .cloned()
                    .zip(row.into_iter().map(blob_to_text))
                    .collect()
            })
            .collect())
    }

    /// Runs a raw query and maps every row onto a new `T`. Columns match
    /// fields through the naming functions; references are not filled.
    ///
    /// # Errors
    ///
    /// Returns the driver's error or a mapping error.
    pub fn query_struct<T: Record>(&mut self, sql: &str, args: &[SqlValue]) -> Result<Vec<T>> {
        let Rows { columns, rows } = self.query_rows(sql, args)?;
        let mapper = self.mapper();
        rows.into_iter()
            .map(|row| {
                let mut record = T::default();
                mapper.scan_into(&mut record, &columns, row)?;
                Ok(record)
            })
            .collect()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts or updates `record`.
    ///
    /// A record with a non-zero primary key whose row exists is updated;
    /// anything else is inserted and receives the generated key. The
    /// `updated` time field is stamped on every save and `created` on
    /// insert. Returns the number of rows affected.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Validation`] when the record rejects itself and
    /// a [`Error::MissingPrimaryKey`] when it has no key.
    pub fn save<T: Record>(&mut self, record: &mut T) -> Result<u64> {
        let db = self.db;
        let mut criteria = self.take_criteria();
        record.validate().map_err(OrmError::Validation)?;
        criteria.model = db.extractor().extract(record, false, &criteria.omit_fields)?;
        let pk = primary_key(&criteria.model.fields, &criteria.model.table)?;

        let now = now();
        let updated = criteria.model.time_field(Stamp::Updated);
        if let Some(i) = updated {
            criteria.model.fields[i].value = SqlValue::Time(now);
        }

        let exists = !pk.value.is_zero() && self.row_exists(&criteria.model.table, &pk)?;
        let mut stamped = Vec::from_iter(updated);
        let affected = if exists {
            criteria.condition = None;
            criteria.merge_pk_condition(db.dialect(), false);
            db.dialect().update(self, &criteria)?
        } else {
            let created = criteria.model.time_field(Stamp::Created);
            if let Some(i) = created {
                criteria.model.fields[i].value = SqlValue::Time(now);
                stamped.push(i);
            }
            let id = db.dialect().insert(self, &criteria)?;
            self.write_back_id(record, &pk, id)?;
            1
        };

        for i in stamped {
            record.set(criteria.model.fields[i].field, SqlValue::Time(now))?;
        }
        Ok(affected)
    }

    /// Updates the rows matched by the record's primary key and the
    /// condition. NULL fields are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::MissingCondition`] when neither a key nor a
    /// condition is set.
    pub fn update<T: Record>(&mut self, record: &mut T) -> Result<u64> {
        let db = self.db;
        let mut criteria = self.take_criteria();
        record.validate().map_err(OrmError::Validation)?;
        criteria.model = db.extractor().extract(record, false, &criteria.omit_fields)?;
        criteria.merge_pk_condition(db.dialect(), false);
        if criteria.condition.is_none() {
            return Err(OrmError::MissingCondition("update"));
        }
        Ok(db.dialect().update(self, &criteria)?)
    }

    /// Deletes the rows matched by the record's primary key and the
    /// condition.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::MissingCondition`] when neither a key nor a
    /// condition is set.
    pub fn delete<T: Record>(&mut self, record: &mut T) -> Result<u64> {
        let db = self.db;
        let mut criteria = self.take_criteria();
        criteria.model = db.extractor().extract(record, false, &criteria.omit_fields)?;
        criteria.merge_pk_condition(db.dialect(), false);
        if criteria.condition.is_none() {
            return Err(OrmError::MissingCondition("delete"));
        }
        Ok(db.dialect().delete(self, &criteria)?)
    }

    /// Inserts every record inside one transaction, the open one or a new
    /// one committed at the end. Generated keys are written back.
    ///
    /// # Errors
    ///
    /// Returns the first failure; a transaction started here is rolled back.
    pub fn bulk_insert<T: Record>(&mut self, records: &mut [T]) -> Result<()> {
        self.take_criteria();
        if self.tx.is_some() {
            return self.insert_each(records).map_err(|e| self.note(e));
        }

        self.begin()?;
        match self.insert_each(records) {
            Ok(()) => self.commit(),
            Err(e) => {
                warn!(error = %e, "Bulk insert failed, rolling back");
                if let Err(rollback) = self.rollback() {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    fn insert_each<T: Record>(&mut self, records: &mut [T]) -> Result<()> {
        let db = self.db;
        for record in records {
            record.validate().map_err(OrmError::Validation)?;
            let criteria = Criteria::new(db.extractor().extract(record, false, &[])?);
            let pk = primary_key(&criteria.model.fields, &criteria.model.table)?;
            let id = db.dialect().insert(self, &criteria)?;
            self.write_back_id(record, &pk, id)?;
        }
        Ok(())
    }

    fn row_exists(&mut self, table: &str, pk: &ModelField) -> Result<bool> {
        let column = self.db.dialect().quote_identifier(&pk.column);
        self.pending.condition = Some(Condition::equal(&column, pk.value.clone()));
        Ok(self.count_table(table)? > 0)
    }

    fn write_back_id(&self, record: &mut dyn Reflect, pk: &ModelField, id: Option<i64>) -> Result<()> {
        // An explicit key is kept as given.
        let generated = matches!(pk.value, SqlValue::Int(0) | SqlValue::UInt(0));
        if let Some(id) = id.filter(|&id| id != 0 && generated) {
            let value = self.db.dialect().coerce(SqlValue::Int(id), pk.kind)?;
            record.set(pk.field, value)?;
        }
        Ok(())
    }

    // =========================================================================
    // Raw SQL
    // =========================================================================

    /// Executes raw SQL written with `?` placeholders.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    pub fn exec(&mut self, sql: &str, args: &[SqlValue]) -> Result<ExecResult> {
        let sql = self.db.dialect().substitute_placeholders(sql);
        Ok(self.execute(&sql, args)?)
    }

    /// Runs a raw query written with `?` placeholders.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    pub fn query_rows(&mut self, sql: &str, args: &[SqlValue]) -> Result<Rows> {
        let sql = self.db.dialect().substitute_placeholders(sql);
        Ok(self.query(&sql, args)?)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Starts a transaction. Every following statement of this session runs
    /// inside it.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::TransactionInProgress`] when one is already open.
    pub fn begin(&mut self) -> Result<()> {
        if self.tx.is_some() {
            return Err(OrmError::TransactionInProgress);
        }
        let tx = self.db.driver().begin()?;
        debug!("Transaction started");
        self.tx = Some(TxState {
            tx,
            statements: HashMap::new(),
            first_error: None,
        });
        Ok(())
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded inside the transaction, in which
    /// case it is rolled back instead, or the driver's commit error.
    pub fn commit(&mut self) -> Result<()> {
        let state = self.tx.take().ok_or(OrmError::NoTransaction)?;
        if let Some(first) = state.first_error {
            warn!(error = %first, "Rolling back transaction after an earlier error");
            if let Err(e) = state.tx.rollback() {
                warn!(error = %e, "Rollback failed");
            }
            return Err(first);
        }
        state.tx.commit()?;
        debug!("Transaction committed");
        Ok(())
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NoTransaction`] or the driver's error.
    pub fn rollback(&mut self) -> Result<()> {
        let state = self.tx.take().ok_or(OrmError::NoTransaction)?;
        state.tx.rollback()?;
        debug!("Transaction rolled back");
        Ok(())
    }

    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Records the first error of an open transaction.
    fn note(&mut self, e: OrmError) -> OrmError {
        if let Some(state) = &mut self.tx {
            if state.first_error.is_none() {
                error!(error = %e, "Statement failed inside transaction");
                state.first_error = Some(e.clone());
            }
        }
        e
    }

    fn statement(&mut self, sql: &str) -> keel_sql_core::Result<Arc<dyn Statement>> {
        match &mut self.tx {
            Some(state) => {
                if let Some(statement) = state.statements.get(sql) {
                    return Ok(Arc::clone(statement));
                }
                let statement = state.tx.prepare(sql)?;
                state.statements.insert(sql.to_string(), Arc::clone(&statement));
                Ok(statement)
            }
            None => self.db.statements().get_or_prepare(self.db.driver(), sql),
        }
    }

    fn note_sql(&mut self, e: Error) -> Error {
        self.note(OrmError::Sql(e.clone()));
        e
    }
}

impl Executor for Session<'_> {
    fn execute(&mut self, sql: &str, args: &[SqlValue]) -> keel_sql_core::Result<ExecResult> {
        debug!(sql = %sql, args = ?args, "Executing SQL");
        self.statement(sql)
            .and_then(|statement| statement.execute(args))
            .map_err(|e| self.note_sql(e))
    }

    fn query(&mut self, sql: &str, args: &[SqlValue]) -> keel_sql_core::Result<Rows> {
        debug!(sql = %sql, args = ?args, "Executing SQL");
        self.statement(sql)
            .and_then(|statement| statement.query(args))
            .map_err(|e| self.note_sql(e))
    }
}

impl Catalog for Session<'_> {
    fn database_name(&self) -> &str {
        &self.db.config().database_name
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if let Some(state) = self.tx.take() {
            warn!("Session dropped with an open transaction, rolling back");
            if let Err(e) = state.tx.rollback() {
                warn!(error = %e, "Rollback failed");
            }
        }
    }
}

fn primary_key(fields: &[ModelField], table: &str) -> Result<ModelField> {
    fields
        .iter()
        .find(|f| f.primary_key)
        .cloned()
        .ok_or_else(|| {
            Error::MissingPrimaryKey {
                table: table.to_string(),
            }
            .into()
        })
}

/// Current UTC time at whole seconds, as stored by every dialect.
fn now() -> chrono::DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(TimeDelta::seconds(1)).unwrap_or(now)
}

fn blob_to_text(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::Blob(bytes) => match String::from_utf8(bytes) {
            Ok(text) => SqlValue::Text(text),
            Err(e) => SqlValue::Blob(e.into_bytes()),
        },
        other => other,
    }
}
