//! SQL dialects.
//!
//! [`Dialect`] renders models and criteria into SQL for one engine. The
//! default methods hold the shared rendering; each engine overrides quoting,
//! placeholders, type mapping, key generation and catalog lookups where it
//! differs.

mod mysql;
mod oracle;
mod postgres;
mod sqlite;

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};

pub use mysql::Mysql;
pub use oracle::Oracle;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use crate::criteria::Criteria;
use crate::error::{Error, Result};
use crate::executor::{Catalog, Executor};
use crate::model::{Model, ModelField};
use crate::value::{parse_timestamp, ScalarKind, SqlValue, TIME_LAYOUT};

/// Separator between a join alias and a column in projected names.
pub const ALIAS_SEPARATOR: &str = "___";

/// Engine-specific SQL rendering, type mapping and catalog access.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character.
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Quotes an identifier. Each `.` separated segment is quoted on its own.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        name.split('.')
            .map(|segment| format!("{quote}{segment}{quote}"))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Rewrites `?` placeholders into the engine's syntax.
    fn substitute_placeholders(&self, sql: &str) -> String {
        sql.to_string()
    }

    /// Returns whether INSERT reports the generated key with `RETURNING`.
    fn supports_returning(&self) -> bool {
        false
    }

    /// Column type for a scalar kind, `None` when the engine can not store it.
    fn map_kind(&self, kind: ScalarKind, size: Option<u32>) -> Option<String>;

    /// Column type for a `coltype` tag value.
    fn column_type_override(&self, column_type: &str) -> Option<&'static str>;

    /// Type and key clause of a primary key column.
    fn primary_key_sql(&self, is_string: bool, size: Option<u32>) -> String;

    /// Column type of a field, honoring a `coltype` override.
    ///
    /// # Errors
    ///
    /// Returns an error when the override or the kind has no mapping.
    fn sql_type(&self, field: &ModelField) -> Result<String> {
        if let Some(column_type) = &field.column_type {
            return self
                .column_type_override(column_type)
                .map(str::to_string)
                .ok_or_else(|| Error::UnsupportedColumnType {
                    dialect: self.name(),
                    column_type: column_type.clone(),
                    column: field.column.clone(),
                });
        }
        self.map_kind(field.kind, field.size)
            .ok_or_else(|| Error::UnsupportedFieldType {
                dialect: self.name(),
                kind: field.kind,
                column: field.column.clone(),
            })
    }

    /// Renders CREATE TABLE. Engines that need companion objects return
    /// more than one statement.
    ///
    /// # Errors
    ///
    /// Returns an error when a column type can not be mapped.
    fn create_table_sql(&self, model: &Model, if_not_exists: bool) -> Result<Vec<String>> {
        Ok(vec![create_table(self, model, if_not_exists)?])
    }

    /// Renders DROP TABLE.
    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_identifier(table))
    }

    /// Renders ALTER TABLE ... ADD COLUMN.
    ///
    /// # Errors
    ///
    /// Returns an error when the column type can not be mapped.
    fn add_column_sql(&self, table: &str, field: &ModelField) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            self.quote_identifier(table),
            self.quote_identifier(&field.column),
            self.sql_type(field)?
        ))
    }

    /// Renders CREATE INDEX.
    fn create_index_sql(&self, name: &str, table: &str, unique: bool, columns: &[String]) -> String {
        let mut sql = String::from("CREATE ");
        if unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        sql.push_str(&self.quote_identifier(name));
        sql.push_str(" ON ");
        sql.push_str(&self.quote_identifier(table));
        sql.push_str(" (");
        let cols: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        sql.push_str(&cols.join(", "));
        sql.push(')');
        sql
    }

    /// Renders INSERT.
    fn insert_sql(&self, criteria: &Criteria) -> (String, Vec<SqlValue>) {
        let model = &criteria.model;
        let (columns, values) = model.columns_and_values(false);
        let quoted: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        let markers = vec!["?"; columns.len()].join(", ");
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({markers})",
            self.quote_identifier(&model.table),
            quoted.join(", "),
        );
        if self.supports_returning() {
            if let Some(pk) = model.primary_key() {
                sql.push_str(" RETURNING ");
                sql.push_str(&self.quote_identifier(&pk.column));
            }
        }
        (self.substitute_placeholders(&sql), values)
    }

    /// Renders UPDATE with the criteria's condition.
    fn update_sql(&self, criteria: &Criteria) -> (String, Vec<SqlValue>) {
        let model = &criteria.model;
        let (columns, mut values) = model.columns_and_values(true);
        let pairs: Vec<String> = columns
            .iter()
            .map(|c| format!("{} = ?", self.quote_identifier(c)))
            .collect();
        let mut sql = format!(
            "UPDATE {} SET {}",
            self.quote_identifier(&model.table),
            pairs.join(", ")
        );
        if let Some(condition) = &criteria.condition {
            let (expr, args) = condition.merge();
            sql.push_str(" WHERE ");
            sql.push_str(&expr);
            values.extend(args);
        }
        (self.substitute_placeholders(&sql), values)
    }

    /// Renders DELETE with the criteria's condition.
    fn delete_sql(&self, criteria: &Criteria) -> (String, Vec<SqlValue>) {
        let mut sql = format!("DELETE FROM {}", self.quote_identifier(&criteria.model.table));
        let mut values = Vec::new();
        if let Some(condition) = &criteria.condition {
            let (expr, args) = condition.merge();
            sql.push_str(" WHERE ");
            sql.push_str(&expr);
            values = args;
        }
        (self.substitute_placeholders(&sql), values)
    }

    /// Renders SELECT, with a LEFT JOIN per reference unless joins are
    /// omitted. Joined columns are projected as `alias___column`.
    fn query_sql(&self, criteria: &Criteria) -> (String, Vec<SqlValue>) {
        let model = &criteria.model;
        let table = self.quote_identifier(&model.table);
        let has_join = !criteria.omit_join && !model.references.is_empty();

        let mut columns: Vec<String> = model
            .fields
            .iter()
            .map(|f| {
                let column = self.quote_identifier(&f.column);
                if has_join {
                    format!("{table}.{column}")
                } else {
                    column
                }
            })
            .collect();
        let mut tables = vec![table.clone()];

        if has_join {
            for reference in model.references.values() {
                let Some(target_pk) = reference.target.primary_key() else {
                    continue;
                };
                let alias = &reference.alias;
                let quoted_alias = self.quote_identifier(alias);
                tables.push(format!(
                    "LEFT JOIN {} AS {quoted_alias} ON {table}.{} = {quoted_alias}.{}",
                    self.quote_identifier(&reference.target.table),
                    self.quote_identifier(&reference.local_column),
                    self.quote_identifier(&target_pk.column),
                ));
                for field in &reference.target.fields {
                    columns.push(format!(
                        "{} AS {alias}{ALIAS_SEPARATOR}{}",
                        self.quote_identifier(&format!("{alias}.{}", field.column)),
                        field.column
                    ));
                }
            }
        }

        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), tables.join(" "));
        let mut args = Vec::new();
        if let Some(condition) = &criteria.condition {
            let (expr, condition_args) = condition.merge();
            sql.push_str(" WHERE ");
            sql.push_str(&expr);
            args = condition_args;
        }
        if !criteria.order_bys.is_empty() {
            let orders: Vec<String> = criteria
                .order_bys
                .iter()
                .map(|o| {
                    let path = self.quote_identifier(&o.path);
                    if o.descending {
                        format!("{path} DESC")
                    } else {
                        path
                    }
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(", "));
        }
        sql.push_str(&self.paging_sql(criteria.limit, criteria.offset, &mut args));
        (self.substitute_placeholders(&sql), args)
    }

    /// Renders LIMIT and OFFSET, pushing their arguments. Zero means unset.
    fn paging_sql(&self, limit: Option<u64>, offset: Option<u64>, args: &mut Vec<SqlValue>) -> String {
        let mut sql = String::new();
        if let Some(limit) = limit.filter(|&n| n > 0) {
            sql.push_str(" LIMIT ?");
            args.push(count_value(limit));
        }
        if let Some(offset) = offset.filter(|&n| n > 0) {
            sql.push_str(" OFFSET ?");
            args.push(count_value(offset));
        }
        sql
    }

    /// Inserts the criteria's model and returns the generated key, if any.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn insert(&self, executor: &mut dyn Executor, criteria: &Criteria) -> Result<Option<i64>> {
        let (sql, args) = self.insert_sql(criteria);
        if self.supports_returning() && criteria.model.primary_key().is_some() {
            let rows = executor.query(&sql, &args)?;
            return Ok(rows.first_value().and_then(SqlValue::as_i64));
        }
        Ok(executor.execute(&sql, &args)?.last_insert_id)
    }

    /// Updates rows and returns how many were affected.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn update(&self, executor: &mut dyn Executor, criteria: &Criteria) -> Result<u64> {
        let (sql, args) = self.update_sql(criteria);
        Ok(executor.execute(&sql, &args)?.rows_affected)
    }

    /// Deletes rows and returns how many were affected.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn delete(&self, executor: &mut dyn Executor, criteria: &Criteria) -> Result<u64> {
        let (sql, args) = self.delete_sql(criteria);
        Ok(executor.execute(&sql, &args)?.rows_affected)
    }

    /// Columns currently present in `table`.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn columns_in_table(&self, catalog: &mut dyn Catalog, table: &str) -> Result<BTreeSet<String>> {
        let sql = self.substitute_placeholders(
            "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?",
        );
        let args = vec![
            SqlValue::Text(catalog.database_name().to_string()),
            SqlValue::Text(table.to_string()),
        ];
        let rows = catalog.query(&sql, &args)?;
        Ok(text_column(&rows.rows, 0))
    }

    /// Returns whether `index` exists on `table`.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    fn index_exists(&self, catalog: &mut dyn Catalog, table: &str, index: &str) -> Result<bool> {
        let sql = self.substitute_placeholders(
            "SELECT INDEX_NAME FROM INFORMATION_SCHEMA.STATISTICS \
             WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND INDEX_NAME = ?",
        );
        let args = vec![
            SqlValue::Text(catalog.database_name().to_string()),
            SqlValue::Text(table.to_string()),
            SqlValue::Text(index.to_string()),
        ];
        Ok(!catalog.query(&sql, &args)?.is_empty())
    }

    /// Returns whether a DDL error only means the object already exists.
    fn is_benign_migration_error(&self, _error: &Error) -> bool {
        false
    }

    /// Reads a stored boolean.
    ///
    /// # Errors
    ///
    /// Returns a conversion error for any other representation.
    fn parse_bool(&self, value: &SqlValue) -> Result<bool> {
        match value {
            SqlValue::Bool(b) => Ok(*b),
            other => Err(Error::conversion(ScalarKind::Bool, other.describe())),
        }
    }

    /// Reads a stored timestamp.
    ///
    /// # Errors
    ///
    /// Returns a conversion error for unparseable values.
    fn parse_time(&self, value: &SqlValue) -> Result<DateTime<Utc>> {
        match value {
            SqlValue::Time(t) => Ok(*t),
            SqlValue::Text(_) | SqlValue::Blob(_) => value
                .as_text()
                .and_then(parse_timestamp)
                .ok_or_else(|| Error::conversion(ScalarKind::Time, value.describe())),
            other => Err(Error::conversion(ScalarKind::Time, other.describe())),
        }
    }

    /// Converts a driver value into the canonical value for `kind`.
    ///
    /// NULL passes through unchanged.
    ///
    /// # Errors
    ///
    /// Returns a conversion error when the value can not represent `kind`.
    fn coerce(&self, value: SqlValue, kind: ScalarKind) -> Result<SqlValue> {
        match (kind, value) {
            (_, SqlValue::Null) => Ok(SqlValue::Null),
            (ScalarKind::Bool, value) => self.parse_bool(&value).map(SqlValue::Bool),
            (ScalarKind::Time, value) => self.parse_time(&value).map(SqlValue::Time),
            (kind, value) if kind.is_integer() => coerce_integer(value, kind),
            (ScalarKind::F32 | ScalarKind::F64, value) => coerce_float(value, kind),
            (ScalarKind::Text, value) => coerce_text(value),
            (_, SqlValue::Blob(bytes)) => Ok(SqlValue::Blob(bytes)),
            (_, SqlValue::Text(text)) => Ok(SqlValue::Blob(text.into_bytes())),
            (kind, value) => Err(Error::conversion(kind, value.describe())),
        }
    }
}

/// Renders a single CREATE TABLE statement through `dialect`'s quoting and
/// type mapping.
///
/// # Errors
///
/// Returns an error when a column type can not be mapped.
pub fn create_table<D: Dialect + ?Sized>(dialect: &D, model: &Model, if_not_exists: bool) -> Result<String> {
    let mut sql = String::from("CREATE TABLE ");
    if if_not_exists {
        sql.push_str("IF NOT EXISTS ");
    }
    sql.push_str(&dialect.quote_identifier(&model.table));
    sql.push_str(" ( ");

    let mut definitions = Vec::with_capacity(model.fields.len());
    for field in &model.fields {
        let mut definition = dialect.quote_identifier(&field.column);
        definition.push(' ');
        if field.primary_key {
            definition.push_str(&dialect.primary_key_sql(field.kind == ScalarKind::Text, field.size));
        } else {
            definition.push_str(&dialect.sql_type(field)?);
            if field.not_null {
                definition.push_str(" NOT NULL");
            }
            if let Some(default) = &field.default {
                definition.push_str(" DEFAULT ");
                definition.push_str(default);
            }
        }
        definitions.push(definition);
    }
    sql.push_str(&definitions.join(", "));

    for reference in model.references.values().filter(|r| r.foreign_key) {
        if let Some(pk) = reference.target.primary_key() {
            sql.push_str(&format!(
                ", FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE",
                dialect.quote_identifier(&reference.local_column),
                dialect.quote_identifier(&reference.target.table),
                dialect.quote_identifier(&pk.column),
            ));
        }
    }
    sql.push_str(" )");
    Ok(sql)
}

/// Rewrites `?` into `$1`, `$2`, ... in order.
#[must_use]
pub fn numbered_placeholders(sql: &str) -> String {
    let mut result = String::with_capacity(sql.len() + 8);
    let mut position = 1;
    for c in sql.chars() {
        if c == '?' {
            result.push('$');
            result.push_str(&position.to_string());
            position += 1;
        } else {
            result.push(c);
        }
    }
    result
}

/// Reads a boolean stored as an integer.
pub(crate) const fn bool_from_integer(value: &SqlValue) -> Option<bool> {
    match value {
        SqlValue::Bool(b) => Some(*b),
        SqlValue::Int(n) => Some(*n != 0),
        SqlValue::UInt(n) => Some(*n != 0),
        _ => None,
    }
}

/// Collects one text column of a catalog result.
pub(crate) fn text_column(rows: &[Vec<SqlValue>], index: usize) -> BTreeSet<String> {
    rows.iter()
        .filter_map(|row| row.get(index))
        .filter_map(SqlValue::as_text)
        .map(str::to_string)
        .collect()
}

fn count_value(n: u64) -> SqlValue {
    SqlValue::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

fn coerce_integer(value: SqlValue, kind: ScalarKind) -> Result<SqlValue> {
    let mismatch = |value: &SqlValue| Error::conversion(kind, value.describe());
    let signed = kind.is_signed();
    match &value {
        SqlValue::Int(n) if signed => Ok(SqlValue::Int(*n)),
        SqlValue::Int(n) => u64::try_from(*n)
            .map(SqlValue::UInt)
            .map_err(|_| mismatch(&value)),
        SqlValue::UInt(n) if signed => i64::try_from(*n)
            .map(SqlValue::Int)
            .map_err(|_| mismatch(&value)),
        SqlValue::UInt(n) => Ok(SqlValue::UInt(*n)),
        SqlValue::Bool(b) if signed => Ok(SqlValue::Int(i64::from(*b))),
        SqlValue::Bool(b) => Ok(SqlValue::UInt(u64::from(*b))),
        SqlValue::Text(_) | SqlValue::Blob(_) => {
            let text = value.as_text().map(str::trim).ok_or_else(|| mismatch(&value))?;
            let parsed = if signed {
                text.parse::<i64>().map(SqlValue::Int).ok()
            } else {
                text.parse::<u64>().map(SqlValue::UInt).ok()
            };
            parsed.ok_or_else(|| mismatch(&value))
        }
        _ => Err(mismatch(&value)),
    }
}

#[allow(clippy::cast_precision_loss)]
fn coerce_float(value: SqlValue, kind: ScalarKind) -> Result<SqlValue> {
    match value {
        SqlValue::Float(f) => Ok(SqlValue::Float(f)),
        SqlValue::Int(n) => Ok(SqlValue::Float(n as f64)),
        SqlValue::UInt(n) => Ok(SqlValue::Float(n as f64)),
        ref other @ (SqlValue::Text(_) | SqlValue::Blob(_)) => other
            .as_text()
            .and_then(|t| t.trim().parse::<f64>().ok())
            .map(SqlValue::Float)
            .ok_or_else(|| Error::conversion(kind, other.describe())),
        other => Err(Error::conversion(kind, other.describe())),
    }
}

fn coerce_text(value: SqlValue) -> Result<SqlValue> {
    match value {
        SqlValue::Text(text) => Ok(SqlValue::Text(text)),
        SqlValue::Blob(bytes) => String::from_utf8(bytes)
            .map(SqlValue::Text)
            .map_err(|e| Error::conversion(ScalarKind::Text, format!("blob that is not UTF-8: {e}"))),
        SqlValue::Int(n) => Ok(SqlValue::Text(n.to_string())),
        SqlValue::UInt(n) => Ok(SqlValue::Text(n.to_string())),
        SqlValue::Float(f) => Ok(SqlValue::Text(f.to_string())),
        SqlValue::Bool(b) => Ok(SqlValue::Text(b.to_string())),
        SqlValue::Time(t) => Ok(SqlValue::Text(t.format(TIME_LAYOUT).to_string())),
        SqlValue::Null => Ok(SqlValue::Null),
    }
}
