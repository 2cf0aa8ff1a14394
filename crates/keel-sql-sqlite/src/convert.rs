//! Conversions between [`SqlValue`] and SQLite storage classes.

use keel_sql_core::executor::Rows;
use keel_sql_core::value::TIME_LAYOUT;
use keel_sql_core::SqlValue;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

pub type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Builds a query with `args` bound in order.
///
/// Times are stored as text in [`TIME_LAYOUT`]. Unsigned values beyond
/// `i64` do not fit an SQLite integer and are stored as text.
pub fn bind_all<'q>(sql: &'q str, args: &[SqlValue]) -> SqliteQuery<'q> {
    let query: SqliteQuery<'q> = sqlx::query(sql);
    args.iter().fold(query, |query, value| match value {
        SqlValue::Null => query.bind(None::<i64>),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(n) => query.bind(*n),
        SqlValue::UInt(n) => match i64::try_from(*n) {
            Ok(n) => query.bind(n),
            Err(_) => query.bind(n.to_string()),
        },
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Blob(b) => query.bind(b.clone()),
        SqlValue::Time(t) => query.bind(t.format(TIME_LAYOUT).to_string()),
    })
}

/// Reads one value by the storage class it was stored with.
///
/// # Errors
///
/// Returns the decoding error of sqlx.
pub fn decode(row: &SqliteRow, index: usize) -> Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_info = raw.type_info();
    let value = match type_info.name() {
        "INTEGER" | "BOOLEAN" => SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" => SqlValue::Float(row.try_get_unchecked::<f64, _>(index)?),
        "BLOB" => SqlValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => SqlValue::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

/// Buffers fetched rows. Column names come from the first row, so an empty
/// result has none.
///
/// # Errors
///
/// Returns the decoding error of sqlx.
pub fn to_rows(fetched: &[SqliteRow]) -> Result<Rows, sqlx::Error> {
    let columns = fetched
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let rows = fetched
        .iter()
        .map(|row| (0..row.len()).map(|i| decode(row, i)).collect::<Result<Vec<_>, _>>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Rows { columns, rows })
}
