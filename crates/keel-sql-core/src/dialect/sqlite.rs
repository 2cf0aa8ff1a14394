//! SQLite dialect.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};

use super::{bool_from_integer, text_column, Dialect};
use crate::error::{Error, Result};
use crate::executor::Catalog;
use crate::value::{parse_timestamp, ScalarKind, SqlValue};

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Sqlite {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Renders a string literal for PRAGMA arguments, which take no parameters.
fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn map_kind(&self, kind: ScalarKind, _size: Option<u32>) -> Option<String> {
        // SQLite has type affinity only; sizes are not enforced.
        let sql = match kind {
            ScalarKind::Bool
            | ScalarKind::I8
            | ScalarKind::I16
            | ScalarKind::I32
            | ScalarKind::I64
            | ScalarKind::U8
            | ScalarKind::U16
            | ScalarKind::U32
            | ScalarKind::U64 => "integer",
            ScalarKind::F32 | ScalarKind::F64 => "real",
            ScalarKind::Text | ScalarKind::Time => "text",
            ScalarKind::Bytes => "blob",
        };
        Some(sql.to_string())
    }

    fn column_type_override(&self, column_type: &str) -> Option<&'static str> {
        match column_type {
            "int" | "bigint" | "boolean" => Some("integer"),
            "double" => Some("real"),
            "timestamp" | "text" => Some("text"),
            _ => None,
        }
    }

    fn primary_key_sql(&self, is_string: bool, _size: Option<u32>) -> String {
        if is_string {
            return "text PRIMARY KEY NOT NULL".to_string();
        }
        "integer PRIMARY KEY AUTOINCREMENT NOT NULL".to_string()
    }

    fn columns_in_table(&self, catalog: &mut dyn Catalog, table: &str) -> Result<BTreeSet<String>> {
        let rows = catalog.query(&format!("PRAGMA table_info({})", literal(table)), &[])?;
        Ok(text_column(&rows.rows, 1))
    }

    fn index_exists(&self, catalog: &mut dyn Catalog, table: &str, index: &str) -> Result<bool> {
        let rows = catalog.query(&format!("PRAGMA index_list({})", literal(table)), &[])?;
        Ok(text_column(&rows.rows, 1).contains(index))
    }

    fn parse_bool(&self, value: &SqlValue) -> Result<bool> {
        bool_from_integer(value).ok_or_else(|| Error::conversion(ScalarKind::Bool, value.describe()))
    }

    fn parse_time(&self, value: &SqlValue) -> Result<DateTime<Utc>> {
        let parsed = match value {
            SqlValue::Time(t) => Some(*t),
            SqlValue::Int(secs) => Utc.timestamp_opt(*secs, 0).single(),
            SqlValue::UInt(secs) => i64::try_from(*secs)
                .ok()
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            SqlValue::Text(_) | SqlValue::Blob(_) => value.as_text().and_then(parse_timestamp),
            _ => None,
        };
        parsed.ok_or_else(|| Error::conversion(ScalarKind::Time, value.describe()))
    }
}
