//! PostgreSQL dialect.

use std::collections::BTreeSet;

use super::{numbered_placeholders, text_column, Dialect};
use crate::error::Result;
use crate::executor::Catalog;
use crate::value::{ScalarKind, SqlValue};

const INLINE_LIMIT: u32 = 65532;

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Postgres {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn substitute_placeholders(&self, sql: &str) -> String {
        numbered_placeholders(sql)
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn map_kind(&self, kind: ScalarKind, size: Option<u32>) -> Option<String> {
        let sql = match kind {
            ScalarKind::Bool => "boolean".to_string(),
            ScalarKind::I8
            | ScalarKind::I16
            | ScalarKind::I32
            | ScalarKind::U8
            | ScalarKind::U16
            | ScalarKind::U32 => "integer".to_string(),
            ScalarKind::I64 | ScalarKind::U64 => "bigint".to_string(),
            ScalarKind::F32 | ScalarKind::F64 => "double precision".to_string(),
            ScalarKind::Text => size
                .filter(|&n| n > 0 && n < INLINE_LIMIT)
                .map_or_else(|| "text".to_string(), |n| format!("varchar({n})")),
            // No sized binary type exists, so the size hint is ignored.
            ScalarKind::Bytes => "bytea".to_string(),
            ScalarKind::Time => "timestamp with time zone".to_string(),
        };
        Some(sql)
    }

    fn column_type_override(&self, column_type: &str) -> Option<&'static str> {
        match column_type {
            "int" => Some("integer"),
            "bigint" => Some("bigint"),
            "boolean" => Some("boolean"),
            "double" => Some("double precision"),
            "timestamp" => Some("timestamp with time zone"),
            "text" => Some("text"),
            _ => None,
        }
    }

    fn primary_key_sql(&self, is_string: bool, _size: Option<u32>) -> String {
        if is_string {
            return "text PRIMARY KEY".to_string();
        }
        "bigserial PRIMARY KEY".to_string()
    }

    fn columns_in_table(&self, catalog: &mut dyn Catalog, table: &str) -> Result<BTreeSet<String>> {
        let sql = self.substitute_placeholders(
            "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = ?",
        );
        let rows = catalog.query(&sql, &[SqlValue::Text(table.to_string())])?;
        Ok(text_column(&rows.rows, 0))
    }

    fn index_exists(&self, catalog: &mut dyn Catalog, table: &str, index: &str) -> Result<bool> {
        let sql = self
            .substitute_placeholders("SELECT indexname FROM pg_indexes WHERE tablename = ? AND indexname = ?");
        let args = [
            SqlValue::Text(table.to_string()),
            SqlValue::Text(index.to_string()),
        ];
        Ok(!catalog.query(&sql, &args)?.is_empty())
    }
}
