//! Oracle dialect.
//!
//! Integer primary keys are generated by a sequence and a `BEFORE INSERT`
//! trigger created alongside the table.

use std::collections::BTreeSet;

use super::{bool_from_integer, create_table, numbered_placeholders, text_column, Dialect};
use crate::error::{Error, Result};
use crate::executor::Catalog;
use crate::model::Model;
use crate::value::{ScalarKind, SqlValue};

const INLINE_LIMIT: u32 = 4000;

/// Oracle dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Oracle;

impl Oracle {
    /// Creates a new Oracle dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for Oracle {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn substitute_placeholders(&self, sql: &str) -> String {
        numbered_placeholders(sql)
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn map_kind(&self, kind: ScalarKind, size: Option<u32>) -> Option<String> {
        let size = size.filter(|&n| n > 0);
        let sql = match kind {
            ScalarKind::Bool => "NUMBER(1)".to_string(),
            ScalarKind::I8
            | ScalarKind::I16
            | ScalarKind::I32
            | ScalarKind::I64
            | ScalarKind::U8
            | ScalarKind::U16
            | ScalarKind::U32
            | ScalarKind::U64 => size.map_or_else(|| "NUMBER".to_string(), |n| format!("NUMBER({n})")),
            // `size:NP` encodes precision N and scale P.
            ScalarKind::F32 | ScalarKind::F64 => size.map_or_else(
                || "NUMBER(16,2)".to_string(),
                |n| format!("NUMBER({},{})", n / 10, n % 10),
            ),
            ScalarKind::Text | ScalarKind::Bytes => size
                .filter(|&n| n < INLINE_LIMIT)
                .map_or_else(|| "CLOB".to_string(), |n| format!("VARCHAR2({n})")),
            ScalarKind::Time => "DATE".to_string(),
        };
        Some(sql)
    }

    fn column_type_override(&self, column_type: &str) -> Option<&'static str> {
        match column_type {
            "int" => Some("NUMBER(10)"),
            "bigint" => Some("NUMBER(19)"),
            "boolean" => Some("NUMBER(1)"),
            "double" => Some("BINARY_DOUBLE"),
            "timestamp" => Some("DATE"),
            "text" => Some("CLOB"),
            _ => None,
        }
    }

    fn primary_key_sql(&self, is_string: bool, size: Option<u32>) -> String {
        let size = size.filter(|&n| n > 0);
        if is_string {
            return format!("VARCHAR2({}) PRIMARY KEY NOT NULL", size.unwrap_or(255));
        }
        format!("NUMBER({}) PRIMARY KEY NOT NULL", size.unwrap_or(16))
    }

    fn create_table_sql(&self, model: &Model, _if_not_exists: bool) -> Result<Vec<String>> {
        // No IF NOT EXISTS; a repeated create fails with ORA-00955.
        let mut statements = vec![create_table(self, model, false)?];
        let Some(pk) = model.primary_key().filter(|pk| pk.kind.is_integer()) else {
            return Ok(statements);
        };
        let prefix = format!("{}_{}", model.table, pk.column);
        let column = self.quote_identifier(&pk.column);
        statements.push(format!(
            "CREATE SEQUENCE {prefix}_seq MINVALUE 1 NOMAXVALUE START WITH 1 INCREMENT BY 1 NOCACHE CYCLE"
        ));
        statements.push(format!(
            "CREATE TRIGGER {prefix}_trigger BEFORE INSERT ON {} FOR EACH ROW WHEN (new.{column} IS NULL) \
             BEGIN SELECT {prefix}_seq.NEXTVAL INTO :new.{column} FROM dual; END;",
            self.quote_identifier(&model.table)
        ));
        Ok(statements)
    }

    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(table))
    }

    fn paging_sql(&self, limit: Option<u64>, offset: Option<u64>, args: &mut Vec<SqlValue>) -> String {
        let count = |n: u64| SqlValue::Int(i64::try_from(n).unwrap_or(i64::MAX));
        let limit = limit.filter(|&n| n > 0);
        let offset = offset.filter(|&n| n > 0);
        match (offset, limit) {
            (Some(offset), Some(limit)) => {
                args.push(count(offset));
                args.push(count(limit));
                " OFFSET ? ROWS FETCH NEXT ? ROWS ONLY".to_string()
            }
            (Some(offset), None) => {
                args.push(count(offset));
                " OFFSET ? ROWS".to_string()
            }
            (None, Some(limit)) => {
                args.push(count(limit));
                " FETCH FIRST ? ROWS ONLY".to_string()
            }
            (None, None) => String::new(),
        }
    }

    fn columns_in_table(&self, catalog: &mut dyn Catalog, table: &str) -> Result<BTreeSet<String>> {
        let sql = self.substitute_placeholders("SELECT COLUMN_NAME FROM USER_TAB_COLUMNS WHERE TABLE_NAME = ?");
        let rows = catalog.query(&sql, &[SqlValue::Text(table.to_string())])?;
        Ok(text_column(&rows.rows, 0))
    }

    fn index_exists(&self, catalog: &mut dyn Catalog, table: &str, index: &str) -> Result<bool> {
        let sql = self.substitute_placeholders(
            "SELECT INDEX_NAME FROM USER_INDEXES WHERE TABLE_NAME = ? AND INDEX_NAME = ?",
        );
        let args = [
            SqlValue::Text(table.to_string()),
            SqlValue::Text(index.to_string()),
        ];
        Ok(!catalog.query(&sql, &args)?.is_empty())
    }

    fn is_benign_migration_error(&self, error: &Error) -> bool {
        let message = error.to_string();
        message.contains("ORA-00955") || message.contains("ORA-00942")
    }

    fn parse_bool(&self, value: &SqlValue) -> Result<bool> {
        bool_from_integer(value).ok_or_else(|| Error::conversion(ScalarKind::Bool, value.describe()))
    }
}
