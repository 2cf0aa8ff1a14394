//! MySQL dialect.

use super::{bool_from_integer, Dialect};
use crate::error::{Error, Result};
use crate::value::{ScalarKind, SqlValue};

/// Longest size rendered as an inline `varchar`/`varbinary`.
const INLINE_LIMIT: u32 = 65532;

/// MySQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mysql;

impl Mysql {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for Mysql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn map_kind(&self, kind: ScalarKind, size: Option<u32>) -> Option<String> {
        let inline = size.filter(|&n| n > 0 && n < INLINE_LIMIT);
        let sql = match kind {
            ScalarKind::Bool => "boolean".to_string(),
            ScalarKind::I8
            | ScalarKind::I16
            | ScalarKind::I32
            | ScalarKind::U8
            | ScalarKind::U16
            | ScalarKind::U32 => "int".to_string(),
            ScalarKind::I64 | ScalarKind::U64 => "bigint".to_string(),
            ScalarKind::F32 | ScalarKind::F64 => "double".to_string(),
            ScalarKind::Text => inline.map_or_else(|| "longtext".to_string(), |n| format!("varchar({n})")),
            ScalarKind::Bytes => inline.map_or_else(|| "longblob".to_string(), |n| format!("varbinary({n})")),
            ScalarKind::Time => "timestamp".to_string(),
        };
        Some(sql)
    }

    fn column_type_override(&self, column_type: &str) -> Option<&'static str> {
        match column_type {
            "int" => Some("int"),
            "bigint" => Some("bigint"),
            "boolean" => Some("boolean"),
            "double" => Some("double"),
            "timestamp" => Some("timestamp"),
            "text" => Some("longtext"),
            _ => None,
        }
    }

    fn primary_key_sql(&self, is_string: bool, size: Option<u32>) -> String {
        if is_string {
            return format!("varchar({}) PRIMARY KEY", size.filter(|&n| n > 0).unwrap_or(255));
        }
        "bigint PRIMARY KEY AUTO_INCREMENT".to_string()
    }

    fn parse_bool(&self, value: &SqlValue) -> Result<bool> {
        bool_from_integer(value).ok_or_else(|| Error::conversion(ScalarKind::Bool, value.describe()))
    }
}
