//! Row mapping from query results into records.
//!
//! A plain column name maps onto a field of the root record. A name of the
//! form `alias___column` maps onto a field of the record behind the
//! reference whose join alias is `alias`.

use std::collections::BTreeMap;

use crate::dialect::{Dialect, ALIAS_SEPARATOR};
use crate::error::{Error, Result};
use crate::naming::Naming;
use crate::reflect::{FieldKind, Reflect};
use crate::value::SqlValue;

/// Copies result rows into records through a dialect's value coercion.
#[derive(Debug, Clone, Copy)]
pub struct RowMapper<'a> {
    dialect: &'a dyn Dialect,
    naming: &'a Naming,
}

impl<'a> RowMapper<'a> {
    #[must_use]
    pub const fn new(dialect: &'a dyn Dialect, naming: &'a Naming) -> Self {
        Self { dialect, naming }
    }

    /// Assigns one row to `record`.
    ///
    /// Columns matching no field are ignored. A joined group whose values
    /// are all NULL, as after a LEFT JOIN miss, leaves its reference unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Column`] when a value can not be converted.
    pub fn scan_into(&self, record: &mut dyn Reflect, columns: &[String], row: Vec<SqlValue>) -> Result<()> {
        let mut groups: BTreeMap<&str, Vec<(&str, SqlValue)>> = BTreeMap::new();
        for (column, value) in columns.iter().zip(row) {
            match column.split_once(ALIAS_SEPARATOR) {
                Some((alias, column)) => groups.entry(alias).or_default().push((column, value)),
                None => self.assign(record, column, value)?,
            }
        }

        for (alias, values) in groups {
            let Some(decl) = record
                .fields()
                .iter()
                .find(|d| d.kind == FieldKind::Reference && self.naming.join_alias(d.name) == alias)
            else {
                continue;
            };
            if values.iter().all(|(_, value)| value.is_null()) {
                record.clear_reference(decl.name);
                continue;
            }
            let Some(target) = record.reference_or_default(decl.name) else {
                continue;
            };
            for (column, value) in values {
                self.assign(target, column, value)?;
            }
        }
        Ok(())
    }

    fn assign(&self, record: &mut dyn Reflect, column: &str, value: SqlValue) -> Result<()> {
        let Some(decl) = self.naming.field_for_column(record.fields(), column) else {
            return Ok(());
        };
        let (kind, nullable) = match decl.kind {
            FieldKind::Scalar(kind) => (kind, false),
            FieldKind::Nullable(kind) => (kind, true),
            FieldKind::Reference | FieldKind::Map | FieldKind::Sequence => return Ok(()),
        };
        // NULL into a non-optional field keeps its current value.
        if value.is_null() && !nullable {
            return Ok(());
        }
        let column_error = |source: Error| Error::Column {
            column: column.to_string(),
            source: Box::new(source),
        };
        let value = self.dialect.coerce(value, kind).map_err(column_error)?;
        record.set(decl.name, value).map_err(column_error)
    }
}
