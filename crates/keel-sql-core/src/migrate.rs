//! Schema reconciliation between a model and a live table.
//!
//! Only additive changes are made: missing columns are added and missing
//! indexes created. A table holding columns the model does not declare is
//! refused, since telling a rename from a drop would be a guess.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::executor::Catalog;
use crate::model::{Model, ModelField};

/// Returns the model fields missing from `present`.
///
/// # Errors
///
/// Returns [`Error::ColumnRenamed`] when `present` holds columns the model
/// does not declare.
pub fn missing_columns<'m>(model: &'m Model, present: &BTreeSet<String>) -> Result<Vec<&'m ModelField>> {
    let (existing, missing): (Vec<&ModelField>, Vec<&ModelField>) =
        model.fields.iter().partition(|f| present.contains(&f.column));
    if existing.len() != present.len() {
        let declared: BTreeSet<&str> = existing.iter().map(|f| f.column.as_str()).collect();
        return Err(Error::ColumnRenamed {
            table: model.table.clone(),
            unknown: present
                .iter()
                .filter(|c| !declared.contains(c.as_str()))
                .cloned()
                .collect(),
        });
    }
    Ok(missing)
}

/// Creates an index unless it already exists. The name is namespaced by
/// the table. Returns the executed statement, if any.
///
/// # Errors
///
/// Returns the driver's error.
pub fn create_index_if_missing(
    dialect: &dyn Dialect,
    catalog: &mut dyn Catalog,
    table: &str,
    name: &str,
    unique: bool,
    columns: &[String],
) -> Result<Option<String>> {
    let name = format!("{table}_{name}");
    if dialect.index_exists(catalog, table, &name)? {
        return Ok(None);
    }
    let sql = dialect.create_index_sql(&name, table, unique, columns);
    info!(table = %table, index = %name, unique, "Creating index");
    catalog.execute(&sql, &[])?;
    Ok(Some(sql))
}

/// Brings an existing table in line with `model` and returns the
/// statements executed. Running it again executes nothing.
///
/// Index creation continues past a failing index; the first failure is
/// returned once every index has been tried.
///
/// # Errors
///
/// Returns [`Error::ColumnRenamed`], a column type error or the driver's
/// error.
pub fn reconcile(dialect: &dyn Dialect, catalog: &mut dyn Catalog, model: &Model) -> Result<Vec<String>> {
    let present = dialect.columns_in_table(catalog, &model.table)?;
    let mut statements = Vec::new();

    for field in missing_columns(model, &present)? {
        let sql = dialect.add_column_sql(&model.table, field)?;
        info!(table = %model.table, column = %field.column, "Adding column");
        catalog.execute(&sql, &[])?;
        statements.push(sql);
    }

    let mut first_error = None;
    for index in &model.indexes {
        match create_index_if_missing(dialect, catalog, &model.table, &index.name, index.unique, &index.columns) {
            Ok(Some(sql)) => statements.push(sql),
            Ok(None) => {}
            Err(e) => {
                warn!(table = %model.table, index = %index.name, error = %e, "Index creation failed");
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(statements),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Extractor;
    use keel_sql_derive::Record;

    #[derive(Debug, Default, Record)]
    struct Account {
        id: i64,
        name: String,
        balance: f64,
    }

    fn present(columns: &[&str]) -> BTreeSet<String> {
        columns.iter().map(ToString::to_string).collect()
    }

    fn model() -> Model {
        Extractor::default()
            .extract(&mut Account::default(), true, &[])
            .unwrap()
    }

    #[test]
    fn test_missing_columns() {
        let model = model();
        let missing = missing_columns(&model, &present(&["id", "name"])).unwrap();
        let names: Vec<_> = missing.iter().map(|f| f.column.as_str()).collect();
        assert_eq!(names, vec!["balance"]);
        assert!(missing_columns(&model, &present(&["id", "name", "balance"]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_unknown_column_is_refused() {
        let model = model();
        let err = missing_columns(&model, &present(&["id", "title", "balance"])).unwrap_err();
        match err {
            Error::ColumnRenamed { table, unknown } => {
                assert_eq!(table, "account");
                assert_eq!(unknown, vec!["title".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
