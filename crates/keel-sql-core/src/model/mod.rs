//! Table descriptors derived from record declarations.
//!
//! A [`Model`] is built by the [`Extractor`] from a live record value. It
//! carries the record's column values, so it is rebuilt for every
//! operation; the parsed declaration behind it is memoized per type.

mod extract;
mod index;
mod tag;

use std::collections::BTreeMap;

pub use extract::Extractor;
pub use index::{IndexSpec, Indexes};
pub use tag::FieldTags;

use crate::value::{ScalarKind, SqlValue};

/// One mapped column of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelField {
    pub column: String,
    /// Rust field the column is read from.
    pub field: &'static str,
    pub kind: ScalarKind,
    /// Whether the field is an `Option`.
    pub nullable: bool,
    pub value: SqlValue,
    pub primary_key: bool,
    pub not_null: bool,
    pub unique: bool,
    pub indexed: bool,
    pub created: bool,
    pub updated: bool,
    pub size: Option<u32>,
    pub default: Option<String>,
    pub column_type: Option<String>,
}

/// An edge from a root model to a referenced model.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Column on the root table holding the key.
    pub local_column: String,
    /// Alias of the joined table.
    pub alias: String,
    pub target: Model,
    /// Whether `CREATE TABLE` emits a `FOREIGN KEY` constraint.
    pub foreign_key: bool,
}

/// Which automatic timestamp to stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    Created,
    Updated,
}

/// Descriptor of one record's table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub table: String,
    pub fields: Vec<ModelField>,
    /// Index of the primary key in `fields`.
    pub pk: Option<usize>,
    /// References keyed by the Rust name of the reference field.
    pub references: BTreeMap<String, Reference>,
    pub indexes: Indexes,
}

impl Model {
    /// Returns the primary key field.
    #[must_use]
    pub fn primary_key(&self) -> Option<&ModelField> {
        self.pk.and_then(|i| self.fields.get(i))
    }

    /// Returns whether the primary key is unset. A model without one counts
    /// as unset.
    #[must_use]
    pub fn pk_is_zero(&self) -> bool {
        self.primary_key().is_none_or(|pk| pk.value.is_zero())
    }

    /// Looks up a field by column name.
    #[must_use]
    pub fn field(&self, column: &str) -> Option<&ModelField> {
        self.fields.iter().find(|f| f.column == column)
    }

    /// Columns and values written by an INSERT or UPDATE.
    ///
    /// An insert skips a zero primary key so the database generates it. An
    /// update skips the primary key and every NULL value.
    #[must_use]
    pub fn columns_and_values(&self, for_update: bool) -> (Vec<&str>, Vec<SqlValue>) {
        let mut columns = Vec::with_capacity(self.fields.len());
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let skip = if for_update {
                field.primary_key || field.value.is_null()
            } else {
                field.primary_key && field.value.is_zero()
            };
            if !skip {
                columns.push(field.column.as_str());
                values.push(field.value.clone());
            }
        }
        (columns, values)
    }

    /// Index of the time field stamped on save, if any.
    #[must_use]
    pub fn time_field(&self, stamp: Stamp) -> Option<usize> {
        let tagged = |f: &ModelField| match stamp {
            Stamp::Created => f.created,
            Stamp::Updated => f.updated,
        };
        let column = match stamp {
            Stamp::Created => "created",
            Stamp::Updated => "updated",
        };
        let times = || {
            self.fields
                .iter()
                .enumerate()
                .filter(|(_, f)| f.kind == ScalarKind::Time)
        };
        times()
            .find(|(_, f)| tagged(f))
            .or_else(|| times().find(|(_, f)| f.column == column))
            .map(|(i, _)| i)
    }

    /// Replaces the value held for `column`.
    pub fn set_value(&mut self, column: &str, value: SqlValue) {
        if let Some(field) = self.fields.iter_mut().find(|f| f.column == column) {
            field.value = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(column: &str, kind: ScalarKind, value: SqlValue) -> ModelField {
        ModelField {
            column: column.to_string(),
            field: "",
            kind,
            nullable: false,
            value,
            primary_key: false,
            not_null: false,
            unique: false,
            indexed: false,
            created: false,
            updated: false,
            size: None,
            default: None,
            column_type: None,
        }
    }

    fn model(pk_value: i64) -> Model {
        let mut id = field("id", ScalarKind::I64, SqlValue::Int(pk_value));
        id.primary_key = true;
        Model {
            table: "t".into(),
            fields: vec![
                id,
                field("name", ScalarKind::Text, SqlValue::Text("a".into())),
                field("note", ScalarKind::Text, SqlValue::Null),
            ],
            pk: Some(0),
            ..Model::default()
        }
    }

    #[test]
    fn test_insert_skips_zero_pk() {
        let m = model(0);
        let (columns, values) = m.columns_and_values(false);
        assert_eq!(columns, vec!["name", "note"]);
        assert_eq!(values.len(), 2);

        let m = model(4);
        let (columns, _) = m.columns_and_values(false);
        assert_eq!(columns, vec!["id", "name", "note"]);
    }

    #[test]
    fn test_update_skips_pk_and_nulls() {
        let m = model(4);
        let (columns, values) = m.columns_and_values(true);
        assert_eq!(columns, vec!["name"]);
        assert_eq!(values, vec![SqlValue::Text("a".into())]);
    }

    #[test]
    fn test_time_field_prefers_tag() {
        let mut m = model(1);
        m.fields.push(field("created", ScalarKind::Time, SqlValue::Null));
        let mut tagged = field("made_at", ScalarKind::Time, SqlValue::Null);
        tagged.created = true;
        m.fields.push(tagged);
        assert_eq!(m.time_field(Stamp::Created), Some(4));
        assert_eq!(m.time_field(Stamp::Updated), None);
    }

    #[test]
    fn test_pk_is_zero() {
        assert!(model(0).pk_is_zero());
        assert!(!model(3).pk_is_zero());
        assert!(Model::default().pk_is_zero());
    }
}
