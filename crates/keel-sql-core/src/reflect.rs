//! Reflection surface implemented by record types.
//!
//! `#[derive(Record)]` and `#[derive(Reflect)]` from `keel-sql-derive`
//! generate these impls. The tag string of each field is passed through
//! verbatim and only parsed when a [`Model`](crate::model::Model) is
//! extracted.

use std::any::TypeId;

use crate::error::Result;
use crate::model::Indexes;
use crate::value::{ScalarKind, SqlValue};

/// Shape of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A plain scalar column.
    Scalar(ScalarKind),
    /// An `Option` of a scalar; NULL maps to `None`.
    Nullable(ScalarKind),
    /// An `Option<Box<R>>` pointing at another record.
    Reference,
    /// A map; never mapped to a column.
    Map,
    /// A non-byte `Vec`; never mapped to a column.
    Sequence,
}

impl FieldKind {
    /// Returns the scalar kind for column-bearing fields.
    #[must_use]
    pub const fn scalar(self) -> Option<ScalarKind> {
        match self {
            Self::Scalar(kind) | Self::Nullable(kind) => Some(kind),
            Self::Reference | Self::Map | Self::Sequence => None,
        }
    }
}

/// Static declaration of one struct field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDecl {
    /// Rust field name.
    pub name: &'static str,
    /// Declared shape.
    pub kind: FieldKind,
    /// Raw `#[column("...")]` tag, empty when absent.
    pub tag: &'static str,
}

/// Dynamic access to a record's fields.
pub trait Reflect: 'static {
    /// Rust type name of the record.
    fn type_name(&self) -> &'static str;

    /// Explicit table name from `#[table(name = "...")]`.
    fn table_name(&self) -> Option<&'static str> {
        None
    }

    /// Declared fields in declaration order.
    fn fields(&self) -> &'static [FieldDecl];

    /// Reads a scalar field. Returns `None` for unknown or non-scalar fields.
    fn get(&self, field: &str) -> Option<SqlValue>;

    /// Writes a scalar field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is unknown or the value does not fit.
    fn set(&mut self, field: &str, value: SqlValue) -> Result<()>;

    /// Borrows a referenced record if it is allocated.
    fn reference(&self, field: &str) -> Option<&dyn Reflect>;

    /// Borrows a referenced record, allocating a default one when unset.
    fn reference_or_default(&mut self, field: &str) -> Option<&mut dyn Reflect>;

    /// Resets a reference field to `None`.
    fn clear_reference(&mut self, field: &str);

    /// Identity used to memoize extracted schemas.
    fn type_key(&self) -> TypeId {
        TypeId::of::<Self>()
    }
}

impl dyn Reflect {
    /// Looks up a field declaration by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static FieldDecl> {
        self.fields().iter().find(|decl| decl.name == name)
    }
}

/// A record that can be stored as a table row.
///
/// `#[derive(Record)]` provides an empty impl; implement it by hand next
/// to `#[derive(Reflect)]` to use the hooks.
pub trait Record: Reflect + Default {
    /// Appends multi-column indexes after the tag-declared ones.
    fn indexes(_indexes: &mut Indexes) {}

    /// Checks the record before any write is issued.
    ///
    /// # Errors
    ///
    /// The message is reported as a validation failure.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}
