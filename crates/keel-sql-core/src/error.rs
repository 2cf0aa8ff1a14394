//! Error types for descriptor construction, SQL rendering and value mapping.

use std::sync::Arc;

use thiserror::Error;

use crate::value::ScalarKind;

/// Errors raised by the core.
///
/// Configuration errors (see [`Error::is_config`]) come from the record
/// declaration itself and surface at extraction or table-creation time.
/// Everything else happens while talking to a database or mapping its values.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A tag key outside the tag language.
    #[error("field `{field}`: unknown tag key `{key}`")]
    UnknownTag {
        field: String,
        key: String,
        /// The value given after `:`, if any.
        value: Option<String>,
    },

    /// A known tag key used with a missing, extra or unparseable value.
    #[error("field `{field}`: malformed tag `{token}`: {reason}")]
    TagSyntax {
        field: String,
        token: String,
        reason: &'static str,
    },

    /// Two fields carry an explicit `pk` tag.
    #[error("`{type_name}` declares more than one primary key (`{first}` and `{second}`)")]
    DuplicatePrimaryKey {
        type_name: String,
        first: String,
        second: String,
    },

    /// An operation needs a primary key the record does not have.
    #[error("table `{table}` has no primary key field")]
    MissingPrimaryKey { table: String },

    /// A `fk`/`join` tag names a field that does not exist.
    #[error("`{type_name}.{field}`: can not find referenced field `{reference}`")]
    MissingReferenceField {
        type_name: String,
        field: String,
        reference: String,
    },

    /// A `fk`/`join` tag names a field that is not an `Option<Box<_>>` record.
    #[error("`{type_name}.{field}`: referenced field `{reference}` is not an optional boxed record")]
    ReferenceNotPointer {
        type_name: String,
        field: String,
        reference: String,
    },

    /// A `coltype` override the dialect has no mapping for.
    #[error("{dialect} does not support column type `{column_type}` (column `{column}`)")]
    UnsupportedColumnType {
        dialect: &'static str,
        column_type: String,
        column: String,
    },

    /// A scalar kind the dialect can not store.
    #[error("{dialect} has no column type for {kind} (column `{column}`)")]
    UnsupportedFieldType {
        dialect: &'static str,
        kind: ScalarKind,
        column: String,
    },

    /// The live table has columns the record no longer declares.
    #[error("columns {unknown:?} of table `{table}` are not declared; rename column migration is not supported")]
    ColumnRenamed { table: String, unknown: Vec<String> },

    /// A database value that can not become the requested scalar kind.
    #[error("can not convert {found} into {expected}")]
    Conversion { expected: ScalarKind, found: String },

    /// A value conversion failure for one result column.
    #[error("column `{column}`: {source}")]
    Column {
        column: String,
        #[source]
        source: Box<Error>,
    },

    /// A record was asked about a field it does not declare.
    #[error("`{type_name}` has no field `{field}`")]
    UnknownField {
        type_name: &'static str,
        field: String,
    },

    /// Error reported by the database driver, passed through unchanged.
    #[error("driver error: {0}")]
    Driver(#[source] Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps a driver error.
    pub fn driver<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Driver(Arc::from(error.into()))
    }

    /// Builds a conversion error for `value` into `expected`.
    pub(crate) fn conversion(expected: ScalarKind, found: impl Into<String>) -> Self {
        Self::Conversion {
            expected,
            found: found.into(),
        }
    }

    /// Returns whether this error stems from the record declaration rather
    /// than from a database round trip.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::UnknownTag { .. }
                | Self::TagSyntax { .. }
                | Self::DuplicatePrimaryKey { .. }
                | Self::MissingPrimaryKey { .. }
                | Self::MissingReferenceField { .. }
                | Self::ReferenceNotPointer { .. }
                | Self::UnsupportedColumnType { .. }
                | Self::UnsupportedFieldType { .. }
                | Self::ColumnRenamed { .. }
        )
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
