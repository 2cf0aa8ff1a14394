//! # keel-sql-core
//!
//! Record reflection, dialect SQL generation and schema reconciliation.
//!
//! A record type derives [`Record`] (see `keel-sql-derive`). The
//! [`Extractor`](model::Extractor) turns a record value into a
//! [`Model`](model::Model), a [`Dialect`](dialect::Dialect) renders models
//! and [`Criteria`](criteria::Criteria) into SQL, the
//! [`RowMapper`](mapper::RowMapper) copies result rows back into records and
//! [`migrate::reconcile`] adds whatever columns and indexes a live table is
//! missing.
//!
//! ## Example
//!
//! ```rust
//! use keel_sql_core::prelude::*;
//! use keel_sql_core::params;
//! use keel_sql_derive::Record;
//!
//! #[derive(Debug, Default, Record)]
//! struct Basic {
//!     id: i64,
//!     #[column("size:64")]
//!     name: String,
//!     state: i64,
//! }
//!
//! let mut basic = Basic { id: 1, ..Basic::default() };
//! let model = Extractor::default().extract(&mut basic, true, &[]).unwrap();
//! let mut criteria = Criteria::new(model);
//! criteria.merge_pk_condition(&Postgres::new(), true);
//!
//! let (sql, args) = Postgres::new().query_sql(&criteria);
//! assert_eq!(sql, r#"SELECT "id", "name", "state" FROM "basic" WHERE "basic"."id" = $1"#);
//! assert_eq!(args, params![1_i64]);
//! ```

#[cfg(test)]
extern crate self as keel_sql_core;

pub mod condition;
pub mod criteria;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod mapper;
pub mod migrate;
pub mod model;
pub mod naming;
pub mod reflect;
pub mod value;

pub use error::{Error, Result};
pub use reflect::{FieldDecl, FieldKind, Record, Reflect};
pub use value::{FromSqlValue, ScalarKind, SqlValue, ToSqlValue};

/// Commonly used types.
pub mod prelude {
    pub use crate::condition::Condition;
    pub use crate::criteria::{Criteria, OrderBy};
    pub use crate::dialect::{Dialect, Mysql, Oracle, Postgres, Sqlite};
    pub use crate::executor::{Catalog, ExecResult, Executor, Rows};
    pub use crate::mapper::RowMapper;
    pub use crate::model::{Extractor, IndexSpec, Indexes, Model};
    pub use crate::naming::Naming;
    pub use crate::reflect::{Record, Reflect};
    pub use crate::value::{SqlValue, ToSqlValue};
}
