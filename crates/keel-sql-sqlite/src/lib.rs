//! # keel-sql-sqlite
//!
//! A blocking SQLite [`Driver`](keel_orm::Driver) for keel, built on
//! `sqlx` and a private `tokio` runtime.
//!
//! ```no_run
//! use keel_orm::Config;
//! use keel_sql_sqlite::SqliteDriver;
//!
//! let db = SqliteDriver::open("app.db")?.into_database(Config::new("app"));
//! let mut session = db.session()?;
//! let rows = session.query_rows("SELECT 1", &[])?;
//! assert_eq!(rows.rows.len(), 1);
//! # Ok::<(), keel_orm::OrmError>(())
//! ```

mod convert;
mod driver;

pub use driver::SqliteDriver;
