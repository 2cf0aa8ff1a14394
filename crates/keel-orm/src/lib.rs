//! # keel-orm
//!
//! Sessions, transactions and migrations on top of `keel-sql-core`.
//!
//! A [`Database`] owns a [`Driver`], the [`Dialect`](keel_sql_core::dialect::Dialect)
//! SQL is rendered for, a cache of prepared statements and the limit on
//! concurrent sessions. Work happens on a [`Session`]:
//!
//! ```ignore
//! use keel_orm::{Config, Database};
//!
//! let db = Database::new(driver, dialect, Config::new("blog_test"));
//! db.migration()?.create_table_if_not_exists::<Post>()?;
//!
//! let mut session = db.session()?;
//! let mut post = Post { title: "Hello".into(), ..Post::default() };
//! session.save(&mut post)?;
//!
//! let recent: Vec<Post> = session
//!     .where_clause("author_id = ?", params![post.author_id])
//!     .order_by_desc("created")
//!     .limit(10)
//!     .find_all()?;
//! ```

pub mod cache;
pub mod config;
pub mod database;
pub mod driver;
pub mod error;
pub mod limiter;
pub mod migration;
pub mod session;

pub use cache::StatementCache;
pub use config::{Config, DataSourceName, DialectKind, LimitPolicy};
pub use database::Database;
pub use driver::{Driver, Statement, Transaction};
pub use error::{OrmError, Result};
pub use limiter::{ConnectionLimiter, Permit};
pub use migration::Migration;
pub use session::{RowMap, Session};
