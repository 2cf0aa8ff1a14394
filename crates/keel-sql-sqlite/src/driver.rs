//! A blocking driver over an sqlx SQLite pool.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use keel_orm::{Config, Database, Driver, Statement, Transaction};
use keel_sql_core::dialect::Sqlite as SqliteDialect;
use keel_sql_core::executor::{ExecResult, Rows};
use keel_sql_core::{Error, Result, SqlValue};
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::runtime::Runtime;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::convert::{bind_all, to_rows};

/// Distinguishes the in-memory databases of one process.
static MEMORY_SEQ: AtomicUsize = AtomicUsize::new(0);

const MEMORY_CONNECTIONS: u32 = 8;

type SharedTransaction = Arc<Mutex<Option<sqlx::Transaction<'static, Sqlite>>>>;

/// SQLite driver running sqlx on a private current-thread runtime.
///
/// Calls block the calling thread, so they must not be made from inside
/// an async runtime.
#[derive(Clone)]
pub struct SqliteDriver {
    pool: SqlitePool,
    runtime: Arc<Runtime>,
}

impl fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("connections", &self.pool.size())
            .finish_non_exhaustive()
    }
}

impl SqliteDriver {
    /// Connects with an sqlx URL such as `sqlite://app.db?mode=rwc`.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is invalid or the database can not be
    /// opened.
    pub fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url).map_err(Error::driver)?;
        Self::with_options(options, SqlitePoolOptions::new())
    }

    /// Opens the database file at `path`, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns an error when the file can not be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::with_options(options, SqlitePoolOptions::new())
    }

    /// Opens a private in-memory database.
    ///
    /// The pool's connections share one named in-memory database, which
    /// lives as long as one connection stays open. Shared-cache locking is
    /// per table: writing a table another session's open transaction has
    /// written fails with "database table is locked" instead of waiting.
    ///
    /// # Errors
    ///
    /// Returns an error when SQLite can not be initialised.
    pub fn in_memory() -> Result<Self> {
        let seq = MEMORY_SEQ.fetch_add(1, Ordering::Relaxed);
        let url = format!(
            "sqlite:file:keel-memory-{}-{seq}?mode=memory&cache=shared",
            std::process::id()
        );
        let options = SqliteConnectOptions::from_str(&url).map_err(Error::driver)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(MEMORY_CONNECTIONS)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>);
        Self::with_options(options, pool)
    }

    /// Connects with explicit sqlx options.
    ///
    /// # Errors
    ///
    /// Returns an error when the runtime can not start or the database can
    /// not be opened.
    pub fn with_options(options: SqliteConnectOptions, pool: SqlitePoolOptions) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::driver)?;
        let pool = runtime
            .block_on(pool.connect_with(options))
            .map_err(Error::driver)?;
        info!(connections = pool.size(), "Opened SQLite database");
        Ok(Self {
            pool,
            runtime: Arc::new(runtime),
        })
    }

    /// Wraps the driver into a [`Database`] using the SQLite dialect.
    #[must_use]
    pub fn into_database(self, config: Config) -> Database {
        Database::new(Arc::new(self), Arc::new(SqliteDialect::new()), config)
    }

    /// The underlying sqlx pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every connection of the pool.
    pub fn close(&self) {
        self.runtime.block_on(self.pool.close());
    }
}

impl Driver for SqliteDriver {
    fn prepare(&self, sql: &str) -> Result<Arc<dyn Statement>> {
        // Compiling once surfaces syntax errors before the statement is
        // cached; sqlx keeps its own per-connection statement cache.
        self.runtime
            .block_on(sqlx::Executor::prepare(&self.pool, sql))
            .map_err(Error::driver)?;
        Ok(Arc::new(SqliteStatement {
            sql: sql.to_string(),
            target: Target::Pool(self.pool.clone()),
            runtime: Arc::clone(&self.runtime),
        }))
    }

    fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.runtime.block_on(self.pool.begin()).map_err(Error::driver)?;
        debug!("Began SQLite transaction");
        Ok(Box::new(SqliteTransaction {
            tx: Arc::new(Mutex::new(Some(tx))),
            runtime: Arc::clone(&self.runtime),
        }))
    }
}

enum Target {
    Pool(SqlitePool),
    Transaction(SharedTransaction),
}

struct SqliteStatement {
    sql: String,
    target: Target,
    runtime: Arc<Runtime>,
}

impl SqliteStatement {
    async fn run_execute(&self, args: &[SqlValue]) -> Result<ExecResult> {
        let query = bind_all(&self.sql, args);
        let result = match &self.target {
            Target::Pool(pool) => query.execute(pool).await,
            Target::Transaction(shared) => {
                let mut slot = shared.lock().await;
                let tx = slot.as_mut().ok_or_else(finished)?;
                query.execute(&mut **tx).await
            }
        }
        .map_err(Error::driver)?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()).filter(|&id| id != 0),
        })
    }

    async fn run_query(&self, args: &[SqlValue]) -> Result<Rows> {
        let query = bind_all(&self.sql, args);
        let fetched = match &self.target {
            Target::Pool(pool) => query.fetch_all(pool).await,
            Target::Transaction(shared) => {
                let mut slot = shared.lock().await;
                let tx = slot.as_mut().ok_or_else(finished)?;
                query.fetch_all(&mut **tx).await
            }
        }
        .map_err(Error::driver)?;
        to_rows(&fetched).map_err(Error::driver)
    }
}

impl Statement for SqliteStatement {
    fn execute(&self, args: &[SqlValue]) -> Result<ExecResult> {
        self.runtime.block_on(self.run_execute(args))
    }

    fn query(&self, args: &[SqlValue]) -> Result<Rows> {
        self.runtime.block_on(self.run_query(args))
    }
}

struct SqliteTransaction {
    tx: SharedTransaction,
    runtime: Arc<Runtime>,
}

impl Transaction for SqliteTransaction {
    fn prepare(&mut self, sql: &str) -> Result<Arc<dyn Statement>> {
        Ok(Arc::new(SqliteStatement {
            sql: sql.to_string(),
            target: Target::Transaction(Arc::clone(&self.tx)),
            runtime: Arc::clone(&self.runtime),
        }))
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.runtime.block_on(async {
            let tx = self.tx.lock().await.take().ok_or_else(finished)?;
            tx.commit().await.map_err(Error::driver)
        })
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        self.runtime.block_on(async {
            let tx = self.tx.lock().await.take().ok_or_else(finished)?;
            tx.rollback().await.map_err(Error::driver)
        })
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        // sqlx returns the connection to the pool from a spawned task.
        let _context = self.runtime.enter();
        if let Ok(mut slot) = self.tx.try_lock() {
            slot.take();
        }
    }
}

fn finished() -> Error {
    Error::driver("transaction already finished")
}
