//! The client object sessions are opened from.

use std::sync::Arc;

use keel_sql_core::dialect::Dialect;
use keel_sql_core::model::Extractor;

use crate::cache::StatementCache;
use crate::config::Config;
use crate::driver::Driver;
use crate::error::Result;
use crate::limiter::ConnectionLimiter;
use crate::migration::Migration;
use crate::session::Session;

/// A driver, its dialect and the state shared by every session.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use keel_orm::{Config, Database};
/// use keel_sql_core::prelude::Sqlite;
///
/// let db = Database::new(Arc::new(driver), Arc::new(Sqlite::new()), Config::new("app_test"));
/// let users: Vec<User> = db.with_session(|s| s.where_equal("state", 1).find_all())?;
/// ```
#[derive(Debug)]
pub struct Database {
    driver: Arc<dyn Driver>,
    dialect: Arc<dyn Dialect>,
    config: Config,
    extractor: Extractor,
    statements: StatementCache,
    limiter: ConnectionLimiter,
}

impl Database {
    /// Creates a database client.
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>, dialect: Arc<dyn Dialect>, config: Config) -> Self {
        let limiter = ConnectionLimiter::new(config.max_connections, config.on_limit);
        Self {
            driver,
            dialect,
            extractor: Extractor::new(config.naming),
            config,
            statements: StatementCache::new(),
            limiter,
        }
    }

    /// Opens a session, taking a slot from the connection limit.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::ConnectionLimit`](crate::OrmError::ConnectionLimit)
    /// when the limit is reached and the policy is to fail.
    pub fn session(&self) -> Result<Session<'_>> {
        let permit = self.limiter.acquire()?;
        Ok(Session::new(self, permit))
    }

    /// Runs `task` on a fresh session, closing it afterwards.
    ///
    /// # Errors
    ///
    /// Returns the error of opening the session or of `task`.
    pub fn with_session<T, F>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Session<'_>) -> Result<T>,
    {
        let mut session = self.session()?;
        task(&mut session)
    }

    /// Opens a session for schema changes.
    ///
    /// # Errors
    ///
    /// Same as [`Database::session`].
    pub fn migration(&self) -> Result<Migration<'_>> {
        Ok(Migration::new(self.session()?))
    }

    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    #[must_use]
    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Statements prepared outside transactions.
    #[must_use]
    pub const fn statements(&self) -> &StatementCache {
        &self.statements
    }

    /// Number of sessions holding a slot of the connection limit.
    #[must_use]
    pub fn sessions_in_use(&self) -> usize {
        self.limiter.in_use()
    }
}
