//! Prepared statements shared by every session of a database.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use keel_sql_core::Result;

use crate::driver::{Driver, Statement};

/// Caches prepared statements by SQL text.
///
/// Lookups take the read lock. A miss takes the write lock, looks again and
/// prepares the statement while holding it, so each SQL text is prepared
/// once.
#[derive(Default)]
pub struct StatementCache {
    statements: RwLock<HashMap<String, Arc<dyn Statement>>>,
}

impl StatementCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached statement for `sql`, preparing it on a miss.
    ///
    /// # Errors
    ///
    /// Returns the driver's error when preparing fails. Failures are not
    /// cached.
    pub fn get_or_prepare(&self, driver: &dyn Driver, sql: &str) -> Result<Arc<dyn Statement>> {
        if let Some(statement) = self
            .statements
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sql)
        {
            return Ok(Arc::clone(statement));
        }

        let mut statements = self.statements.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(statement) = statements.get(sql) {
            return Ok(Arc::clone(statement));
        }
        let prepared = driver.prepare(sql)?;
        statements.insert(sql.to_string(), Arc::clone(&prepared));
        Ok(prepared)
    }

    /// Number of cached statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every statement.
    pub fn clear(&self) {
        self.statements
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl std::fmt::Debug for StatementCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementCache")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Transaction;
    use keel_sql_core::executor::{ExecResult, Rows};
    use keel_sql_core::{Error, SqlValue};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    struct Noop;

    impl Statement for Noop {
        fn execute(&self, _args: &[SqlValue]) -> Result<ExecResult> {
            Ok(ExecResult::default())
        }

        fn query(&self, _args: &[SqlValue]) -> Result<Rows> {
            Ok(Rows::default())
        }
    }

    #[derive(Debug, Default)]
    struct Counting {
        prepared: AtomicUsize,
        delay: Option<Duration>,
    }

    impl Driver for Counting {
        fn prepare(&self, sql: &str) -> Result<Arc<dyn Statement>> {
            if sql.starts_with("BROKEN") {
                return Err(Error::driver("syntax error"));
            }
            self.prepared.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            Ok(Arc::new(Noop))
        }

        fn begin(&self) -> Result<Box<dyn Transaction>> {
            Err(Error::driver("no transactions"))
        }
    }

    #[test]
    fn test_statement_is_prepared_once() {
        let driver = Counting::default();
        let cache = StatementCache::new();
        let first = cache.get_or_prepare(&driver, "SELECT 1").unwrap();
        let second = cache.get_or_prepare(&driver, "SELECT 1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(driver.prepared.load(Ordering::SeqCst), 1);

        cache.get_or_prepare(&driver, "SELECT 2").unwrap();
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_misses_prepare_once() {
        let driver = Counting {
            delay: Some(Duration::from_millis(100)),
            ..Counting::default()
        };
        let cache = StatementCache::new();
        let statements: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| cache.get_or_prepare(&driver, "SELECT 1").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(driver.prepared.load(Ordering::SeqCst), 1);
        assert!(statements.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let driver = Counting::default();
        let cache = StatementCache::new();
        assert!(cache.get_or_prepare(&driver, "BROKEN").is_err());
        assert!(cache.is_empty());
    }
}
