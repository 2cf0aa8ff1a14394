//! In-memory driver for session tests.
//!
//! Every statement is logged. Queries answer with the rows scripted for the
//! longest matching SQL prefix, or no rows. An unscripted `COUNT(*)` counts
//! zero, as a real database would. Statements containing a
//! configured failure pattern return a driver error.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use keel_orm::{Config, Database, Driver, Statement, Transaction};
use keel_sql_core::executor::{ExecResult, Rows};
use keel_sql_core::prelude::Sqlite;
use keel_sql_core::{Error, Result, SqlValue};

#[derive(Debug, Default)]
pub struct FakeState {
    pub log: Vec<String>,
    pub responses: Vec<(String, Rows)>,
    pub failures: Vec<String>,
    pub prepared: usize,
    pub prepared_in_tx: usize,
    pub last_id: i64,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDriver {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Answers queries starting with `prefix`.
    pub fn respond(&self, prefix: &str, columns: &[&str], rows: Vec<Vec<SqlValue>>) {
        self.state().responses.push((
            prefix.to_string(),
            Rows {
                columns: columns.iter().map(ToString::to_string).collect(),
                rows,
            },
        ));
    }

    /// Makes every statement containing `pattern` fail.
    pub fn fail_on(&self, pattern: &str) {
        self.state().failures.push(pattern.to_string());
    }

    pub fn log(&self) -> Vec<String> {
        self.state().log.clone()
    }

    pub fn last(&self) -> String {
        self.state().log.last().cloned().unwrap_or_default()
    }

    fn statement(&self, sql: &str) -> Arc<dyn Statement> {
        Arc::new(FakeStatement {
            sql: sql.to_string(),
            state: Arc::clone(&self.state),
        })
    }
}

impl Driver for FakeDriver {
    fn prepare(&self, sql: &str) -> Result<Arc<dyn Statement>> {
        self.state().prepared += 1;
        Ok(self.statement(sql))
    }

    fn begin(&self) -> Result<Box<dyn Transaction>> {
        Ok(Box::new(FakeTransaction {
            driver: self.clone(),
        }))
    }
}

struct FakeStatement {
    sql: String,
    state: Arc<Mutex<FakeState>>,
}

impl FakeStatement {
    fn run(&self) -> Result<MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock().unwrap();
        state.log.push(self.sql.clone());
        if state.failures.iter().any(|f| self.sql.contains(f.as_str())) {
            return Err(Error::driver(format!("scripted failure: {}", self.sql)));
        }
        Ok(state)
    }
}

impl Statement for FakeStatement {
    fn execute(&self, _args: &[SqlValue]) -> Result<ExecResult> {
        let mut state = self.run()?;
        state.last_id += 1;
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: Some(state.last_id),
        })
    }

    fn query(&self, _args: &[SqlValue]) -> Result<Rows> {
        let state = self.run()?;
        Ok(state
            .responses
            .iter()
            .filter(|(prefix, _)| self.sql.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, rows)| rows.clone())
            .unwrap_or_else(|| empty_result(&self.sql)))
    }
}

fn empty_result(sql: &str) -> Rows {
    if !sql.starts_with("SELECT COUNT(*)") {
        return Rows::default();
    }
    Rows {
        columns: vec!["COUNT(*)".to_string()],
        rows: vec![vec![SqlValue::Int(0)]],
    }
}

struct FakeTransaction {
    driver: FakeDriver,
}

impl Transaction for FakeTransaction {
    fn prepare(&mut self, sql: &str) -> Result<Arc<dyn Statement>> {
        self.driver.state().prepared_in_tx += 1;
        Ok(self.driver.statement(sql))
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.driver.state().commits += 1;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        self.driver.state().rollbacks += 1;
        Ok(())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A SQLite flavored database over a fresh fake driver.
pub fn database(config: Config) -> (Database, FakeDriver) {
    init_tracing();
    let driver = FakeDriver::default();
    let db = Database::new(Arc::new(driver.clone()), Arc::new(Sqlite::new()), config);
    (db, driver)
}
