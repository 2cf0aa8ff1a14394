//! Client configuration and data source names.

use std::fmt;
use std::sync::Arc;

use keel_sql_core::dialect::{Dialect, Mysql, Oracle, Postgres, Sqlite};
use keel_sql_core::naming::Naming;
use serde::{Deserialize, Serialize};

/// What [`Database::session`](crate::Database::session) does when every
/// slot is taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitPolicy {
    /// Wait for a session to be dropped.
    #[default]
    Block,
    /// Return [`OrmError::ConnectionLimit`](crate::OrmError::ConnectionLimit).
    Fail,
}

/// Settings of a [`Database`](crate::Database).
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Name reported to catalog lookups and checked by the drop guard.
    pub database_name: String,
    /// Maximum number of live sessions, unlimited when `None`.
    pub max_connections: Option<usize>,
    pub on_limit: LimitPolicy,
    pub naming: Naming,
}

impl Config {
    /// Creates a configuration for `database_name` with no session limit.
    #[must_use]
    pub fn new(database_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            ..Self::default()
        }
    }

    /// Caps the number of live sessions. Zero removes the cap.
    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = (max > 0).then_some(max);
        self
    }

    #[must_use]
    pub const fn with_limit_policy(mut self, policy: LimitPolicy) -> Self {
        self.on_limit = policy;
        self
    }

    #[must_use]
    pub const fn with_naming(mut self, naming: Naming) -> Self {
        self.naming = naming;
        self
    }
}

/// Database engine a data source points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    Mysql,
    Postgres,
    Sqlite,
    Oracle,
}

impl DialectKind {
    /// Returns the dialect for this engine.
    #[must_use]
    pub fn dialect(self) -> Arc<dyn Dialect> {
        match self {
            Self::Mysql => Arc::new(Mysql::new()),
            Self::Postgres => Arc::new(Postgres::new()),
            Self::Sqlite => Arc::new(Sqlite::new()),
            Self::Oracle => Arc::new(Oracle::new()),
        }
    }
}

/// Connection parameters rendered into a driver connection string.
///
/// ```
/// use keel_orm::{DataSourceName, DialectKind};
///
/// let mut dsn = DataSourceName::new(DialectKind::Mysql, "shop");
/// dsn.username = "root".into();
/// dsn.host = "localhost".into();
/// dsn.port = Some(3306);
/// assert_eq!(dsn.to_string(), "root@tcp(localhost:3306)/shop");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceName {
    pub dialect: DialectKind,
    pub database_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub unix_socket: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    /// Extra `key=value` parameters.
    #[serde(default)]
    pub variables: Vec<String>,
}

impl DataSourceName {
    #[must_use]
    pub fn new(dialect: DialectKind, database_name: impl Into<String>) -> Self {
        Self {
            dialect,
            database_name: database_name.into(),
            username: String::new(),
            password: String::new(),
            unix_socket: false,
            host: String::new(),
            port: None,
            variables: Vec::new(),
        }
    }

    /// A local PostgreSQL source as the `postgres` user without TLS.
    #[must_use]
    pub fn postgres_default(database_name: impl Into<String>) -> Self {
        let mut dsn = Self::new(DialectKind::Postgres, database_name);
        dsn.username = "postgres".into();
        dsn.append("sslmode", "disable")
    }

    /// Adds a `key=value` parameter.
    #[must_use]
    pub fn append(mut self, key: &str, value: &str) -> Self {
        self.variables.push(format!("{key}={value}"));
        self
    }

    /// Builds a configuration for this source.
    #[must_use]
    pub fn config(&self) -> Config {
        Config::new(self.database_name.clone())
    }

    fn address(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{port}", self.host),
            None => self.host.clone(),
        }
    }
}

impl fmt::Display for DataSourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dialect {
            DialectKind::Mysql => {
                f.write_str(&self.username)?;
                if !self.password.is_empty() {
                    write!(f, ":{}", self.password)?;
                }
                f.write_str("@")?;
                if !self.host.is_empty() {
                    let protocol = if self.unix_socket { "unix" } else { "tcp" };
                    write!(f, "{protocol}({})", self.address())?;
                }
                write!(f, "/{}", self.database_name)?;
                if !self.variables.is_empty() {
                    write!(f, "?{}", self.variables.join("&"))?;
                }
                Ok(())
            }
            DialectKind::Postgres => {
                let mut pairs = vec![format!("user={}", self.username)];
                if !self.password.is_empty() {
                    pairs.push(format!("password={}", self.password));
                }
                if !self.database_name.is_empty() {
                    pairs.push(format!("dbname={}", self.database_name));
                }
                pairs.extend(self.variables.iter().cloned());
                if !self.host.is_empty() {
                    let slash = if self.unix_socket { "/" } else { "" };
                    pairs.push(format!("host={slash}{}", self.host));
                }
                if let Some(port) = self.port {
                    pairs.push(format!("port={port}"));
                }
                f.write_str(&pairs.join(" "))
            }
            DialectKind::Sqlite => f.write_str(&self.database_name),
            // Easy Connect: user[/password]@host[:port]/service
            DialectKind::Oracle => {
                f.write_str(&self.username)?;
                if !self.password.is_empty() {
                    write!(f, "/{}", self.password)?;
                }
                write!(f, "@{}/{}", self.address(), self.database_name)
            }
        }
    }
}
