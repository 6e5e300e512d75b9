//! Database connections.
//!
//! The backend is picked from the URL scheme. SQLite and PostgreSQL can
//! be inspected and migrated; MySQL and SQL Server URLs are recognised
//! but rejected with [`MigrateError::Unsupported`].

use std::str::FromStr;

use oxide_sqlschema::dialect::{
    MssqlDialect, MysqlDialect, PostgresDialect, SchemaDialect, SqliteDialect,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::error::{MigrateError, Result};

static POSTGRES: PostgresDialect = PostgresDialect::new();
static MYSQL: MysqlDialect = MysqlDialect::new();
static SQLITE: SqliteDialect = SqliteDialect::new();
static MSSQL: MssqlDialect = MssqlDialect::new();

/// Database family behind a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// SQLite.
    Sqlite,
    /// PostgreSQL.
    Postgres,
    /// MySQL or MariaDB.
    Mysql,
    /// Microsoft SQL Server.
    Mssql,
}

impl Backend {
    /// Picks the backend from the scheme of `url`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::InvalidUrl`] for a missing or unknown scheme.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| MigrateError::InvalidUrl(url.to_string()))?;
        match scheme.as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "mssql" | "sqlserver" => Ok(Self::Mssql),
            _ => Err(MigrateError::InvalidUrl(url.to_string())),
        }
    }

    /// Returns the dialect used for type comparison and DDL.
    #[must_use]
    pub fn dialect(self) -> &'static dyn SchemaDialect {
        match self {
            Self::Sqlite => &SQLITE,
            Self::Postgres => &POSTGRES,
            Self::Mysql => &MYSQL,
            Self::Mssql => &MSSQL,
        }
    }

    /// Fails unless this backend can be inspected and migrated.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Unsupported`] naming the dialect and `capability`.
    pub fn require(self, capability: &'static str) -> Result<()> {
        match self {
            Self::Sqlite | Self::Postgres => Ok(()),
            Self::Mysql | Self::Mssql => Err(MigrateError::Unsupported {
                dialect: self.dialect().name(),
                capability,
            }),
        }
    }
}

/// A connection pool for one of the supported backends.
#[derive(Debug, Clone)]
pub enum DatabasePool {
    /// SQLite pool.
    Sqlite(SqlitePool),
    /// PostgreSQL pool.
    Postgres(PgPool),
}

impl DatabasePool {
    /// Connects to `url`.
    ///
    /// SQLite database files are created if missing. In-memory SQLite
    /// databases get a single connection so every query sees the same data.
    ///
    /// # Errors
    ///
    /// Fails on an unknown or unsupported URL, or if the connection fails.
    pub async fn connect(url: &str) -> Result<Self> {
        let backend = Backend::from_url(url)?;
        backend.require("migrate")?;
        debug!(backend = ?backend, "Connecting to database");

        match backend {
            Backend::Sqlite => {
                let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
                let max_connections = if url.contains(":memory:") { 1 } else { 5 };
                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .connect_with(options)
                    .await?;
                Ok(Self::Sqlite(pool))
            }
            Backend::Postgres => {
                let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
                Ok(Self::Postgres(pool))
            }
            Backend::Mysql | Backend::Mssql => Err(MigrateError::Unsupported {
                dialect: backend.dialect().name(),
                capability: "migrate",
            }),
        }
    }

    /// Returns the backend of this pool.
    #[must_use]
    pub const fn backend(&self) -> Backend {
        match self {
            Self::Sqlite(_) => Backend::Sqlite,
            Self::Postgres(_) => Backend::Postgres,
        }
    }

    /// Returns the dialect of this pool.
    #[must_use]
    pub fn dialect(&self) -> &'static dyn SchemaDialect {
        self.backend().dialect()
    }

    /// Executes a statement without parameters.
    ///
    /// # Errors
    ///
    /// Returns the database error unchanged.
    pub async fn execute(&self, sql: &str) -> std::result::Result<(), sqlx::Error> {
        match self {
            Self::Sqlite(pool) => sqlx::query(sql).execute(pool).await.map(|_| ()),
            Self::Postgres(pool) => sqlx::query(sql).execute(pool).await.map(|_| ()),
        }
    }
}

impl From<SqlitePool> for DatabasePool {
    fn from(pool: SqlitePool) -> Self {
        Self::Sqlite(pool)
    }
}

impl From<PgPool> for DatabasePool {
    fn from(pool: PgPool) -> Self {
        Self::Postgres(pool)
    }
}
