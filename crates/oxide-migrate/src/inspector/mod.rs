//! Database inspectors.
//!
//! Each inspector reads the catalog of one backend and builds the same
//! [`State`] a [`ModelInspector`](oxide_sqlschema::inspector::ModelInspector)
//! would build for matching models: lowercase types with character
//! lengths split off, normalized defaults, sorted key columns.

mod postgres;
mod sqlite;

pub use postgres::PostgresInspector;
pub use sqlite::SqliteInspector;

use oxide_sqlschema::dialect::SchemaDialect;
use oxide_sqlschema::inspector::{Inspector, InspectorConfig};
use oxide_sqlschema::normalize::parse_sql_type;
use oxide_sqlschema::schema::{ColumnDefinition, State};

use crate::connection::DatabasePool;
use crate::error::{MigrateError, Result};

/// Inspector for whichever backend a [`DatabasePool`] connects to.
#[derive(Debug, Clone, Copy)]
pub enum DatabaseInspector<'a> {
    /// SQLite catalog reader.
    Sqlite(SqliteInspector<'a>),
    /// PostgreSQL catalog reader.
    Postgres(PostgresInspector<'a>),
}

impl<'a> DatabaseInspector<'a> {
    /// Creates the inspector matching `pool`.
    #[must_use]
    pub fn new(pool: &'a DatabasePool, config: &'a InspectorConfig) -> Self {
        match pool {
            DatabasePool::Sqlite(pool) => Self::Sqlite(SqliteInspector::new(pool, config)),
            DatabasePool::Postgres(pool) => Self::Postgres(PostgresInspector::new(pool, config)),
        }
    }
}

impl Inspector for DatabaseInspector<'_> {
    type Error = MigrateError;

    async fn inspect(&self) -> Result<State> {
        match self {
            Self::Sqlite(inspector) => inspector.inspect().await,
            Self::Postgres(inspector) => inspector.inspect().await,
        }
    }
}

/// Builds a column from the values a catalog reports.
fn column(
    dialect: &dyn SchemaDialect,
    name: &str,
    declared_type: &str,
    nullable: bool,
    default: Option<&str>,
) -> Result<ColumnDefinition> {
    let (sql_type, varchar_len) = parse_sql_type(declared_type)?;
    Ok(ColumnDefinition {
        name: name.to_string(),
        sql_type,
        varchar_len,
        default_value: dialect.normalize_default(default.unwrap_or_default()),
        is_nullable: nullable,
        is_auto_increment: false,
        is_identity: false,
    })
}
