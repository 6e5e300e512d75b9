//! Changeset executor.
//!
//! This module applies operations to a live database through the
//! dialect's DDL. Nothing is retried or rolled back: the first failing
//! statement stops the run and is reported with its operation.

use oxide_sqlschema::dialect::SchemaDialect;
use oxide_sqlschema::migrator::Migrator;
use oxide_sqlschema::operations::Operation;
use tracing::{debug, info};

use crate::connection::DatabasePool;
use crate::error::{MigrateError, Result};

/// Executes operations against a database.
#[derive(Debug, Clone)]
pub struct DatabaseMigrator {
    pool: DatabasePool,
}

impl DatabaseMigrator {
    /// Creates a migrator over `pool`.
    #[must_use]
    pub const fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &'static dyn SchemaDialect {
        self.pool.dialect()
    }

    /// Generates the SQL for `operations` without executing it.
    ///
    /// # Errors
    ///
    /// Fails on the first operation the dialect cannot express.
    pub fn sql_for(&self, operations: &[Operation]) -> Result<Vec<String>> {
        let mut all_sql = Vec::new();
        for operation in operations {
            all_sql.extend(self.dialect().generate_sql(operation)?);
        }
        Ok(all_sql)
    }
}

impl Migrator for DatabaseMigrator {
    type Error = MigrateError;

    async fn apply(&self, operations: &[Operation]) -> Result<()> {
        // Render everything first so an unsupported operation fails
        // before any DDL has run.
        let mut planned = Vec::with_capacity(operations.len());
        for operation in operations {
            planned.push((operation, self.dialect().generate_sql(operation)?));
        }

        for (operation, statements) in planned {
            info!(operation = %operation, "Applying operation");
            for sql in statements {
                debug!(sql = %sql, "Executing SQL");
                self.pool
                    .execute(&sql)
                    .await
                    .map_err(|source| MigrateError::Ddl {
                        operation: operation.to_string(),
                        table: operation.fqn().to_string(),
                        source,
                    })?;
            }
        }
        Ok(())
    }
}
