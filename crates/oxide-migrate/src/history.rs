//! Migration history tracking.
//!
//! This module manages the `oxide_automigrations` table, which records
//! every changeset applied by the auto-migrator. The table is excluded
//! from inspection, so it never shows up in a diff.

use chrono::{DateTime, Utc};
use oxide_sqlschema::changeset::Changeset;

use crate::connection::DatabasePool;
use crate::error::Result;

/// Name of the history table.
pub const HISTORY_TABLE: &str = "oxide_automigrations";

const CREATE_SQLITE_SQL: &str = r"
CREATE TABLE IF NOT EXISTS oxide_automigrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    operations TEXT NOT NULL,
    applied_at TEXT NOT NULL
)
";

const CREATE_POSTGRES_SQL: &str = r"
CREATE TABLE IF NOT EXISTS oxide_automigrations (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    operations TEXT NOT NULL,
    applied_at TEXT NOT NULL
)
";

const SELECT_SQL: &str =
    "SELECT id, name, operations, applied_at FROM oxide_automigrations ORDER BY id";

/// A record of an applied changeset.
#[derive(Debug, Clone)]
pub struct AppliedMigration {
    /// Unique ID in the history table.
    pub id: i64,
    /// Migration name (`<timestamp>_auto`).
    pub name: String,
    /// Canonical text of each applied operation.
    pub operations: Vec<String>,
    /// When the changeset was applied.
    pub applied_at: DateTime<Utc>,
}

/// Generates the name recorded for a changeset applied at `at`.
#[must_use]
pub fn migration_name(at: DateTime<Utc>) -> String {
    format!("{}_auto", at.format("%Y%m%d%H%M%S"))
}

fn parse_applied_at(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime format fallback
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}

/// Manages the migration history in the database.
#[derive(Debug, Clone)]
pub struct MigrationHistory {
    pool: DatabasePool,
}

impl MigrationHistory {
    /// Creates a new migration history manager.
    #[must_use]
    pub const fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Ensures the history table exists.
    pub async fn ensure_table(&self) -> Result<()> {
        let sql = match &self.pool {
            DatabasePool::Sqlite(_) => CREATE_SQLITE_SQL,
            DatabasePool::Postgres(_) => CREATE_POSTGRES_SQL,
        };
        self.pool.execute(sql).await?;
        Ok(())
    }

    /// Records `changeset` as applied now and returns the recorded name.
    pub async fn record_applied(&self, changeset: &Changeset) -> Result<String> {
        let now = Utc::now();
        let name = migration_name(now);
        let operations = serde_json::to_string(
            &changeset.iter().map(ToString::to_string).collect::<Vec<_>>(),
        )?;
        let applied_at = now.to_rfc3339();

        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query(
                    "INSERT INTO oxide_automigrations (name, operations, applied_at) VALUES (?, ?, ?)",
                )
                .bind(&name)
                .bind(&operations)
                .bind(&applied_at)
                .execute(pool)
                .await?;
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO oxide_automigrations (name, operations, applied_at) VALUES ($1, $2, $3)",
                )
                .bind(&name)
                .bind(&operations)
                .bind(&applied_at)
                .execute(pool)
                .await?;
            }
        }
        Ok(name)
    }

    /// Gets all applied changesets, oldest first.
    pub async fn get_applied(&self) -> Result<Vec<AppliedMigration>> {
        let rows: Vec<(i64, String, String, String)> = match &self.pool {
            DatabasePool::Sqlite(pool) => sqlx::query_as(SELECT_SQL).fetch_all(pool).await?,
            DatabasePool::Postgres(pool) => sqlx::query_as(SELECT_SQL).fetch_all(pool).await?,
        };

        let mut migrations = Vec::with_capacity(rows.len());
        for (id, name, operations, applied_at) in rows {
            migrations.push(AppliedMigration {
                id,
                name,
                operations: serde_json::from_str(&operations)?,
                applied_at: parse_applied_at(&applied_at),
            });
        }
        Ok(migrations)
    }

    /// Gets the most recently applied changeset.
    pub async fn get_last_applied(&self) -> Result<Option<AppliedMigration>> {
        Ok(self.get_applied().await?.pop())
    }

    /// Counts applied changesets.
    pub async fn count_applied(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM oxide_automigrations";
        let row: (i64,) = match &self.pool {
            DatabasePool::Sqlite(pool) => sqlx::query_as(sql).fetch_one(pool).await?,
            DatabasePool::Postgres(pool) => sqlx::query_as(sql).fetch_one(pool).await?,
        };
        Ok(row.0)
    }
}
