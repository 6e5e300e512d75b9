//! The inspect, diff and apply pipeline.
//!
//! [`AutoMigrator`] compares the schema a database has with the schema a
//! [`ModelRegistry`] describes and applies the difference. The current
//! state always comes from the database, never from a cache, so a run
//! that stopped half-way is picked up by simply running again.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use oxide_sqlschema::changeset::Changeset;
use oxide_sqlschema::detector::Detector;
use oxide_sqlschema::dialect::SchemaDialect;
use oxide_sqlschema::inspector::{Inspector, InspectorConfig, ModelInspector};
use oxide_sqlschema::migrator::{Migrator, StateMigrator};
use oxide_sqlschema::model::ModelRegistry;
use oxide_sqlschema::schema::State;
use tracing::info;

use crate::connection::{Backend, DatabasePool};
use crate::error::{MigrateError, Result};
use crate::executor::DatabaseMigrator;
use crate::history::{MigrationHistory, HISTORY_TABLE};
use crate::inspector::DatabaseInspector;

/// Reads a model registry from a JSON file.
///
/// The file holds an array of model definitions.
///
/// # Errors
///
/// Fails if the file cannot be read or does not describe valid models.
pub fn load_models(path: &Path) -> Result<ModelRegistry> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Keeps a database in step with a set of models.
#[derive(Debug, Clone)]
pub struct AutoMigrator {
    pool: DatabasePool,
    config: InspectorConfig,
    timeout: Option<Duration>,
}

impl AutoMigrator {
    /// Connects to `url`.
    ///
    /// # Errors
    ///
    /// Fails with [`MigrateError::Unsupported`] for a backend that cannot
    /// be inspected, before any connection is made.
    pub async fn connect(url: &str, config: InspectorConfig) -> Result<Self> {
        Backend::from_url(url)?.require("inspect")?;
        let pool = DatabasePool::connect(url).await?;
        Ok(Self::new(pool, config))
    }

    /// Creates a migrator over an existing pool.
    #[must_use]
    pub fn new(pool: DatabasePool, config: InspectorConfig) -> Self {
        let config = if config.exclude_tables.iter().any(|t| t == HISTORY_TABLE) {
            config
        } else {
            config.exclude(HISTORY_TABLE)
        };
        Self {
            pool,
            config,
            timeout: None,
        }
    }

    /// Bounds each inspection and each apply by `limit`.
    #[must_use]
    pub const fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Returns the pool.
    #[must_use]
    pub const fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &'static dyn SchemaDialect {
        self.pool.dialect()
    }

    /// Returns the inspector configuration.
    #[must_use]
    pub const fn config(&self) -> &InspectorConfig {
        &self.config
    }

    /// Returns the migration history.
    #[must_use]
    pub fn history(&self) -> MigrationHistory {
        MigrationHistory::new(self.pool.clone())
    }

    async fn bounded<T>(&self, step: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| MigrateError::Timeout(format!("{step} exceeded {limit:?}")))?,
            None => fut.await,
        }
    }

    /// Reads the current schema from the database.
    pub async fn inspect_database(&self) -> Result<State> {
        let inspector = DatabaseInspector::new(&self.pool, &self.config);
        self.bounded("inspect", inspector.inspect()).await
    }

    /// Builds the schema the models describe.
    ///
    /// # Errors
    ///
    /// Fails on malformed models.
    pub fn inspect_models(&self, registry: &ModelRegistry) -> Result<State> {
        Ok(ModelInspector::new(registry, self.dialect(), &self.config).build()?)
    }

    /// Computes the changes that bring the database in line with `registry`.
    pub async fn plan(&self, registry: &ModelRegistry) -> Result<Changeset> {
        let target = self.inspect_models(registry)?;
        let current = self.inspect_database().await?;
        Ok(Detector::for_dialect(self.dialect()).diff(&current, &target))
    }

    /// Generates the DDL for `changeset` without executing it.
    ///
    /// # Errors
    ///
    /// Fails on the first operation the dialect cannot express.
    pub fn sql(&self, changeset: &Changeset) -> Result<Vec<String>> {
        Ok(changeset.to_sql(self.dialect())?)
    }

    /// Plans and replays the changes in memory, returning the schema the
    /// database would have afterwards.
    pub async fn dry_run(&self, registry: &ModelRegistry) -> Result<(Changeset, State)> {
        let target = self.inspect_models(registry)?;
        let current = self.inspect_database().await?;
        let changeset = Detector::for_dialect(self.dialect()).diff(&current, &target);

        let replay = StateMigrator::new(current);
        replay.apply(changeset.operations()).await?;
        Ok((changeset, replay.into_state()?))
    }

    /// Applies `changeset` to the database.
    pub async fn apply(&self, changeset: &Changeset) -> Result<()> {
        let migrator = DatabaseMigrator::new(self.pool.clone());
        self.bounded("apply", migrator.apply(changeset.operations()))
            .await
    }

    /// Plans, applies and records the changes for `registry`.
    ///
    /// Returns the applied changeset. An empty changeset is neither
    /// applied nor recorded.
    pub async fn migrate(&self, registry: &ModelRegistry) -> Result<Changeset> {
        let changeset = self.plan(registry).await?;
        if changeset.is_empty() {
            info!("No changes detected");
            return Ok(changeset);
        }

        info!(operations = changeset.len(), "Applying changeset");
        self.apply(&changeset).await?;

        let history = self.history();
        history.ensure_table().await?;
        let name = history.record_applied(&changeset).await?;
        info!(name = %name, "Changeset applied successfully");
        Ok(changeset)
    }
}
