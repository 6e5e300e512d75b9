//! Automatic schema migrations for Rust.
//!
//! `oxide-migrate` keeps a database in step with a set of model
//! definitions. There are no migration files: every run reads the live
//! schema, diffs it against the models and applies the difference.
//!
//! # Architecture
//!
//! - **Connection** - picks the backend from the database URL
//! - **Inspector** - reads the live schema from the database catalog
//! - **Executor** - applies a changeset through the dialect's DDL
//! - **History** - records every applied changeset
//! - **AutoMigrator** - the inspect, diff and apply pipeline
//!
//! Diffing itself lives in [`oxide_sqlschema`].
//!
//! # Example
//!
//! ```rust,no_run
//! use oxide_migrate::prelude::*;
//!
//! # async fn run() -> oxide_migrate::error::Result<()> {
//! let models = ModelRegistry::from_models([ModelDefinition::new("users")
//!     .field(FieldDescriptor::new("id", "bigint").primary_key().auto_increment())
//!     .field(FieldDescriptor::new("email", "varchar(255)").not_null().unique())])?;
//!
//! let migrator = AutoMigrator::connect("sqlite:app.db", InspectorConfig::new()).await?;
//! let applied = migrator.migrate(&models).await?;
//! println!("{applied}");
//! # Ok(())
//! # }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Show the live schema
//! oxide-migrate inspect
//!
//! # Show what would change
//! oxide-migrate --models models.json diff
//!
//! # Show the DDL without running it
//! oxide-migrate --models models.json sql
//!
//! # Apply and record the changes
//! oxide-migrate --models models.json migrate
//!
//! # List applied changesets
//! oxide-migrate history
//! ```

pub mod auto;
pub mod connection;
pub mod error;
pub mod executor;
pub mod history;
pub mod inspector;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::auto::{load_models, AutoMigrator};
    pub use crate::connection::{Backend, DatabasePool};
    pub use crate::error::{MigrateError, Result};
    pub use crate::executor::DatabaseMigrator;
    pub use crate::history::{AppliedMigration, MigrationHistory, HISTORY_TABLE};
    pub use crate::inspector::{DatabaseInspector, PostgresInspector, SqliteInspector};
    pub use oxide_sqlschema::prelude::*;
}
