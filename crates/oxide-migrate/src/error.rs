//! Error types for the migration pipeline.

use oxide_sqlschema::SchemaError;

/// Errors that can occur while inspecting or migrating a database.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The database has no support for a pipeline step.
    #[error("{dialect} does not support {capability}")]
    Unsupported {
        /// Dialect name.
        dialect: &'static str,
        /// The missing capability ("inspect", "migrate").
        capability: &'static str,
    },

    /// Database error while connecting or inspecting.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A DDL statement failed while applying an operation.
    #[error("Failed to apply '{operation}' on {table}: {source}")]
    Ddl {
        /// Canonical text of the failed operation.
        operation: String,
        /// Table the operation targets.
        table: String,
        /// Database error.
        source: sqlx::Error,
    },

    /// Schema modelling or DDL rendering error.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// IO error (reading model files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A step ran out of time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The database URL could not be understood.
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
