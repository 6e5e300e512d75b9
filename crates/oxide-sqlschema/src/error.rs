//! Error types for schema modelling and DDL generation.

/// Errors raised while building schema states or rendering DDL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The dialect cannot express an operation.
    #[error("{dialect} does not support {operation} on {table}")]
    UnsupportedOperation {
        /// Dialect name.
        dialect: &'static str,
        /// Short operation description (e.g. "change column type").
        operation: String,
        /// Fully-qualified table the operation targets.
        table: String,
    },

    /// A declared SQL type could not be parsed.
    #[error("Invalid SQL type '{0}'")]
    InvalidType(String),

    /// An operation does not fit the state it is applied to.
    #[error("Invalid schema state: {0}")]
    InvalidState(String),

    /// A model definition is malformed.
    #[error("Invalid model '{model}': {message}")]
    InvalidModel {
        /// Model (table) name as declared.
        model: String,
        /// What is wrong with it.
        message: String,
    },
}

impl SchemaError {
    /// Creates an [`SchemaError::UnsupportedOperation`].
    pub fn unsupported(
        dialect: &'static str,
        operation: impl Into<String>,
        table: impl ToString,
    ) -> Self {
        Self::UnsupportedOperation {
            dialect,
            operation: operation.into(),
            table: table.to_string(),
        }
    }

    /// Creates an [`SchemaError::InvalidModel`].
    pub fn invalid_model(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidModel {
            model: model.into(),
            message: message.into(),
        }
    }
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
