//! # oxide-sqlschema
//!
//! Schema diffing for automatic migrations.
//!
//! The crate compares two [`State`](schema::State)s, usually the schema a
//! database has and the schema the application's models describe, and
//! produces an ordered [`Changeset`](changeset::Changeset) of operations
//! that turns one into the other. Each [`SchemaDialect`](dialect::SchemaDialect)
//! renders operations as DDL for its database.
//!
//! ## Quick Start
//!
//! ```rust
//! use oxide_sqlschema::prelude::*;
//!
//! let current = State::new().table(
//!     Table::new("public", "journals")
//!         .column(ColumnDefinition::new("isbn", "varchar").not_null())
//!         .column(ColumnDefinition::new("title", "varchar").not_null()),
//! );
//! let target = State::new().table(
//!     Table::new("public", "journals_renamed")
//!         .column(ColumnDefinition::new("isbn", "varchar").not_null())
//!         .column(ColumnDefinition::new("title", "varchar").not_null()),
//! );
//!
//! let dialect = PostgresDialect::new();
//! let changes = Detector::for_dialect(&dialect).diff(&current, &target);
//! assert_eq!(
//!     changes.to_sql(&dialect).unwrap(),
//!     vec!["ALTER TABLE \"public\".\"journals\" RENAME TO \"journals_renamed\""]
//! );
//! ```
//!
//! ## Pieces
//!
//! - [`schema`]: tables, columns, keys and constraints.
//! - [`inspector`]: producing states, including from model definitions.
//! - [`detector`]: finding renames, additions, drops and changes.
//! - [`refmap`]: keeping foreign keys in step with renames and drops.
//! - [`changeset`] and [`operations`]: the ordered result.
//! - [`migrator`]: applying operations.

pub mod changeset;
pub mod columns;
pub mod detector;
pub mod dialect;
pub mod error;
pub mod inspector;
pub mod migrator;
pub mod model;
pub mod normalize;
pub mod operations;
pub mod refmap;
pub mod schema;
pub mod signature;
pub mod state;

pub use changeset::Changeset;
pub use detector::Detector;
pub use error::{Result, SchemaError};
pub use operations::Operation;
pub use schema::State;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::changeset::Changeset;
    pub use crate::columns::{ColumnReference, Columns};
    pub use crate::detector::Detector;
    pub use crate::dialect::{
        MssqlDialect, MysqlDialect, PostgresDialect, SchemaDialect, SqliteDialect,
    };
    pub use crate::error::{Result, SchemaError};
    pub use crate::inspector::{Inspector, InspectorConfig, ModelInspector};
    pub use crate::migrator::{Migrator, StateMigrator};
    pub use crate::model::{FieldDescriptor, ModelDefinition, ModelRegistry, Relation};
    pub use crate::operations::Operation;
    pub use crate::refmap::RefMap;
    pub use crate::schema::{
        ColumnDefinition, ForeignKey, Fqn, PrimaryKey, State, Table, Unique,
    };
}
