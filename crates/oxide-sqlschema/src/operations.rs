//! Schema change operations.
//!
//! Every change the detector can find is one [`Operation`]. Operations
//! carry enough data to render DDL without looking at either state again,
//! and each has a canonical string form (its `Display`) used for
//! deterministic ordering and comparison.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnDefinition, ForeignKey, Fqn, PrimaryKey, Table, Unique};

/// A single schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a table with its columns, primary key and unique constraints.
    CreateTable {
        /// Full table definition.
        table: Table,
    },

    /// Drop a table.
    DropTable {
        /// Table to drop.
        fqn: Fqn,
    },

    /// Rename a table within its schema.
    RenameTable {
        /// Current name.
        fqn: Fqn,
        /// New table name.
        new_name: String,
    },

    /// Add a column.
    AddColumn {
        /// Table.
        fqn: Fqn,
        /// Column to add.
        column: ColumnDefinition,
    },

    /// Drop a column.
    DropColumn {
        /// Table.
        fqn: Fqn,
        /// Column being dropped, as it currently exists.
        column: ColumnDefinition,
    },

    /// Rename a column.
    RenameColumn {
        /// Table.
        fqn: Fqn,
        /// Current column name.
        old_name: String,
        /// New column name.
        new_name: String,
    },

    /// Change type, nullability, default or sequence attributes of a column.
    ChangeColumnType {
        /// Table.
        fqn: Fqn,
        /// Current definition.
        from: ColumnDefinition,
        /// Target definition.
        to: ColumnDefinition,
    },

    /// Add a primary key.
    AddPrimaryKey {
        /// Table.
        fqn: Fqn,
        /// Key to add.
        primary_key: PrimaryKey,
    },

    /// Drop the primary key.
    DropPrimaryKey {
        /// Table.
        fqn: Fqn,
        /// Key being dropped.
        primary_key: PrimaryKey,
    },

    /// Replace the primary key.
    ChangePrimaryKey {
        /// Table.
        fqn: Fqn,
        /// Current key.
        old: PrimaryKey,
        /// Target key.
        new: PrimaryKey,
    },

    /// Add a unique constraint.
    AddUniqueConstraint {
        /// Table.
        fqn: Fqn,
        /// Constraint to add.
        unique: Unique,
    },

    /// Drop a unique constraint.
    DropUniqueConstraint {
        /// Table.
        fqn: Fqn,
        /// Constraint being dropped.
        unique: Unique,
    },

    /// Add a foreign key.
    AddForeignKey {
        /// Key to add.
        foreign_key: ForeignKey,
        /// Constraint name; empty lets the dialect pick one.
        name: String,
    },

    /// Drop a foreign key.
    DropForeignKey {
        /// Key being dropped.
        foreign_key: ForeignKey,
        /// Constraint name as known to the database.
        name: String,
    },
}

impl Operation {
    /// Creates a `CreateTable` operation.
    #[must_use]
    pub const fn create_table(table: Table) -> Self {
        Self::CreateTable { table }
    }

    /// Creates a `DropTable` operation.
    #[must_use]
    pub const fn drop_table(fqn: Fqn) -> Self {
        Self::DropTable { fqn }
    }

    /// Creates a `RenameTable` operation.
    pub fn rename_table(fqn: Fqn, new_name: impl Into<String>) -> Self {
        Self::RenameTable {
            fqn,
            new_name: new_name.into(),
        }
    }

    /// Creates an `AddColumn` operation.
    #[must_use]
    pub const fn add_column(fqn: Fqn, column: ColumnDefinition) -> Self {
        Self::AddColumn { fqn, column }
    }

    /// Creates a `DropColumn` operation.
    #[must_use]
    pub const fn drop_column(fqn: Fqn, column: ColumnDefinition) -> Self {
        Self::DropColumn { fqn, column }
    }

    /// Creates a `RenameColumn` operation.
    pub fn rename_column(fqn: Fqn, old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self::RenameColumn {
            fqn,
            old_name: old_name.into(),
            new_name: new_name.into(),
        }
    }

    /// Creates a `ChangeColumnType` operation.
    #[must_use]
    pub const fn change_column(fqn: Fqn, from: ColumnDefinition, to: ColumnDefinition) -> Self {
        Self::ChangeColumnType { fqn, from, to }
    }

    /// Creates an `AddForeignKey` operation.
    pub fn add_foreign_key(foreign_key: ForeignKey, name: impl Into<String>) -> Self {
        Self::AddForeignKey {
            foreign_key,
            name: name.into(),
        }
    }

    /// Creates a `DropForeignKey` operation.
    pub fn drop_foreign_key(foreign_key: ForeignKey, name: impl Into<String>) -> Self {
        Self::DropForeignKey {
            foreign_key,
            name: name.into(),
        }
    }

    /// The table this operation acts on. Foreign key operations act on
    /// the referencing table.
    #[must_use]
    pub fn fqn(&self) -> Fqn {
        match self {
            Self::CreateTable { table } => table.fqn(),
            Self::AddForeignKey { foreign_key, .. } | Self::DropForeignKey { foreign_key, .. } => {
                foreign_key.from.fqn.clone()
            }
            Self::DropTable { fqn }
            | Self::RenameTable { fqn, .. }
            | Self::AddColumn { fqn, .. }
            | Self::DropColumn { fqn, .. }
            | Self::RenameColumn { fqn, .. }
            | Self::ChangeColumnType { fqn, .. }
            | Self::AddPrimaryKey { fqn, .. }
            | Self::DropPrimaryKey { fqn, .. }
            | Self::ChangePrimaryKey { fqn, .. }
            | Self::AddUniqueConstraint { fqn, .. }
            | Self::DropUniqueConstraint { fqn, .. } => fqn.clone(),
        }
    }

    /// Position in the changeset. Renames come first so later operations
    /// can address tables and columns by their new names; constraints
    /// are dropped before the structures they depend on and added last.
    #[must_use]
    pub const fn phase(&self) -> u8 {
        match self {
            Self::RenameTable { .. } => 0,
            Self::RenameColumn { .. } => 1,
            Self::DropForeignKey { .. } => 2,
            Self::DropUniqueConstraint { .. } | Self::DropPrimaryKey { .. } => 3,
            Self::CreateTable { .. } => 4,
            Self::AddColumn { .. } => 5,
            Self::ChangeColumnType { .. } => 6,
            Self::DropColumn { .. } => 7,
            Self::DropTable { .. } => 8,
            Self::ChangePrimaryKey { .. } | Self::AddPrimaryKey { .. } => 9,
            Self::AddUniqueConstraint { .. } => 10,
            Self::AddForeignKey { .. } => 11,
        }
    }

    /// Short human-readable kind, used in errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "create table",
            Self::DropTable { .. } => "drop table",
            Self::RenameTable { .. } => "rename table",
            Self::AddColumn { .. } => "add column",
            Self::DropColumn { .. } => "drop column",
            Self::RenameColumn { .. } => "rename column",
            Self::ChangeColumnType { .. } => "change column",
            Self::AddPrimaryKey { .. } => "add primary key",
            Self::DropPrimaryKey { .. } => "drop primary key",
            Self::ChangePrimaryKey { .. } => "change primary key",
            Self::AddUniqueConstraint { .. } => "add unique constraint",
            Self::DropUniqueConstraint { .. } => "drop unique constraint",
            Self::AddForeignKey { .. } => "add foreign key",
            Self::DropForeignKey { .. } => "drop foreign key",
        }
    }

    /// Returns the operation that undoes this one, if it can be derived.
    ///
    /// `DropTable` only knows the table name, so it is not reversible.
    #[must_use]
    pub fn reverse(&self) -> Option<Self> {
        let reversed = match self {
            Self::CreateTable { table } => Self::drop_table(table.fqn()),
            Self::DropTable { .. } => return None,
            Self::RenameTable { fqn, new_name } => {
                Self::rename_table(fqn.with_table(new_name.clone()), fqn.table.clone())
            }
            Self::AddColumn { fqn, column } => Self::drop_column(fqn.clone(), column.clone()),
            Self::DropColumn { fqn, column } => Self::add_column(fqn.clone(), column.clone()),
            Self::RenameColumn {
                fqn,
                old_name,
                new_name,
            } => Self::rename_column(fqn.clone(), new_name.clone(), old_name.clone()),
            Self::ChangeColumnType { fqn, from, to } => {
                Self::change_column(fqn.clone(), to.clone(), from.clone())
            }
            Self::AddPrimaryKey { fqn, primary_key } => Self::DropPrimaryKey {
                fqn: fqn.clone(),
                primary_key: primary_key.clone(),
            },
            Self::DropPrimaryKey { fqn, primary_key } => Self::AddPrimaryKey {
                fqn: fqn.clone(),
                primary_key: primary_key.clone(),
            },
            Self::ChangePrimaryKey { fqn, old, new } => Self::ChangePrimaryKey {
                fqn: fqn.clone(),
                old: new.clone(),
                new: old.clone(),
            },
            Self::AddUniqueConstraint { fqn, unique } => Self::DropUniqueConstraint {
                fqn: fqn.clone(),
                unique: unique.clone(),
            },
            Self::DropUniqueConstraint { fqn, unique } => Self::AddUniqueConstraint {
                fqn: fqn.clone(),
                unique: unique.clone(),
            },
            Self::AddForeignKey { foreign_key, name } => {
                Self::drop_foreign_key(foreign_key.clone(), name.clone())
            }
            Self::DropForeignKey { foreign_key, name } => {
                Self::add_foreign_key(foreign_key.clone(), name.clone())
            }
        };
        Some(reversed)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable { table } => {
                let columns = table
                    .columns
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "create table {} ({columns})", table.fqn())?;
                if let Some(pk) = &table.primary_key {
                    write!(f, " primary key ({})", pk.columns)?;
                }
                for unique in &table.unique_constraints {
                    write!(f, " unique ({})", unique.columns)?;
                }
                Ok(())
            }
            Self::DropTable { fqn } => write!(f, "drop table {fqn}"),
            Self::RenameTable { fqn, new_name } => write!(f, "rename table {fqn} to {new_name}"),
            Self::AddColumn { fqn, column } => write!(f, "add column {fqn}.{column}"),
            Self::DropColumn { fqn, column } => write!(f, "drop column {fqn}.{}", column.name),
            Self::RenameColumn {
                fqn,
                old_name,
                new_name,
            } => write!(f, "rename column {fqn}.{old_name} to {new_name}"),
            Self::ChangeColumnType { fqn, from, to } => {
                write!(f, "change column {fqn}.{from} => {to}")
            }
            Self::AddPrimaryKey { fqn, primary_key } => {
                write!(f, "add primary key {fqn} ({})", primary_key.columns)
            }
            Self::DropPrimaryKey { fqn, primary_key } => {
                write!(f, "drop primary key {fqn} ({})", primary_key.columns)
            }
            Self::ChangePrimaryKey { fqn, old, new } => write!(
                f,
                "change primary key {fqn} ({}) => ({})",
                old.columns, new.columns
            ),
            Self::AddUniqueConstraint { fqn, unique } => {
                write!(f, "add unique {fqn} ({})", unique.columns)
            }
            Self::DropUniqueConstraint { fqn, unique } => {
                write!(f, "drop unique {fqn} ({})", unique.columns)
            }
            Self::AddForeignKey { foreign_key, .. } => write!(f, "add foreign key {foreign_key}"),
            Self::DropForeignKey { foreign_key, .. } => write!(f, "drop foreign key {foreign_key}"),
        }
    }
}
