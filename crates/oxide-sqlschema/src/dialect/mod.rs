//! Database dialects.
//!
//! A dialect knows three things about its database: which type spellings
//! mean the same type, how defaults are normalized, and how each
//! [`Operation`] is written as DDL. Operations the database cannot
//! express fail with [`SchemaError::UnsupportedOperation`] instead of
//! emitting something close.

mod mssql;
mod mysql;
mod postgres;
mod sqlite;

pub use mssql::MssqlDialect;
pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::columns::Columns;
use crate::error::{Result, SchemaError};
use crate::normalize;
use crate::operations::Operation;
use crate::schema::{ColumnDefinition, ForeignKey, Fqn, PrimaryKey, Table, Unique};

static POSTGRES: PostgresDialect = PostgresDialect::new();
static MYSQL: MysqlDialect = MysqlDialect::new();
static SQLITE: SqliteDialect = SqliteDialect::new();
static MSSQL: MssqlDialect = MssqlDialect::new();

/// Looks up a dialect by name (`postgres`, `mysql`, `sqlite`, `mssql`).
#[must_use]
pub fn by_name(name: &str) -> Option<&'static dyn SchemaDialect> {
    match name.to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" | "pg" => Some(&POSTGRES),
        "mysql" | "mariadb" => Some(&MYSQL),
        "sqlite" | "sqlite3" => Some(&SQLITE),
        "mssql" | "sqlserver" => Some(&MSSQL),
        _ => None,
    }
}

/// Database-specific type semantics and DDL generation.
pub trait SchemaDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Schema used when a model does not name one.
    fn default_schema(&self) -> &'static str;

    /// Length assumed for a `VARCHAR` declared without one. 0 means unbounded.
    fn default_varchar_len(&self) -> u32 {
        0
    }

    /// Alternative type spellings and the canonical name they map to.
    fn type_aliases(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Maps a lowercase type name to its canonical spelling. Parameters
    /// such as `(10,2)` are kept and the base name is resolved.
    fn canonical_type(&self, sql_type: &str) -> String {
        let lowered = sql_type.trim().to_lowercase();
        let (base, params) = match lowered.find('(') {
            Some(open) => (lowered[..open].trim_end(), &lowered[open..]),
            None => (lowered.as_str(), ""),
        };
        let base = self
            .type_aliases()
            .iter()
            .find(|(alias, _)| *alias == base)
            .map_or(base, |(_, canonical)| *canonical);
        format!("{base}{params}")
    }

    /// Returns true if the two columns have the same type in this dialect.
    ///
    /// Aliases are resolved first. A character column declared without a
    /// length is treated as having [`default_varchar_len`](Self::default_varchar_len).
    fn equivalent_types(&self, a: &ColumnDefinition, b: &ColumnDefinition) -> bool {
        let a_type = self.canonical_type(&a.sql_type);
        let b_type = self.canonical_type(&b.sql_type);
        if a_type != b_type {
            return false;
        }
        let effective = |len: u32| {
            if len == 0 {
                self.default_varchar_len()
            } else {
                len
            }
        };
        effective(a.varchar_len) == effective(b.varchar_len)
    }

    /// Normalizes a default expression as reported by this database.
    fn normalize_default(&self, expr: &str) -> String {
        normalize::default_value(expr)
    }

    /// Quotes an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Renders a schema-qualified table name.
    fn table_name(&self, fqn: &Fqn) -> String {
        if fqn.schema.is_empty() {
            self.quote_identifier(&fqn.table)
        } else {
            format!(
                "{}.{}",
                self.quote_identifier(&fqn.schema),
                self.quote_identifier(&fqn.table)
            )
        }
    }

    /// Renders a quoted, comma-separated column list.
    fn column_list(&self, columns: &Columns) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Renders the SQL type of a column.
    fn type_name(&self, column: &ColumnDefinition) -> String {
        if column.varchar_len > 0 {
            format!("{}({})", column.sql_type.to_uppercase(), column.varchar_len)
        } else {
            column.sql_type.to_uppercase()
        }
    }

    /// Clause appended for auto-increment or identity columns, if any.
    fn sequence_clause(&self, column: &ColumnDefinition) -> Option<&'static str> {
        let _ = column;
        None
    }

    /// Generates column definition SQL.
    fn column_definition(&self, column: &ColumnDefinition) -> String {
        let mut parts = vec![self.quote_identifier(&column.name), self.type_name(column)];
        if !column.is_nullable {
            parts.push("NOT NULL".to_string());
        }
        if !column.default_value.is_empty() {
            parts.push(format!("DEFAULT {}", column.default_value));
        }
        if let Some(clause) = self.sequence_clause(column) {
            parts.push(clause.to_string());
        }
        parts.join(" ")
    }

    /// Picks a constraint name when none is known.
    fn constraint_name(&self, fqn: &Fqn, columns: &Columns, suffix: &str) -> String {
        let mut name = fqn.table.clone();
        for column in columns.iter() {
            name.push('_');
            name.push_str(column);
        }
        name.push('_');
        name.push_str(suffix);
        name
    }

    /// Name of a primary key constraint.
    fn primary_key_name(&self, fqn: &Fqn, pk: &PrimaryKey) -> String {
        pk.name
            .clone()
            .unwrap_or_else(|| format!("{}_pkey", fqn.table))
    }

    /// Name of a unique constraint.
    fn unique_name(&self, fqn: &Fqn, unique: &Unique) -> String {
        unique
            .name
            .clone()
            .unwrap_or_else(|| self.constraint_name(fqn, &unique.columns, "key"))
    }

    /// Name of a foreign key constraint; `name` may be empty.
    fn foreign_key_name(&self, fk: &ForeignKey, name: &str) -> String {
        if name.is_empty() {
            self.constraint_name(&fk.from.fqn, &fk.from.columns, "fkey")
        } else {
            name.to_string()
        }
    }

    /// Generates `CREATE TABLE` with the primary key and unique constraints.
    fn create_table_sql(&self, table: &Table) -> String {
        let mut defs: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        if let Some(pk) = &table.primary_key {
            defs.push(format!("PRIMARY KEY ({})", self.column_list(&pk.columns)));
        }
        for unique in &table.unique_constraints {
            let columns = self.column_list(&unique.columns);
            match &unique.name {
                Some(name) => defs.push(format!(
                    "CONSTRAINT {} UNIQUE ({columns})",
                    self.quote_identifier(name)
                )),
                None => defs.push(format!("UNIQUE ({columns})")),
            }
        }
        format!(
            "CREATE TABLE {} ({})",
            self.table_name(&table.fqn()),
            defs.join(", ")
        )
    }

    /// Generates SQL for an operation.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnsupportedOperation`] when the dialect has
    /// no way to express `operation`.
    fn generate_sql(&self, operation: &Operation) -> Result<Vec<String>>;

    /// Builds the error for an operation this dialect cannot express.
    fn unsupported(&self, operation: &Operation) -> SchemaError {
        SchemaError::unsupported(self.name(), operation.kind(), operation.fqn())
    }
}
