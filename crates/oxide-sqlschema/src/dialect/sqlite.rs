//! SQLite dialect.
//!
//! SQLite's `ALTER TABLE` only renames tables and columns and adds or
//! drops columns. Column changes, primary key changes and foreign key
//! changes are reported as unsupported. Unique constraints added after
//! creation become unique indexes.

use super::SchemaDialect;
use crate::error::Result;
use crate::operations::Operation;
use crate::schema::{ColumnDefinition, Fqn, Table};

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Index name qualified with the table's schema.
    fn index_name(&self, fqn: &Fqn, name: &str) -> String {
        if fqn.schema.is_empty() {
            self.quote_identifier(name)
        } else {
            format!(
                "{}.{}",
                self.quote_identifier(&fqn.schema),
                self.quote_identifier(name)
            )
        }
    }

    /// The single auto-increment primary key column, if the table has one.
    fn rowid_alias<'a>(&self, table: &'a Table) -> Option<&'a ColumnDefinition> {
        let pk = table.primary_key.as_ref()?;
        if pk.columns.len() != 1 {
            return None;
        }
        table
            .columns
            .iter()
            .find(|c| pk.columns.contains(&c.name) && c.is_auto_increment)
    }
}

impl SchemaDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn default_schema(&self) -> &'static str {
        "main"
    }

    /// Reduces a declared type to its column affinity.
    fn canonical_type(&self, sql_type: &str) -> String {
        let lowered = sql_type.trim().to_lowercase();
        let affinity = if lowered.contains("int") {
            "integer"
        } else if lowered.contains("char") || lowered.contains("clob") || lowered.contains("text") {
            "text"
        } else if lowered.is_empty() || lowered.contains("blob") {
            "blob"
        } else if lowered.contains("real") || lowered.contains("floa") || lowered.contains("doub") {
            "real"
        } else {
            "numeric"
        };
        affinity.to_string()
    }

    fn equivalent_types(&self, a: &ColumnDefinition, b: &ColumnDefinition) -> bool {
        self.canonical_type(&a.sql_type) == self.canonical_type(&b.sql_type)
    }

    fn type_name(&self, column: &ColumnDefinition) -> String {
        if column.is_auto_increment {
            "INTEGER".to_string()
        } else if column.varchar_len > 0 {
            format!("{}({})", column.sql_type.to_uppercase(), column.varchar_len)
        } else {
            column.sql_type.to_uppercase()
        }
    }

    fn create_table_sql(&self, table: &Table) -> String {
        let rowid = self.rowid_alias(table);
        let mut defs: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                let def = self.column_definition(c);
                if rowid.is_some_and(|r| r.name == c.name) {
                    format!("{def} PRIMARY KEY AUTOINCREMENT")
                } else {
                    def
                }
            })
            .collect();
        if let (Some(pk), None) = (&table.primary_key, rowid) {
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

    fn generate_sql(&self, operation: &Operation) -> Result<Vec<String>> {
        let sql = match operation {
            Operation::CreateTable { table } => self.create_table_sql(table),
            Operation::DropTable { fqn } => format!("DROP TABLE {}", self.table_name(fqn)),
            Operation::RenameTable { fqn, new_name } => format!(
                "ALTER TABLE {} RENAME TO {}",
                self.table_name(fqn),
                self.quote_identifier(new_name)
            ),
            Operation::AddColumn { fqn, column } => format!(
                "ALTER TABLE {} ADD COLUMN {}",
                self.table_name(fqn),
                self.column_definition(column)
            ),
            Operation::DropColumn { fqn, column } => format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.table_name(fqn),
                self.quote_identifier(&column.name)
            ),
            Operation::RenameColumn {
                fqn,
                old_name,
                new_name,
            } => format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                self.table_name(fqn),
                self.quote_identifier(old_name),
                self.quote_identifier(new_name)
            ),
            Operation::AddUniqueConstraint { fqn, unique } => format!(
                "CREATE UNIQUE INDEX {} ON {} ({})",
                self.index_name(fqn, &self.unique_name(fqn, unique)),
                self.quote_identifier(&fqn.table),
                self.column_list(&unique.columns)
            ),
            Operation::DropUniqueConstraint { fqn, unique } => format!(
                "DROP INDEX {}",
                self.index_name(fqn, &self.unique_name(fqn, unique))
            ),
            Operation::ChangeColumnType { .. }
            | Operation::AddPrimaryKey { .. }
            | Operation::DropPrimaryKey { .. }
            | Operation::ChangePrimaryKey { .. }
            | Operation::AddForeignKey { .. }
            | Operation::DropForeignKey { .. } => return Err(self.unsupported(operation)),
        };
        Ok(vec![sql])
    }
}
