//! SQL Server dialect.

use super::SchemaDialect;
use crate::error::Result;
use crate::operations::Operation;
use crate::schema::{ColumnDefinition, Fqn};

/// SQL Server dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlDialect;

impl MssqlDialect {
    /// Creates a new SQL Server dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Unquoted `schema.table` for `sp_rename` arguments.
    fn rename_target(fqn: &Fqn) -> String {
        fqn.to_string().replace('\'', "''")
    }
}

const ALIASES: &[(&str, &str)] = &[
    ("integer", "int"),
    ("character varying", "varchar"),
    ("character", "char"),
    ("boolean", "bit"),
    ("bool", "bit"),
    ("numeric", "decimal"),
    ("double precision", "float"),
];

impl SchemaDialect for MssqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn default_schema(&self) -> &'static str {
        "dbo"
    }

    fn default_varchar_len(&self) -> u32 {
        255
    }

    fn type_aliases(&self) -> &'static [(&'static str, &'static str)] {
        ALIASES
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn sequence_clause(&self, column: &ColumnDefinition) -> Option<&'static str> {
        (column.is_auto_increment || column.is_identity).then_some("IDENTITY(1,1)")
    }

    fn generate_sql(&self, operation: &Operation) -> Result<Vec<String>> {
        let sql = match operation {
            Operation::CreateTable { table } => self.create_table_sql(table),
            Operation::DropTable { fqn } => format!("DROP TABLE {}", self.table_name(fqn)),
            Operation::RenameTable { fqn, new_name } => format!(
                "EXEC sp_rename '{}', '{}'",
                Self::rename_target(fqn),
                new_name.replace('\'', "''")
            ),
            Operation::AddColumn { fqn, column } => format!(
                "ALTER TABLE {} ADD {}",
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
                "EXEC sp_rename '{}.{}', '{}', 'COLUMN'",
                Self::rename_target(fqn),
                old_name.replace('\'', "''"),
                new_name.replace('\'', "''")
            ),
            Operation::ChangeColumnType { fqn, from, to } => {
                if from.default_value != to.default_value
                    || from.is_identity != to.is_identity
                    || from.is_auto_increment != to.is_auto_increment
                {
                    return Err(self.unsupported(operation));
                }
                let nullability = if to.is_nullable { "NULL" } else { "NOT NULL" };
                format!(
                    "ALTER TABLE {} ALTER COLUMN {} {} {nullability}",
                    self.table_name(fqn),
                    self.quote_identifier(&to.name),
                    self.type_name(to)
                )
            }
            Operation::AddPrimaryKey { fqn, primary_key } => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
                self.table_name(fqn),
                self.quote_identifier(&self.primary_key_name(fqn, primary_key)),
                self.column_list(&primary_key.columns)
            ),
            Operation::DropPrimaryKey { fqn, primary_key } => format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.table_name(fqn),
                self.quote_identifier(&self.primary_key_name(fqn, primary_key))
            ),
            Operation::ChangePrimaryKey { fqn, old, new } => {
                return Ok(vec![
                    format!(
                        "ALTER TABLE {} DROP CONSTRAINT {}",
                        self.table_name(fqn),
                        self.quote_identifier(&self.primary_key_name(fqn, old))
                    ),
                    format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
                        self.table_name(fqn),
                        self.quote_identifier(&self.primary_key_name(fqn, new)),
                        self.column_list(&new.columns)
                    ),
                ]);
            }
            Operation::AddUniqueConstraint { fqn, unique } => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
                self.table_name(fqn),
                self.quote_identifier(&self.unique_name(fqn, unique)),
                self.column_list(&unique.columns)
            ),
            Operation::DropUniqueConstraint { fqn, unique } => format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.table_name(fqn),
                self.quote_identifier(&self.unique_name(fqn, unique))
            ),
            Operation::AddForeignKey { foreign_key, name } => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                self.table_name(&foreign_key.from.fqn),
                self.quote_identifier(&self.foreign_key_name(foreign_key, name)),
                self.column_list(&foreign_key.from.columns),
                self.table_name(&foreign_key.to.fqn),
                self.column_list(&foreign_key.to.columns)
            ),
            Operation::DropForeignKey { foreign_key, name } => format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.table_name(&foreign_key.from.fqn),
                self.quote_identifier(&self.foreign_key_name(foreign_key, name))
            ),
        };
        Ok(vec![sql])
    }
}
