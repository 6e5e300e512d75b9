//! PostgreSQL dialect.

use super::SchemaDialect;
use crate::error::Result;
use crate::operations::Operation;
use crate::schema::{ColumnDefinition, Fqn};

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// `SERIAL` family type replacing an integer auto-increment column.
    fn serial_type(&self, column: &ColumnDefinition) -> Option<&'static str> {
        if !column.is_auto_increment {
            return None;
        }
        match self.canonical_type(&column.sql_type).as_str() {
            "smallint" => Some("SMALLSERIAL"),
            "integer" => Some("SERIAL"),
            "bigint" => Some("BIGSERIAL"),
            _ => None,
        }
    }

    fn alter_column(
        &self,
        fqn: &Fqn,
        from: &ColumnDefinition,
        to: &ColumnDefinition,
        op: &Operation,
    ) -> Result<Vec<String>> {
        if from.is_auto_increment != to.is_auto_increment {
            return Err(self.unsupported(op));
        }

        let column = self.quote_identifier(&to.name);
        let mut clauses = Vec::new();
        if !from.same_type(to) {
            clauses.push(format!(
                "ALTER COLUMN {column} SET DATA TYPE {}",
                self.type_name(to)
            ));
        }
        if from.is_nullable != to.is_nullable {
            let action = if to.is_nullable { "DROP" } else { "SET" };
            clauses.push(format!("ALTER COLUMN {column} {action} NOT NULL"));
        }
        if from.default_value != to.default_value {
            if to.default_value.is_empty() {
                clauses.push(format!("ALTER COLUMN {column} DROP DEFAULT"));
            } else {
                clauses.push(format!(
                    "ALTER COLUMN {column} SET DEFAULT {}",
                    to.default_value
                ));
            }
        }
        if from.is_identity != to.is_identity {
            if to.is_identity {
                clauses.push(format!(
                    "ALTER COLUMN {column} ADD GENERATED BY DEFAULT AS IDENTITY"
                ));
            } else {
                clauses.push(format!("ALTER COLUMN {column} DROP IDENTITY"));
            }
        }

        if clauses.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![format!(
            "ALTER TABLE {} {}",
            self.table_name(fqn),
            clauses.join(", ")
        )])
    }
}

const ALIASES: &[(&str, &str)] = &[
    ("character varying", "varchar"),
    ("character", "char"),
    ("bpchar", "char"),
    ("int", "integer"),
    ("int4", "integer"),
    ("serial", "integer"),
    ("serial4", "integer"),
    ("int8", "bigint"),
    ("bigserial", "bigint"),
    ("serial8", "bigint"),
    ("int2", "smallint"),
    ("smallserial", "smallint"),
    ("bool", "boolean"),
    ("float8", "double precision"),
    ("float4", "real"),
    ("decimal", "numeric"),
    ("timestamp without time zone", "timestamp"),
    ("timestamp with time zone", "timestamptz"),
    ("time without time zone", "time"),
    ("time with time zone", "timetz"),
];

impl SchemaDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn default_schema(&self) -> &'static str {
        "public"
    }

    fn type_aliases(&self) -> &'static [(&'static str, &'static str)] {
        ALIASES
    }

    fn sequence_clause(&self, column: &ColumnDefinition) -> Option<&'static str> {
        column
            .is_identity
            .then_some("GENERATED BY DEFAULT AS IDENTITY")
    }

    fn column_definition(&self, column: &ColumnDefinition) -> String {
        let data_type = self
            .serial_type(column)
            .map_or_else(|| self.type_name(column), ToString::to_string);
        let mut sql = format!("{} {data_type}", self.quote_identifier(&column.name));
        if !column.is_nullable {
            sql.push_str(" NOT NULL");
        }
        if !column.default_value.is_empty() {
            sql.push_str(" DEFAULT ");
            sql.push_str(&column.default_value);
        }
        if let Some(clause) = self.sequence_clause(column) {
            sql.push(' ');
            sql.push_str(clause);
        }
        sql
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
            Operation::ChangeColumnType { fqn, from, to } => {
                return self.alter_column(fqn, from, to, operation);
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
            Operation::ChangePrimaryKey { fqn, old, new } => format!(
                "ALTER TABLE {} DROP CONSTRAINT {}, ADD CONSTRAINT {} PRIMARY KEY ({})",
                self.table_name(fqn),
                self.quote_identifier(&self.primary_key_name(fqn, old)),
                self.quote_identifier(&self.primary_key_name(fqn, new)),
                self.column_list(&new.columns)
            ),
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
