//! MySQL dialect.
//!
//! Tables live in the connection's current database, so the default
//! schema is empty and names are rendered unqualified.

use super::SchemaDialect;
use crate::error::Result;
use crate::operations::Operation;
use crate::schema::ColumnDefinition;

/// MySQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

const ALIASES: &[(&str, &str)] = &[
    ("integer", "int"),
    ("character varying", "varchar"),
    ("character", "char"),
    ("boolean", "tinyint(1)"),
    ("bool", "tinyint(1)"),
    ("numeric", "decimal"),
    ("dec", "decimal"),
    ("double precision", "double"),
    ("real", "double"),
];

impl SchemaDialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn default_schema(&self) -> &'static str {
        ""
    }

    fn default_varchar_len(&self) -> u32 {
        255
    }

    fn type_aliases(&self) -> &'static [(&'static str, &'static str)] {
        ALIASES
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn type_name(&self, column: &ColumnDefinition) -> String {
        let base = column.sql_type.to_uppercase();
        if column.varchar_len > 0 {
            format!("{base}({})", column.varchar_len)
        } else if column.sql_type == "varchar" {
            format!("VARCHAR({})", self.default_varchar_len())
        } else {
            base
        }
    }

    fn sequence_clause(&self, column: &ColumnDefinition) -> Option<&'static str> {
        (column.is_auto_increment || column.is_identity).then_some("AUTO_INCREMENT")
    }

    fn generate_sql(&self, operation: &Operation) -> Result<Vec<String>> {
        let sql = match operation {
            Operation::CreateTable { table } => self.create_table_sql(table),
            Operation::DropTable { fqn } => format!("DROP TABLE {}", self.table_name(fqn)),
            Operation::RenameTable { fqn, new_name } => format!(
                "ALTER TABLE {} RENAME TO {}",
                self.table_name(fqn),
                self.table_name(&fqn.with_table(new_name.clone()))
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
            Operation::ChangeColumnType { fqn, to, .. } => format!(
                "ALTER TABLE {} MODIFY COLUMN {}",
                self.table_name(fqn),
                self.column_definition(to)
            ),
            Operation::AddPrimaryKey { fqn, primary_key } => format!(
                "ALTER TABLE {} ADD PRIMARY KEY ({})",
                self.table_name(fqn),
                self.column_list(&primary_key.columns)
            ),
            Operation::DropPrimaryKey { fqn, .. } => {
                format!("ALTER TABLE {} DROP PRIMARY KEY", self.table_name(fqn))
            }
            Operation::ChangePrimaryKey { fqn, new, .. } => format!(
                "ALTER TABLE {} DROP PRIMARY KEY, ADD PRIMARY KEY ({})",
                self.table_name(fqn),
                self.column_list(&new.columns)
            ),
            Operation::AddUniqueConstraint { fqn, unique } => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
                self.table_name(fqn),
                self.quote_identifier(&self.unique_name(fqn, unique)),
                self.column_list(&unique.columns)
            ),
            Operation::DropUniqueConstraint { fqn, unique } => format!(
                "ALTER TABLE {} DROP INDEX {}",
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
                "ALTER TABLE {} DROP FOREIGN KEY {}",
                self.table_name(&foreign_key.from.fqn),
                self.quote_identifier(&self.foreign_key_name(foreign_key, name))
            ),
        };
        Ok(vec![sql])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::Columns;
    use crate::schema::{Fqn, PrimaryKey, Unique};

    fn dialect() -> MysqlDialect {
        MysqlDialect::new()
    }

    #[test]
    fn test_default_varchar_length() {
        let d = dialect();
        let unsized_col = ColumnDefinition::new("name", "varchar");
        let sized = ColumnDefinition::new("name", "varchar").varchar_len(255);
        assert!(d.equivalent_types(&unsized_col, &sized));
        assert!(!d.equivalent_types(&unsized_col, &sized.clone().varchar_len(100)));
        assert_eq!(d.type_name(&unsized_col), "VARCHAR(255)");
    }

    #[test]
    fn test_boolean_alias() {
        let d = dialect();
        assert!(d.equivalent_types(
            &ColumnDefinition::new("flag", "boolean"),
            &ColumnDefinition::new("flag", "tinyint(1)")
        ));
    }

    #[test]
    fn test_modify_column() {
        let fqn = Fqn::new("", "users");
        let sql = dialect()
            .generate_sql(&Operation::change_column(
                fqn,
                ColumnDefinition::new("age", "int"),
                ColumnDefinition::new("age", "bigint").not_null(),
            ))
            .unwrap();
        assert_eq!(sql[0], "ALTER TABLE `users` MODIFY COLUMN `age` BIGINT NOT NULL");
    }

    #[test]
    fn test_key_statements() {
        let d = dialect();
        let fqn = Fqn::new("", "users");
        let sql = d
            .generate_sql(&Operation::DropPrimaryKey {
                fqn: fqn.clone(),
                primary_key: PrimaryKey::new(Columns::parse("id")),
            })
            .unwrap();
        assert_eq!(sql[0], "ALTER TABLE `users` DROP PRIMARY KEY");

        let sql = d
            .generate_sql(&Operation::DropUniqueConstraint {
                fqn,
                unique: Unique::new(Columns::parse("email")).named("uq_email"),
            })
            .unwrap();
        assert_eq!(sql[0], "ALTER TABLE `users` DROP INDEX `uq_email`");
    }

    #[test]
    fn test_auto_increment() {
        let col = ColumnDefinition::new("id", "bigint").not_null().auto_increment();
        assert_eq!(
            dialect().column_definition(&col),
            "`id` BIGINT NOT NULL AUTO_INCREMENT"
        );
    }
}
