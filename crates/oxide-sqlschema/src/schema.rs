//! Schema state model.
//!
//! These types describe a database schema independent of where it came
//! from: a live database or a set of model definitions. Two states are
//! compared by the [`Detector`](crate::detector::Detector).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::columns::{ColumnReference, Columns};

/// Fully-qualified table name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fqn {
    /// Schema name (`public`, `main`, `dbo`, ...).
    pub schema: String,
    /// Table name.
    pub table: String,
}

impl Fqn {
    /// Creates a new fully-qualified name.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Returns the same schema with a different table name.
    #[must_use]
    pub fn with_table(&self, table: impl Into<String>) -> Self {
        Self::new(self.schema.clone(), table)
    }
}

impl fmt::Display for Fqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.schema.is_empty() {
            f.write_str(&self.table)
        } else {
            write!(f, "{}.{}", self.schema, self.table)
        }
    }
}

/// A single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// Lowercase SQL type without length (e.g. `varchar`, `bigint`).
    pub sql_type: String,
    /// Declared `VARCHAR` length, 0 when absent.
    #[serde(default)]
    pub varchar_len: u32,
    /// Normalized default expression, empty when absent.
    #[serde(default)]
    pub default_value: String,
    /// Whether NULL is allowed.
    pub is_nullable: bool,
    /// Whether values come from a sequence (`SERIAL`, `AUTOINCREMENT`).
    #[serde(default)]
    pub is_auto_increment: bool,
    /// Whether the column is an identity column.
    #[serde(default)]
    pub is_identity: bool,
}

impl ColumnDefinition {
    /// Creates a nullable column with no default.
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into().trim().to_lowercase(),
            varchar_len: 0,
            default_value: String::new(),
            is_nullable: true,
            is_auto_increment: false,
            is_identity: false,
        }
    }

    /// Sets the `VARCHAR` length.
    #[must_use]
    pub const fn varchar_len(mut self, len: u32) -> Self {
        self.varchar_len = len;
        self
    }

    /// Sets the default expression.
    #[must_use]
    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default_value = expr.into();
        self
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    /// Marks the column nullable.
    #[must_use]
    pub const fn nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    /// Marks the column auto-incrementing.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    /// Marks the column as an identity column.
    #[must_use]
    pub const fn identity(mut self) -> Self {
        self.is_identity = true;
        self
    }

    /// Returns true if type and length are the same, ignoring every other attribute.
    #[must_use]
    pub fn same_type(&self, other: &Self) -> bool {
        self.sql_type == other.sql_type && self.varchar_len == other.varchar_len
    }
}

impl fmt::Display for ColumnDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.sql_type)?;
        if self.varchar_len > 0 {
            write!(f, "({})", self.varchar_len)?;
        }
        if !self.is_nullable {
            f.write_str(" not null")?;
        }
        if !self.default_value.is_empty() {
            write!(f, " default {}", self.default_value)?;
        }
        if self.is_auto_increment {
            f.write_str(" autoincrement")?;
        }
        if self.is_identity {
            f.write_str(" identity")?;
        }
        Ok(())
    }
}

/// A primary key. Columns are stored sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Constraint name, if known.
    pub name: Option<String>,
    /// Key columns.
    pub columns: Columns,
}

impl PrimaryKey {
    /// Creates an unnamed primary key over `columns`.
    #[must_use]
    pub fn new(columns: Columns) -> Self {
        Self {
            name: None,
            columns: columns.to_sorted(),
        }
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Compares key columns only.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        self.columns.to_sorted() == other.columns.to_sorted()
    }
}

/// A unique constraint. Columns are stored sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unique {
    /// Constraint name, if known.
    pub name: Option<String>,
    /// Constrained columns.
    pub columns: Columns,
}

impl Unique {
    /// Creates an unnamed unique constraint over `columns`.
    #[must_use]
    pub fn new(columns: Columns) -> Self {
        Self {
            name: None,
            columns: columns.to_sorted(),
        }
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Two unique constraints are equal when they cover the same columns.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        self.columns.to_sorted() == other.columns.to_sorted()
    }
}

/// A foreign key from one column set to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referencing side.
    pub from: ColumnReference,
    /// Referenced side.
    pub to: ColumnReference,
}

impl ForeignKey {
    /// Creates a foreign key.
    #[must_use]
    pub const fn new(from: ColumnReference, to: ColumnReference) -> Self {
        Self { from, to }
    }

    /// Returns true if either side is on `fqn`.
    #[must_use]
    pub fn depends_on_table(&self, fqn: &Fqn) -> bool {
        self.from.fqn == *fqn || self.to.fqn == *fqn
    }

    /// Returns true if either side includes `column` of `fqn`.
    #[must_use]
    pub fn depends_on_column(&self, fqn: &Fqn, column: &str) -> bool {
        (self.from.fqn == *fqn && self.from.columns.contains(column))
            || (self.to.fqn == *fqn && self.to.columns.contains(column))
    }
}

impl fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} references {}", self.from, self.to)
    }
}

/// A table with its columns and table-level constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Columns in declaration order. Names are unique.
    pub columns: Vec<ColumnDefinition>,
    /// Primary key, if any.
    pub primary_key: Option<PrimaryKey>,
    /// Unique constraints.
    #[serde(default)]
    pub unique_constraints: Vec<Unique>,
}

impl Table {
    /// Creates an empty table.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            unique_constraints: Vec::new(),
        }
    }

    /// Adds a column, replacing any column with the same name.
    #[must_use]
    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.push_column(column);
        self
    }

    /// Sets the primary key.
    #[must_use]
    pub fn primary_key(mut self, primary_key: PrimaryKey) -> Self {
        self.primary_key = Some(primary_key);
        self
    }

    /// Adds a unique constraint.
    #[must_use]
    pub fn unique(mut self, unique: Unique) -> Self {
        self.unique_constraints.push(unique);
        self
    }

    /// Adds a column in place, replacing any column with the same name.
    pub fn push_column(&mut self, column: ColumnDefinition) {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    /// Returns the fully-qualified name.
    #[must_use]
    pub fn fqn(&self) -> Fqn {
        Fqn::new(self.schema.clone(), self.name.clone())
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns true if the table has a column with this name.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }
}

/// A complete schema: tables plus foreign keys.
///
/// Foreign keys map to their constraint name. Names are empty when the
/// source does not know them (models, or SQLite).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Tables by fully-qualified name.
    #[serde(with = "table_list")]
    pub tables: BTreeMap<Fqn, Table>,
    /// Foreign keys with their constraint names.
    #[serde(with = "foreign_key_list")]
    pub foreign_keys: BTreeMap<ForeignKey, String>,
}

impl State {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table.
    #[must_use]
    pub fn table(mut self, table: Table) -> Self {
        self.add_table(table);
        self
    }

    /// Adds a named foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKey, name: impl Into<String>) -> Self {
        self.foreign_keys.insert(fk, name.into());
        self
    }

    /// Adds a table in place.
    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.fqn(), table);
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, fqn: &Fqn) -> Option<&Table> {
        self.tables.get(fqn)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (fqn, table) in &self.tables {
            writeln!(f, "{fqn}")?;
            for column in &table.columns {
                writeln!(f, "  {column}")?;
            }
            if let Some(pk) = &table.primary_key {
                writeln!(f, "  primary key ({})", pk.columns)?;
            }
            for unique in &table.unique_constraints {
                writeln!(f, "  unique ({})", unique.columns)?;
            }
        }
        for fk in self.foreign_keys.keys() {
            writeln!(f, "foreign key {fk}")?;
        }
        Ok(())
    }
}

mod table_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::{Fqn, Table};

    pub fn serialize<S: Serializer>(
        tables: &BTreeMap<Fqn, Table>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(tables.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Fqn, Table>, D::Error> {
        let tables = Vec::<Table>::deserialize(deserializer)?;
        Ok(tables.into_iter().map(|t| (t.fqn(), t)).collect())
    }
}

mod foreign_key_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::ForeignKey;

    pub fn serialize<S: Serializer>(
        foreign_keys: &BTreeMap<ForeignKey, String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(foreign_keys.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<ForeignKey, String>, D::Error> {
        let list = Vec::<(ForeignKey, String)>::deserialize(deserializer)?;
        Ok(list.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fqn_display() {
        assert_eq!(Fqn::new("public", "users").to_string(), "public.users");
        assert_eq!(Fqn::new("", "users").to_string(), "users");
    }

    #[test]
    fn test_column_definition_builder() {
        let col = ColumnDefinition::new("email", "VARCHAR")
            .varchar_len(255)
            .not_null()
            .default_value("''");
        assert_eq!(col.sql_type, "varchar");
        assert!(!col.is_nullable);
        assert_eq!(col.to_string(), "email varchar(255) not null default ''");
    }

    #[test]
    fn test_push_column_replaces() {
        let table = Table::new("public", "users")
            .column(ColumnDefinition::new("id", "bigint"))
            .column(ColumnDefinition::new("id", "integer"));
        assert_eq!(table.columns.len(), 1);
        assert_eq!(table.get_column("id").unwrap().sql_type, "integer");
    }

    #[test]
    fn test_unique_equality_ignores_name() {
        let a = Unique::new(Columns::parse("x,y")).named("a");
        let b = Unique::new(Columns::parse("y,x")).named("b");
        assert!(a.equals(&b));
        assert!(!a.equals(&Unique::new(Columns::parse("x"))));
    }

    #[test]
    fn test_primary_key_sorted() {
        let pk = PrimaryKey::new(Columns::parse("b,a"));
        assert_eq!(pk.columns.as_str(), "a,b");
    }

    #[test]
    fn test_foreign_key_dependencies() {
        let fk = ForeignKey::new(
            ColumnReference::new("public", "posts", ["author_id"]),
            ColumnReference::new("public", "users", ["id"]),
        );
        assert!(fk.depends_on_table(&Fqn::new("public", "users")));
        assert!(fk.depends_on_column(&Fqn::new("public", "posts"), "author_id"));
        assert!(!fk.depends_on_column(&Fqn::new("public", "posts"), "id"));
    }

    #[test]
    fn test_state_serde_roundtrip() {
        let state = State::new()
            .table(Table::new("public", "users").column(ColumnDefinition::new("id", "bigint")))
            .foreign_key(
                ForeignKey::new(
                    ColumnReference::new("public", "users", ["id"]),
                    ColumnReference::new("public", "users", ["id"]),
                ),
                "self_fk",
            );
        let json = serde_json::to_string(&state).unwrap();
        let back: State = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
