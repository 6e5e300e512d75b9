//! Column lists and column references.
//!
//! A [`Columns`] value is the comma-joined list of column names used by
//! keys and constraints. Order is kept as given, since foreign keys pair
//! columns positionally. Primary keys and unique constraints store a
//! sorted copy so that two constraints over the same set compare equal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::Fqn;

/// An ordered list of column names, stored as `"a,b,c"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Columns(String);

impl Columns {
    /// Builds a column list, keeping the given order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        Self(joined)
    }

    /// Builds a column list sorted by name.
    pub fn sorted<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(names).to_sorted()
    }

    /// Parses a comma-separated list such as `"a, b"`.
    #[must_use]
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Returns the raw comma-joined representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the column names in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.split(',').filter(|name| !name.is_empty())
    }

    /// Returns the column names in order.
    #[must_use]
    pub fn split(&self) -> Vec<&str> {
        self.iter().collect()
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns true if the list has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if `column` is one of the listed names.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.iter().any(|name| name == column)
    }

    /// Returns true if every column of `other` is listed here.
    #[must_use]
    pub fn contains_all(&self, other: &Self) -> bool {
        other.iter().all(|name| self.contains(name))
    }

    /// Renames one column in place. Returns true if it was present.
    pub fn replace(&mut self, old: &str, new: &str) -> bool {
        if !self.contains(old) {
            return false;
        }
        let renamed = Self::new(self.iter().map(|name| if name == old { new } else { name }));
        *self = renamed;
        true
    }

    /// Returns a copy sorted by name.
    #[must_use]
    pub fn to_sorted(&self) -> Self {
        let mut names = self.split();
        names.sort_unstable();
        Self::new(names)
    }
}

impl fmt::Display for Columns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Columns {
    fn from(list: &str) -> Self {
        Self::parse(list)
    }
}

/// A table plus one or more of its columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnReference {
    /// The table.
    pub fqn: Fqn,
    /// The referenced columns, in order.
    pub columns: Columns,
}

impl ColumnReference {
    /// Creates a reference to `columns` of `schema.table`.
    pub fn new<I, S>(schema: impl Into<String>, table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            fqn: Fqn::new(schema, table),
            columns: Columns::new(columns),
        }
    }

    /// Creates a reference to columns of an existing table name.
    #[must_use]
    pub fn on(fqn: Fqn, columns: Columns) -> Self {
        Self { fqn, columns }
    }
}

impl fmt::Display for ColumnReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.fqn, self.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_keeps_order() {
        let cols = Columns::new(["b", "a"]);
        assert_eq!(cols.as_str(), "b,a");
        assert_eq!(cols.split(), vec!["b", "a"]);
    }

    #[test]
    fn test_sorted() {
        assert_eq!(Columns::sorted(["b", "a", "c"]).as_str(), "a,b,c");
        assert_eq!(Columns::parse("y, x").to_sorted(), Columns::parse("x,y"));
    }

    #[test]
    fn test_empty() {
        let cols = Columns::new(Vec::<String>::new());
        assert!(cols.is_empty());
        assert_eq!(cols.len(), 0);
        assert!(cols.split().is_empty());
    }

    #[test]
    fn test_contains() {
        let cols = Columns::parse("c1,c2");
        assert!(cols.contains("c1"));
        assert!(!cols.contains("c"));
        assert!(cols.contains_all(&Columns::parse("c2")));
        assert!(!cols.contains_all(&Columns::parse("c2,c3")));
    }

    #[test]
    fn test_replace_single_column() {
        let mut cols = Columns::parse("c1,c2,c3");
        assert!(cols.replace("c2", "x2"));
        assert_eq!(cols.as_str(), "c1,x2,c3");
        assert!(!cols.replace("missing", "y"));
        assert_eq!(cols.as_str(), "c1,x2,c3");
    }

    #[test]
    fn test_column_reference_display() {
        let col = ColumnReference::new("public", "users", ["id"]);
        assert_eq!(col.to_string(), "public.users (id)");
    }
}
