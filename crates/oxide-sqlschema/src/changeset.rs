//! Ordered collections of operations.

use std::fmt;

use crate::dialect::SchemaDialect;
use crate::error::Result;
use crate::operations::Operation;

/// An ordered list of operations.
///
/// Operations are sorted by [`Operation::phase`] and then by their
/// canonical string, so the same set of changes always yields the same
/// changeset regardless of detection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    operations: Vec<Operation>,
}

impl Changeset {
    /// Builds a changeset, sorting operations into execution order.
    pub fn new(operations: impl IntoIterator<Item = Operation>) -> Self {
        let mut keyed: Vec<(u8, String, Operation)> = operations
            .into_iter()
            .map(|op| (op.phase(), op.to_string(), op))
            .collect();
        keyed.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        keyed.dedup_by(|a, b| a.0 == b.0 && a.1 == b.1);
        Self {
            operations: keyed.into_iter().map(|(_, _, op)| op).collect(),
        }
    }

    /// The operations in execution order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Iterates over the operations in execution order.
    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Renders every operation to DDL, in order.
    ///
    /// Stops at the first operation the dialect cannot express.
    pub fn to_sql(&self, dialect: &dyn SchemaDialect) -> Result<Vec<String>> {
        let mut statements = Vec::new();
        for op in &self.operations {
            statements.extend(dialect.generate_sql(op)?);
        }
        Ok(statements)
    }

    /// Returns the changeset that undoes this one, or `None` if any
    /// operation is irreversible. The result runs in reverse order.
    #[must_use]
    pub fn reverse(&self) -> Option<Self> {
        let operations = self
            .operations
            .iter()
            .rev()
            .map(Operation::reverse)
            .collect::<Option<Vec<_>>>()?;
        Some(Self { operations })
    }
}

impl fmt::Display for Changeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.operations {
            writeln!(f, "{op}")?;
        }
        Ok(())
    }
}

impl FromIterator<Operation> for Changeset {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl IntoIterator for Changeset {
    type Item = Operation;
    type IntoIter = std::vec::IntoIter<Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.into_iter()
    }
}

impl<'a> IntoIterator for &'a Changeset {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}
