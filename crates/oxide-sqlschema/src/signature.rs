//! Name-independent table shapes.
//!
//! A [`Signature`] is the multiset of a table's column definitions with
//! column names ignored. Two tables with equal signatures have the same
//! columns up to naming, which is what makes one a rename candidate for
//! the other.

use crate::schema::{ColumnDefinition, Table};

/// Column equality used to build signatures.
pub type ColumnEquality<'a> = dyn Fn(&ColumnDefinition, &ColumnDefinition) -> bool + 'a;

/// The column multiset of a table.
pub struct Signature<'a> {
    counts: Vec<(&'a ColumnDefinition, usize)>,
    eq: &'a ColumnEquality<'a>,
}

impl<'a> Signature<'a> {
    /// Groups the columns of `table` by `eq` and counts each group.
    pub fn new(table: &'a Table, eq: &'a ColumnEquality<'a>) -> Self {
        let mut counts: Vec<(&ColumnDefinition, usize)> = Vec::new();
        for column in &table.columns {
            match counts.iter_mut().find(|(seen, _)| eq(*seen, column)) {
                Some((_, n)) => *n += 1,
                None => counts.push((column, 1)),
            }
        }
        Self { counts, eq }
    }

    /// Returns true if both signatures hold the same columns the same
    /// number of times.
    #[must_use]
    pub fn equals(&self, other: &Signature<'_>) -> bool {
        self.counts.len() == other.counts.len()
            && self.counts.iter().all(|(column, n)| {
                other
                    .counts
                    .iter()
                    .any(|(candidate, m)| n == m && (self.eq)(*column, *candidate))
            })
    }
}
