//! Foreign key tracking across renames and drops.
//!
//! While the detector walks tables, renames and drops change what the
//! current foreign keys point at. [`RefMap`] keeps the original keys in
//! an arena and records, per entry, the latest definition and whether the
//! key was deleted. Nothing is mutated in place: [`RefMap::live`] produces
//! the resulting key set in a final pass.

use std::collections::{BTreeMap, BTreeSet};

use crate::columns::ColumnReference;
use crate::schema::{ForeignKey, Fqn};

#[derive(Debug, Clone)]
struct Entry {
    original: ForeignKey,
    name: String,
}

/// Tracks updates to a set of foreign keys.
#[derive(Debug, Clone, Default)]
pub struct RefMap {
    entries: Vec<Entry>,
    updates: BTreeMap<usize, ForeignKey>,
    deleted: BTreeSet<usize>,
}

impl RefMap {
    /// Creates a map over foreign keys and their constraint names.
    pub fn new<I>(foreign_keys: I) -> Self
    where
        I: IntoIterator<Item = (ForeignKey, String)>,
    {
        let entries = foreign_keys
            .into_iter()
            .map(|(original, name)| Entry { original, name })
            .collect();
        Self {
            entries,
            updates: BTreeMap::new(),
            deleted: BTreeSet::new(),
        }
    }

    fn current(&self, index: usize) -> &ForeignKey {
        self.updates
            .get(&index)
            .unwrap_or(&self.entries[index].original)
    }

    fn live_indices(&self) -> Vec<usize> {
        (0..self.entries.len())
            .filter(|i| !self.deleted.contains(i))
            .collect()
    }

    /// Points every key on table `old` at table `new`. Returns the number
    /// of keys changed; a self-referencing key counts once.
    pub fn update_table(&mut self, old: &Fqn, new: &Fqn) -> usize {
        let mut count = 0;
        for index in self.live_indices() {
            let mut fk = self.current(index).clone();
            let mut changed = false;
            if fk.from.fqn == *old {
                fk.from.fqn = new.clone();
                changed = true;
            }
            if fk.to.fqn == *old {
                fk.to.fqn = new.clone();
                changed = true;
            }
            if changed {
                self.updates.insert(index, fk);
                count += 1;
            }
        }
        count
    }

    /// Renames the single column named by `column` to `new_name` in every
    /// key that uses it, including composite keys. Returns the number of
    /// keys changed.
    pub fn update_column(&mut self, column: &ColumnReference, new_name: &str) -> usize {
        let mut count = 0;
        for index in self.live_indices() {
            let mut fk = self.current(index).clone();
            let mut changed = false;
            for old_name in column.columns.iter() {
                if fk.from.fqn == column.fqn && fk.from.columns.replace(old_name, new_name) {
                    changed = true;
                }
                if fk.to.fqn == column.fqn && fk.to.columns.replace(old_name, new_name) {
                    changed = true;
                }
            }
            if changed {
                self.updates.insert(index, fk);
                count += 1;
            }
        }
        count
    }

    /// Marks every key on table `fqn` as deleted. Returns the number of
    /// keys newly deleted.
    pub fn delete_table(&mut self, fqn: &Fqn) -> usize {
        let doomed: Vec<usize> = self
            .live_indices()
            .into_iter()
            .filter(|&i| self.current(i).depends_on_table(fqn))
            .collect();
        self.deleted.extend(doomed.iter().copied());
        doomed.len()
    }

    /// Marks every key using any column of `column` as deleted. Returns
    /// the number of keys newly deleted.
    pub fn delete_column(&mut self, column: &ColumnReference) -> usize {
        let doomed: Vec<usize> = self
            .live_indices()
            .into_iter()
            .filter(|&i| {
                let fk = self.current(i);
                column
                    .columns
                    .iter()
                    .any(|name| fk.depends_on_column(&column.fqn, name))
            })
            .collect();
        self.deleted.extend(doomed.iter().copied());
        doomed.len()
    }

    /// Maps each original key to its current definition, for keys that
    /// were updated and not deleted.
    #[must_use]
    pub fn updated(&self) -> BTreeMap<ForeignKey, ForeignKey> {
        self.updates
            .iter()
            .filter(|(index, _)| !self.deleted.contains(index))
            .map(|(&index, fk)| (self.entries[index].original.clone(), fk.clone()))
            .collect()
    }

    /// Current definitions of deleted keys, with their constraint names.
    #[must_use]
    pub fn deleted(&self) -> Vec<(ForeignKey, String)> {
        self.deleted
            .iter()
            .map(|&index| (self.current(index).clone(), self.entries[index].name.clone()))
            .collect()
    }

    /// The resulting key set: current definitions of keys not deleted.
    #[must_use]
    pub fn live(&self) -> BTreeMap<ForeignKey, String> {
        self.live_indices()
            .into_iter()
            .map(|index| (self.current(index).clone(), self.entries[index].name.clone()))
            .collect()
    }
}
