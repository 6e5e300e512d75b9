//! Change detection between two schema states.
//!
//! The detector walks the target tables in order. A table present in both
//! states is compared column by column. A target table with no match by
//! name is checked against the unmatched current tables of the same
//! schema: if one has an identical [`Signature`], the change is a rename.
//! Otherwise the table is created. Current tables still unmatched at the
//! end are dropped.
//!
//! Foreign keys are diffed last, after a [`RefMap`] has followed every
//! rename and drop, so a renamed table does not look like a dropped and
//! recreated foreign key.

use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use crate::changeset::Changeset;
use crate::columns::ColumnReference;
use crate::dialect::SchemaDialect;
use crate::operations::Operation;
use crate::refmap::RefMap;
use crate::schema::{ColumnDefinition, Fqn, PrimaryKey, State, Table, Unique};
use crate::signature::Signature;

type TypeEquivalence<'a> = dyn Fn(&ColumnDefinition, &ColumnDefinition) -> bool + Send + Sync + 'a;

/// Compares schema states and produces the changes between them.
pub struct Detector<'a> {
    type_equivalence: Box<TypeEquivalence<'a>>,
}

impl fmt::Debug for Detector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector").finish_non_exhaustive()
    }
}

impl Default for Detector<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-table constraints as they stand after column renames.
struct Constraints {
    primary_key: Option<PrimaryKey>,
    uniques: Vec<Unique>,
}

impl Constraints {
    fn of(table: &Table) -> Self {
        Self {
            primary_key: table.primary_key.clone(),
            uniques: table.unique_constraints.clone(),
        }
    }

    fn rename_column(&mut self, old: &str, new: &str) {
        if let Some(pk) = self.primary_key.as_mut() {
            pk.columns.replace(old, new);
            pk.columns = pk.columns.to_sorted();
        }
        for unique in &mut self.uniques {
            unique.columns.replace(old, new);
            unique.columns = unique.columns.to_sorted();
        }
    }
}

impl<'a> Detector<'a> {
    /// Creates a detector that treats types as equal only when they are
    /// spelled the same and have the same length.
    #[must_use]
    pub fn new() -> Self {
        Self {
            type_equivalence: Box::new(ColumnDefinition::same_type),
        }
    }

    /// Creates a detector using the type equivalence of `dialect`.
    #[must_use]
    pub fn for_dialect(dialect: &'a dyn SchemaDialect) -> Self {
        Self::new().with_type_equivalence(move |a, b| dialect.equivalent_types(a, b))
    }

    /// Replaces the type equivalence used to compare columns.
    #[must_use]
    pub fn with_type_equivalence<F>(mut self, equivalence: F) -> Self
    where
        F: Fn(&ColumnDefinition, &ColumnDefinition) -> bool + Send + Sync + 'a,
    {
        self.type_equivalence = Box::new(equivalence);
        self
    }

    /// Returns true if the two columns have equivalent types.
    #[must_use]
    pub fn equal_types(&self, a: &ColumnDefinition, b: &ColumnDefinition) -> bool {
        (self.type_equivalence)(a, b)
    }

    /// Returns true if the two columns are the same apart from their names.
    #[must_use]
    pub fn equal_columns(&self, a: &ColumnDefinition, b: &ColumnDefinition) -> bool {
        self.equal_types(a, b)
            && a.default_value == b.default_value
            && a.is_nullable == b.is_nullable
            && a.is_auto_increment == b.is_auto_increment
            && a.is_identity == b.is_identity
    }

    /// Returns true if both tables have the same columns up to naming.
    #[must_use]
    pub fn equal_signatures(&self, a: &Table, b: &Table) -> bool {
        let eq = |x: &ColumnDefinition, y: &ColumnDefinition| self.equal_columns(x, y);
        Signature::new(a, &eq).equals(&Signature::new(b, &eq))
    }

    /// Returns true if `current` may be renamed to `target`: same schema
    /// and equal signatures.
    #[must_use]
    pub fn can_rename(&self, current: &Table, target: &Table) -> bool {
        current.schema == target.schema && self.equal_signatures(current, target)
    }

    /// Computes the changes that turn `current` into `target`.
    #[must_use]
    pub fn diff(&self, current: &State, target: &State) -> Changeset {
        let mut changes = Vec::new();
        let mut refs = RefMap::new(
            current
                .foreign_keys
                .iter()
                .map(|(fk, name)| (fk.clone(), name.clone())),
        );
        let mut unmatched: Vec<&Table> = current
            .tables
            .iter()
            .filter(|(fqn, _)| !target.tables.contains_key(fqn))
            .map(|(_, table)| table)
            .collect();

        for (fqn, want) in &target.tables {
            if let Some(have) = current.tables.get(fqn) {
                self.diff_table(have, want, &mut refs, &mut changes);
                continue;
            }

            let renamed = unmatched.iter().position(|have| self.can_rename(have, want));
            if let Some(index) = renamed {
                let have = unmatched.remove(index);
                let old = have.fqn();
                debug!(from = %old, to = %fqn, "Detected table rename");
                changes.push(Operation::rename_table(old.clone(), want.name.clone()));
                refs.update_table(&old, fqn);
                self.diff_table(have, want, &mut refs, &mut changes);
                continue;
            }

            changes.push(Operation::create_table(want.clone()));
        }

        let mut dropped = BTreeSet::new();
        for have in unmatched {
            let fqn = have.fqn();
            refs.delete_table(&fqn);
            changes.push(Operation::drop_table(fqn.clone()));
            dropped.insert(fqn);
        }

        // Keys owned by a dropped table go away with it, unless they point
        // at another dropped table: then the drop order would matter.
        for (fk, name) in refs.deleted() {
            let owner_dropped = dropped.contains(&fk.from.fqn);
            let cross_drop = owner_dropped && fk.from.fqn != fk.to.fqn && dropped.contains(&fk.to.fqn);
            if !owner_dropped || cross_drop {
                changes.push(Operation::drop_foreign_key(fk, name));
            }
        }

        let live = refs.live();
        for (fk, name) in &target.foreign_keys {
            if !live.contains_key(fk) {
                changes.push(Operation::add_foreign_key(fk.clone(), name.clone()));
            }
        }
        for (fk, name) in live {
            if !target.foreign_keys.contains_key(&fk) {
                changes.push(Operation::drop_foreign_key(fk, name));
            }
        }

        Changeset::new(changes)
    }

    /// Compares a matched pair of tables. Operations are addressed to the
    /// target's name, since renames run first.
    fn diff_table(
        &self,
        have: &Table,
        want: &Table,
        refs: &mut RefMap,
        changes: &mut Vec<Operation>,
    ) {
        let fqn = want.fqn();
        let mut constraints = Constraints::of(have);
        let dropped = self.diff_columns(&fqn, have, want, &mut constraints, refs, changes);
        Self::diff_constraints(&fqn, &constraints, want, &dropped, changes);
    }

    /// Returns the names of dropped columns.
    fn diff_columns(
        &self,
        fqn: &Fqn,
        have: &Table,
        want: &Table,
        constraints: &mut Constraints,
        refs: &mut RefMap,
        changes: &mut Vec<Operation>,
    ) -> Vec<String> {
        let mut leftover: Vec<&ColumnDefinition> = have
            .columns
            .iter()
            .filter(|c| !want.has_column(&c.name))
            .collect();

        for target in &want.columns {
            if let Some(existing) = have.get_column(&target.name) {
                if !self.equal_columns(existing, target) {
                    changes.push(Operation::change_column(
                        fqn.clone(),
                        existing.clone(),
                        self.target_definition(existing, target),
                    ));
                }
                continue;
            }

            let renamed = leftover
                .iter()
                .position(|candidate| self.equal_columns(candidate, target));
            if let Some(index) = renamed {
                let old = leftover.remove(index);
                debug!(table = %fqn, from = %old.name, to = %target.name, "Detected column rename");
                changes.push(Operation::rename_column(
                    fqn.clone(),
                    old.name.clone(),
                    target.name.clone(),
                ));
                refs.update_column(
                    &ColumnReference::new(&fqn.schema, &fqn.table, [&old.name]),
                    &target.name,
                );
                constraints.rename_column(&old.name, &target.name);
                continue;
            }

            changes.push(Operation::add_column(fqn.clone(), target.clone()));
        }

        let mut dropped_names = Vec::with_capacity(leftover.len());
        for dropped in leftover {
            refs.delete_column(&ColumnReference::new(&fqn.schema, &fqn.table, [&dropped.name]));
            changes.push(Operation::drop_column(fqn.clone(), dropped.clone()));
            dropped_names.push(dropped.name.clone());
        }
        dropped_names
    }

    fn diff_constraints(
        fqn: &Fqn,
        constraints: &Constraints,
        want: &Table,
        dropped_columns: &[String],
        changes: &mut Vec<Operation>,
    ) {
        for unique in &constraints.uniques {
            if !want.unique_constraints.iter().any(|u| u.equals(unique)) {
                changes.push(Operation::DropUniqueConstraint {
                    fqn: fqn.clone(),
                    unique: unique.clone(),
                });
            }
        }
        for unique in &want.unique_constraints {
            if !constraints.uniques.iter().any(|u| u.equals(unique)) {
                changes.push(Operation::AddUniqueConstraint {
                    fqn: fqn.clone(),
                    unique: unique.clone(),
                });
            }
        }

        match (&constraints.primary_key, &want.primary_key) {
            (None, Some(new)) => changes.push(Operation::AddPrimaryKey {
                fqn: fqn.clone(),
                primary_key: new.clone(),
            }),
            (Some(old), None) => changes.push(Operation::DropPrimaryKey {
                fqn: fqn.clone(),
                primary_key: old.clone(),
            }),
            // The old key must be gone before its columns are dropped.
            (Some(old), Some(new))
                if !old.equals(new) && dropped_columns.iter().any(|c| old.columns.contains(c)) =>
            {
                changes.push(Operation::DropPrimaryKey {
                    fqn: fqn.clone(),
                    primary_key: old.clone(),
                });
                changes.push(Operation::AddPrimaryKey {
                    fqn: fqn.clone(),
                    primary_key: new.clone(),
                });
            }
            (Some(old), Some(new)) if !old.equals(new) => {
                changes.push(Operation::ChangePrimaryKey {
                    fqn: fqn.clone(),
                    old: old.clone(),
                    new: new.clone(),
                });
            }
            _ => {}
        }
    }

    /// The definition a changed column should end up with. Keeps the
    /// current type spelling when the types are equivalent, so only the
    /// attributes that really differ are altered.
    fn target_definition(
        &self,
        have: &ColumnDefinition,
        want: &ColumnDefinition,
    ) -> ColumnDefinition {
        let mut target = want.clone();
        if self.equal_types(have, want) {
            target.sql_type.clone_from(&have.sql_type);
            target.varchar_len = have.varchar_len;
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::Columns;
    use crate::dialect::PostgresDialect;
    use crate::schema::ForeignKey;

    fn detector() -> Detector<'static> {
        Detector::new()
    }

    fn users(schema: &str, name: &str) -> Table {
        Table::new(schema, name)
            .column(ColumnDefinition::new("id", "bigint").not_null())
            .column(ColumnDefinition::new("email", "varchar").varchar_len(255))
            .primary_key(PrimaryKey::new(Columns::parse("id")))
    }

    #[test]
    fn test_no_changes() {
        let state = State::new().table(users("public", "users"));
        assert!(detector().diff(&state, &state).is_empty());
    }

    #[test]
    fn test_create_and_drop() {
        let current = State::new().table(users("public", "old"));
        let target = State::new().table(
            Table::new("public", "new").column(ColumnDefinition::new("x", "text")),
        );
        let changes = detector().diff(&current, &target);
        assert_eq!(changes.len(), 2);
        assert!(matches!(changes.operations()[0], Operation::CreateTable { .. }));
        assert!(matches!(changes.operations()[1], Operation::DropTable { .. }));
    }

    #[test]
    fn test_rename_table() {
        let current = State::new().table(users("public", "users"));
        let target = State::new().table(users("public", "accounts"));
        let changes = detector().diff(&current, &target);
        assert_eq!(changes.len(), 1);
        match &changes.operations()[0] {
            Operation::RenameTable { fqn, new_name } => {
                assert_eq!(fqn, &Fqn::new("public", "users"));
                assert_eq!(new_name, "accounts");
            }
            other => panic!("Expected RenameTable, got {other}"),
        }
    }

    #[test]
    fn test_no_rename_across_schemas() {
        let current = State::new().table(users("public", "users"));
        let target = State::new().table(users("auth", "users"));
        let changes = detector().diff(&current, &target);
        let kinds: Vec<&str> = changes.iter().map(Operation::kind).collect();
        assert_eq!(kinds, vec!["create table", "drop table"]);
    }

    #[test]
    fn test_add_and_drop_column() {
        let current = State::new().table(users("public", "users"));
        let target = State::new().table(
            Table::new("public", "users")
                .column(ColumnDefinition::new("id", "bigint").not_null())
                .column(ColumnDefinition::new("age", "integer"))
                .primary_key(PrimaryKey::new(Columns::parse("id"))),
        );
        let changes = detector().diff(&current, &target);
        let kinds: Vec<&str> = changes.iter().map(Operation::kind).collect();
        assert_eq!(kinds, vec!["add column", "drop column"]);
    }

    #[test]
    fn test_rename_column() {
        let current = State::new().table(users("public", "users"));
        let target = State::new().table(
            Table::new("public", "users")
                .column(ColumnDefinition::new("id", "bigint").not_null())
                .column(ColumnDefinition::new("mail", "varchar").varchar_len(255))
                .primary_key(PrimaryKey::new(Columns::parse("id"))),
        );
        let changes = detector().diff(&current, &target);
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes.operations()[0],
            Operation::rename_column(Fqn::new("public", "users"), "email", "mail")
        );
    }

    #[test]
    fn test_change_column_keeps_equivalent_type() {
        let current = State::new().table(
            Table::new("public", "t")
                .column(ColumnDefinition::new("name", "character varying").varchar_len(50)),
        );
        let target = State::new().table(
            Table::new("public", "t")
                .column(ColumnDefinition::new("name", "varchar").varchar_len(50).not_null()),
        );
        let dialect = PostgresDialect::new();
        let changes = Detector::for_dialect(&dialect).diff(&current, &target);
        assert_eq!(changes.len(), 1);
        match &changes.operations()[0] {
            Operation::ChangeColumnType { from, to, .. } => {
                assert_eq!(to.sql_type, "character varying");
                assert!(from.is_nullable);
                assert!(!to.is_nullable);
            }
            other => panic!("Expected ChangeColumnType, got {other}"),
        }
    }

    #[test]
    fn test_exact_types_by_default() {
        let current = State::new()
            .table(Table::new("public", "t").column(ColumnDefinition::new("n", "int4")));
        let target = State::new()
            .table(Table::new("public", "t").column(ColumnDefinition::new("n", "integer")));
        assert_eq!(detector().diff(&current, &target).len(), 1);

        let dialect = PostgresDialect::new();
        assert!(Detector::for_dialect(&dialect).diff(&current, &target).is_empty());
    }

    #[test]
    fn test_primary_key_changes() {
        let base = Table::new("public", "t")
            .column(ColumnDefinition::new("a", "integer").not_null())
            .column(ColumnDefinition::new("b", "integer").not_null());
        let none = State::new().table(base.clone());
        let single = State::new().table(base.clone().primary_key(PrimaryKey::new(Columns::parse("a"))));
        let composite = State::new().table(base.primary_key(PrimaryKey::new(Columns::parse("b,a"))));

        let d = detector();
        assert!(matches!(d.diff(&none, &single).operations()[0], Operation::AddPrimaryKey { .. }));
        assert!(matches!(d.diff(&single, &none).operations()[0], Operation::DropPrimaryKey { .. }));
        assert!(matches!(
            d.diff(&single, &composite).operations()[0],
            Operation::ChangePrimaryKey { .. }
        ));
    }

    #[test]
    fn test_primary_key_over_dropped_column() {
        let current = State::new().table(
            Table::new("public", "t")
                .column(ColumnDefinition::new("code", "text").not_null())
                .column(ColumnDefinition::new("id", "bigint").not_null())
                .primary_key(PrimaryKey::new(Columns::parse("code"))),
        );
        let target = State::new().table(
            Table::new("public", "t")
                .column(ColumnDefinition::new("id", "bigint").not_null())
                .primary_key(PrimaryKey::new(Columns::parse("id"))),
        );
        let changes = detector().diff(&current, &target);
        let kinds: Vec<&str> = changes.iter().map(Operation::kind).collect();
        assert_eq!(kinds, vec!["drop primary key", "drop column", "add primary key"]);

        let mut replayed = current.clone();
        replayed.apply_all(&changes).unwrap();
        assert!(detector().diff(&replayed, &target).is_empty());
    }

    #[test]
    fn test_unique_changes_ignore_names() {
        let base = users("public", "users");
        let named = State::new().table(base.clone().unique(Unique::new(Columns::parse("email")).named("a")));
        let renamed = State::new().table(base.clone().unique(Unique::new(Columns::parse("email")).named("b")));
        let without = State::new().table(base);

        let d = detector();
        assert!(d.diff(&named, &renamed).is_empty());
        assert!(matches!(
            d.diff(&without, &named).operations()[0],
            Operation::AddUniqueConstraint { .. }
        ));
        assert!(matches!(
            d.diff(&named, &without).operations()[0],
            Operation::DropUniqueConstraint { .. }
        ));
    }

    #[test]
    fn test_renamed_column_carries_constraints() {
        let current = State::new().table(
            Table::new("public", "t")
                .column(ColumnDefinition::new("code", "text").not_null())
                .primary_key(PrimaryKey::new(Columns::parse("code"))),
        );
        let target = State::new().table(
            Table::new("public", "t")
                .column(ColumnDefinition::new("sku", "text").not_null())
                .primary_key(PrimaryKey::new(Columns::parse("sku"))),
        );
        let changes = detector().diff(&current, &target);
        let kinds: Vec<&str> = changes.iter().map(Operation::kind).collect();
        assert_eq!(kinds, vec!["rename column"]);
    }

    #[test]
    fn test_foreign_key_follows_table_rename() {
        let posts = Table::new("public", "posts")
            .column(ColumnDefinition::new("id", "bigint").not_null())
            .column(ColumnDefinition::new("author_id", "bigint"));
        let fk_to = |table: &str| {
            ForeignKey::new(
                ColumnReference::new("public", "posts", ["author_id"]),
                ColumnReference::new("public", table, ["id"]),
            )
        };
        let current = State::new()
            .table(users("public", "users"))
            .table(posts.clone())
            .foreign_key(fk_to("users"), "posts_author_id_fkey");
        let target = State::new()
            .table(users("public", "accounts"))
            .table(posts)
            .foreign_key(fk_to("accounts"), "");

        let changes = detector().diff(&current, &target);
        let kinds: Vec<&str> = changes.iter().map(Operation::kind).collect();
        assert_eq!(kinds, vec!["rename table"]);
    }

    #[test]
    fn test_foreign_key_dropped_with_referenced_table() {
        let posts = Table::new("public", "posts")
            .column(ColumnDefinition::new("id", "bigint").not_null())
            .column(ColumnDefinition::new("author_id", "bigint"));
        let fk = ForeignKey::new(
            ColumnReference::new("public", "posts", ["author_id"]),
            ColumnReference::new("public", "users", ["id"]),
        );
        let current = State::new()
            .table(users("public", "users"))
            .table(posts.clone())
            .foreign_key(fk.clone(), "posts_author_id_fkey");
        let target = State::new().table(posts);

        let changes = detector().diff(&current, &target);
        assert_eq!(
            changes.operations(),
            &[
                Operation::drop_foreign_key(fk, "posts_author_id_fkey"),
                Operation::drop_table(Fqn::new("public", "users")),
            ]
        );
    }

    #[test]
    fn test_foreign_key_of_dropped_table_not_repeated() {
        let posts = Table::new("public", "posts")
            .column(ColumnDefinition::new("id", "bigint").not_null())
            .column(ColumnDefinition::new("author_id", "bigint"));
        let fk = ForeignKey::new(
            ColumnReference::new("public", "posts", ["author_id"]),
            ColumnReference::new("public", "users", ["id"]),
        );
        let current = State::new()
            .table(users("public", "users"))
            .table(posts)
            .foreign_key(fk, "posts_author_id_fkey");
        let target = State::new().table(users("public", "users"));

        let changes = detector().diff(&current, &target);
        let kinds: Vec<&str> = changes.iter().map(Operation::kind).collect();
        assert_eq!(kinds, vec!["drop table"]);
    }

    #[test]
    fn test_foreign_key_between_dropped_tables() {
        let posts = Table::new("public", "posts")
            .column(ColumnDefinition::new("id", "bigint").not_null())
            .column(ColumnDefinition::new("author_id", "bigint"));
        let fk = ForeignKey::new(
            ColumnReference::new("public", "posts", ["author_id"]),
            ColumnReference::new("public", "users", ["id"]),
        );
        let current = State::new()
            .table(users("public", "users"))
            .table(posts)
            .foreign_key(fk.clone(), "posts_author_id_fkey");

        let changes = detector().diff(&current, &State::new());
        assert_eq!(changes.operations()[0], Operation::drop_foreign_key(fk, "posts_author_id_fkey"));
        assert_eq!(changes.len(), 3);

        let mut replayed = current.clone();
        replayed.apply_all(&changes).unwrap();
        assert!(replayed.tables.is_empty());
    }

    #[test]
    fn test_add_foreign_key() {
        let posts = Table::new("public", "posts")
            .column(ColumnDefinition::new("id", "bigint").not_null())
            .column(ColumnDefinition::new("author_id", "bigint"));
        let fk = ForeignKey::new(
            ColumnReference::new("public", "posts", ["author_id"]),
            ColumnReference::new("public", "users", ["id"]),
        );
        let current = State::new().table(users("public", "users")).table(posts.clone());
        let target = current.clone().foreign_key(fk.clone(), "");

        let changes = detector().diff(&current, &target);
        assert_eq!(changes.operations(), &[Operation::add_foreign_key(fk, "")]);
    }
}
