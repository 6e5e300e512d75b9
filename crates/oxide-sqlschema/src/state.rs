//! Replaying operations onto a state.
//!
//! Applying a changeset to the state it was computed from must yield a
//! state with no remaining differences to the target. Replay checks each
//! operation against the state the way a database would, so a changeset
//! in the wrong order fails here instead of half-way through a migration.

use crate::changeset::Changeset;
use crate::columns::ColumnReference;
use crate::error::{Result, SchemaError};
use crate::operations::Operation;
use crate::refmap::RefMap;
use crate::schema::{Fqn, State, Table};

fn invalid(message: String) -> SchemaError {
    SchemaError::InvalidState(message)
}

impl State {
    fn table_mut(&mut self, fqn: &Fqn) -> Result<&mut Table> {
        self.tables
            .get_mut(fqn)
            .ok_or_else(|| invalid(format!("table {fqn} does not exist")))
    }

    fn rewrite_foreign_keys(&mut self, update: impl FnOnce(&mut RefMap)) {
        let mut refs = RefMap::new(std::mem::take(&mut self.foreign_keys));
        update(&mut refs);
        self.foreign_keys = refs.live();
    }

    /// Applies every operation of `changeset` in order.
    ///
    /// # Errors
    ///
    /// Stops at the first operation that does not fit the state.
    pub fn apply_all(&mut self, changeset: &Changeset) -> Result<()> {
        for op in changeset {
            self.apply(op)?;
        }
        Ok(())
    }

    /// Applies a single operation.
    ///
    /// # Errors
    ///
    /// Fails when the operation refers to missing tables, columns or
    /// constraints, or would create one that already exists.
    pub fn apply(&mut self, operation: &Operation) -> Result<()> {
        match operation {
            Operation::CreateTable { table } => {
                let fqn = table.fqn();
                if self.tables.contains_key(&fqn) {
                    return Err(invalid(format!("table {fqn} already exists")));
                }
                self.tables.insert(fqn, table.clone());
            }

            Operation::DropTable { fqn } => {
                if self
                    .foreign_keys
                    .keys()
                    .any(|fk| fk.to.fqn == *fqn && fk.from.fqn != *fqn)
                {
                    return Err(invalid(format!("table {fqn} is still referenced")));
                }
                if self.tables.remove(fqn).is_none() {
                    return Err(invalid(format!("table {fqn} does not exist")));
                }
                self.foreign_keys.retain(|fk, _| fk.from.fqn != *fqn);
            }

            Operation::RenameTable { fqn, new_name } => {
                let target = fqn.with_table(new_name.clone());
                if self.tables.contains_key(&target) {
                    return Err(invalid(format!("table {target} already exists")));
                }
                let mut table = self
                    .tables
                    .remove(fqn)
                    .ok_or_else(|| invalid(format!("table {fqn} does not exist")))?;
                table.name.clone_from(new_name);
                self.tables.insert(target.clone(), table);
                self.rewrite_foreign_keys(|refs| {
                    refs.update_table(fqn, &target);
                });
            }

            Operation::AddColumn { fqn, column } => {
                let table = self.table_mut(fqn)?;
                if table.has_column(&column.name) {
                    return Err(invalid(format!("column {fqn}.{} already exists", column.name)));
                }
                table.columns.push(column.clone());
            }

            Operation::DropColumn { fqn, column } => {
                if self
                    .foreign_keys
                    .keys()
                    .any(|fk| fk.depends_on_column(fqn, &column.name))
                {
                    return Err(invalid(format!(
                        "column {fqn}.{} is used by a foreign key",
                        column.name
                    )));
                }
                let table = self.table_mut(fqn)?;
                let before = table.columns.len();
                table.columns.retain(|c| c.name != column.name);
                if table.columns.len() == before {
                    return Err(invalid(format!("column {fqn}.{} does not exist", column.name)));
                }
                table
                    .unique_constraints
                    .retain(|u| !u.columns.contains(&column.name));
                if table
                    .primary_key
                    .as_ref()
                    .is_some_and(|pk| pk.columns.contains(&column.name))
                {
                    table.primary_key = None;
                }
            }

            Operation::RenameColumn {
                fqn,
                old_name,
                new_name,
            } => {
                let table = self.table_mut(fqn)?;
                if table.has_column(new_name) {
                    return Err(invalid(format!("column {fqn}.{new_name} already exists")));
                }
                let column = table
                    .columns
                    .iter_mut()
                    .find(|c| c.name == *old_name)
                    .ok_or_else(|| invalid(format!("column {fqn}.{old_name} does not exist")))?;
                column.name.clone_from(new_name);
                if let Some(pk) = table.primary_key.as_mut() {
                    pk.columns.replace(old_name, new_name);
                    pk.columns = pk.columns.to_sorted();
                }
                for unique in &mut table.unique_constraints {
                    unique.columns.replace(old_name, new_name);
                    unique.columns = unique.columns.to_sorted();
                }
                let reference = ColumnReference::new(&fqn.schema, &fqn.table, [old_name]);
                self.rewrite_foreign_keys(|refs| {
                    refs.update_column(&reference, new_name);
                });
            }

            Operation::ChangeColumnType { fqn, from, to } => {
                let table = self.table_mut(fqn)?;
                let column = table
                    .columns
                    .iter_mut()
                    .find(|c| c.name == from.name)
                    .ok_or_else(|| invalid(format!("column {fqn}.{} does not exist", from.name)))?;
                *column = to.clone();
            }

            Operation::AddPrimaryKey { fqn, primary_key } => {
                let table = self.table_mut(fqn)?;
                if table.primary_key.is_some() {
                    return Err(invalid(format!("table {fqn} already has a primary key")));
                }
                table.primary_key = Some(primary_key.clone());
            }

            Operation::DropPrimaryKey { fqn, .. } => {
                let table = self.table_mut(fqn)?;
                if table.primary_key.take().is_none() {
                    return Err(invalid(format!("table {fqn} has no primary key")));
                }
            }

            Operation::ChangePrimaryKey { fqn, new, .. } => {
                let table = self.table_mut(fqn)?;
                if table.primary_key.is_none() {
                    return Err(invalid(format!("table {fqn} has no primary key")));
                }
                table.primary_key = Some(new.clone());
            }

            Operation::AddUniqueConstraint { fqn, unique } => {
                let table = self.table_mut(fqn)?;
                if table.unique_constraints.iter().any(|u| u.equals(unique)) {
                    return Err(invalid(format!(
                        "unique ({}) already exists on {fqn}",
                        unique.columns
                    )));
                }
                table.unique_constraints.push(unique.clone());
            }

            Operation::DropUniqueConstraint { fqn, unique } => {
                let table = self.table_mut(fqn)?;
                let before = table.unique_constraints.len();
                table.unique_constraints.retain(|u| !u.equals(unique));
                if table.unique_constraints.len() == before {
                    return Err(invalid(format!(
                        "unique ({}) does not exist on {fqn}",
                        unique.columns
                    )));
                }
            }

            Operation::AddForeignKey { foreign_key, name } => {
                for side in [&foreign_key.from, &foreign_key.to] {
                    let table = self
                        .tables
                        .get(&side.fqn)
                        .ok_or_else(|| invalid(format!("table {} does not exist", side.fqn)))?;
                    if let Some(missing) = side.columns.iter().find(|c| !table.has_column(c)) {
                        return Err(invalid(format!("column {}.{missing} does not exist", side.fqn)));
                    }
                }
                if self
                    .foreign_keys
                    .insert(foreign_key.clone(), name.clone())
                    .is_some()
                {
                    return Err(invalid(format!("foreign key {foreign_key} already exists")));
                }
            }

            Operation::DropForeignKey { foreign_key, .. } => {
                if self.foreign_keys.remove(foreign_key).is_none() {
                    return Err(invalid(format!("foreign key {foreign_key} does not exist")));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::Columns;
    use crate::schema::{ColumnDefinition, ForeignKey, PrimaryKey};

    fn state() -> State {
        State::new()
            .table(
                Table::new("public", "users")
                    .column(ColumnDefinition::new("id", "bigint").not_null())
                    .primary_key(PrimaryKey::new(Columns::parse("id"))),
            )
            .table(
                Table::new("public", "posts")
                    .column(ColumnDefinition::new("id", "bigint").not_null())
                    .column(ColumnDefinition::new("author_id", "bigint")),
            )
            .foreign_key(
                ForeignKey::new(
                    ColumnReference::new("public", "posts", ["author_id"]),
                    ColumnReference::new("public", "users", ["id"]),
                ),
                "posts_author_id_fkey",
            )
    }

    #[test]
    fn test_rename_table_moves_foreign_keys() {
        let mut s = state();
        s.apply(&Operation::rename_table(Fqn::new("public", "users"), "people"))
            .unwrap();
        assert!(s.get_table(&Fqn::new("public", "people")).is_some());
        let (fk, name) = s.foreign_keys.iter().next().unwrap();
        assert_eq!(fk.to.fqn, Fqn::new("public", "people"));
        assert_eq!(name, "posts_author_id_fkey");
    }

    #[test]
    fn test_drop_referenced_table_fails() {
        let mut s = state();
        let err = s
            .apply(&Operation::drop_table(Fqn::new("public", "users")))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidState(_)));
    }

    #[test]
    fn test_drop_referencing_table_removes_keys() {
        let mut s = state();
        s.apply(&Operation::drop_table(Fqn::new("public", "posts")))
            .unwrap();
        assert!(s.foreign_keys.is_empty());
    }

    #[test]
    fn test_rename_column_updates_keys() {
        let mut s = state();
        s.apply(&Operation::rename_column(Fqn::new("public", "users"), "id", "user_id"))
            .unwrap();
        let users = s.get_table(&Fqn::new("public", "users")).unwrap();
        assert_eq!(users.primary_key.as_ref().unwrap().columns.as_str(), "user_id");
        let fk = s.foreign_keys.keys().next().unwrap();
        assert_eq!(fk.to.columns.as_str(), "user_id");
    }

    #[test]
    fn test_add_existing_column_fails() {
        let mut s = state();
        let result = s.apply(&Operation::add_column(
            Fqn::new("public", "users"),
            ColumnDefinition::new("id", "bigint"),
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_drop_column_used_by_key_fails() {
        let mut s = state();
        let result = s.apply(&Operation::drop_column(
            Fqn::new("public", "posts"),
            ColumnDefinition::new("author_id", "bigint"),
        ));
        assert!(result.is_err());
    }
}
