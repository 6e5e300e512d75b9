//! Schema inspection.
//!
//! An [`Inspector`] produces a [`State`]. Database-backed inspectors live
//! with the database drivers; this module defines the trait, the shared
//! configuration, and the [`ModelInspector`] that builds the target state
//! from a [`ModelRegistry`].

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::columns::{ColumnReference, Columns};
use crate::dialect::SchemaDialect;
use crate::error::{Result, SchemaError};
use crate::model::{resolve_table, ModelDefinition, ModelRegistry};
use crate::normalize::parse_sql_type;
use crate::schema::{ColumnDefinition, ForeignKey, Fqn, PrimaryKey, State, Table, Unique};

/// Produces a schema state.
pub trait Inspector {
    /// Error raised while inspecting.
    type Error: std::error::Error;

    /// Inspects the source and returns its schema.
    fn inspect(&self) -> impl Future<Output = std::result::Result<State, Self::Error>> + Send;
}

/// Settings shared by all inspectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// Schema to inspect and to place unqualified models in. `None` uses
    /// the dialect default.
    pub schema: Option<String>,
    /// Tables to ignore, as `table` or `schema.table`.
    pub exclude_tables: Vec<String>,
}

impl InspectorConfig {
    /// Creates a configuration using the dialect's default schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the schema.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Excludes a table.
    #[must_use]
    pub fn exclude(mut self, table: impl Into<String>) -> Self {
        self.exclude_tables.push(table.into());
        self
    }

    /// The schema to use with `dialect`.
    #[must_use]
    pub fn schema_for(&self, dialect: &dyn SchemaDialect) -> String {
        self.schema
            .clone()
            .unwrap_or_else(|| dialect.default_schema().to_string())
    }

    /// Returns true if `fqn` is excluded.
    #[must_use]
    pub fn is_excluded(&self, fqn: &Fqn) -> bool {
        self.exclude_tables
            .iter()
            .any(|t| *t == fqn.table || *t == fqn.to_string())
    }
}

/// Builds the target state from registered models.
#[derive(Clone, Copy)]
pub struct ModelInspector<'a> {
    registry: &'a ModelRegistry,
    dialect: &'a dyn SchemaDialect,
    config: &'a InspectorConfig,
}

impl<'a> ModelInspector<'a> {
    /// Creates an inspector over `registry`.
    #[must_use]
    pub fn new(
        registry: &'a ModelRegistry,
        dialect: &'a dyn SchemaDialect,
        config: &'a InspectorConfig,
    ) -> Self {
        Self {
            registry,
            dialect,
            config,
        }
    }

    /// Builds the state synchronously.
    ///
    /// # Errors
    ///
    /// Fails on malformed models: duplicate tables or fields, bad types,
    /// or relations over unknown or mismatched columns.
    pub fn build(&self) -> Result<State> {
        let schema = self.config.schema_for(self.dialect);
        let mut state = State::new();

        for model in self.registry.models() {
            let fqn = model.fqn(&schema)?;
            if self.config.is_excluded(&fqn) {
                debug!(table = %fqn, "Skipping excluded model");
                continue;
            }
            if state.tables.contains_key(&fqn) {
                return Err(SchemaError::invalid_model(
                    &model.name,
                    format!("table {fqn} is declared by more than one model"),
                ));
            }

            let table = self.table(model, &fqn)?;
            for relation in &model.relations {
                if relation.columns.is_empty() || relation.columns.len() != relation.references_columns.len() {
                    return Err(SchemaError::invalid_model(
                        &model.name,
                        format!("relation to {} pairs mismatched column lists", relation.references),
                    ));
                }
                if let Some(missing) = relation.columns.iter().find(|c| !table.has_column(c)) {
                    return Err(SchemaError::invalid_model(
                        &model.name,
                        format!("relation uses unknown column {missing}"),
                    ));
                }
                let fk = ForeignKey::new(
                    ColumnReference::on(fqn.clone(), Columns::new(&relation.columns)),
                    ColumnReference::on(
                        resolve_table(&relation.references, &schema),
                        Columns::new(&relation.references_columns),
                    ),
                );
                state
                    .foreign_keys
                    .insert(fk, relation.name.clone().unwrap_or_default());
            }
            state.add_table(table);
        }

        Ok(state)
    }

    fn table(&self, model: &ModelDefinition, fqn: &Fqn) -> Result<Table> {
        let mut table = Table::new(fqn.schema.clone(), fqn.table.clone());
        let mut pk_columns = Vec::new();
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();

        for field in &model.fields {
            if field.name.trim().is_empty() {
                return Err(SchemaError::invalid_model(&model.name, "field with empty name"));
            }
            if table.has_column(&field.name) {
                return Err(SchemaError::invalid_model(
                    &model.name,
                    format!("field {} declared twice", field.name),
                ));
            }

            let (sql_type, varchar_len) = parse_sql_type(&field.sql_type)?;
            let column = ColumnDefinition {
                name: field.name.clone(),
                sql_type,
                varchar_len,
                default_value: self
                    .dialect
                    .normalize_default(field.default.as_deref().unwrap_or_default()),
                is_nullable: field.nullable && !field.primary_key,
                is_auto_increment: field.auto_increment,
                is_identity: field.identity,
            };
            table.push_column(column);

            if field.primary_key {
                pk_columns.push(field.name.clone());
            }
            match field.unique.as_deref() {
                None => {}
                Some("") => {
                    table
                        .unique_constraints
                        .push(Unique::new(Columns::new([&field.name])));
                }
                Some(group) => match groups.iter_mut().find(|(name, _)| name == group) {
                    Some((_, columns)) => columns.push(field.name.clone()),
                    None => groups.push((group.to_string(), vec![field.name.clone()])),
                },
            }
        }

        if !pk_columns.is_empty() {
            table.primary_key = Some(PrimaryKey::new(Columns::new(pk_columns)));
        }
        for (name, columns) in groups {
            table
                .unique_constraints
                .push(Unique::new(Columns::new(columns)).named(name));
        }
        Ok(table)
    }
}

impl Inspector for ModelInspector<'_> {
    type Error = SchemaError;

    async fn inspect(&self) -> Result<State> {
        self.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::PostgresDialect;
    use crate::model::{FieldDescriptor, Relation};

    fn registry() -> ModelRegistry {
        ModelRegistry::from_models([
            ModelDefinition::new("users")
                .field(FieldDescriptor::new("id", "bigint").primary_key().auto_increment())
                .field(FieldDescriptor::new("email", "VARCHAR(255)").not_null().unique())
                .field(FieldDescriptor::new("org_id", "bigint").unique_group("users_org_handle"))
                .field(FieldDescriptor::new("handle", "text").unique_group("users_org_handle"))
                .field(FieldDescriptor::new("active", "boolean").default_value("TRUE")),
            ModelDefinition::new("posts")
                .field(FieldDescriptor::new("id", "bigint").primary_key())
                .field(FieldDescriptor::new("author_id", "bigint"))
                .relation(Relation::new(["author_id"], "users", ["id"])),
        ])
        .unwrap()
    }

    #[test]
    fn test_build_tables() {
        let registry = registry();
        let config = InspectorConfig::new();
        let state = ModelInspector::new(&registry, &PostgresDialect::new(), &config)
            .build()
            .unwrap();

        let users = state.get_table(&Fqn::new("public", "users")).unwrap();
        let id = users.get_column("id").unwrap();
        assert!(!id.is_nullable);
        assert!(id.is_auto_increment);
        let email = users.get_column("email").unwrap();
        assert_eq!(email.sql_type, "varchar");
        assert_eq!(email.varchar_len, 255);
        assert_eq!(users.get_column("active").unwrap().default_value, "true");
        assert_eq!(users.primary_key.as_ref().unwrap().columns.as_str(), "id");
        assert_eq!(users.unique_constraints.len(), 2);
        assert!(users
            .unique_constraints
            .iter()
            .any(|u| u.name.as_deref() == Some("users_org_handle")
                && u.columns.as_str() == "handle,org_id"));
    }

    #[test]
    fn test_build_foreign_keys() {
        let registry = registry();
        let config = InspectorConfig::new().with_schema("app");
        let state = ModelInspector::new(&registry, &PostgresDialect::new(), &config)
            .build()
            .unwrap();
        let (fk, name) = state.foreign_keys.iter().next().unwrap();
        assert_eq!(fk.from, ColumnReference::new("app", "posts", ["author_id"]));
        assert_eq!(fk.to, ColumnReference::new("app", "users", ["id"]));
        assert!(name.is_empty());
    }

    #[test]
    fn test_exclusion() {
        let registry = registry();
        let config = InspectorConfig::new().exclude("public.posts");
        let state = ModelInspector::new(&registry, &PostgresDialect::new(), &config)
            .build()
            .unwrap();
        assert_eq!(state.tables.len(), 1);
        assert!(state.foreign_keys.is_empty());
    }

    #[test]
    fn test_duplicate_table_after_resolution() {
        let registry = ModelRegistry::from_models([
            ModelDefinition::new("users"),
            ModelDefinition::new("public.users"),
        ])
        .unwrap();
        let config = InspectorConfig::new();
        let err = ModelInspector::new(&registry, &PostgresDialect::new(), &config)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidModel { .. }));
    }

    #[test]
    fn test_invalid_type() {
        let registry = ModelRegistry::from_models([ModelDefinition::new("t")
            .field(FieldDescriptor::new("name", "varchar(abc)"))])
        .unwrap();
        let config = InspectorConfig::new();
        let err = ModelInspector::new(&registry, &PostgresDialect::new(), &config)
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::InvalidType("varchar(abc)".to_string()));
    }

    #[test]
    fn test_relation_with_unknown_column() {
        let registry = ModelRegistry::from_models([ModelDefinition::new("posts")
            .field(FieldDescriptor::new("id", "bigint"))
            .relation(Relation::new(["writer_id"], "users", ["id"]))])
        .unwrap();
        let config = InspectorConfig::new();
        assert!(ModelInspector::new(&registry, &PostgresDialect::new(), &config)
            .build()
            .is_err());
    }

    #[tokio::test]
    async fn test_inspect_async() {
        let registry = registry();
        let config = InspectorConfig::new();
        let dialect = PostgresDialect::new();
        let inspector = ModelInspector::new(&registry, &dialect, &config);
        let state = inspector.inspect().await.unwrap();
        assert_eq!(state.tables.len(), 2);
    }
}
