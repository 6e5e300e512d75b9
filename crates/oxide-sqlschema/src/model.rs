//! Model definitions.
//!
//! A model describes one table the application expects: its fields and
//! the relations it declares to other tables. Models are collected in a
//! [`ModelRegistry`], which is passed explicitly to whatever needs it.
//!
//! Registries can be loaded from JSON:
//!
//! ```json
//! [
//!   {
//!     "name": "users",
//!     "fields": [
//!       { "name": "id", "type": "bigint", "primary_key": true, "auto_increment": true },
//!       { "name": "email", "type": "varchar(255)", "nullable": false, "unique": "" }
//!     ]
//!   }
//! ]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::schema::Fqn;

/// Prefix marking a schema as a placeholder for the configured schema.
pub const SCHEMA_PLACEHOLDER: &str = "?";

const fn default_nullable() -> bool {
    true
}

/// A single field of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Column name.
    pub name: String,
    /// Declared SQL type, e.g. `varchar(255)`.
    #[serde(rename = "type")]
    pub sql_type: String,
    /// Whether NULL is allowed. Ignored for primary key fields.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Default expression.
    #[serde(default)]
    pub default: Option<String>,
    /// Part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Values come from a sequence.
    #[serde(default)]
    pub auto_increment: bool,
    /// Identity column.
    #[serde(default)]
    pub identity: bool,
    /// Unique tag: empty for a single-column constraint, or a group name
    /// shared by the fields of one composite constraint.
    #[serde(default)]
    pub unique: Option<String>,
}

impl FieldDescriptor {
    /// Creates a nullable field.
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            default: None,
            primary_key: false,
            auto_increment: false,
            identity: false,
            unique: None,
        }
    }

    /// Marks the field NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default expression.
    #[must_use]
    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Marks the field as (part of) the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the field auto-incrementing.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Marks the field as an identity column.
    #[must_use]
    pub const fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// Adds a single-column unique constraint.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = Some(String::new());
        self
    }

    /// Adds the field to the named composite unique constraint.
    #[must_use]
    pub fn unique_group(mut self, group: impl Into<String>) -> Self {
        self.unique = Some(group.into());
        self
    }
}

/// A relation declared by a model: a foreign key to another table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Constraint name, if the model pins one.
    #[serde(default)]
    pub name: Option<String>,
    /// Referencing columns on this model.
    pub columns: Vec<String>,
    /// Referenced table, optionally `schema.table`.
    pub references: String,
    /// Referenced columns, paired by position with `columns`.
    pub references_columns: Vec<String>,
}

impl Relation {
    /// Creates a relation from `columns` to `references(references_columns)`.
    pub fn new<I, J, S, T>(columns: I, references: impl Into<String>, references_columns: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            references: references.into(),
            references_columns: references_columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Pins the constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A model: one table the application expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Table name, optionally `schema.table`.
    pub name: String,
    /// Explicit schema. Overrides any schema in `name`.
    #[serde(default)]
    pub schema: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Foreign keys declared by this model.
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl ModelDefinition {
    /// Creates a model with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Sets an explicit schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a relation.
    #[must_use]
    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Resolves the table name against `default_schema`.
    ///
    /// # Errors
    ///
    /// Fails if the table name is empty.
    pub fn fqn(&self, default_schema: &str) -> Result<Fqn, SchemaError> {
        let fqn = resolve_table(&self.name, default_schema);
        let fqn = match &self.schema {
            Some(schema) => Fqn::new(resolve_schema(schema, default_schema), fqn.table),
            None => fqn,
        };
        if fqn.table.is_empty() {
            return Err(SchemaError::invalid_model(&self.name, "table name is empty"));
        }
        Ok(fqn)
    }
}

fn resolve_schema(schema: &str, default_schema: &str) -> String {
    if schema.is_empty() || schema.starts_with(SCHEMA_PLACEHOLDER) {
        default_schema.to_string()
    } else {
        schema.to_string()
    }
}

/// Splits `schema.table`; bare names get `default_schema`.
#[must_use]
pub fn resolve_table(name: &str, default_schema: &str) -> Fqn {
    match name.trim().split_once('.') {
        Some((schema, table)) => Fqn::new(resolve_schema(schema, default_schema), table),
        None => Fqn::new(default_schema, name.trim()),
    }
}

/// The set of models an application declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ModelDefinition>", into = "Vec<ModelDefinition>")]
pub struct ModelRegistry {
    models: Vec<ModelDefinition>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry, rejecting duplicate model names.
    ///
    /// # Errors
    ///
    /// Fails on the first model whose name and schema repeat an earlier one.
    pub fn from_models(models: impl IntoIterator<Item = ModelDefinition>) -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        for model in models {
            registry.register(model)?;
        }
        Ok(registry)
    }

    /// Registers a model.
    ///
    /// # Errors
    ///
    /// Fails if a model with the same name and schema is already registered.
    pub fn register(&mut self, model: ModelDefinition) -> Result<(), SchemaError> {
        let key = model.fqn(SCHEMA_PLACEHOLDER)?;
        let duplicate = self
            .models
            .iter()
            .any(|m| m.fqn(SCHEMA_PLACEHOLDER).is_ok_and(|fqn| fqn == key));
        if duplicate {
            return Err(SchemaError::invalid_model(&model.name, "registered twice"));
        }
        self.models.push(model);
        Ok(())
    }

    /// Registered models in registration order.
    #[must_use]
    pub fn models(&self) -> &[ModelDefinition] {
        &self.models
    }

    /// Number of models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns true if no model is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl TryFrom<Vec<ModelDefinition>> for ModelRegistry {
    type Error = SchemaError;

    fn try_from(models: Vec<ModelDefinition>) -> Result<Self, Self::Error> {
        Self::from_models(models)
    }
}

impl From<ModelRegistry> for Vec<ModelDefinition> {
    fn from(registry: ModelRegistry) -> Self {
        registry.models
    }
}
