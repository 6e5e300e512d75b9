//! PostgreSQL catalog reader.

use std::collections::BTreeMap;

use oxide_sqlschema::columns::{ColumnReference, Columns};
use oxide_sqlschema::dialect::PostgresDialect;
use oxide_sqlschema::inspector::{Inspector, InspectorConfig};
use oxide_sqlschema::schema::{ForeignKey, Fqn, PrimaryKey, State, Table, Unique};
use sqlx::postgres::PgPool;
use tracing::debug;

use crate::error::{MigrateError, Result};

const TABLES_SQL: &str = r"
SELECT table_name::text
FROM information_schema.tables
WHERE table_schema = $1 AND table_type = 'BASE TABLE'
ORDER BY table_name
";

const COLUMNS_SQL: &str = r"
SELECT table_name::text,
       column_name::text,
       data_type::text,
       udt_name::text,
       COALESCE(character_maximum_length, 0)::int4,
       COALESCE(numeric_precision, 0)::int4,
       COALESCE(numeric_scale, 0)::int4,
       COALESCE(datetime_precision, 6)::int4,
       is_nullable::text,
       column_default::text,
       is_identity::text
FROM information_schema.columns
WHERE table_schema = $1
ORDER BY table_name, ordinal_position
";

const KEYS_SQL: &str = r"
SELECT rel.relname::text,
       c.conname::text,
       c.contype::text,
       array_agg(a.attname::text ORDER BY array_position(c.conkey, a.attnum))
FROM pg_constraint c
JOIN pg_class rel ON rel.oid = c.conrelid
JOIN pg_namespace n ON n.oid = rel.relnamespace
JOIN pg_attribute a ON a.attrelid = c.conrelid AND a.attnum = ANY (c.conkey)
WHERE n.nspname = $1 AND c.contype IN ('p', 'u')
GROUP BY rel.relname, c.conname, c.contype
ORDER BY rel.relname, c.conname
";

const FOREIGN_KEYS_SQL: &str = r"
SELECT rel.relname::text,
       c.conname::text,
       fn.nspname::text,
       frel.relname::text,
       array_agg(a.attname::text ORDER BY k.ord),
       array_agg(fa.attname::text ORDER BY k.ord)
FROM pg_constraint c
JOIN pg_class rel ON rel.oid = c.conrelid
JOIN pg_namespace n ON n.oid = rel.relnamespace
JOIN pg_class frel ON frel.oid = c.confrelid
JOIN pg_namespace fn ON fn.oid = frel.relnamespace
CROSS JOIN LATERAL unnest(c.conkey, c.confkey) WITH ORDINALITY AS k(attnum, refnum, ord)
JOIN pg_attribute a ON a.attrelid = c.conrelid AND a.attnum = k.attnum
JOIN pg_attribute fa ON fa.attrelid = c.confrelid AND fa.attnum = k.refnum
WHERE n.nspname = $1 AND c.contype = 'f'
GROUP BY rel.relname, c.conname, fn.nspname, frel.relname
ORDER BY rel.relname, c.conname
";

type ColumnRow = (
    String,
    String,
    String,
    String,
    i32,
    i32,
    i32,
    i32,
    String,
    Option<String>,
    String,
);

/// Rebuilds a declared type from `information_schema.columns`.
///
/// `numeric` keeps its precision and scale. Time types keep a precision
/// other than the default of 6, which PostgreSQL reports even when none
/// was declared.
fn declared_type(
    data_type: String,
    udt_name: String,
    length: i32,
    (precision, scale): (i32, i32),
    time_precision: i32,
) -> String {
    match data_type.as_str() {
        // Arrays and enums report only their category in data_type.
        "USER-DEFINED" | "ARRAY" => udt_name,
        "numeric" if precision > 0 => format!("numeric({precision},{scale})"),
        "timestamp without time zone"
        | "timestamp with time zone"
        | "time without time zone"
        | "time with time zone"
            if time_precision != 6 =>
        {
            format!("{data_type}({time_precision})")
        }
        _ if length > 0 => format!("{data_type}({length})"),
        _ => data_type,
    }
}

/// Reads tables, keys and constraints from `information_schema` and
/// `pg_catalog`.
///
/// Columns whose default calls `nextval(...)` are reported as
/// auto-increment with no default; `GENERATED ... AS IDENTITY` columns
/// as identity. Foreign keys may point into other schemas.
#[derive(Debug, Clone, Copy)]
pub struct PostgresInspector<'a> {
    pool: &'a PgPool,
    config: &'a InspectorConfig,
    dialect: PostgresDialect,
}

impl<'a> PostgresInspector<'a> {
    /// Creates an inspector over `pool`.
    #[must_use]
    pub const fn new(pool: &'a PgPool, config: &'a InspectorConfig) -> Self {
        Self {
            pool,
            config,
            dialect: PostgresDialect::new(),
        }
    }

    async fn tables(&self, schema: &str) -> Result<BTreeMap<String, Table>> {
        let names: Vec<(String,)> = sqlx::query_as(TABLES_SQL)
            .bind(schema)
            .fetch_all(self.pool)
            .await?;
        let mut tables: BTreeMap<String, Table> = names
            .into_iter()
            .map(|(name,)| (name.clone(), Table::new(schema, name)))
            .collect();

        let rows: Vec<ColumnRow> = sqlx::query_as(COLUMNS_SQL)
            .bind(schema)
            .fetch_all(self.pool)
            .await?;
        for (
            table,
            name,
            data_type,
            udt_name,
            length,
            precision,
            scale,
            time_precision,
            nullable,
            default,
            identity,
        ) in rows
        {
            let Some(target) = tables.get_mut(&table) else {
                continue;
            };
            let declared = declared_type(
                data_type,
                udt_name,
                length,
                (precision, scale),
                time_precision,
            );
            let serial = default
                .as_deref()
                .is_some_and(|d| d.trim_start().starts_with("nextval("));
            let default = if serial { None } else { default };

            let mut column = super::column(
                &self.dialect,
                &name,
                &declared,
                nullable == "YES",
                default.as_deref(),
            )?;
            column.is_auto_increment = serial;
            column.is_identity = identity == "YES";
            target.push_column(column);
        }

        let keys: Vec<(String, String, String, Vec<String>)> = sqlx::query_as(KEYS_SQL)
            .bind(schema)
            .fetch_all(self.pool)
            .await?;
        for (table, name, kind, columns) in keys {
            let Some(target) = tables.get_mut(&table) else {
                continue;
            };
            let columns = Columns::new(columns);
            if kind == "p" {
                target.primary_key = Some(PrimaryKey::new(columns).named(name));
            } else {
                target.unique_constraints.push(Unique::new(columns).named(name));
            }
        }

        Ok(tables)
    }

    async fn foreign_keys(&self, schema: &str) -> Result<Vec<(ForeignKey, String)>> {
        let rows: Vec<(String, String, String, String, Vec<String>, Vec<String>)> =
            sqlx::query_as(FOREIGN_KEYS_SQL)
                .bind(schema)
                .fetch_all(self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(table, name, ref_schema, ref_table, from, to)| {
                let fk = ForeignKey::new(
                    ColumnReference::on(Fqn::new(schema, table), Columns::new(from)),
                    ColumnReference::on(Fqn::new(ref_schema, ref_table), Columns::new(to)),
                );
                (fk, name)
            })
            .collect())
    }
}

impl Inspector for PostgresInspector<'_> {
    type Error = MigrateError;

    async fn inspect(&self) -> Result<State> {
        let schema = self.config.schema_for(&self.dialect);
        let mut state = State::new();

        for table in self.tables(&schema).await?.into_values() {
            if self.config.is_excluded(&table.fqn()) {
                debug!(table = %table.fqn(), "Skipping excluded table");
                continue;
            }
            state.add_table(table);
        }
        for (fk, name) in self.foreign_keys(&schema).await? {
            if self.config.is_excluded(&fk.from.fqn) {
                continue;
            }
            state.foreign_keys.insert(fk, name);
        }

        debug!(schema = %schema, tables = state.tables.len(), "Inspected PostgreSQL schema");
        Ok(state)
    }
}
