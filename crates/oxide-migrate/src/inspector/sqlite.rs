//! SQLite catalog reader.

use oxide_sqlschema::columns::{ColumnReference, Columns};
use oxide_sqlschema::dialect::{SchemaDialect, SqliteDialect};
use oxide_sqlschema::inspector::{Inspector, InspectorConfig};
use oxide_sqlschema::schema::{ForeignKey, Fqn, PrimaryKey, State, Table, Unique};
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use crate::error::Result;

/// Reads tables, keys and indexes from `sqlite_master` and the table
/// pragmas.
///
/// SQLite has no constraint names for primary and foreign keys, so those
/// come back unnamed. Unique constraints declared inline are backed by
/// `sqlite_autoindex_*` indexes and come back unnamed as well.
#[derive(Debug, Clone, Copy)]
pub struct SqliteInspector<'a> {
    pool: &'a SqlitePool,
    config: &'a InspectorConfig,
    dialect: SqliteDialect,
}

/// One row of `pragma_foreign_key_list`.
struct ForeignKeyRow {
    id: i64,
    table: String,
    from: String,
    to: Option<String>,
}

impl<'a> SqliteInspector<'a> {
    /// Creates an inspector over `pool`.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, config: &'a InspectorConfig) -> Self {
        Self {
            pool,
            config,
            dialect: SqliteDialect::new(),
        }
    }

    async fn table_names(&self, schema: &str) -> Result<Vec<(String, Option<String>)>> {
        let sql = format!(
            r"SELECT name, sql FROM {}.sqlite_master
              WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
              ORDER BY name",
            self.dialect.quote_identifier(schema)
        );
        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as(&sql).fetch_all(self.pool).await?;
        Ok(rows)
    }

    async fn table(&self, fqn: &Fqn, create_sql: &str) -> Result<Table> {
        let rows: Vec<(String, String, i64, Option<String>, i64)> = sqlx::query_as(
            r#"SELECT name, type, "notnull", dflt_value, pk
               FROM pragma_table_info(?1, ?2) ORDER BY cid"#,
        )
        .bind(&fqn.table)
        .bind(&fqn.schema)
        .fetch_all(self.pool)
        .await?;

        let mut table = Table::new(fqn.schema.clone(), fqn.table.clone());
        let mut pk_columns: Vec<(i64, String)> = Vec::new();
        for (name, declared, not_null, default, pk) in rows {
            // Columns declared without a type have BLOB affinity.
            let declared = if declared.trim().is_empty() {
                "blob".to_string()
            } else {
                declared
            };
            let nullable = not_null == 0 && pk == 0;
            let column = super::column(&self.dialect, &name, &declared, nullable, default.as_deref())?;
            table.push_column(column);
            if pk > 0 {
                pk_columns.push((pk, name));
            }
        }

        pk_columns.sort();
        if !pk_columns.is_empty() {
            let autoincrement =
                pk_columns.len() == 1 && create_sql.to_ascii_uppercase().contains("AUTOINCREMENT");
            if autoincrement {
                let name = &pk_columns[0].1;
                if let Some(column) = table.columns.iter_mut().find(|c| c.name == *name) {
                    column.is_auto_increment = true;
                }
            }
            table.primary_key = Some(PrimaryKey::new(Columns::new(
                pk_columns.iter().map(|(_, name)| name),
            )));
        }

        table.unique_constraints = self.unique_constraints(fqn).await?;
        Ok(table)
    }

    async fn unique_constraints(&self, fqn: &Fqn) -> Result<Vec<Unique>> {
        let indexes: Vec<(String, i64, String, i64)> = sqlx::query_as(
            r#"SELECT name, "unique", origin, partial
               FROM pragma_index_list(?1, ?2) ORDER BY name"#,
        )
        .bind(&fqn.table)
        .bind(&fqn.schema)
        .fetch_all(self.pool)
        .await?;

        let mut uniques = Vec::new();
        for (name, unique, origin, partial) in indexes {
            if unique == 0 || partial != 0 || !(origin == "u" || origin == "c") {
                continue;
            }
            let columns: Vec<(Option<String>,)> = sqlx::query_as(
                "SELECT name FROM pragma_index_info(?1, ?2) ORDER BY seqno",
            )
            .bind(&name)
            .bind(&fqn.schema)
            .fetch_all(self.pool)
            .await?;
            // Expression indexes report NULL column names.
            let Some(columns) = columns
                .into_iter()
                .map(|(c,)| c)
                .collect::<Option<Vec<String>>>()
            else {
                debug!(index = %name, "Skipping expression index");
                continue;
            };

            let unique = Unique::new(Columns::new(columns));
            if name.starts_with("sqlite_autoindex_") {
                uniques.push(unique);
            } else {
                uniques.push(unique.named(name));
            }
        }
        Ok(uniques)
    }

    async fn foreign_keys(&self, fqn: &Fqn) -> Result<Vec<ForeignKey>> {
        let rows: Vec<(i64, String, String, Option<String>)> = sqlx::query_as(
            r#"SELECT id, "table", "from", "to"
               FROM pragma_foreign_key_list(?1, ?2) ORDER BY id, seq"#,
        )
        .bind(&fqn.table)
        .bind(&fqn.schema)
        .fetch_all(self.pool)
        .await?;
        let rows: Vec<ForeignKeyRow> = rows
            .into_iter()
            .map(|(id, table, from, to)| ForeignKeyRow {
                id,
                table,
                from,
                to,
            })
            .collect();

        let mut keys = Vec::new();
        let mut start = 0;
        while start < rows.len() {
            let id = rows[start].id;
            let end = rows[start..]
                .iter()
                .position(|r| r.id != id)
                .map_or(rows.len(), |offset| start + offset);
            let group = &rows[start..end];
            start = end;

            let target = fqn.with_table(group[0].table.clone());
            let to_columns = if group.iter().all(|r| r.to.is_some()) {
                Columns::new(group.iter().filter_map(|r| r.to.as_deref()))
            } else {
                // No target columns means the referenced primary key.
                self.primary_key_columns(&target).await?
            };
            keys.push(ForeignKey::new(
                ColumnReference::on(fqn.clone(), Columns::new(group.iter().map(|r| &r.from))),
                ColumnReference::on(target, to_columns),
            ));
        }
        Ok(keys)
    }

    async fn primary_key_columns(&self, fqn: &Fqn) -> Result<Columns> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM pragma_table_info(?1, ?2) WHERE pk > 0 ORDER BY pk",
        )
        .bind(&fqn.table)
        .bind(&fqn.schema)
        .fetch_all(self.pool)
        .await?;
        Ok(Columns::new(rows.into_iter().map(|(name,)| name)))
    }
}

impl Inspector for SqliteInspector<'_> {
    type Error = crate::error::MigrateError;

    async fn inspect(&self) -> Result<State> {
        let schema = self.config.schema_for(&self.dialect);
        let mut state = State::new();

        for (name, create_sql) in self.table_names(&schema).await? {
            let fqn = Fqn::new(schema.clone(), name);
            if self.config.is_excluded(&fqn) {
                debug!(table = %fqn, "Skipping excluded table");
                continue;
            }
            let table = self
                .table(&fqn, create_sql.as_deref().unwrap_or_default())
                .await?;
            for fk in self.foreign_keys(&fqn).await? {
                state.foreign_keys.insert(fk, String::new());
            }
            state.add_table(table);
        }

        debug!(tables = state.tables.len(), "Inspected SQLite schema");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    async fn run(pool: &SqlitePool, sql: &str) {
        sqlx::query(sql).execute(pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_inspect_columns_and_keys() {
        let pool = create_test_pool().await;
        run(
            &pool,
            "CREATE TABLE authors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL,
                bio TEXT DEFAULT ('none'),
                UNIQUE (name)
            )",
        )
        .await;

        let config = InspectorConfig::new();
        let state = SqliteInspector::new(&pool, &config).inspect().await.unwrap();
        let authors = state.get_table(&Fqn::new("main", "authors")).unwrap();

        let id = authors.get_column("id").unwrap();
        assert_eq!(id.sql_type, "integer");
        assert!(id.is_auto_increment);
        assert!(!id.is_nullable);

        let name = authors.get_column("name").unwrap();
        assert_eq!(name.sql_type, "varchar");
        assert_eq!(name.varchar_len, 100);
        assert!(!name.is_nullable);

        let bio = authors.get_column("bio").unwrap();
        assert_eq!(bio.default_value, "'none'");
        assert!(bio.is_nullable);

        assert_eq!(
            authors.primary_key.as_ref().unwrap().columns.as_str(),
            "id"
        );
        assert_eq!(authors.unique_constraints.len(), 1);
        assert_eq!(authors.unique_constraints[0].columns.as_str(), "name");
        assert!(authors.unique_constraints[0].name.is_none());
    }

    #[tokio::test]
    async fn test_inspect_foreign_keys() {
        let pool = create_test_pool().await;
        run(&pool, "CREATE TABLE users (id INTEGER PRIMARY KEY)").await;
        run(
            &pool,
            "CREATE TABLE posts (
                id INTEGER PRIMARY KEY,
                author_id INTEGER REFERENCES users,
                editor_id INTEGER REFERENCES users (id)
            )",
        )
        .await;

        let config = InspectorConfig::new();
        let state = SqliteInspector::new(&pool, &config).inspect().await.unwrap();
        let keys: Vec<String> = state.foreign_keys.keys().map(ToString::to_string).collect();
        assert_eq!(
            keys,
            vec![
                "main.posts (author_id) references main.users (id)".to_string(),
                "main.posts (editor_id) references main.users (id)".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_inspect_named_unique_index() {
        let pool = create_test_pool().await;
        run(&pool, "CREATE TABLE tags (a TEXT, b TEXT, c TEXT)").await;
        run(&pool, "CREATE UNIQUE INDEX tags_b_a_key ON tags (b, a)").await;
        run(&pool, "CREATE INDEX tags_c_idx ON tags (c)").await;

        let config = InspectorConfig::new();
        let state = SqliteInspector::new(&pool, &config).inspect().await.unwrap();
        let tags = state.get_table(&Fqn::new("main", "tags")).unwrap();
        assert_eq!(tags.unique_constraints.len(), 1);
        let unique = &tags.unique_constraints[0];
        assert_eq!(unique.name.as_deref(), Some("tags_b_a_key"));
        assert_eq!(unique.columns.as_str(), "a,b");
        assert!(tags.primary_key.is_none());
    }

    #[tokio::test]
    async fn test_excluded_tables_are_skipped() {
        let pool = create_test_pool().await;
        run(&pool, "CREATE TABLE kept (x INTEGER)").await;
        run(&pool, "CREATE TABLE skipped (x INTEGER)").await;

        let config = InspectorConfig::new().exclude("skipped");
        let state = SqliteInspector::new(&pool, &config).inspect().await.unwrap();
        let names: Vec<&str> = state.tables.keys().map(|f| f.table.as_str()).collect();
        assert_eq!(names, vec!["kept"]);
    }
}
