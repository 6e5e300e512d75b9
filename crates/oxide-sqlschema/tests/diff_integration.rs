//! Integration tests for change detection.
//!
//! These tests build current and target states, diff them, and check the
//! resulting changesets by their canonical text, by replaying them onto
//! the current state, and by rendering them through a dialect.

use oxide_sqlschema::prelude::*;
use oxide_sqlschema::signature::Signature;

fn varchar(name: &str, len: u32) -> ColumnDefinition {
    ColumnDefinition::new(name, "varchar").varchar_len(len).not_null()
}

fn lines(changes: &Changeset) -> Vec<String> {
    changes.iter().map(ToString::to_string).collect()
}

/// Diffs, replays the changeset onto `current` and checks nothing is left.
fn assert_converges(detector: &Detector<'_>, current: &State, target: &State) -> Changeset {
    let changes = detector.diff(current, target);
    let mut replayed = current.clone();
    replayed.apply_all(&changes).unwrap();
    let rest = detector.diff(&replayed, target);
    assert!(rest.is_empty(), "left over after replay:\n{rest}");
    changes
}

// =============================================================================
// Library schema: journals, reviews, authors
// =============================================================================

fn journals(name: &str) -> Table {
    Table::new("public", name)
        .column(varchar("isbn", 13))
        .column(varchar("title", 200))
        .column(ColumnDefinition::new("page_count", "integer").default_value("0"))
        .primary_key(PrimaryKey::new(Columns::parse("isbn")))
}

fn authors() -> Table {
    Table::new("public", "authors")
        .column(ColumnDefinition::new("id", "bigint").not_null().auto_increment())
        .column(varchar("name", 100))
        .primary_key(PrimaryKey::new(Columns::parse("id")))
}

fn reviews() -> Table {
    Table::new("public", "reviews")
        .column(ColumnDefinition::new("id", "bigint").not_null())
        .column(ColumnDefinition::new("body", "text"))
        .column(ColumnDefinition::new("score", "integer").not_null().default_value("0"))
}

fn reader() -> Table {
    Table::new("public", "reader")
        .column(ColumnDefinition::new("id", "bigint").not_null())
        .column(varchar("email", 255))
}

#[test]
fn test_library_rename_create_drop() {
    let current = State::new()
        .table(journals("journals"))
        .table(reviews())
        .table(authors());
    let target = State::new()
        .table(journals("journals_renamed"))
        .table(reader())
        .table(authors());

    let changes = assert_converges(&Detector::new(), &current, &target);
    assert_eq!(
        lines(&changes),
        vec![
            "rename table public.journals to journals_renamed".to_string(),
            "create table public.reader (id bigint not null, email varchar(255) not null)"
                .to_string(),
            "drop table public.reviews".to_string(),
        ]
    );
}

#[test]
fn test_renamed_table_with_swapped_column_types() {
    let current = State::new().table(
        Table::new("public", "t1")
            .column(ColumnDefinition::new("a", "integer"))
            .column(ColumnDefinition::new("b", "text")),
    );
    let target = State::new().table(
        Table::new("public", "t2")
            .column(ColumnDefinition::new("a", "text"))
            .column(ColumnDefinition::new("b", "integer")),
    );

    let changes = assert_converges(&Detector::new(), &current, &target);
    let kinds: Vec<_> = changes.iter().map(Operation::kind).collect();
    assert_eq!(kinds, vec!["rename table", "change column", "change column"]);
    assert_eq!(lines(&changes)[0], "rename table public.t1 to t2");
}

#[test]
fn test_changeset_text_is_stable() {
    let current = State::new().table(journals("journals")).table(reviews());
    let target = State::new().table(journals("journals_renamed")).table(reader());

    let first = Detector::new().diff(&current, &target).to_string();
    let second = Detector::new().diff(&current, &target).to_string();
    assert_eq!(first, second);
}

#[test]
fn test_no_rename_across_schemas() {
    let columns = |table: Table| {
        table
            .column(ColumnDefinition::new("id", "bigint").not_null())
            .column(varchar("login", 64))
    };
    let current = State::new().table(columns(Table::new("public", "external_users")));
    let target = State::new().table(columns(Table::new("external", "users")));

    let changes = assert_converges(&Detector::new(), &current, &target);
    let ops: Vec<_> = changes.iter().map(Operation::kind).collect();
    assert_eq!(ops, vec!["create table", "drop table"]);
}

// =============================================================================
// Foreign keys across renames and drops
// =============================================================================

fn post_author() -> ForeignKey {
    ForeignKey::new(
        ColumnReference::new("public", "posts", ["author_id"]),
        ColumnReference::new("public", "authors", ["id"]),
    )
}

fn posts(name: &str) -> Table {
    Table::new("public", name)
        .column(ColumnDefinition::new("id", "bigint").not_null())
        .column(ColumnDefinition::new("author_id", "bigint").not_null())
        .primary_key(PrimaryKey::new(Columns::parse("id")))
}

#[test]
fn test_foreign_keys_follow_renames() {
    let current = State::new()
        .table(authors())
        .table(posts("posts"))
        .foreign_key(post_author(), "posts_author_id_fkey");
    let target = State::new()
        .table(authors())
        .table(posts("articles"))
        .foreign_key(
            ForeignKey::new(
                ColumnReference::new("public", "articles", ["author_id"]),
                ColumnReference::new("public", "authors", ["id"]),
            ),
            "",
        );

    let changes = assert_converges(&Detector::new(), &current, &target);
    assert_eq!(
        lines(&changes),
        vec!["rename table public.posts to articles".to_string()]
    );
}

#[test]
fn test_new_relation_after_table_creation() {
    let current = State::new().table(authors());
    let target = State::new()
        .table(authors())
        .table(posts("posts"))
        .foreign_key(post_author(), "");

    let changes = assert_converges(&Detector::new(), &current, &target);
    let ops: Vec<_> = changes.iter().map(Operation::kind).collect();
    assert_eq!(ops, vec!["create table", "add foreign key"]);

    let sql = changes.to_sql(&PostgresDialect::new()).unwrap();
    assert_eq!(
        sql[1],
        "ALTER TABLE \"public\".\"posts\" ADD CONSTRAINT \"posts_author_id_fkey\" \
         FOREIGN KEY (\"author_id\") REFERENCES \"public\".\"authors\" (\"id\")"
    );
}

#[test]
fn test_dropping_referenced_table_drops_key_first() {
    let current = State::new()
        .table(authors())
        .table(posts("posts"))
        .foreign_key(post_author(), "posts_author_id_fkey");
    let target = State::new().table(posts("posts"));

    let changes = assert_converges(&Detector::new(), &current, &target);
    let ops: Vec<_> = changes.iter().map(Operation::kind).collect();
    assert_eq!(ops, vec!["drop foreign key", "drop table"]);
}

// =============================================================================
// Models against a live-looking state
// =============================================================================

fn registry() -> ModelRegistry {
    ModelRegistry::from_models([
        ModelDefinition::new("authors")
            .field(FieldDescriptor::new("id", "bigint").primary_key().auto_increment())
            .field(FieldDescriptor::new("name", "varchar(100)").not_null()),
        ModelDefinition::new("posts")
            .field(FieldDescriptor::new("id", "bigint").primary_key())
            .field(FieldDescriptor::new("author_id", "bigint").not_null())
            .field(FieldDescriptor::new("slug", "varchar(80)").not_null().unique())
            .relation(Relation::new(["author_id"], "authors", ["id"])),
    ])
    .unwrap()
}

#[tokio::test]
async fn test_models_from_empty_database() {
    let dialect = PostgresDialect::new();
    let config = InspectorConfig::new();
    let registry = registry();
    let target = ModelInspector::new(&registry, &dialect, &config)
        .inspect()
        .await
        .unwrap();

    let detector = Detector::for_dialect(&dialect);
    let changes = assert_converges(&detector, &State::new(), &target);
    let ops: Vec<_> = changes.iter().map(Operation::kind).collect();
    assert_eq!(ops, vec!["create table", "create table", "add foreign key"]);

    let reverse = changes.reverse().unwrap();
    let mut state = target.clone();
    state.apply_all(&reverse).unwrap();
    assert!(state.tables.is_empty());
}

#[tokio::test]
async fn test_models_add_column_to_existing_table() {
    let dialect = SqliteDialect::new();
    let config = InspectorConfig::new();
    let registry = registry();
    let target = ModelInspector::new(&registry, &dialect, &config)
        .inspect()
        .await
        .unwrap();

    let mut current = target.clone();
    let posts = Fqn::new("main", "posts");
    current
        .apply(&Operation::drop_column(
            posts.clone(),
            ColumnDefinition::new("slug", "varchar"),
        ))
        .unwrap();

    let detector = Detector::for_dialect(&dialect);
    let changes = assert_converges(&detector, &current, &target);
    let ops: Vec<_> = changes.iter().map(Operation::kind).collect();
    assert_eq!(ops, vec!["add column", "add unique constraint"]);
    assert!(changes.to_sql(&dialect).is_ok());
}

// =============================================================================
// Building blocks
// =============================================================================

#[test]
fn test_signature_reflexive_and_symmetric() {
    let eq = |a: &ColumnDefinition, b: &ColumnDefinition| {
        a.same_type(b) && a.is_nullable == b.is_nullable && a.default_value == b.default_value
    };
    let a = journals("a");
    let b = journals("b");
    let c = reviews();

    assert!(Signature::new(&a, &eq).equals(&Signature::new(&a, &eq)));
    assert!(Signature::new(&a, &eq).equals(&Signature::new(&b, &eq)));
    assert!(Signature::new(&b, &eq).equals(&Signature::new(&a, &eq)));
    assert!(!Signature::new(&a, &eq).equals(&Signature::new(&c, &eq)));
    assert!(!Signature::new(&c, &eq).equals(&Signature::new(&a, &eq)));

    let mut d = journals("d");
    d.columns[2] = ColumnDefinition::new("page_count", "integer").default_value("1");
    assert!(!Signature::new(&a, &eq).equals(&Signature::new(&d, &eq)));
}

#[test]
fn test_refmap_counts() {
    let users = Fqn::new("public", "users");
    let keys = [
        (
            ForeignKey::new(
                ColumnReference::new("public", "posts", ["author_id"]),
                ColumnReference::new("public", "users", ["id"]),
            ),
            "posts_author_id_fkey".to_string(),
        ),
        (
            ForeignKey::new(
                ColumnReference::new("public", "users", ["invited_by"]),
                ColumnReference::new("public", "users", ["id"]),
            ),
            "users_invited_by_fkey".to_string(),
        ),
    ];
    let mut refs = RefMap::new(keys);
    assert_eq!(refs.update_table(&users, &users.with_table("people")), 2);
    assert_eq!(refs.updated().len(), 2);
    assert_eq!(refs.delete_table(&Fqn::new("public", "posts")), 1);
    assert_eq!(refs.live().len(), 1);
}

#[test]
fn test_unique_equality_ignores_names() {
    let a = Unique::new(Columns::parse("x,y")).named("a");
    let b = Unique::new(Columns::parse("x,y")).named("b");
    assert!(a.equals(&b));
}
