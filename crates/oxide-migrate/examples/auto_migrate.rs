//! Example: Evolving a Blog Schema
//!
//! This example keeps an in-memory SQLite database in step with three
//! versions of a blog's models: the initial tables, a renamed table, and
//! a new column. Each step prints the detected changes and the DDL.
//!
//! Run with: cargo run --example auto_migrate -p oxide-migrate

use oxide_migrate::prelude::*;

// =============================================================================
// Model Versions
// =============================================================================

fn users() -> ModelDefinition {
    ModelDefinition::new("users")
        .field(FieldDescriptor::new("id", "bigint").primary_key().auto_increment())
        .field(FieldDescriptor::new("username", "varchar(100)").not_null().unique())
        .field(FieldDescriptor::new("email", "varchar(255)").not_null())
        .field(
            FieldDescriptor::new("is_active", "boolean")
                .not_null()
                .default_value("TRUE"),
        )
}

fn posts(name: &str) -> ModelDefinition {
    ModelDefinition::new(name)
        .field(FieldDescriptor::new("id", "bigint").primary_key().auto_increment())
        .field(FieldDescriptor::new("title", "varchar(200)").not_null())
        .field(FieldDescriptor::new("body", "text").not_null())
        .field(
            FieldDescriptor::new("created_at", "timestamp")
                .not_null()
                .default_value("CURRENT_TIMESTAMP"),
        )
}

/// Version 1: users and posts.
fn v1() -> Result<ModelRegistry> {
    Ok(ModelRegistry::from_models([users(), posts("posts")])?)
}

/// Version 2: posts are now called articles.
fn v2() -> Result<ModelRegistry> {
    Ok(ModelRegistry::from_models([users(), posts("articles")])?)
}

/// Version 3: users get an optional bio.
fn v3() -> Result<ModelRegistry> {
    Ok(ModelRegistry::from_models([
        users().field(FieldDescriptor::new("bio", "text")),
        posts("articles"),
    ])?)
}

// =============================================================================
// Main
// =============================================================================

async fn step(migrator: &AutoMigrator, title: &str, models: &ModelRegistry) -> Result<()> {
    println!("{title}");
    let changeset = migrator.plan(models).await?;
    if changeset.is_empty() {
        println!("    No changes\n");
        return Ok(());
    }
    for sql in migrator.sql(&changeset)? {
        println!("    {sql};");
    }
    migrator.migrate(models).await?;
    println!();
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(70));
    println!(" OXIDE-MIGRATE: Blog Schema Example");
    println!("{}", "=".repeat(70));
    println!();

    let migrator = AutoMigrator::connect("sqlite::memory:", InspectorConfig::new()).await?;

    step(&migrator, "[1] Creating the initial schema...", &v1()?).await?;
    step(&migrator, "[2] Renaming posts to articles...", &v2()?).await?;
    step(&migrator, "[3] Adding a bio to users...", &v3()?).await?;
    step(&migrator, "[4] Running again...", &v3()?).await?;

    println!("[5] Applied changesets:");
    for migration in migrator.history().get_applied().await? {
        println!("    {} ({} operations)", migration.name, migration.operations.len());
    }

    println!();
    println!("{}", "=".repeat(70));
    println!(" Final schema");
    println!("{}", "=".repeat(70));
    print!("{}", migrator.inspect_database().await?);

    Ok(())
}
