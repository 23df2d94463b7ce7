//! Database schema and migrations
//!
//! Migrations are plain SQL files compiled into the binary and applied in
//! version order. Each one runs in its own transaction and is recorded in
//! the `migrations` table.

use crate::error::Result;
use sqlx::sqlite::SqlitePool;

struct Migration {
    version: i32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial schema",
    sql: include_str!("migrations/001_initial_schema.sql"),
}];

/// Initialize database with schema
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Initializing database schema");

    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?;

    tracing::info!("Current database version: {}", current);

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply_migration(pool, migration).await?;
    }

    tracing::info!("Database initialization complete");
    Ok(())
}

async fn apply_migration(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    tracing::info!("Applying migration {} ({})", migration.version, migration.name);

    let mut tx = pool.begin().await?;

    // Statements are split on ';' so migration comments must not contain one.
    for statement in migration.sql.split(';').filter(|s| !s.trim().is_empty()) {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    sqlx::query("INSERT INTO migrations (version) VALUES (?)")
        .bind(migration.version)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
