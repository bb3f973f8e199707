//! SQLite connection pool and schema bootstrap
//!
//! The pool is capped at a single connection: the store has at most one
//! writer and worker task-id allocation relies on serialized inserts.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::time::Duration;

/// Current schema version recorded in the config table
const SCHEMA_VERSION: &str = "1";

pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS config(
            name TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS registries(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            url TEXT NOT NULL,
            user TEXT NOT NULL DEFAULT '',
            password TEXT NOT NULL DEFAULT '',
            timeout INTEGER NOT NULL DEFAULT 60
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS credentials(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            description TEXT NOT NULL,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            labels TEXT NOT NULL DEFAULT '',
            source TEXT NOT NULL,
            branch TEXT NOT NULL,
            buildSpec TEXT NOT NULL DEFAULT 'BuildSpec',
            prepackageSpec TEXT NOT NULL DEFAULT '',
            packageSpec TEXT NOT NULL DEFAULT 'PackageSpec',
            buildHash BLOB NOT NULL DEFAULT x'',
            state TEXT NOT NULL DEFAULT 'NONE',
            version INTEGER NOT NULL DEFAULT 0,
            protected INTEGER NOT NULL DEFAULT 0,
            tagRepo INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS destinations(
            project INTEGER NOT NULL,
            registry INTEGER NOT NULL,
            tag TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS triggers(
            project INTEGER NOT NULL,
            target INTEGER NOT NULL,
            state TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS environments(
            project INTEGER NOT NULL,
            name TEXT NOT NULL,
            credential INTEGER NOT NULL,
            UNIQUE(project, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project INTEGER NOT NULL,
            type TEXT NOT NULL,
            state TEXT NOT NULL,
            time TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project)")
        .execute(pool)
        .await?;

    sqlx::query("INSERT OR IGNORE INTO config(name, value) VALUES('version', ?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let version: (String,) =
            sqlx::query_as("SELECT value FROM config WHERE name = 'version'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(version.0, SCHEMA_VERSION);
    }
}
