//! Task Repository
//!
//! Task ids are allocated by the store; they are the serial backbone of
//! every worker, which is why a failed insert is fatal to the process
//! (handled by the caller).

use chrono::{SecondsFormat, Utc};
use racs_core::domain::task::{Task, TaskOutcome};
use sqlx::SqlitePool;

/// Insert a RUNNING task row, returning its id and creation timestamp
pub async fn create(
    pool: &SqlitePool,
    project: i64,
    kind: &str,
) -> Result<(i64, String), sqlx::Error> {
    let time = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let result = sqlx::query("INSERT INTO tasks(project, type, state, time) VALUES(?, ?, 'RUNNING', ?)")
        .bind(project)
        .bind(kind)
        .bind(&time)
        .execute(pool)
        .await?;

    Ok((result.last_insert_rowid(), time))
}

pub async fn update_state(pool: &SqlitePool, id: i64, state: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tasks SET state = ? WHERE id = ?")
        .bind(state)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn state_of(pool: &SqlitePool, id: i64) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT state FROM tasks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(state,)| state))
}

/// Newest-first history page
pub async fn list(pool: &SqlitePool, from: i64) -> Result<Vec<Task>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TaskRow>(
        "SELECT project, id, type AS kind, state, time FROM tasks ORDER BY id DESC LIMIT 100 OFFSET ?",
    )
    .bind(from)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Every task in creation order, for rebuilding the per-project windows
pub async fn load_all(pool: &SqlitePool) -> Result<Vec<Task>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TaskRow>(
        "SELECT project, id, type AS kind, state, time FROM tasks ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    project: i64,
    id: i64,
    kind: String,
    state: String,
    time: String,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            project: row.project,
            kind: row.kind,
            state: row.state.parse().unwrap_or(TaskOutcome::Error),
            time: row.time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_task_ids_are_serial() {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();

        let (first, _) = create(&pool, 1, "CLEANING").await.unwrap();
        let (second, _) = create(&pool, 2, "CLONING").await.unwrap();
        assert!(second > first);

        update_state(&pool, first, "SUCCESS").await.unwrap();
        assert_eq!(state_of(&pool, first).await.unwrap().unwrap(), "SUCCESS");
        assert_eq!(state_of(&pool, second).await.unwrap().unwrap(), "RUNNING");
        assert!(state_of(&pool, 999).await.unwrap().is_none());

        let page = list(&pool, 0).await.unwrap();
        assert_eq!(page[0].id, second);
        assert_eq!(page[1].id, first);

        let all = load_all(&pool).await.unwrap();
        assert_eq!(all[0].id, first);
        assert_eq!(all[0].state, TaskOutcome::Success);
    }
}
