//! Credential Repository

use racs_core::domain::credential::Credential;
use racs_core::dto::credential::CreateCredential;
use sqlx::SqlitePool;

pub async fn create(pool: &SqlitePool, req: &CreateCredential) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO credentials(description, value) VALUES(?, ?)")
        .bind(&req.description)
        .bind(&req.value)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

pub async fn update_value(pool: &SqlitePool, id: i64, value: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE credentials SET value = ? WHERE id = ?")
        .bind(value)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn load_all(pool: &SqlitePool) -> Result<Vec<Credential>, sqlx::Error> {
    let rows: Vec<(i64, String, String)> =
        sqlx::query_as("SELECT id, description, value FROM credentials ORDER BY id")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .map(|(id, description, value)| Credential {
            id,
            description,
            value,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_credential_round_trip() {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();

        let id = create(
            &pool,
            &CreateCredential {
                description: "deploy key".to_string(),
                value: "hunter2".to_string(),
            },
        )
        .await
        .unwrap();

        assert!(update_value(&pool, id, "hunter3").await.unwrap());
        let credentials = load_all(&pool).await.unwrap();
        assert_eq!(credentials[0].value, "hunter3");
        assert!(!update_value(&pool, id + 1, "nope").await.unwrap());
    }
}
