//! Registry Repository

use racs_core::domain::registry::Registry;
use racs_core::dto::registry::RegistryFields;
use sqlx::SqlitePool;

pub async fn create(pool: &SqlitePool, req: &RegistryFields) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO registries(name, url, user, password, timeout) VALUES(?, ?, ?, ?, ?)",
    )
    .bind(&req.name)
    .bind(&req.url)
    .bind(&req.user)
    .bind(&req.password)
    .bind(req.timeout)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn update(pool: &SqlitePool, id: i64, req: &RegistryFields) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE registries SET name = ?, url = ?, user = ?, password = ?, timeout = ? WHERE id = ?",
    )
    .bind(&req.name)
    .bind(&req.url)
    .bind(&req.user)
    .bind(&req.password)
    .bind(req.timeout)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn load_all(pool: &SqlitePool) -> Result<Vec<Registry>, sqlx::Error> {
    let rows: Vec<(i64, String, String, String, String, i64)> =
        sqlx::query_as("SELECT id, name, url, user, password, timeout FROM registries ORDER BY id")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name, url, user, password, timeout)| {
            Registry::new(id, name, url, user, password, timeout)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_registry_round_trip() {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();

        let id = create(
            &pool,
            &RegistryFields {
                name: "local".to_string(),
                url: "registry.example.com".to_string(),
                user: "ci".to_string(),
                password: "secret".to_string(),
                timeout: 30,
            },
        )
        .await
        .unwrap();

        let registries = load_all(&pool).await.unwrap();
        assert_eq!(registries.len(), 1);
        assert_eq!(registries[0].id, id);
        assert_eq!(registries[0].timeout, 30);

        let updated = update(
            &pool,
            id,
            &RegistryFields {
                name: "local".to_string(),
                url: "registry.example.com".to_string(),
                user: String::new(),
                password: String::new(),
                timeout: 60,
            },
        )
        .await
        .unwrap();
        assert!(updated);
        assert_eq!(load_all(&pool).await.unwrap()[0].timeout, 60);
    }
}
