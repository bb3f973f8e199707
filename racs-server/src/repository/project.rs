//! Project Repository
//!
//! Handles all database operations related to projects and their owned
//! destination, trigger and environment rows.

use racs_core::domain::project::Project;
use racs_core::domain::stage::{ProjectState, Stage};
use racs_core::dto::project::{CreateProject, UpdateProject};
use sqlx::SqlitePool;

/// Create a new project row with the default recipes, returning its id
pub async fn create(pool: &SqlitePool, req: &CreateProject) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO projects(name, labels, source, branch, buildSpec, prepackageSpec, packageSpec, buildHash, state, version, protected, tagRepo)
        VALUES(?, ?, ?, ?, 'BuildSpec', '', 'PackageSpec', x'', 'CREATE_SUCCESS', 0, 0, 0)
        "#,
    )
    .bind(&req.name)
    .bind(&req.labels)
    .bind(&req.url)
    .bind(&req.branch)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Rewrite a project's configuration fields
pub async fn update(pool: &SqlitePool, id: i64, req: &UpdateProject) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE projects
        SET name = ?, labels = ?, source = ?, branch = ?,
            buildSpec = ?, prepackageSpec = ?, packageSpec = ?,
            protected = ?, tagRepo = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.name)
    .bind(&req.labels)
    .bind(&req.url)
    .bind(&req.branch)
    .bind(&req.build_spec)
    .bind(&req.prepackage_spec)
    .bind(&req.package_spec)
    .bind(req.protected as i64)
    .bind(req.tag_repo as i64)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn update_state(pool: &SqlitePool, id: i64, state: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE projects SET state = ? WHERE id = ?")
        .bind(state)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_version(pool: &SqlitePool, id: i64, version: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE projects SET version = ? WHERE id = ?")
        .bind(version)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_build_hash(
    pool: &SqlitePool,
    id: i64,
    hash: &[u8],
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE projects SET buildHash = ? WHERE id = ?")
        .bind(hash)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Erase a project and every row it owns
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM destinations WHERE project = ?")
        .bind(id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM triggers WHERE project = ?")
        .bind(id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM environments WHERE project = ?")
        .bind(id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM tasks WHERE project = ?")
        .bind(id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn replace_destinations(
    pool: &SqlitePool,
    id: i64,
    destinations: &[(i64, String)],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM destinations WHERE project = ?")
        .bind(id)
        .execute(pool)
        .await?;
    for (registry, tag) in destinations {
        sqlx::query("INSERT INTO destinations(project, registry, tag) VALUES(?, ?, ?)")
            .bind(id)
            .bind(registry)
            .bind(tag)
            .execute(pool)
            .await?;
    }
    Ok(())
}

pub async fn replace_triggers(
    pool: &SqlitePool,
    id: i64,
    triggers: &[(i64, Stage)],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM triggers WHERE project = ?")
        .bind(id)
        .execute(pool)
        .await?;
    for (target, stage) in triggers {
        sqlx::query("INSERT INTO triggers(project, target, state) VALUES(?, ?, ?)")
            .bind(id)
            .bind(target)
            .bind(stage.token())
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// The bindings are a mapping keyed by variable name: `(project, name)`
/// is unique and a repeated name overwrites the earlier credential.
pub async fn replace_environment(
    pool: &SqlitePool,
    id: i64,
    environment: &[(String, i64)],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM environments WHERE project = ?")
        .bind(id)
        .execute(pool)
        .await?;
    for (name, credential) in environment {
        sqlx::query(
            "INSERT OR REPLACE INTO environments(project, name, credential) VALUES(?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(credential)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Load every project row (without its owned rows)
pub async fn load_all(pool: &SqlitePool) -> Result<Vec<Project>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ProjectRow>(
        r#"
        SELECT id, name, labels, source, branch,
               buildSpec AS build_spec, prepackageSpec AS prepackage_spec,
               packageSpec AS package_spec, buildHash AS build_hash,
               state, version, protected, tagRepo AS tag_repo
        FROM projects
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

pub async fn load_destinations(
    pool: &SqlitePool,
) -> Result<Vec<(i64, i64, String)>, sqlx::Error> {
    let rows: Vec<(i64, i64, String)> =
        sqlx::query_as("SELECT project, registry, tag FROM destinations ORDER BY rowid")
            .fetch_all(pool)
            .await?;
    Ok(rows)
}

pub async fn load_triggers(pool: &SqlitePool) -> Result<Vec<(i64, i64, String)>, sqlx::Error> {
    let rows: Vec<(i64, i64, String)> =
        sqlx::query_as("SELECT project, target, state FROM triggers ORDER BY rowid")
            .fetch_all(pool)
            .await?;
    Ok(rows)
}

pub async fn load_environments(
    pool: &SqlitePool,
) -> Result<Vec<(i64, String, i64)>, sqlx::Error> {
    let rows: Vec<(i64, String, i64)> =
        sqlx::query_as("SELECT project, name, credential FROM environments ORDER BY rowid")
            .fetch_all(pool)
            .await?;
    Ok(rows)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    name: String,
    labels: String,
    source: String,
    branch: String,
    build_spec: String,
    prepackage_spec: String,
    package_spec: String,
    build_hash: Vec<u8>,
    state: String,
    version: i64,
    protected: i64,
    tag_repo: i64,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        let mut project = Project::new(row.id, row.name, row.source, row.branch, row.labels);
        project.build_spec = row.build_spec;
        project.prepackage_spec = row.prepackage_spec;
        project.package_spec = row.package_spec;
        project.build_hash = row.build_hash;
        project.state = row.state.parse().unwrap_or(ProjectState::None);
        project.version = row.version;
        project.protected = row.protected != 0;
        project.tag_repo = row.tag_repo != 0;
        project
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn pool() -> SqlitePool {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        pool
    }

    fn request(name: &str) -> CreateProject {
        CreateProject {
            name: name.to_string(),
            url: "https://example.com/lib.git".to_string(),
            branch: "main".to_string(),
            labels: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_and_load_round_trip() {
        let pool = pool().await;
        let id = create(&pool, &request("lib")).await.unwrap();
        assert!(id > 0);

        let projects = load_all(&pool).await.unwrap();
        assert_eq!(projects.len(), 1);
        let project = &projects[0];
        assert_eq!(project.name, "lib");
        assert_eq!(project.build_spec, "BuildSpec");
        assert_eq!(project.state.to_string(), "CREATE_SUCCESS");
        assert_eq!(project.version, 0);
        assert!(project.build_hash.is_empty());
    }

    #[tokio::test]
    async fn test_owned_rows_replaced_and_deleted() {
        let pool = pool().await;
        let id = create(&pool, &request("lib")).await.unwrap();

        replace_destinations(&pool, id, &[(1, "lib:$VERSION".to_string())])
            .await
            .unwrap();
        replace_destinations(
            &pool,
            id,
            &[(1, "lib:latest".to_string()), (2, "lib:$VERSION".to_string())],
        )
        .await
        .unwrap();
        assert_eq!(load_destinations(&pool).await.unwrap().len(), 2);

        replace_triggers(&pool, id, &[(7, Stage::Build)]).await.unwrap();
        assert_eq!(
            load_triggers(&pool).await.unwrap(),
            vec![(id, 7, "build".to_string())]
        );

        replace_environment(&pool, id, &[("API_KEY".to_string(), 3)])
            .await
            .unwrap();

        // a repeated name is a rewrite, not a second binding
        replace_environment(
            &pool,
            id,
            &[("API_KEY".to_string(), 3), ("API_KEY".to_string(), 4)],
        )
        .await
        .unwrap();
        assert_eq!(
            load_environments(&pool).await.unwrap(),
            vec![(id, "API_KEY".to_string(), 4)]
        );

        delete(&pool, id).await.unwrap();
        assert!(load_all(&pool).await.unwrap().is_empty());
        assert!(load_destinations(&pool).await.unwrap().is_empty());
        assert!(load_triggers(&pool).await.unwrap().is_empty());
        assert!(load_environments(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_worker_owned_columns() {
        let pool = pool().await;
        let id = create(&pool, &request("lib")).await.unwrap();

        update_state(&pool, id, "BUILD_ERROR").await.unwrap();
        update_version(&pool, id, 3).await.unwrap();
        update_build_hash(&pool, id, &[0xAB, 0xCD]).await.unwrap();

        let project = &load_all(&pool).await.unwrap()[0];
        assert_eq!(project.state.to_string(), "BUILD_ERROR");
        assert_eq!(project.version, 3);
        assert_eq!(project.build_hash, vec![0xAB, 0xCD]);
    }
}
