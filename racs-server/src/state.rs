//! Process-wide shared state
//!
//! The project, registry and credential maps are read by workers, the
//! broker and the HTTP surface, and mutated by handlers and workers.
//! Mutations are serialized behind async RwLocks; readers may observe
//! slightly stale snapshots. All worker-owned project fields (state,
//! version, buildHash, commit, task window) are written only by the
//! project's own worker.

use std::collections::HashMap;
use std::sync::Arc;

use racs_core::domain::credential::Credential;
use racs_core::domain::project::Project;
use racs_core::domain::registry::Registry;
use racs_core::domain::request::StageRequest;
use racs_core::dto::project::ProjectInfo;
use sqlx::SqlitePool;
use tokio::sync::{mpsc, RwLock};

use crate::config::Config;
use crate::engine::broker::BrokerHandle;
use crate::layout::Layout;

/// Capacity of a project's stage-request queue; producers to a full
/// queue suspend, which is the backpressure contract.
pub const QUEUE_CAPACITY: usize = 10;

pub type RegistryMap = Arc<RwLock<HashMap<i64, Arc<RwLock<Registry>>>>>;
pub type CredentialMap = Arc<RwLock<HashMap<i64, Credential>>>;
pub type ProjectMap = Arc<RwLock<HashMap<i64, ProjectHandle>>>;

/// Shared handle to one project: its queue and its guarded aggregate
#[derive(Clone)]
pub struct ProjectHandle {
    pub queue: mpsc::Sender<StageRequest>,
    pub project: Arc<RwLock<Project>>,
}

pub struct AppState {
    pub config: Config,
    pub layout: Layout,
    pub pool: SqlitePool,
    pub broker: BrokerHandle,
    pub registries: RegistryMap,
    pub credentials: CredentialMap,
    pub projects: ProjectMap,
}

impl AppState {
    pub async fn project(&self, id: i64) -> Option<ProjectHandle> {
        self.projects.read().await.get(&id).cloned()
    }

    /// Snapshot of one project, with credential descriptions resolved
    pub async fn project_info(&self, project: &Project) -> ProjectInfo {
        let credentials = self.credentials.read().await;
        ProjectInfo::from_project(project, |id| {
            credentials.get(&id).map(|c| c.description.clone())
        })
    }

    /// Id-ordered snapshot of every project
    pub async fn project_list(&self) -> Vec<ProjectInfo> {
        snapshot_projects(&self.projects, &self.credentials).await
    }
}

/// Builds the id-ordered project list used by `/project/list` and the
/// broker's bootstrap event.
pub async fn snapshot_projects(
    projects: &ProjectMap,
    credentials: &CredentialMap,
) -> Vec<ProjectInfo> {
    let handles: Vec<ProjectHandle> = projects.read().await.values().cloned().collect();
    let credentials = credentials.read().await;
    let mut result = Vec::with_capacity(handles.len());
    for handle in handles {
        let project = handle.project.read().await;
        result.push(ProjectInfo::from_project(&project, |id| {
            credentials.get(&id).map(|c| c.description.clone())
        }));
    }
    result.sort_by_key(|info| info.id);
    result
}
