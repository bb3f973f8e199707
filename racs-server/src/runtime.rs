//! Orchestration runtime
//!
//! Start-up reconstruction from the store, worker spawning, the shared
//! image pruning job, and the mutations shared between the HTTP surface
//! and the tests: project lifecycle, destination/trigger/environment
//! rewrites, registry and credential upkeep, and webhook stage requests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use racs_core::domain::credential::Credential;
use racs_core::domain::project::{Destination, Project, TriggerEdge};
use racs_core::domain::registry::Registry;
use racs_core::domain::request::StageRequest;
use racs_core::domain::stage::Stage;
use racs_core::dto::credential::CreateCredential;
use racs_core::dto::project::{CreateProject, UpdateProject};
use racs_core::dto::registry::RegistryFields;
use racs_core::event::Event;
use sqlx::SqlitePool;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::engine::worker::{capture, Worker};
use crate::engine::{broker, command};
use crate::layout::{clean_relative, Layout};
use crate::repository::{
    credential_repository, project_repository, registry_repository, task_repository,
};
use crate::state::{AppState, CredentialMap, ProjectHandle, ProjectMap, RegistryMap, QUEUE_CAPACITY};

/// Reconstructs the orchestrator from the store and spawns its workers
pub async fn start(config: Config, pool: SqlitePool) -> anyhow::Result<Arc<AppState>> {
    let layout = Layout::new(&config.data_dir);
    layout.ensure().context("Failed to create data directories")?;
    std::env::set_var("GIT_TERMINAL_PROMPT", "0");

    let mut registries = HashMap::new();
    for registry in registry_repository::load_all(&pool).await? {
        registries.insert(registry.id, Arc::new(RwLock::new(registry)));
    }
    let registries: RegistryMap = Arc::new(RwLock::new(registries));

    let mut credentials = HashMap::new();
    for credential in credential_repository::load_all(&pool).await? {
        credentials.insert(credential.id, credential);
    }
    let credentials: CredentialMap = Arc::new(RwLock::new(credentials));

    let projects: ProjectMap = Arc::new(RwLock::new(HashMap::new()));
    let broker = broker::spawn(projects.clone(), credentials.clone());

    let state = Arc::new(AppState {
        config,
        layout,
        pool: pool.clone(),
        broker,
        registries,
        credentials,
        projects,
    });

    let mut loaded: HashMap<i64, Project> = project_repository::load_all(&pool)
        .await?
        .into_iter()
        .map(|project| (project.id, project))
        .collect();

    let known_registries: Vec<i64> = state.registries.read().await.keys().copied().collect();
    for (project, registry, tag) in project_repository::load_destinations(&pool).await? {
        if !known_registries.contains(&registry) {
            warn!("Destination of project {} references unknown registry {}", project, registry);
            continue;
        }
        if let Some(project) = loaded.get_mut(&project) {
            project.destinations.push(Destination { registry, tag });
        }
    }

    for (upstream, target, token) in project_repository::load_triggers(&pool).await? {
        let Ok(stage) = token.parse::<Stage>() else {
            warn!("Trigger of project {} has unknown stage {}", upstream, token);
            continue;
        };
        if !loaded.contains_key(&upstream) || !loaded.contains_key(&target) {
            continue;
        }
        if let Some(project) = loaded.get_mut(&upstream) {
            project.triggers.push(TriggerEdge {
                project: target,
                stage,
            });
        }
        if let Some(downstream) = loaded.get_mut(&target) {
            match stage {
                Stage::Prepare => downstream.prepare_dep = Some(upstream),
                Stage::Prepackage => downstream.prepackage_dep = Some(upstream),
                Stage::Package => downstream.package_dep = Some(upstream),
                _ => {}
            }
        }
    }

    for (project, name, credential) in project_repository::load_environments(&pool).await? {
        if let Some(project) = loaded.get_mut(&project) {
            project.environment.push((name, credential));
        }
    }

    for task in task_repository::load_all(&pool).await? {
        if let Some(project) = loaded.get_mut(&task.project) {
            project.push_task(task);
        }
    }

    let mut ids: Vec<i64> = loaded.keys().copied().collect();
    ids.sort_unstable();
    for id in ids {
        let Some(mut project) = loaded.remove(&id) else {
            continue;
        };
        let spec = command::rev_parse_head(&state.config, &state.layout, id);
        if let Some(commit) = capture(&spec).await {
            project.commit = commit;
        }
        info!("Restored project {} ({})", id, project.name);
        install_project(&state, project, false).await;
    }

    spawn_pruner(&state);
    Ok(state)
}

/// Inserts the project into the process-wide map and spawns its worker.
/// `bootstrap` drives a freshly created project through its implicit
/// create-success into the first clean/clone cycle.
pub async fn install_project(
    state: &Arc<AppState>,
    project: Project,
    bootstrap: bool,
) -> ProjectHandle {
    let id = project.id;
    let (queue, requests) = mpsc::channel(QUEUE_CAPACITY);
    let project = Arc::new(RwLock::new(project));
    let handle = ProjectHandle {
        queue,
        project: project.clone(),
    };
    state.projects.write().await.insert(id, handle.clone());
    Worker::spawn(state.clone(), id, project, requests, bootstrap);
    handle
}

/// Creates a project and starts its first pipeline run
pub async fn create_project(state: &Arc<AppState>, req: &CreateProject) -> anyhow::Result<i64> {
    let id = project_repository::create(&state.pool, req).await?;
    info!("Project created {} {} {} {}", id, req.name, req.url, req.branch);
    state
        .layout
        .ensure_project(id)
        .context("Failed to create project directories")?;
    let project = Project::new(
        id,
        req.name.clone(),
        req.url.clone(),
        req.branch.clone(),
        req.labels.clone(),
    );
    let info = state.project_info(&project).await;
    install_project(state, project, true).await;
    state
        .broker
        .publish(Event::ProjectCreate {
            project: Box::new(info),
        })
        .await;
    Ok(id)
}

/// Rewrites a project's configuration fields
pub async fn update_project(
    state: &Arc<AppState>,
    id: i64,
    req: UpdateProject,
) -> anyhow::Result<bool> {
    let Some(handle) = state.project(id).await else {
        return Ok(false);
    };
    let req = UpdateProject {
        build_spec: clean_relative(&req.build_spec).unwrap_or_default(),
        prepackage_spec: clean_relative(&req.prepackage_spec).unwrap_or_default(),
        package_spec: clean_relative(&req.package_spec).unwrap_or_default(),
        ..req
    };
    {
        let mut project = handle.project.write().await;
        project.name = req.name.clone();
        project.labels = req.labels.clone();
        project.url = req.url.clone();
        project.branch = req.branch.clone();
        project.build_spec = req.build_spec.clone();
        project.prepackage_spec = req.prepackage_spec.clone();
        project.package_spec = req.package_spec.clone();
        project.protected = req.protected;
        project.tag_repo = req.tag_repo;
    }
    project_repository::update(&state.pool, id, &req).await?;
    publish_project_update(state, id).await;
    // keep the clone's origin pointed at the rewritten URL
    let spec = command::set_remote(&state.config, &state.layout, id, &req.url);
    capture(&spec).await;
    Ok(true)
}

/// Replaces a project's destination list; unknown registries are skipped
pub async fn set_destinations(
    state: &Arc<AppState>,
    id: i64,
    entries: Vec<(i64, String)>,
) -> anyhow::Result<bool> {
    let Some(handle) = state.project(id).await else {
        return Ok(false);
    };
    let mut destinations = Vec::new();
    let mut rows = Vec::new();
    {
        let registries = state.registries.read().await;
        for (registry, tag) in entries {
            if !registries.contains_key(&registry) {
                warn!(
                    "Destination of project {} references unknown registry {}",
                    id, registry
                );
                continue;
            }
            destinations.push(Destination {
                registry,
                tag: tag.clone(),
            });
            rows.push((registry, tag));
        }
    }
    handle.project.write().await.destinations = destinations;
    project_repository::replace_destinations(&state.pool, id, &rows).await?;
    publish_project_update(state, id).await;
    Ok(true)
}

/// Replaces a project's trigger edges and recomputes the base-image
/// dependencies they impose on the downstream projects.
pub async fn set_triggers(
    state: &Arc<AppState>,
    id: i64,
    entries: Vec<(i64, String)>,
) -> anyhow::Result<bool> {
    let Some(handle) = state.project(id).await else {
        return Ok(false);
    };

    let old = handle.project.read().await.triggers.clone();
    for edge in &old {
        if let Some(downstream) = state.project(edge.project).await {
            let mut project = downstream.project.write().await;
            match edge.stage {
                Stage::Prepare => project.prepare_dep = None,
                Stage::Prepackage => project.prepackage_dep = None,
                Stage::Package => project.package_dep = None,
                _ => {}
            }
        }
    }

    let mut edges = Vec::new();
    for (target, token) in entries {
        let stage = match token.parse::<Stage>() {
            Ok(stage) if stage != Stage::Delete => stage,
            _ => {
                warn!("Trigger of project {} has unknown stage {}", id, token);
                continue;
            }
        };
        let Some(downstream) = state.project(target).await else {
            warn!("Trigger of project {} references unknown project {}", id, target);
            continue;
        };
        {
            let mut project = downstream.project.write().await;
            match stage {
                Stage::Prepare => project.prepare_dep = Some(id),
                Stage::Prepackage => project.prepackage_dep = Some(id),
                Stage::Package => project.package_dep = Some(id),
                _ => {}
            }
        }
        edges.push(TriggerEdge {
            project: target,
            stage,
        });
    }

    let rows: Vec<(i64, Stage)> = edges.iter().map(|e| (e.project, e.stage)).collect();
    handle.project.write().await.triggers = edges;
    project_repository::replace_triggers(&state.pool, id, &rows).await?;
    publish_project_update(state, id).await;
    Ok(true)
}

/// Replaces a project's credential bindings. The bindings are a mapping
/// keyed by variable name (a repeated name overwrites the earlier
/// entry); bindings referencing a missing credential are dropped
/// silently.
pub async fn set_environment(
    state: &Arc<AppState>,
    id: i64,
    entries: Vec<(String, i64)>,
) -> anyhow::Result<bool> {
    let Some(handle) = state.project(id).await else {
        return Ok(false);
    };
    let mut bindings: Vec<(String, i64)> = Vec::new();
    {
        let credentials = state.credentials.read().await;
        for (name, credential) in entries {
            if !credentials.contains_key(&credential) {
                continue;
            }
            match bindings.iter_mut().find(|(bound, _)| *bound == name) {
                Some(binding) => binding.1 = credential,
                None => bindings.push((name, credential)),
            }
        }
    }
    handle.project.write().await.environment = bindings.clone();
    project_repository::replace_environment(&state.pool, id, &bindings).await?;
    publish_project_update(state, id).await;
    Ok(true)
}

/// Outcome of a webhook stage request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Queued,
    /// Branch mismatch or unknown stage; acknowledged but not acted on
    Ignored,
    /// Protected project and unauthenticated caller
    Rejected,
    NotFound,
}

/// Handles an external stage request (webhook or UI retry)
pub async fn request_stage(
    state: &Arc<AppState>,
    id: i64,
    stage: &str,
    payload: Option<&serde_json::Value>,
    authenticated: bool,
) -> RequestOutcome {
    let Some(handle) = state.project(id).await else {
        return RequestOutcome::NotFound;
    };
    let (protected, branch) = {
        let project = handle.project.read().await;
        (project.protected, project.branch.clone())
    };
    if protected && !authenticated {
        return RequestOutcome::Rejected;
    }
    let expected = format!("refs/heads/{}", branch);
    if let Some(payload) = payload {
        let requested = payload.get("ref").and_then(|v| v.as_str()).unwrap_or("");
        if requested != expected {
            info!(
                "Build requested for {} expected {}, skipping",
                requested, expected
            );
            return RequestOutcome::Ignored;
        }
    }
    let stage = match stage.parse::<Stage>() {
        Ok(stage) if stage != Stage::Delete => stage,
        _ => {
            info!("Ignoring request for unknown stage {} on project {}", stage, id);
            return RequestOutcome::Ignored;
        }
    };
    if handle.queue.send(StageRequest::new(stage)).await.is_err() {
        warn!("Project {} queue is closed, dropping request", id);
    }
    RequestOutcome::Queued
}

/// Enqueues the delete stage; processed in queue order behind any
/// already-queued work.
pub async fn enqueue_delete(state: &Arc<AppState>, id: i64) -> bool {
    match state.project(id).await {
        Some(handle) => handle
            .queue
            .send(StageRequest::new(Stage::Delete))
            .await
            .is_ok(),
        None => false,
    }
}

pub async fn create_registry(state: &Arc<AppState>, req: RegistryFields) -> anyhow::Result<i64> {
    let id = registry_repository::create(&state.pool, &req).await?;
    info!("Registry created {} {} {} ******", req.name, req.url, req.user);
    let registry = Registry::new(id, req.name, req.url, req.user, req.password, req.timeout);
    state
        .registries
        .write()
        .await
        .insert(id, Arc::new(RwLock::new(registry)));
    Ok(id)
}

pub async fn update_registry(
    state: &Arc<AppState>,
    id: i64,
    req: RegistryFields,
) -> anyhow::Result<bool> {
    if !registry_repository::update(&state.pool, id, &req).await? {
        return Ok(false);
    }
    if let Some(registry) = state.registries.read().await.get(&id).cloned() {
        let mut registry = registry.write().await;
        registry.name = req.name;
        registry.url = req.url;
        registry.user = req.user;
        registry.password = req.password;
        registry.timeout = req.timeout;
    }
    Ok(true)
}

pub async fn create_credential(
    state: &Arc<AppState>,
    req: CreateCredential,
) -> anyhow::Result<i64> {
    let id = credential_repository::create(&state.pool, &req).await?;
    state.credentials.write().await.insert(
        id,
        Credential {
            id,
            description: req.description,
            value: req.value,
        },
    );
    Ok(id)
}

pub async fn update_credential(
    state: &Arc<AppState>,
    id: i64,
    value: String,
) -> anyhow::Result<bool> {
    if !credential_repository::update_value(&state.pool, id, &value).await? {
        return Ok(false);
    }
    if let Some(credential) = state.credentials.write().await.get_mut(&id) {
        credential.value = value;
    }
    Ok(true)
}

/// Publishes a full `project/update` snapshot
pub async fn publish_project_update(state: &Arc<AppState>, id: i64) {
    if let Some(handle) = state.project(id).await {
        let project = handle.project.read().await.clone();
        let info = state.project_info(&project).await;
        state
            .broker
            .publish(Event::ProjectUpdate {
                project: Box::new(info),
            })
            .await;
    }
}

/// Periodically prunes dangling images left behind by the build stages
pub fn spawn_pruner(state: &Arc<AppState>) -> Option<JoinHandle<()>> {
    if state.config.prune_interval == 0 {
        return None;
    }
    let state = state.clone();
    Some(tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(state.config.prune_interval));
        loop {
            interval.tick().await;
            info!("Pruning images");
            let spec = command::prune_images(&state.config);
            if capture(&spec).await.is_none() {
                error!("Image prune failed");
            }
        }
    }))
}
