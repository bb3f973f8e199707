//! Project worker
//!
//! One long-lived task per project. The worker owns the project's queue
//! and advances its stage machine: it processes one stage request at a
//! time, chains follow-up stages inline (never through the queue, so a
//! retry enqueued from outside cannot interleave with a mid-flight
//! pipeline), iterates the indexed stages across destinations, and
//! parks on its queue after an error until an external re-enqueue.

use std::sync::Arc;

use racs_core::domain::project::Project;
use racs_core::domain::request::{StageRequest, TriggerPayload};
use racs_core::domain::stage::{Outcome, ProjectState, Stage};
use racs_core::domain::task::{Task, TaskOutcome};
use racs_core::event::Event;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::engine::command::{self, CommandSpec};
use crate::engine::{detect, environment, executor, session};
use crate::repository::{project_repository, task_repository};
use crate::state::AppState;

/// What the worker does after a processed request
enum Next {
    /// Chain straight into the next stage, bypassing the queue
    Inline(StageRequest),
    /// Wait on the queue for an external request
    Park,
    /// The project is gone; stop the worker
    Terminate,
}

pub struct Worker {
    state: Arc<AppState>,
    id: i64,
    project: Arc<RwLock<Project>>,
    queue: mpsc::Receiver<StageRequest>,
}

impl Worker {
    /// Spawns the worker task. A freshly created project bootstraps with
    /// an implicit create-success, driving an unconditional clean/clone
    /// cycle; reconstructed projects park on their queue.
    pub fn spawn(
        state: Arc<AppState>,
        id: i64,
        project: Arc<RwLock<Project>>,
        queue: mpsc::Receiver<StageRequest>,
        bootstrap: bool,
    ) -> JoinHandle<()> {
        let worker = Worker {
            state,
            id,
            project,
            queue,
        };
        tokio::spawn(worker.run(bootstrap))
    }

    async fn run(mut self, bootstrap: bool) {
        // keep the clone's origin pointed at the configured URL
        let spec = {
            let project = self.project.read().await;
            command::set_remote(&self.state.config, &self.state.layout, self.id, &project.url)
        };
        capture(&spec).await;

        info!("Project {} waiting for tasks", self.id);
        let mut next: Option<StageRequest> = bootstrap.then(|| StageRequest::new(Stage::Clean));
        loop {
            let request = match next.take() {
                Some(request) => request,
                None => match self.queue.recv().await {
                    Some(request) => request,
                    None => return,
                },
            };
            info!(
                "Project {} received task {}",
                self.id,
                request.stage.running_name()
            );
            let outcome = self.execute(&request).await;
            info!(
                "Project {} finished task {}",
                self.id,
                request.stage.running_name()
            );
            if outcome != Outcome::Success {
                // park until an external re-enqueue; no retry, no chain
                continue;
            }
            match self.advance(&request).await {
                Next::Inline(request) => next = Some(request),
                Next::Park => {}
                Next::Terminate => return,
            }
        }
    }

    /// Runs one stage request: resolve it to a command, execute it as a
    /// task, and move the project into the stage's success or error
    /// state. Stages that are no-ops for the current configuration skip
    /// execution but still advance.
    async fn execute(&self, request: &StageRequest) -> Outcome {
        let stage = request.stage;
        let command = match self.resolve(request).await {
            Some(command) => command,
            None => {
                {
                    self.project.write().await.state =
                        ProjectState::Stage(stage, Outcome::Running);
                }
                self.set_state(ProjectState::Stage(stage, Outcome::Success))
                    .await;
                return Outcome::Success;
            }
        };

        {
            self.project.write().await.state = ProjectState::Stage(stage, Outcome::Running);
        }
        let kind = stage.running_name();
        let (task_id, time) = match task_repository::create(&self.state.pool, self.id, kind).await {
            Ok(created) => created,
            Err(err) => {
                // task identity is the worker's serial backbone; losing
                // the store here is unrecoverable
                error!(
                    "Failed to create task record for project {}: {}",
                    self.id, err
                );
                std::process::exit(1);
            }
        };
        info!("Creating task {}:{}", self.id, task_id);
        {
            self.project.write().await.push_task(Task {
                id: task_id,
                project: self.id,
                kind: kind.to_string(),
                state: TaskOutcome::Running,
                time: time.clone(),
            });
        }
        self.state
            .broker
            .publish(Event::TaskCreate {
                project: self.id,
                id: task_id,
                kind: kind.to_string(),
                time,
                state: TaskOutcome::Running.to_string(),
            })
            .await;

        info!("Task {}", command.command_line());
        let ok = match executor::run_command(&self.state.layout, task_id, &command).await {
            Ok(ok) => ok,
            Err(err) => {
                error!("Task {} failed to run: {:#}", task_id, err);
                false
            }
        };
        info!("Task {} completed", task_id);

        let outcome = if ok { Outcome::Success } else { Outcome::Error };
        let task_outcome = if ok {
            TaskOutcome::Success
        } else {
            TaskOutcome::Error
        };
        let state = ProjectState::Stage(stage, outcome);
        {
            let mut project = self.project.write().await;
            project.state = state;
            project.set_task_outcome(task_id, task_outcome);
        }
        let state_name = state.to_string();
        if let Err(err) =
            project_repository::update_state(&self.state.pool, self.id, &state_name).await
        {
            warn!("Failed to persist state for project {}: {}", self.id, err);
        }
        if let Err(err) =
            task_repository::update_state(&self.state.pool, task_id, task_outcome.as_str()).await
        {
            warn!("Failed to persist state for task {}: {}", task_id, err);
        }
        self.state
            .broker
            .publish(Event::ProjectState {
                id: self.id,
                state: state_name,
            })
            .await;
        self.state
            .broker
            .publish(Event::TaskState {
                project: self.id,
                id: task_id,
                state: task_outcome.to_string(),
            })
            .await;
        outcome
    }

    /// Maps a request to its command, or `None` when the stage is a
    /// no-op for the current configuration (missing prepackage recipe,
    /// tagRepo off, index past the destination list).
    async fn resolve(&self, request: &StageRequest) -> Option<CommandSpec> {
        let config = &self.state.config;
        let layout = &self.state.layout;
        let project = self.project.read().await.clone();
        match request.stage {
            Stage::Clean => Some(command::clean(config, layout, project.id)),
            Stage::Clone => Some(command::clone(
                config,
                layout,
                project.id,
                &project.branch,
                &project.url,
            )),
            Stage::Prepare => Some(command::prepare(config, layout, &project)),
            Stage::Pull => Some(command::pull(config, layout, project.id)),
            Stage::Build => {
                let credentials = self.state.credentials.read().await.clone();
                let env_file = match environment::write_environment(
                    layout,
                    &project,
                    &credentials,
                    request.trigger.as_ref(),
                ) {
                    Ok(path) => path,
                    Err(err) => {
                        warn!(
                            "Failed to write environment for project {}: {}",
                            project.id, err
                        );
                        layout.environment_file(project.id)
                    }
                };
                Some(command::build(config, layout, project.id, &env_file))
            }
            Stage::Prepackage => {
                if project.prepackage_spec.is_empty() {
                    None
                } else {
                    Some(command::prepackage(config, layout, &project))
                }
            }
            Stage::Package => Some(command::package(config, layout, &project)),
            Stage::Push => {
                let destination = project.destinations.get(request.index)?;
                let registry = self
                    .state
                    .registries
                    .read()
                    .await
                    .get(&destination.registry)
                    .cloned();
                match registry {
                    Some(registry) => {
                        let url = session::login(config, &registry).await;
                        Some(command::push(
                            config,
                            project.id,
                            &url,
                            &destination.resolved_tag(project.version),
                        ))
                    }
                    None => {
                        warn!(
                            "Project {} destination {} references unknown registry {}",
                            project.id, request.index, destination.registry
                        );
                        None
                    }
                }
            }
            Stage::Tag => {
                if !project.tag_repo {
                    return None;
                }
                let destination = project.destinations.get(request.index)?;
                Some(command::tag(
                    config,
                    layout,
                    project.id,
                    &destination.resolved_tag(project.version),
                ))
            }
            Stage::Delete => Some(command::delete(config, layout, project.id)),
        }
    }

    /// The post-stage transition table, applied only on success
    async fn advance(&self, request: &StageRequest) -> Next {
        let trigger = request.trigger.clone();
        match request.stage {
            Stage::Clean => Next::Inline(StageRequest::indexed(Stage::Clone, 0, trigger)),
            Stage::Clone => Next::Inline(StageRequest::indexed(Stage::Prepare, 0, trigger)),
            Stage::Prepare => Next::Inline(StageRequest::indexed(Stage::Pull, 0, trigger)),
            Stage::Pull => {
                // a changed build recipe forces the builder image to be
                // rebuilt before building
                let (build_spec, stored) = {
                    let project = self.project.read().await;
                    (project.build_spec.clone(), project.build_hash.clone())
                };
                let hash = detect::recipe_hash(&self.state.layout.recipe_path(self.id, &build_spec))
                    .await;
                if hash != stored {
                    {
                        self.project.write().await.build_hash = hash.clone();
                    }
                    if let Err(err) =
                        project_repository::update_build_hash(&self.state.pool, self.id, &hash)
                            .await
                    {
                        warn!(
                            "Failed to persist build hash for project {}: {}",
                            self.id, err
                        );
                    }
                    Next::Inline(StageRequest::indexed(Stage::Prepare, 0, trigger))
                } else {
                    Next::Inline(StageRequest::indexed(Stage::Build, 0, trigger))
                }
            }
            Stage::Build => {
                let spec =
                    command::rev_parse_head(&self.state.config, &self.state.layout, self.id);
                if let Some(commit) = capture(&spec).await {
                    self.project.write().await.commit = commit;
                }
                Next::Inline(StageRequest::indexed(Stage::Prepackage, 0, trigger))
            }
            Stage::Prepackage => Next::Inline(StageRequest::indexed(Stage::Package, 0, trigger)),
            Stage::Package => {
                let version = {
                    let mut project = self.project.write().await;
                    project.version += 1;
                    project.version
                };
                if let Err(err) =
                    project_repository::update_version(&self.state.pool, self.id, version).await
                {
                    warn!(
                        "Failed to persist version for project {}: {}",
                        self.id, err
                    );
                }
                self.state
                    .broker
                    .publish(Event::ProjectVersion {
                        id: self.id,
                        version,
                    })
                    .await;
                // best effort; the pipeline continues on failure
                let spec = command::git_tag_version(
                    &self.state.config,
                    &self.state.layout,
                    self.id,
                    version,
                );
                if capture(&spec).await.is_none() {
                    error!("Failed to tag working copy of project {} with r{}", self.id, version);
                }
                Next::Inline(StageRequest::indexed(Stage::Push, 0, trigger))
            }
            Stage::Push => {
                self.fire_triggers(request).await;
                let destinations = self.project.read().await.destinations.len();
                let index = request.index + 1;
                if index < destinations {
                    Next::Inline(StageRequest::indexed(Stage::Push, index, trigger))
                } else {
                    Next::Inline(StageRequest::indexed(Stage::Tag, 0, trigger))
                }
            }
            Stage::Tag => {
                let destinations = self.project.read().await.destinations.len();
                let index = request.index + 1;
                if index < destinations {
                    Next::Inline(StageRequest::indexed(Stage::Tag, index, trigger))
                } else {
                    Next::Park
                }
            }
            Stage::Delete => {
                if let Err(err) = project_repository::delete(&self.state.pool, self.id).await {
                    warn!("Failed to erase rows for project {}: {}", self.id, err);
                }
                self.state.projects.write().await.remove(&self.id);
                info!("Project {} deleted", self.id);
                Next::Terminate
            }
        }
    }

    /// Fans the trigger payload out to every downstream project
    async fn fire_triggers(&self, request: &StageRequest) {
        let project = self.project.read().await.clone();
        if project.triggers.is_empty() {
            return;
        }
        let (tag, registry) = match project.destinations.get(request.index) {
            Some(destination) => {
                let name = match self
                    .state
                    .registries
                    .read()
                    .await
                    .get(&destination.registry)
                    .cloned()
                {
                    Some(registry) => registry.read().await.name.clone(),
                    None => String::new(),
                };
                (destination.resolved_tag(project.version), name)
            }
            None => (String::new(), String::new()),
        };
        let payload = TriggerPayload {
            url: project.url.clone(),
            branch: project.branch.clone(),
            commit: project.commit.clone(),
            tag,
            registry,
            project: project.id,
            version: project.version,
        };
        for edge in &project.triggers {
            let downstream = self.state.projects.read().await.get(&edge.project).cloned();
            match downstream {
                Some(handle) => {
                    let request =
                        StageRequest::indexed(edge.stage, 0, Some(payload.clone()));
                    if handle.queue.send(request).await.is_err() {
                        warn!(
                            "Project {} trigger target {} is gone, dropping request",
                            self.id, edge.project
                        );
                    }
                }
                None => warn!(
                    "Project {} trigger references unknown project {}",
                    self.id, edge.project
                ),
            }
        }
    }

    /// Persists and publishes a state reached without running a command
    async fn set_state(&self, state: ProjectState) {
        {
            self.project.write().await.state = state;
        }
        let name = state.to_string();
        if let Err(err) = project_repository::update_state(&self.state.pool, self.id, &name).await {
            warn!("Failed to persist state for project {}: {}", self.id, err);
        }
        self.state
            .broker
            .publish(Event::ProjectState {
                id: self.id,
                state: name,
            })
            .await;
    }
}

/// Runs a command quietly, returning its trimmed stdout on success
pub(crate) async fn capture(spec: &CommandSpec) -> Option<String> {
    match tokio::process::Command::new(&spec.program)
        .args(&spec.args)
        .output()
        .await
    {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
        }
        _ => None,
    }
}
