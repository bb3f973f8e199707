//! Project domain types

use std::collections::VecDeque;

use crate::domain::stage::{ProjectState, Stage};
use crate::domain::task::{Task, TaskOutcome};

/// Most recent tasks kept in a project's in-memory window
pub const TASK_WINDOW: usize = 5;

/// A publish destination: a registry reference plus a tag template
///
/// The template may contain a literal `$VERSION` token which is replaced
/// with the project's decimal version when the tag is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub registry: i64,
    pub tag: String,
}

impl Destination {
    pub fn resolved_tag(&self, version: i64) -> String {
        self.tag.replace("$VERSION", &version.to_string())
    }
}

/// A cross-project trigger edge: on push-success, `project` is sent a
/// stage request for `stage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEdge {
    pub project: i64,
    pub stage: Stage,
}

/// The primary aggregate: a repository bound to a build/package recipe,
/// publish destinations, and cross-project triggers.
///
/// `state`, `version`, `build_hash`, `commit` and the task window are
/// owned by the project's worker; configuration fields are rewritten by
/// the HTTP surface.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub labels: String,
    pub url: String,
    pub branch: String,
    pub build_spec: String,
    pub prepackage_spec: String,
    pub package_spec: String,
    pub build_hash: Vec<u8>,
    pub state: ProjectState,
    pub version: i64,
    pub protected: bool,
    pub tag_repo: bool,
    pub destinations: Vec<Destination>,
    pub triggers: Vec<TriggerEdge>,
    /// Environment bindings: variable name -> credential id. A mapping,
    /// not a list: names are unique and a rewrite replaces the binding.
    pub environment: Vec<(String, i64)>,
    /// Base-image back-references imposed by upstream triggers
    pub prepare_dep: Option<i64>,
    pub prepackage_dep: Option<i64>,
    pub package_dep: Option<i64>,
    /// Last observed HEAD commit of the clone
    pub commit: String,
    /// Rolling window of the most recent tasks (runtime-only)
    pub tasks: VecDeque<Task>,
}

impl Project {
    /// A freshly created project with the default recipe names, ready for
    /// its bootstrap clean/clone cycle.
    pub fn new(id: i64, name: String, url: String, branch: String, labels: String) -> Self {
        Self {
            id,
            name,
            labels,
            url,
            branch,
            build_spec: "BuildSpec".to_string(),
            prepackage_spec: String::new(),
            package_spec: "PackageSpec".to_string(),
            build_hash: Vec::new(),
            state: ProjectState::CreateSuccess,
            version: 0,
            protected: false,
            tag_repo: false,
            destinations: Vec::new(),
            triggers: Vec::new(),
            environment: Vec::new(),
            prepare_dep: None,
            prepackage_dep: None,
            package_dep: None,
            commit: String::new(),
            tasks: VecDeque::new(),
        }
    }

    /// Appends a task to the rolling window, trimming the head to keep at
    /// most [`TASK_WINDOW`] entries.
    pub fn push_task(&mut self, task: Task) {
        self.tasks.push_back(task);
        while self.tasks.len() > TASK_WINDOW {
            self.tasks.pop_front();
        }
    }

    /// Updates the outcome of a task in the window, if still present.
    pub fn set_task_outcome(&mut self, task_id: i64, outcome: TaskOutcome) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
            task.state = outcome;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: i64) -> Task {
        Task {
            id,
            project: 1,
            kind: "CLEANING".to_string(),
            state: TaskOutcome::Running,
            time: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_resolved_tag_substitutes_version() {
        let destination = Destination {
            registry: 1,
            tag: "lib:$VERSION".to_string(),
        };
        assert_eq!(destination.resolved_tag(7), "lib:7");
    }

    #[test]
    fn test_resolved_tag_without_token() {
        let destination = Destination {
            registry: 1,
            tag: "lib:latest".to_string(),
        };
        assert_eq!(destination.resolved_tag(7), "lib:latest");
    }

    #[test]
    fn test_task_window_is_bounded() {
        let mut project = Project::new(
            1,
            "demo".to_string(),
            "https://example.com/demo.git".to_string(),
            "main".to_string(),
            String::new(),
        );
        for id in 0..8 {
            project.push_task(task(id));
        }
        assert_eq!(project.tasks.len(), TASK_WINDOW);
        let ids: Vec<i64> = project.tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_set_task_outcome() {
        let mut project = Project::new(
            1,
            "demo".to_string(),
            "https://example.com/demo.git".to_string(),
            "main".to_string(),
            String::new(),
        );
        project.push_task(task(1));
        project.set_task_outcome(1, TaskOutcome::Success);
        assert_eq!(project.tasks[0].state, TaskOutcome::Success);
        // unknown ids are ignored
        project.set_task_outcome(99, TaskOutcome::Error);
    }
}
