//! Project DTOs

use serde::{Deserialize, Serialize};

use crate::domain::project::Project;
use crate::dto::task::TaskInfo;

/// Full project snapshot, as listed and streamed to subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: i64,
    pub name: String,
    pub labels: String,
    pub url: String,
    pub branch: String,
    #[serde(rename = "buildSpec")]
    pub build_spec: String,
    #[serde(rename = "prepackageSpec")]
    pub prepackage_spec: String,
    #[serde(rename = "packageSpec")]
    pub package_spec: String,
    pub state: String,
    pub version: i64,
    pub protected: bool,
    #[serde(rename = "tagRepo")]
    pub tag_repo: bool,
    /// `(registry id, tag template)` pairs in publish order
    pub destinations: Vec<(i64, String)>,
    /// `(downstream project id, stage token)` pairs
    pub triggers: Vec<(i64, String)>,
    /// `(variable name, credential id, credential description)` triples
    pub environment: Vec<(String, i64, String)>,
    pub tasks: Vec<TaskInfo>,
}

impl ProjectInfo {
    /// Builds a snapshot of `project`; `describe` resolves a credential id
    /// to its description (unknown ids yield an empty description).
    pub fn from_project(project: &Project, describe: impl Fn(i64) -> Option<String>) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            labels: project.labels.clone(),
            url: project.url.clone(),
            branch: project.branch.clone(),
            build_spec: project.build_spec.clone(),
            prepackage_spec: project.prepackage_spec.clone(),
            package_spec: project.package_spec.clone(),
            state: project.state.to_string(),
            version: project.version,
            protected: project.protected,
            tag_repo: project.tag_repo,
            destinations: project
                .destinations
                .iter()
                .map(|d| (d.registry, d.tag.clone()))
                .collect(),
            triggers: project
                .triggers
                .iter()
                .map(|t| (t.project, t.stage.token().to_string()))
                .collect(),
            environment: project
                .environment
                .iter()
                .map(|(name, id)| (name.clone(), *id, describe(*id).unwrap_or_default()))
                .collect(),
            tasks: project.tasks.iter().map(TaskInfo::from).collect(),
        }
    }
}

/// Request to create a new project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub url: String,
    pub branch: String,
    #[serde(default)]
    pub labels: String,
}

/// Request to rewrite a project's identity, recipes, and flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProject {
    pub name: String,
    pub url: String,
    pub branch: String,
    #[serde(default)]
    pub labels: String,
    #[serde(rename = "buildSpec", default)]
    pub build_spec: String,
    #[serde(rename = "prepackageSpec", default)]
    pub prepackage_spec: String,
    #[serde(rename = "packageSpec", default)]
    pub package_spec: String,
    #[serde(default)]
    pub protected: bool,
    #[serde(rename = "tagRepo", default)]
    pub tag_repo: bool,
}

/// Request to replace a project's destination list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDestinations {
    pub destinations: Vec<(i64, String)>,
}

/// Request to replace a project's trigger edges
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTriggers {
    pub triggers: Vec<(i64, String)>,
}

/// Request to replace a project's credential bindings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEnvironment {
    pub environment: Vec<(String, i64)>,
}

/// Request to stage a recipe file into a project's root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFile {
    pub name: String,
    pub value: String,
}

/// Deletion confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteProject {
    pub confirm: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::project::Destination;
    use crate::domain::stage::{Outcome, ProjectState, Stage};
    use crate::domain::project::TriggerEdge;

    #[test]
    fn test_snapshot_shape() {
        let mut project = Project::new(
            3,
            "lib".to_string(),
            "https://example.com/lib.git".to_string(),
            "main".to_string(),
            "core".to_string(),
        );
        project.state = ProjectState::Stage(Stage::Tag, Outcome::Success);
        project.version = 4;
        project.destinations.push(Destination {
            registry: 1,
            tag: "lib:$VERSION".to_string(),
        });
        project.triggers.push(TriggerEdge {
            project: 9,
            stage: Stage::Build,
        });
        project.environment.push(("API_KEY".to_string(), 12));

        let info = ProjectInfo::from_project(&project, |id| {
            (id == 12).then(|| "deploy key".to_string())
        });
        assert_eq!(info.state, "TAG_SUCCESS");
        assert_eq!(info.destinations, vec![(1, "lib:$VERSION".to_string())]);
        assert_eq!(info.triggers, vec![(9, "build".to_string())]);
        assert_eq!(
            info.environment,
            vec![("API_KEY".to_string(), 12, "deploy key".to_string())]
        );

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["buildSpec"], "BuildSpec");
        assert_eq!(json["tagRepo"], false);
        assert_eq!(json["version"], 4);
    }
}
