//! Event stream schema
//!
//! Every state transition is published as a JSON object with an `event`
//! discriminator. A freshly registered subscriber receives a synthetic
//! `project/list` bootstrap event before any live events.

use serde::Serialize;

use crate::dto::project::ProjectInfo;

/// A single event on the broker stream
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum Event {
    #[serde(rename = "project/list")]
    ProjectList { projects: Vec<ProjectInfo> },
    #[serde(rename = "project/create")]
    ProjectCreate {
        #[serde(flatten)]
        project: Box<ProjectInfo>,
    },
    #[serde(rename = "project/update")]
    ProjectUpdate {
        #[serde(flatten)]
        project: Box<ProjectInfo>,
    },
    #[serde(rename = "project/state")]
    ProjectState { id: i64, state: String },
    #[serde(rename = "project/version")]
    ProjectVersion { id: i64, version: i64 },
    #[serde(rename = "task/create")]
    TaskCreate {
        project: i64,
        id: i64,
        #[serde(rename = "type")]
        kind: String,
        time: String,
        state: String,
    },
    #[serde(rename = "task/state")]
    TaskState { project: i64, id: i64, state: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_discriminators() {
        let event = Event::ProjectState {
            id: 2,
            state: "BUILD_SUCCESS".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "project/state");
        assert_eq!(json["id"], 2);
        assert_eq!(json["state"], "BUILD_SUCCESS");

        let event = Event::TaskCreate {
            project: 2,
            id: 41,
            kind: "BUILDING".to_string(),
            time: "2024-01-01T00:00:00Z".to_string(),
            state: "RUNNING".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "task/create");
        assert_eq!(json["type"], "BUILDING");
    }

    #[test]
    fn test_bootstrap_event_shape() {
        let event = Event::ProjectList { projects: vec![] };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "project/list");
        assert!(json["projects"].as_array().unwrap().is_empty());
    }
}
