//! Task DTOs

use serde::{Deserialize, Serialize};

use crate::domain::task::Task;

/// Task summary, as listed and streamed to subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub project: i64,
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub state: String,
    pub time: String,
}

impl From<&Task> for TaskInfo {
    fn from(task: &Task) -> Self {
        Self {
            project: task.project,
            id: task.id,
            kind: task.kind.clone(),
            state: task.state.to_string(),
            time: task.time.clone(),
        }
    }
}
