//! Task domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single command execution record attached to a project and a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub project: i64,
    /// Stage kind, e.g. `CLEANING`
    pub kind: String,
    pub state: TaskOutcome,
    /// Creation timestamp (RFC 3339 text, as persisted)
    pub time: String,
}

/// Task execution outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskOutcome {
    Running,
    Success,
    Error,
}

impl TaskOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Running => "RUNNING",
            TaskOutcome::Success => "SUCCESS",
            TaskOutcome::Error => "ERROR",
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown task outcome name
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown task outcome: {0}")]
pub struct ParseOutcomeError(pub String);

impl FromStr for TaskOutcome {
    type Err = ParseOutcomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(TaskOutcome::Running),
            "SUCCESS" => Ok(TaskOutcome::Success),
            "ERROR" => Ok(TaskOutcome::Error),
            other => Err(ParseOutcomeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_round_trip() {
        for outcome in [TaskOutcome::Running, TaskOutcome::Success, TaskOutcome::Error] {
            assert_eq!(outcome.as_str().parse::<TaskOutcome>().unwrap(), outcome);
        }
        assert!("PENDING".parse::<TaskOutcome>().is_err());
    }
}
