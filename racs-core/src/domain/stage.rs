//! Stage machine vocabulary
//!
//! A project advances through a fixed pipeline of stages. Every stage has
//! three observable outcomes (running, error, success); a project's state
//! is the pair, plus the `NONE` initial state and the `CREATE_SUCCESS`
//! pseudo-state that bootstraps a freshly created project into its first
//! clean/clone cycle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Clean,
    Clone,
    Prepare,
    Pull,
    Build,
    Prepackage,
    Package,
    Push,
    Tag,
    Delete,
}

impl Stage {
    /// Lowercase token used by webhooks and trigger definitions
    pub fn token(&self) -> &'static str {
        match self {
            Stage::Clean => "clean",
            Stage::Clone => "clone",
            Stage::Prepare => "prepare",
            Stage::Pull => "pull",
            Stage::Build => "build",
            Stage::Prepackage => "prepackage",
            Stage::Package => "package",
            Stage::Push => "push",
            Stage::Tag => "tag",
            Stage::Delete => "delete",
        }
    }

    /// Gerund form, used for in-progress states and task kinds
    pub fn running_name(&self) -> &'static str {
        match self {
            Stage::Clean => "CLEANING",
            Stage::Clone => "CLONING",
            Stage::Prepare => "PREPARING",
            Stage::Pull => "PULLING",
            Stage::Build => "BUILDING",
            Stage::Prepackage => "PREPACKAGING",
            Stage::Package => "PACKAGING",
            Stage::Push => "PUSHING",
            Stage::Tag => "TAGGING",
            Stage::Delete => "DELETING",
        }
    }

    /// Upper-case stem used in error/success state names
    pub fn stem(&self) -> &'static str {
        match self {
            Stage::Clean => "CLEAN",
            Stage::Clone => "CLONE",
            Stage::Prepare => "PREPARE",
            Stage::Pull => "PULL",
            Stage::Build => "BUILD",
            Stage::Prepackage => "PREPACKAGE",
            Stage::Package => "PACKAGE",
            Stage::Push => "PUSH",
            Stage::Tag => "TAG",
            Stage::Delete => "DELETE",
        }
    }

    /// All stages in pipeline order
    pub fn all() -> [Stage; 10] {
        [
            Stage::Clean,
            Stage::Clone,
            Stage::Prepare,
            Stage::Pull,
            Stage::Build,
            Stage::Prepackage,
            Stage::Package,
            Stage::Push,
            Stage::Tag,
            Stage::Delete,
        ]
    }
}

/// Unknown stage token
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown stage: {0}")]
pub struct ParseStageError(pub String);

impl FromStr for Stage {
    type Err = ParseStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::all()
            .into_iter()
            .find(|stage| stage.token() == s)
            .ok_or_else(|| ParseStageError(s.to_string()))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Outcome of a stage execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Running,
    Error,
    Success,
}

/// Observable state of a project
///
/// The canonical string forms are the persistence strings (`CLEANING`,
/// `CLEAN_ERROR`, `CLEAN_SUCCESS`, ...) and round-trip through
/// `Display`/`FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectState {
    None,
    CreateSuccess,
    Stage(Stage, Outcome),
}

impl fmt::Display for ProjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectState::None => f.write_str("NONE"),
            ProjectState::CreateSuccess => f.write_str("CREATE_SUCCESS"),
            ProjectState::Stage(stage, Outcome::Running) => f.write_str(stage.running_name()),
            ProjectState::Stage(stage, Outcome::Error) => {
                write!(f, "{}_ERROR", stage.stem())
            }
            ProjectState::Stage(stage, Outcome::Success) => {
                write!(f, "{}_SUCCESS", stage.stem())
            }
        }
    }
}

/// Unknown project state name
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown project state: {0}")]
pub struct ParseStateError(pub String);

impl FromStr for ProjectState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "NONE" {
            return Ok(ProjectState::None);
        }
        if s == "CREATE_SUCCESS" {
            return Ok(ProjectState::CreateSuccess);
        }
        for stage in Stage::all() {
            if s == stage.running_name() {
                return Ok(ProjectState::Stage(stage, Outcome::Running));
            }
        }
        if let Some(stem) = s.strip_suffix("_ERROR") {
            if let Some(stage) = Stage::all().into_iter().find(|stage| stage.stem() == stem) {
                return Ok(ProjectState::Stage(stage, Outcome::Error));
            }
        }
        if let Some(stem) = s.strip_suffix("_SUCCESS") {
            if let Some(stage) = Stage::all().into_iter().find(|stage| stage.stem() == stem) {
                return Ok(ProjectState::Stage(stage, Outcome::Success));
            }
        }
        Err(ParseStateError(s.to_string()))
    }
}

impl Serialize for ProjectState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_token_round_trip() {
        for stage in Stage::all() {
            assert_eq!(stage.token().parse::<Stage>().unwrap(), stage);
        }
    }

    #[test]
    fn test_unknown_stage_rejected() {
        assert!("deploy".parse::<Stage>().is_err());
        assert!("".parse::<Stage>().is_err());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(
            ProjectState::Stage(Stage::Clean, Outcome::Running).to_string(),
            "CLEANING"
        );
        assert_eq!(
            ProjectState::Stage(Stage::Prepackage, Outcome::Error).to_string(),
            "PREPACKAGE_ERROR"
        );
        assert_eq!(
            ProjectState::Stage(Stage::Tag, Outcome::Success).to_string(),
            "TAG_SUCCESS"
        );
        assert_eq!(ProjectState::None.to_string(), "NONE");
        assert_eq!(ProjectState::CreateSuccess.to_string(), "CREATE_SUCCESS");
    }

    #[test]
    fn test_state_round_trip() {
        let mut names = vec!["NONE".to_string(), "CREATE_SUCCESS".to_string()];
        for stage in Stage::all() {
            for outcome in [Outcome::Running, Outcome::Error, Outcome::Success] {
                names.push(ProjectState::Stage(stage, outcome).to_string());
            }
        }
        for name in names {
            let state: ProjectState = name.parse().unwrap();
            assert_eq!(state.to_string(), name);
        }
    }

    #[test]
    fn test_unknown_state_rejected() {
        assert!("DEPLOY_SUCCESS".parse::<ProjectState>().is_err());
        assert!("cleaning".parse::<ProjectState>().is_err());
    }
}
