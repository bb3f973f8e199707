//! On-disk layout
//!
//! Every project owns a directory tree with fixed sub-paths under the
//! data root: `projects/<id>/{context,workspace,workspace/source}` with
//! recipe files at the project root. Every task owns
//! `tasks/<id>/out.log`.

use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.to_path_buf(),
        }
    }

    /// Creates the top-level directories
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.projects_root())?;
        std::fs::create_dir_all(self.tasks_root())?;
        Ok(())
    }

    pub fn projects_root(&self) -> PathBuf {
        self.root.join("projects")
    }

    pub fn project_root(&self, id: i64) -> PathBuf {
        self.projects_root().join(id.to_string())
    }

    pub fn context_dir(&self, id: i64) -> PathBuf {
        self.project_root(id).join("context")
    }

    pub fn workspace_dir(&self, id: i64) -> PathBuf {
        self.project_root(id).join("workspace")
    }

    pub fn source_dir(&self, id: i64) -> PathBuf {
        self.workspace_dir(id).join("source")
    }

    pub fn recipe_path(&self, id: i64, name: &str) -> PathBuf {
        self.project_root(id).join(name)
    }

    pub fn environment_file(&self, id: i64) -> PathBuf {
        self.project_root(id).join("environment")
    }

    /// Creates a project's directory tree (the source checkout itself is
    /// created by the clone stage)
    pub fn ensure_project(&self, id: i64) -> io::Result<()> {
        std::fs::create_dir_all(self.context_dir(id))?;
        std::fs::create_dir_all(self.workspace_dir(id))?;
        Ok(())
    }

    pub fn tasks_root(&self) -> PathBuf {
        self.root.join("tasks")
    }

    pub fn task_dir(&self, task_id: i64) -> PathBuf {
        self.tasks_root().join(task_id.to_string())
    }

    pub fn task_log(&self, task_id: i64) -> PathBuf {
        self.task_dir(task_id).join("out.log")
    }

}

/// Normalizes a caller-supplied relative file name, rejecting anything
/// that would escape the project root.
pub fn clean_relative(name: &str) -> Option<String> {
    let path = Path::new(name);
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_paths() {
        let layout = Layout::new(Path::new("/data"));
        assert_eq!(
            layout.source_dir(3),
            PathBuf::from("/data/projects/3/workspace/source")
        );
        assert_eq!(
            layout.recipe_path(3, "BuildSpec"),
            PathBuf::from("/data/projects/3/BuildSpec")
        );
        assert_eq!(layout.task_log(17), PathBuf::from("/data/tasks/17/out.log"));
    }

    #[test]
    fn test_clean_relative() {
        assert_eq!(clean_relative("BuildSpec"), Some("BuildSpec".to_string()));
        assert_eq!(
            clean_relative("./docker/Spec"),
            Some("docker/Spec".to_string())
        );
        assert_eq!(clean_relative("../etc/passwd"), None);
        assert_eq!(clean_relative("/etc/passwd"), None);
        assert_eq!(clean_relative(""), None);
        assert_eq!(clean_relative("."), None);
    }
}
