//! Task executor
//!
//! Runs one resolved command to completion with combined stdout/stderr
//! captured into the task's log file. The log opens with the command
//! line rendered in bold so log viewers can separate invocation from
//! output.

use std::fs::File;
use std::io::Write as _;
use std::process::Stdio;

use anyhow::{Context, Result};
use tracing::debug;

use crate::engine::command::CommandSpec;
use crate::layout::Layout;

/// Executes `command` for task `task_id`, returning whether it exited
/// successfully. Failure to launch is an error distinct from a non-zero
/// exit.
pub async fn run_command(layout: &Layout, task_id: i64, command: &CommandSpec) -> Result<bool> {
    let task_dir = layout.task_dir(task_id);
    std::fs::create_dir_all(&task_dir)
        .with_context(|| format!("Failed to create task directory {}", task_dir.display()))?;

    let log_path = layout.task_log(task_id);
    let mut log = File::create(&log_path)
        .with_context(|| format!("Failed to create task log {}", log_path.display()))?;
    log.write_all(b"\x1b[1m")?;
    log.write_all(command.command_line().as_bytes())?;
    log.write_all(b"\x1b[0m\n")?;

    let stdout = log
        .try_clone()
        .context("Failed to clone task log handle")?;
    let status = tokio::process::Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(log))
        .status()
        .await
        .with_context(|| format!("Failed to launch {}", command.program))?;

    debug!(
        "Task {} exited with {}",
        task_id,
        status.code().unwrap_or(-1)
    );
    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(program: &str, args: &[&str]) -> CommandSpec {
        CommandSpec {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_output_is_captured_after_bold_header() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());

        let ok = run_command(&layout, 1, &spec("sh", &["-c", "echo out; echo err >&2"]))
            .await
            .unwrap();
        assert!(ok);

        let log = std::fs::read_to_string(layout.task_log(1)).unwrap();
        assert!(log.starts_with("\x1b[1msh -c echo out; echo err >&2\x1b[0m\n"));
        assert!(log.contains("out\n"));
        assert!(log.contains("err\n"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());

        let ok = run_command(&layout, 2, &spec("sh", &["-c", "exit 3"]))
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());

        assert!(run_command(&layout, 3, &spec("/nonexistent/tool", &[]))
            .await
            .is_err());
    }
}
