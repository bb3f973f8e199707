//! Credential binder
//!
//! Materializes a project's bound credentials plus any trigger context
//! into the transient environment file consumed by the build stage.
//! Bindings referencing a missing credential are dropped silently.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

use racs_core::domain::credential::Credential;
use racs_core::domain::project::Project;
use racs_core::domain::request::TriggerPayload;

use crate::layout::Layout;

pub fn write_environment(
    layout: &Layout,
    project: &Project,
    credentials: &HashMap<i64, Credential>,
    trigger: Option<&TriggerPayload>,
) -> io::Result<PathBuf> {
    let path = layout.environment_file(project.id);
    let mut out = String::new();
    if let Some(trigger) = trigger {
        let _ = writeln!(out, "RACS_TRIGGER={}", trigger.tag);
        let _ = writeln!(out, "RACS_VERSION={}", trigger.version);
        let _ = writeln!(out, "RACS_TRIGGER_URL={}", trigger.url);
        let _ = writeln!(out, "RACS_TRIGGER_BRANCH={}", trigger.branch);
        let _ = writeln!(out, "RACS_TRIGGER_COMMIT={}", trigger.commit);
        let _ = writeln!(out, "RACS_TRIGGER_TAG={}", trigger.tag);
        let _ = writeln!(out, "RACS_TRIGGER_PROJECT={}", trigger.project);
        let _ = writeln!(out, "RACS_TRIGGER_REGISTRY={}", trigger.registry);
    }
    for (name, credential_id) in &project.environment {
        if let Some(credential) = credentials.get(credential_id) {
            let _ = writeln!(out, "{}={}", name, credential.value);
        }
    }
    std::fs::write(&path, out)?;
    Ok(path)
}
