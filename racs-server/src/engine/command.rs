//! Stage-to-command mapping
//!
//! Every stage resolves to one external command invocation. The image
//! naming scheme ties the stages together: the prepare stage produces
//! `builder-<id>`, prepackage produces `prepackage-<id>` and package
//! produces `package-<id>`, which is also what dependent projects
//! consume through `--from`.

use std::path::Path;

use racs_core::domain::project::Project;

use crate::config::Config;
use crate::layout::Layout;

/// A resolved command: program plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    fn new(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
        }
    }

    /// Rendered command line, written as the log header
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

fn path_arg(path: impl AsRef<Path>) -> String {
    path.as_ref().display().to_string()
}

pub fn clean(config: &Config, layout: &Layout, id: i64) -> CommandSpec {
    CommandSpec::new(
        &config.rm_tool,
        vec!["-rfv".to_string(), path_arg(layout.source_dir(id))],
    )
}

pub fn clone(config: &Config, layout: &Layout, id: i64, branch: &str, url: &str) -> CommandSpec {
    CommandSpec::new(
        &config.git_tool,
        vec![
            "clone".to_string(),
            "-v".to_string(),
            "--recursive".to_string(),
            "-b".to_string(),
            branch.to_string(),
            url.to_string(),
            path_arg(layout.source_dir(id)),
        ],
    )
}

pub fn prepare(config: &Config, layout: &Layout, project: &Project) -> CommandSpec {
    let mut args = vec![
        "build".to_string(),
        "--pull=newer".to_string(),
        "--squash".to_string(),
        "-f".to_string(),
        path_arg(layout.recipe_path(project.id, &project.build_spec)),
        "-t".to_string(),
        format!("builder-{}", project.id),
    ];
    if let Some(dep) = project.prepare_dep {
        args.push("--from".to_string());
        args.push(format!("package-{}", dep));
    }
    args.push(path_arg(layout.context_dir(project.id)));
    CommandSpec::new(&config.container_tool, args)
}

pub fn pull(config: &Config, layout: &Layout, id: i64) -> CommandSpec {
    CommandSpec::new(
        &config.git_tool,
        vec![
            "-C".to_string(),
            path_arg(layout.source_dir(id)),
            "pull".to_string(),
            "--recurse-submodules".to_string(),
        ],
    )
}

pub fn build(config: &Config, layout: &Layout, id: i64, env_file: &Path) -> CommandSpec {
    CommandSpec::new(
        &config.container_tool,
        vec![
            "run".to_string(),
            "--network=host".to_string(),
            "--rm=true".to_string(),
            "--env-file".to_string(),
            path_arg(env_file),
            "-v".to_string(),
            format!("{}:/workspace", path_arg(layout.workspace_dir(id))),
            "--read-only".to_string(),
            format!("builder-{}", id),
        ],
    )
}

pub fn prepackage(config: &Config, layout: &Layout, project: &Project) -> CommandSpec {
    let mut args = vec![
        "build".to_string(),
        "--pull=newer".to_string(),
        "--layers".to_string(),
        "--cache-ttl=24h".to_string(),
        "-f".to_string(),
        path_arg(layout.recipe_path(project.id, &project.prepackage_spec)),
        "-t".to_string(),
        format!("prepackage-{}", project.id),
    ];
    if let Some(dep) = project.prepackage_dep {
        args.push("--from".to_string());
        args.push(format!("package-{}", dep));
    }
    args.push(path_arg(layout.workspace_dir(project.id)));
    CommandSpec::new(&config.container_tool, args)
}

pub fn package(config: &Config, layout: &Layout, project: &Project) -> CommandSpec {
    let mut args = vec![
        "build".to_string(),
        "-v".to_string(),
        format!("{}:/workspace", path_arg(layout.workspace_dir(project.id))),
        "--pull=newer".to_string(),
        "--squash".to_string(),
        "-f".to_string(),
        path_arg(layout.recipe_path(project.id, &project.package_spec)),
        "-t".to_string(),
        format!("package-{}", project.id),
    ];
    if let Some(dep) = project.package_dep {
        args.push("--from".to_string());
        args.push(format!("package-{}", dep));
    } else if !project.prepackage_spec.is_empty() {
        args.push("--from".to_string());
        args.push(format!("prepackage-{}", project.id));
    }
    args.push(path_arg(layout.context_dir(project.id)));
    CommandSpec::new(&config.container_tool, args)
}

pub fn push(config: &Config, id: i64, registry_url: &str, resolved_tag: &str) -> CommandSpec {
    CommandSpec::new(
        &config.container_tool,
        vec![
            "push".to_string(),
            format!("package-{}", id),
            format!("{}/{}", registry_url, resolved_tag),
        ],
    )
}

/// The repository tag is the substring after the last `:` of the
/// resolved destination tag (or the whole tag when it has no colon).
pub fn tag_suffix(resolved_tag: &str) -> &str {
    resolved_tag
        .rfind(':')
        .map(|i| &resolved_tag[i + 1..])
        .unwrap_or(resolved_tag)
}

pub fn tag(config: &Config, layout: &Layout, id: i64, resolved_tag: &str) -> CommandSpec {
    CommandSpec::new(
        &config.git_tool,
        vec![
            "-C".to_string(),
            path_arg(layout.source_dir(id)),
            "push".to_string(),
            "origin".to_string(),
            tag_suffix(resolved_tag).to_string(),
        ],
    )
}

pub fn delete(config: &Config, layout: &Layout, id: i64) -> CommandSpec {
    CommandSpec::new(
        &config.rm_tool,
        vec!["-vrf".to_string(), path_arg(layout.project_root(id))],
    )
}

pub fn git_tag_version(config: &Config, layout: &Layout, id: i64, version: i64) -> CommandSpec {
    CommandSpec::new(
        &config.git_tool,
        vec![
            "-C".to_string(),
            path_arg(layout.source_dir(id)),
            "tag".to_string(),
            format!("r{}", version),
        ],
    )
}

pub fn rev_parse_head(config: &Config, layout: &Layout, id: i64) -> CommandSpec {
    CommandSpec::new(
        &config.git_tool,
        vec![
            "-C".to_string(),
            path_arg(layout.source_dir(id)),
            "rev-parse".to_string(),
            "HEAD".to_string(),
        ],
    )
}

pub fn set_remote(config: &Config, layout: &Layout, id: i64, url: &str) -> CommandSpec {
    CommandSpec::new(
        &config.git_tool,
        vec![
            "-C".to_string(),
            path_arg(layout.source_dir(id)),
            "remote".to_string(),
            "set-url".to_string(),
            "origin".to_string(),
            url.to_string(),
        ],
    )
}

pub fn prune_images(config: &Config) -> CommandSpec {
    CommandSpec::new(
        &config.container_tool,
        vec![
            "image".to_string(),
            "prune".to_string(),
            "-f".to_string(),
            "--filter".to_string(),
            "until=5m".to_string(),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture() -> (Config, Layout, Project) {
        let config = Config {
            no_login: true,
            ..Config::default()
        };
        let layout = Layout::new(&PathBuf::from("/data"));
        let project = Project::new(
            4,
            "lib".to_string(),
            "https://example.com/lib.git".to_string(),
            "main".to_string(),
            String::new(),
        );
        (config, layout, project)
    }

    #[test]
    fn test_clean_command() {
        let (config, layout, project) = fixture();
        let spec = clean(&config, &layout, project.id);
        assert_eq!(spec.program, "rm");
        assert_eq!(spec.args, vec!["-rfv", "/data/projects/4/workspace/source"]);
    }

    #[test]
    fn test_clone_command() {
        let (config, layout, project) = fixture();
        let spec = clone(&config, &layout, project.id, "main", &project.url);
        assert_eq!(
            spec.args,
            vec![
                "clone",
                "-v",
                "--recursive",
                "-b",
                "main",
                "https://example.com/lib.git",
                "/data/projects/4/workspace/source",
            ]
        );
    }

    #[test]
    fn test_prepare_command_without_dependency() {
        let (config, layout, project) = fixture();
        let spec = prepare(&config, &layout, &project);
        assert_eq!(spec.program, "podman");
        assert_eq!(
            spec.args,
            vec![
                "build",
                "--pull=newer",
                "--squash",
                "-f",
                "/data/projects/4/BuildSpec",
                "-t",
                "builder-4",
                "/data/projects/4/context",
            ]
        );
    }

    #[test]
    fn test_prepare_command_with_dependency() {
        let (config, layout, mut project) = fixture();
        project.prepare_dep = Some(9);
        let spec = prepare(&config, &layout, &project);
        assert!(spec
            .args
            .windows(2)
            .any(|w| w == ["--from".to_string(), "package-9".to_string()]));
        assert_eq!(spec.args.last().unwrap(), "/data/projects/4/context");
    }

    #[test]
    fn test_build_command() {
        let (config, layout, project) = fixture();
        let spec = build(
            &config,
            &layout,
            project.id,
            &layout.environment_file(project.id),
        );
        assert_eq!(
            spec.args,
            vec![
                "run",
                "--network=host",
                "--rm=true",
                "--env-file",
                "/data/projects/4/environment",
                "-v",
                "/data/projects/4/workspace:/workspace",
                "--read-only",
                "builder-4",
            ]
        );
    }

    #[test]
    fn test_package_prefers_dependency_over_prepackage_image() {
        let (config, layout, mut project) = fixture();
        project.prepackage_spec = "PrepackageSpec".to_string();
        let spec = package(&config, &layout, &project);
        assert!(spec
            .args
            .windows(2)
            .any(|w| w == ["--from".to_string(), "prepackage-4".to_string()]));

        project.package_dep = Some(2);
        let spec = package(&config, &layout, &project);
        assert!(spec
            .args
            .windows(2)
            .any(|w| w == ["--from".to_string(), "package-2".to_string()]));
    }

    #[test]
    fn test_push_command() {
        let (config, _, project) = fixture();
        let spec = push(&config, project.id, "registry.example.com", "lib:3");
        assert_eq!(
            spec.args,
            vec!["push", "package-4", "registry.example.com/lib:3"]
        );
    }

    #[test]
    fn test_tag_suffix() {
        assert_eq!(tag_suffix("lib:3"), "3");
        assert_eq!(tag_suffix("team/lib:v2.1"), "v2.1");
        assert_eq!(tag_suffix("latest"), "latest");
    }

    #[test]
    fn test_tag_command_pushes_suffix() {
        let (config, layout, project) = fixture();
        let spec = tag(&config, &layout, project.id, "lib:3");
        assert_eq!(
            spec.args,
            vec![
                "-C",
                "/data/projects/4/workspace/source",
                "push",
                "origin",
                "3",
            ]
        );
    }

    #[test]
    fn test_command_line_rendering() {
        let (config, layout, project) = fixture();
        let spec = clean(&config, &layout, project.id);
        assert_eq!(
            spec.command_line(),
            "rm -rfv /data/projects/4/workspace/source"
        );
    }
}
