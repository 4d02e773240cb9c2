//! Docker-backed [`ContainerRuntime`]/[`CommandRunner`] adapter: the
//! concrete capability the core's trait-only seams are wired up against in
//! this binary. Shells out to `--docker-path`/`--docker-compose-path` via
//! `devcontainer-process`, the same subprocess layer the lifecycle runner
//! already expects a `CommandRunner` to be built on.

use std::path::{Path, PathBuf};

use devcontainer_config::BaseImage;
use devcontainer_core::ContainerRuntime;
use devcontainer_lifecycle::CommandRunner;
use devcontainer_process::{run_command_with_timeout, CancellationToken, CommandOutput, DEFAULT_KILL_GRACE_PERIOD};
use devcontainer_types::{CommandSpec, CoreError, CoreResult, InstallPlan, SimpleCommand, Stage};

fn run_docker(
    docker_path: &str,
    args: &[&str],
    cwd: &Path,
    cancel: &CancellationToken,
) -> CoreResult<CommandOutput> {
    run_command_with_timeout(docker_path, args, cwd, None, Some(cancel), DEFAULT_KILL_GRACE_PERIOD)
        .map_err(|e| CoreError::runtime_failure(e.to_string()))
}

fn display_command(command: &CommandSpec) -> String {
    match command {
        CommandSpec::Single(s) => s.clone(),
        CommandSpec::Argv(argv) => argv.join(" "),
        CommandSpec::Named(map) => map
            .values()
            .map(|c| match c {
                SimpleCommand::Single(s) => s.clone(),
                SimpleCommand::Argv(a) => a.join(" "),
            })
            .collect::<Vec<_>>()
            .join(" && "),
    }
}

fn image_tag_for(workspace_path: &Path) -> String {
    let digest = devcontainer_oci::sha256_digest(workspace_path.display().to_string().as_bytes());
    let short = digest.trim_start_matches("sha256:").chars().take(12).collect::<String>();
    format!("devcontainer-rs/{short}:latest")
}

/// Drives `docker build`/`docker run`/`docker exec` (or `docker compose`
/// for a compose-based config) against an assembled [`InstallPlan`].
pub struct DockerRuntime {
    docker_path: String,
    docker_compose_path: String,
    workspace_path: PathBuf,
    base: BaseImage,
    cancel: CancellationToken,
}

impl DockerRuntime {
    pub fn new(
        docker_path: String,
        docker_compose_path: String,
        workspace_path: PathBuf,
        base: BaseImage,
    ) -> Self {
        Self {
            docker_path,
            docker_compose_path,
            workspace_path,
            base,
            cancel: CancellationToken::new(),
        }
    }

    /// Shares this runtime's cancellation flag, so a Ctrl-C handler
    /// installed by `main` can stop an in-flight build/up/exec.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// A [`CommandRunner`] scoped to one already-started container, for the
    /// lifecycle scheduler to drive `onCreateCommand`..`postAttachCommand`
    /// through `docker exec`.
    pub fn command_runner(&self, container_id: &str) -> ContainerCommandRunner {
        ContainerCommandRunner {
            docker_path: self.docker_path.clone(),
            workspace_path: self.workspace_path.clone(),
            container_id: container_id.to_string(),
            cancel: self.cancel.clone(),
        }
    }

    fn run(&self, args: &[&str]) -> CoreResult<CommandOutput> {
        run_docker(&self.docker_path, args, &self.workspace_path, &self.cancel)
    }
}

impl ContainerRuntime for DockerRuntime {
    fn build(&self, _plan: &InstallPlan) -> CoreResult<String> {
        match &self.base {
            // Feature installation in this design runs through the lifecycle
            // scheduler after the container starts, not as Dockerfile
            // layers, so building an `image` base is just naming it.
            BaseImage::Image { image } => Ok(image.clone()),
            BaseImage::Dockerfile { docker_file, build } => {
                let dockerfile_path = self.workspace_path.join(".devcontainer").join(docker_file);
                let dockerfile_path = dockerfile_path
                    .to_str()
                    .ok_or_else(|| CoreError::runtime_failure("Dockerfile path is not valid UTF-8"))?
                    .to_string();
                let image_tag = image_tag_for(&self.workspace_path);
                let context_dir = self
                    .workspace_path
                    .to_str()
                    .ok_or_else(|| CoreError::runtime_failure("workspace path is not valid UTF-8"))?;

                let mut args = vec!["build", "-t", image_tag.as_str(), "-f", dockerfile_path.as_str()];
                if let Some(target) = &build.target {
                    args.push("--target");
                    args.push(target);
                }
                if let Some(platform) = &build.platform {
                    args.push("--platform");
                    args.push(platform);
                }
                args.push(context_dir);

                let output = self.run(&args)?;
                if output.exit_code != 0 {
                    return Err(CoreError::runtime_failure(format!(
                        "docker build failed with exit code {}: {}",
                        output.exit_code, output.stderr
                    )));
                }
                Ok(image_tag)
            }
            BaseImage::Compose { docker_compose_file, service, .. } => {
                let file = match docker_compose_file {
                    devcontainer_config::ComposeFileRef::Single(f) => f.clone(),
                    devcontainer_config::ComposeFileRef::Multiple(files) => {
                        files.first().cloned().unwrap_or_default()
                    }
                };
                let compose_path = self.workspace_path.join(".devcontainer").join(&file);
                let compose_path = compose_path
                    .to_str()
                    .ok_or_else(|| CoreError::runtime_failure("compose file path is not valid UTF-8"))?
                    .to_string();
                let output = run_docker(
                    &self.docker_compose_path,
                    &["-f", compose_path.as_str(), "build", service.as_str()],
                    &self.workspace_path,
                    &self.cancel,
                )?;
                if output.exit_code != 0 {
                    return Err(CoreError::runtime_failure(format!(
                        "docker-compose build failed with exit code {}: {}",
                        output.exit_code, output.stderr
                    )));
                }
                Ok(service.clone())
            }
        }
    }

    fn up(&self, plan: &InstallPlan, image_id: &str) -> CoreResult<String> {
        if let BaseImage::Compose { docker_compose_file, service, .. } = &self.base {
            let file = match docker_compose_file {
                devcontainer_config::ComposeFileRef::Single(f) => f.clone(),
                devcontainer_config::ComposeFileRef::Multiple(files) => {
                    files.first().cloned().unwrap_or_default()
                }
            };
            let compose_path = self.workspace_path.join(".devcontainer").join(&file);
            let compose_path = compose_path
                .to_str()
                .ok_or_else(|| CoreError::runtime_failure("compose file path is not valid UTF-8"))?
                .to_string();
            let output = run_docker(
                &self.docker_compose_path,
                &["-f", compose_path.as_str(), "up", "-d", service.as_str()],
                &self.workspace_path,
                &self.cancel,
            )?;
            if output.exit_code != 0 {
                return Err(CoreError::runtime_failure(format!(
                    "docker-compose up failed with exit code {}: {}",
                    output.exit_code, output.stderr
                )));
            }
            let ps = run_docker(
                &self.docker_compose_path,
                &["-f", compose_path.as_str(), "ps", "-q", service.as_str()],
                &self.workspace_path,
                &self.cancel,
            )?;
            return Ok(ps.stdout.trim().to_string());
        }

        let mount = plan.workspace_mount.clone().unwrap_or_else(|| {
            format!(
                "type=bind,source={},target={}",
                self.workspace_path.display(),
                plan.workspace_folder
            )
        });
        let env_args: Vec<String> = plan
            .container_env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        let mut args: Vec<&str> = vec!["run", "-d", "--mount", mount.as_str()];
        for e in &env_args {
            args.push("-e");
            args.push(e);
        }
        args.push(image_id);
        args.push("sleep");
        args.push("infinity");

        let output = self.run(&args)?;
        if output.exit_code != 0 {
            return Err(CoreError::runtime_failure(format!(
                "docker run failed with exit code {}: {}",
                output.exit_code, output.stderr
            )));
        }
        Ok(output.stdout.trim().to_string())
    }

    fn exec(&self, container_id: &str, command: &CommandSpec) -> CoreResult<i32> {
        let line = display_command(command);
        let output = self.run(&["exec", container_id, "sh", "-c", line.as_str()])?;
        Ok(output.exit_code)
    }
}

/// A [`CommandRunner`] bound to one container, driving the lifecycle
/// scheduler's commands through `docker exec`.
pub struct ContainerCommandRunner {
    docker_path: String,
    workspace_path: PathBuf,
    container_id: String,
    cancel: CancellationToken,
}

impl CommandRunner for ContainerCommandRunner {
    fn run(&self, stage: Stage, command: &CommandSpec) -> CoreResult<()> {
        let line = display_command(command);
        let output = run_docker(
            &self.docker_path,
            &["exec", self.container_id.as_str(), "sh", "-c", line.as_str()],
            &self.workspace_path,
            &self.cancel,
        )?;
        if output.exit_code != 0 {
            return Err(CoreError::lifecycle_command_failed(
                stage.as_str(),
                &line,
                Some(output.exit_code),
            ));
        }
        Ok(())
    }
}
