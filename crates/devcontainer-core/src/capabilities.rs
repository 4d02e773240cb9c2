//! Capability seams the Plan Assembler is wired up with. Every one of
//! these is a trait (or a thin struct over one) so `assemble` can be
//! exercised against fakes instead of real network, disk, or subprocess
//! access.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use devcontainer_events::LogSink;
use devcontainer_fetch::FeatureFetcher;
use devcontainer_types::{CommandSpec, CoreResult, InstallPlan, Lockfile, LockMode};
use devcontainer_workspace::{FileSystem, HostPlatform};

/// Drives the actual container engine (docker/podman/compose) from an
/// assembled [`InstallPlan`]. Deliberately trait-only: invoking a real
/// runtime is out of scope here, left to the CLI adapter that implements
/// this against a chosen `--docker-path`/`--docker-compose-path`.
pub trait ContainerRuntime: Send + Sync {
    /// Builds (or pulls) the base image and applies every planned
    /// Feature's install layer, returning the built image id.
    fn build(&self, plan: &InstallPlan) -> CoreResult<String>;

    /// Brings up (or reuses) a container from a built image, returning the
    /// container id.
    fn up(&self, plan: &InstallPlan, image_id: &str) -> CoreResult<String>;

    /// Runs one command inside an already-running container.
    fn exec(&self, container_id: &str, command: &CommandSpec) -> CoreResult<i32>;
}

/// Everything `assemble` needs beyond the parsed config and workspace
/// path: where to fetch Features from, how to read the filesystem, where
/// structured events go, and the policy knobs that change plan shape
/// (lock mode, mount flags, the caller's environment for `${localEnv:...}`).
pub struct Capabilities {
    pub fetcher: FeatureFetcher,
    pub fs: Arc<dyn FileSystem>,
    pub log: Arc<dyn LogSink>,
    pub platform: HostPlatform,
    pub mount_workspace_git_root: bool,
    pub mount_git_worktree_common_dir: bool,
    pub lock_mode: LockMode,
    pub existing_lockfile: Option<Lockfile>,
    pub lockfile_path: Option<PathBuf>,
    pub local_env: BTreeMap<String, String>,
}
