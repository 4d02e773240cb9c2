//! Turns parsed [`GlobalArgs`] into everything a command handler needs:
//! the discovered workspace and config, a real [`Capabilities`] wired up
//! with network/disk/event capabilities, and the pieces the
//! [`DockerRuntime`](crate::runtime::DockerRuntime) adapter is built from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use devcontainer_config::DevContainerConfig;
use devcontainer_core::Capabilities;
use devcontainer_events::{CoreEvent, EventLog, LogSink};
use devcontainer_fetch::FeatureFetcher;
use devcontainer_oci::ReqwestHttpClient;
use devcontainer_secret_mask::SecretMasker;
use devcontainer_types::{CoreError, CoreResult, LockMode};
use devcontainer_workspace::{HostPlatform, StdFileSystem};

use crate::args::{GlobalArgs, LogFormat, LogLevel};

/// Known config locations, checked in order, matching the two filenames
/// the original tool accepts.
const CONFIG_CANDIDATES: [&str; 2] = [".devcontainer/devcontainer.json", ".devcontainer.json"];

pub struct AppContext {
    pub workspace_path: PathBuf,
    pub config: DevContainerConfig,
    pub user_data_folder: PathBuf,
    pub docker_path: String,
    pub docker_compose_path: String,
    pub event_log: Arc<Mutex<EventLog>>,
    pub log_sink: Arc<dyn LogSink>,
}

impl AppContext {
    pub fn build(global: &GlobalArgs) -> CoreResult<Self> {
        let workspace_path = global
            .workspace_folder
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let config_path = match &global.config {
            Some(path) => path.clone(),
            None => discover_config(&workspace_path)?,
        };
        let config = devcontainer_config::read_from_path(&config_path)?;

        let user_data_folder = global
            .user_data_folder
            .clone()
            .unwrap_or_else(|| workspace_path.join(".devcontainer-rs"));

        let event_log = Arc::new(Mutex::new(EventLog::new()));
        let text_sink = TextLogSink {
            format: global.log_format,
            level: global.log_level,
        };
        let log_sink: Arc<dyn LogSink> = Arc::new(BroadcastLogSink {
            event_log: event_log.clone(),
            text: text_sink,
        });

        Ok(Self {
            workspace_path,
            config,
            user_data_folder,
            docker_path: global.docker_path.clone(),
            docker_compose_path: global.docker_compose_path.clone(),
            event_log,
            log_sink,
        })
    }

    /// Where the experimental lockfile lives for this workspace, regardless
    /// of whether lockfile handling is currently enabled.
    pub fn lockfile_path(&self) -> PathBuf {
        self.user_data_folder.join("devcontainer-lock.json")
    }

    /// Builds the [`Capabilities`] `assemble` needs, reading an existing
    /// lockfile and secrets file from disk as needed.
    pub fn capabilities(&self, global: &GlobalArgs) -> CoreResult<Capabilities> {
        let cache_dir = self.user_data_folder.join("feature-cache");
        let http = Arc::new(
            ReqwestHttpClient::new().map_err(|e| CoreError::network("oci", e.to_string()))?,
        );

        let lock_mode = if global.experimental_frozen_lockfile {
            LockMode::Frozen
        } else {
            LockMode::Write
        };

        let lockfile_path = self.lockfile_path();
        let existing_lockfile =
            if global.experimental_lockfile || global.experimental_frozen_lockfile {
                devcontainer_lockfile::read(&lockfile_path)?
            } else {
                None
            };

        Ok(Capabilities {
            fetcher: FeatureFetcher::new(http, cache_dir),
            fs: Arc::new(StdFileSystem),
            log: self.log_sink.clone(),
            platform: HostPlatform::current(),
            mount_workspace_git_root: false,
            mount_git_worktree_common_dir: false,
            lock_mode,
            existing_lockfile,
            lockfile_path: if global.experimental_lockfile || global.experimental_frozen_lockfile {
                Some(lockfile_path)
            } else {
                None
            },
            local_env: std::env::vars().collect::<BTreeMap<_, _>>(),
        })
    }

    pub fn secret_masker(&self, global: &GlobalArgs) -> CoreResult<SecretMasker> {
        match &global.secrets_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    CoreError::bad_config(format!(
                        "failed to read secrets file {}: {e}",
                        path.display()
                    ))
                })?;
                Ok(SecretMasker::new(raw.lines().map(str::trim)))
            }
            None => Ok(SecretMasker::empty()),
        }
    }

    /// Persists this run's event log to `<user-data-folder>/devcontainer-events.jsonl`.
    pub fn flush_events(&self) -> CoreResult<()> {
        let path = devcontainer_events::events_path(&self.user_data_folder);
        let log = self.event_log.lock().expect("event log mutex poisoned");
        log.write_to_file(&path)
            .map_err(|e| CoreError::internal(format!("failed to write event log: {e}")))
    }
}

fn discover_config(workspace_path: &Path) -> CoreResult<PathBuf> {
    for candidate in CONFIG_CANDIDATES {
        let path = workspace_path.join(candidate);
        if path.is_file() {
            return Ok(path);
        }
    }
    Err(CoreError::config_not_found(
        workspace_path.join(CONFIG_CANDIDATES[0]).display(),
    ))
}

/// Prints events to stderr, `[level] message` for text, one JSON object per
/// line for `--log-format json` — mirroring the event-reporting style the
/// lifecycle `CommandLogger` seam already uses, just backed by stderr
/// instead of a capturing test double.
struct TextLogSink {
    format: LogFormat,
    level: LogLevel,
}

impl TextLogSink {
    fn should_emit(&self, kind: &devcontainer_events::CoreEventKind) -> bool {
        use devcontainer_events::CoreEventKind::*;
        match kind {
            Warning { .. } | LifecycleCommandStarted { .. } | LifecycleCommandFinished { .. } => true,
            _ => !matches!(self.level, LogLevel::Info),
        }
    }

    fn describe(kind: &devcontainer_events::CoreEventKind) -> String {
        use devcontainer_events::CoreEventKind::*;
        match kind {
            FetchStarted { id } => format!("fetching {id}"),
            FetchCompleted { id, digest } => format!("fetched {id} ({digest})"),
            FetchDeduplicated { id } => format!("reusing cached fetch of {id}"),
            ResolverNodeExpanded { id } => format!("resolved {id}"),
            ResolverOrderComputed { order } => format!("install order: {}", order.join(", ")),
            VersionResolved { id, tag } => format!("resolved {id} to {tag}"),
            LockfileWritten { path } => format!("wrote lockfile to {path}"),
            LockfileFrozenMismatch { id } => format!("frozen lockfile mismatch for {id}"),
            LifecycleCommandStarted { stage, masked_command } => {
                format!("[{}] running: {masked_command}", stage.as_str())
            }
            LifecycleCommandFinished { stage, exit_code } => {
                format!("[{}] finished (exit {exit_code})", stage.as_str())
            }
            LifecycleStageSkipped { stage, reason } => {
                format!("[{}] skipped: {reason}", stage.as_str())
            }
            MountResolved { workspace_folder, workspace_mount } => {
                format!("mounting {workspace_mount} at {workspace_folder}")
            }
            Warning { message } => format!("warning: {message}"),
        }
    }
}

impl LogSink for TextLogSink {
    fn emit(&self, event: CoreEvent) {
        if !self.should_emit(&event.kind) {
            return;
        }
        match self.format {
            LogFormat::Json => {
                if let Ok(line) = serde_json::to_string(&event) {
                    eprintln!("{line}");
                }
            }
            LogFormat::Text => eprintln!("{}", Self::describe(&event.kind)),
        }
    }
}

/// Fans every event out to the stderr text sink and the in-memory
/// [`EventLog`] that eventually gets flushed to disk.
struct BroadcastLogSink {
    event_log: Arc<Mutex<EventLog>>,
    text: TextLogSink,
}

impl LogSink for BroadcastLogSink {
    fn emit(&self, event: CoreEvent) {
        self.text.emit(event.clone());
        self.event_log
            .lock()
            .expect("event log mutex poisoned")
            .record(event);
    }
}
