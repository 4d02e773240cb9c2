//! Install plan and workspace shapes: the output of the Plan Assembler and
//! the input to the lifecycle scheduler and container runtime adapter.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::node::{CommandSpec, FeatureNode, Stage};

/// One unit of lifecycle scheduling: either a single command, or several
/// commands meant to run concurrently (a `CommandSpec::Named` map expands
/// into exactly one `CommandBatch` with `len() > 1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBatch {
    pub commands: Vec<CommandSpec>,
}

impl CommandBatch {
    pub fn single(spec: CommandSpec) -> Self {
        Self {
            commands: vec![spec],
        }
    }

    pub fn is_concurrent(&self) -> bool {
        self.commands.len() > 1
    }
}

/// Per-stage ordered list of batches, in execution order.
pub type LifecycleSchedule = BTreeMap<Stage, Vec<CommandBatch>>;

/// One resolved, fetched Feature ready to be installed, plus its effective
/// environment inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedFeature {
    pub node: FeatureNode,
    pub tarball_path: PathBuf,
    pub env_inputs: BTreeMap<String, String>,
}

/// The fully assembled result handed to the container runtime adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallPlan {
    pub features: Vec<PlannedFeature>,
    pub workspace_folder: String,
    pub workspace_mount: Option<String>,
    pub additional_mount_string: Option<String>,
    pub lifecycle_schedule: LifecycleSchedule,
    pub container_env: BTreeMap<String, String>,
    pub remote_env: BTreeMap<String, String>,
}

impl InstallPlan {
    pub fn feature_ids(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.node.id.as_str()).collect()
    }
}

/// The resolved workspace, produced once per invocation and read-only after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub workspace_or_folder_path: PathBuf,
    pub root_folder_path: PathBuf,
    pub config_folder_path: PathBuf,
    pub is_workspace_file: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_batch_concurrency() {
        let single = CommandBatch::single(CommandSpec::Single("echo hi".into()));
        assert!(!single.is_concurrent());

        let concurrent = CommandBatch {
            commands: vec![
                CommandSpec::Single("echo a".into()),
                CommandSpec::Single("echo b".into()),
            ],
        };
        assert!(concurrent.is_concurrent());
    }

    #[test]
    fn feature_ids_preserves_order() {
        let plan = InstallPlan {
            features: vec![
                PlannedFeature {
                    node: FeatureNode::new("a", "1"),
                    tarball_path: PathBuf::from("/tmp/a"),
                    env_inputs: BTreeMap::new(),
                },
                PlannedFeature {
                    node: FeatureNode::new("b", "1"),
                    tarball_path: PathBuf::from("/tmp/b"),
                    env_inputs: BTreeMap::new(),
                },
            ],
            workspace_folder: "/workspaces/app".into(),
            workspace_mount: None,
            additional_mount_string: None,
            lifecycle_schedule: LifecycleSchedule::new(),
            container_env: BTreeMap::new(),
            remote_env: BTreeMap::new(),
        };
        assert_eq!(plan.feature_ids(), vec!["a", "b"]);
    }
}
