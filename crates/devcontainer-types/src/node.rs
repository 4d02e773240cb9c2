//! Resolver-facing Feature node and lifecycle command shapes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The five lifecycle stages, in the strict order they always run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    OnCreate,
    UpdateContent,
    PostCreate,
    PostStart,
    PostAttach,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::OnCreate,
        Stage::UpdateContent,
        Stage::PostCreate,
        Stage::PostStart,
        Stage::PostAttach,
    ];

    /// The config key / marker-file suffix for this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::OnCreate => "onCreateCommand",
            Stage::UpdateContent => "updateContentCommand",
            Stage::PostCreate => "postCreateCommand",
            Stage::PostStart => "postStartCommand",
            Stage::PostAttach => "postAttachCommand",
        }
    }

    /// Whether this stage runs once (marker-gated) or on every invocation.
    /// Only `postAttachCommand` runs unconditionally on every attach.
    pub fn runs_every_time(&self) -> bool {
        matches!(self, Stage::PostAttach)
    }
}

/// A single command, either a shell string or an argv array. Shared by
/// both the plain `CommandSpec` and the values of a `Named` map — a
/// `Named` map cannot itself contain another `Named` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SimpleCommand {
    Single(String),
    Argv(Vec<String>),
}

/// The full lifecycle command shape: a single command, an argv array, or a
/// named map of commands that run concurrently as one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Single(String),
    Argv(Vec<String>),
    Named(BTreeMap<String, SimpleCommand>),
}

impl CommandSpec {
    /// Number of concurrent processes this spec expands into.
    pub fn concurrency(&self) -> usize {
        match self {
            CommandSpec::Single(_) | CommandSpec::Argv(_) => 1,
            CommandSpec::Named(map) => map.len(),
        }
    }
}

/// A resolver-state vertex: one Feature at a concrete, resolved version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureNode {
    pub id: String,
    pub version: String,
    pub options: BTreeMap<String, String>,
    pub installs_after: BTreeSet<String>,
    pub depends_on: BTreeSet<String>,
    pub legacy_ids: BTreeSet<String>,
    pub lifecycle_hooks: BTreeMap<Stage, Vec<CommandSpec>>,
    pub customizations: Value,
}

impl FeatureNode {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            options: BTreeMap::new(),
            installs_after: BTreeSet::new(),
            depends_on: BTreeSet::new(),
            legacy_ids: BTreeSet::new(),
            lifecycle_hooks: BTreeMap::new(),
            customizations: Value::Null,
        }
    }

    /// Whether any id in `legacy_ids` (or the primary `id`) matches `candidate`.
    pub fn satisfies(&self, candidate: &str) -> bool {
        self.id == candidate || self.legacy_ids.contains(candidate)
    }

    /// `installsAfter ∩ dependsOn = ∅`, checked eagerly at construction time
    /// by callers; exposed so tests and the resolver can assert it holds.
    pub fn has_disjoint_edges(&self) -> bool {
        self.installs_after.is_disjoint(&self.depends_on)
    }
}
