//! Lockfile on-disk schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEntry {
    pub version: String,
    pub resolved: String,
    pub integrity: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    pub features: BTreeMap<String, LockEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_feature_install_order: Option<Vec<String>>,
}

impl Lockfile {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&LockEntry> {
        self.features.get(id)
    }

    /// Whether `other`'s entry for `id` agrees on `{version, resolved, integrity}`.
    pub fn agrees_with(&self, id: &str, candidate: &LockEntry) -> bool {
        match self.features.get(id) {
            Some(existing) => {
                existing.version == candidate.version
                    && existing.resolved == candidate.resolved
                    && existing.integrity == candidate.integrity
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Write,
    Frozen,
}

/// A single changed, added, or removed entry between two lockfile states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockDiffEntry {
    Added(String),
    Changed(String),
    Removed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockDiff {
    pub entries: Vec<LockDiffEntry>,
}

impl LockDiff {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
