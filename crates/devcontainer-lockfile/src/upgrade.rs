//! `upgrade`: merge freshly re-resolved entries into an existing lockfile
//! without touching anything the caller didn't select.
//!
//! Rewriting the config's declared version string for `--target-version` is
//! the config layer's job; this only refreshes the lock entry once the
//! caller has re-resolved the feature against the new target.

use devcontainer_types::{LockDiff, LockDiffEntry, Lockfile};

use crate::engine::ResolvedFeature;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeSelector {
    All,
    Feature(String),
}

/// `refreshed` must already reflect the selector — the caller (Plan
/// Assembler) decides which features to re-resolve; this just folds the
/// results back into the lockfile and reports what changed.
pub fn upgrade(
    existing: &Lockfile,
    selector: &UpgradeSelector,
    refreshed: &[ResolvedFeature],
) -> (Lockfile, LockDiff) {
    let mut new_lock = existing.clone();
    let mut diff = LockDiff::default();

    let selected: Vec<&ResolvedFeature> = match selector {
        UpgradeSelector::All => refreshed.iter().collect(),
        UpgradeSelector::Feature(id) => refreshed.iter().filter(|f| &f.id == id).collect(),
    };

    for feature in selected {
        let candidate = feature.to_entry();
        match new_lock.features.get(&feature.id) {
            Some(prior) if *prior == candidate => {}
            Some(_) => diff.entries.push(LockDiffEntry::Changed(feature.id.clone())),
            None => diff.entries.push(LockDiffEntry::Added(feature.id.clone())),
        }
        new_lock.features.insert(feature.id.clone(), candidate);
    }

    (new_lock, diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devcontainer_types::LockEntry;

    fn feature(id: &str, version: &str) -> ResolvedFeature {
        ResolvedFeature {
            id: id.to_string(),
            version: version.to_string(),
            resolved: format!("ghcr.io/devcontainers/{id}:{version}"),
            integrity: format!("sha256:{version}"),
            depends_on: vec![],
        }
    }

    #[test]
    fn upgrade_single_feature_leaves_others_untouched() {
        let mut existing = Lockfile::empty();
        existing.features.insert(
            "ruby".to_string(),
            LockEntry {
                version: "1.0.0".into(),
                resolved: "ghcr.io/devcontainers/ruby:1.0.0".into(),
                integrity: "sha256:old".into(),
                depends_on: vec![],
            },
        );
        existing.features.insert(
            "node".to_string(),
            LockEntry {
                version: "18.0.0".into(),
                resolved: "ghcr.io/devcontainers/node:18".into(),
                integrity: "sha256:node".into(),
                depends_on: vec![],
            },
        );

        let refreshed = vec![feature("ruby", "2.0.0")];
        let (lock, diff) = upgrade(&existing, &UpgradeSelector::Feature("ruby".to_string()), &refreshed);

        assert_eq!(lock.features["ruby"].version, "2.0.0");
        assert_eq!(lock.features["node"].version, "18.0.0");
        assert_eq!(diff.entries, vec![LockDiffEntry::Changed("ruby".to_string())]);
    }

    #[test]
    fn upgrade_all_refreshes_every_entry() {
        let mut existing = Lockfile::empty();
        existing.features.insert(
            "ruby".to_string(),
            LockEntry {
                version: "1.0.0".into(),
                resolved: "ghcr.io/devcontainers/ruby:1.0.0".into(),
                integrity: "sha256:1.0.0".into(),
                depends_on: vec![],
            },
        );
        let refreshed = vec![feature("ruby", "1.0.0")];
        let (_, diff) = upgrade(&existing, &UpgradeSelector::All, &refreshed);
        assert!(diff.is_empty());
    }
}
