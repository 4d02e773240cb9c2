//! `plan`: fold a resolved graph and an optional existing lockfile into a
//! new lockfile plus the diff that produced it, honoring write/frozen mode.

use devcontainer_types::{CoreError, CoreResult, LockDiff, LockDiffEntry, LockEntry, LockMode, Lockfile};

/// One resolved Feature ready to be locked: everything a [`LockEntry`]
/// needs plus the id it resolves under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFeature {
    pub id: String,
    pub version: String,
    pub resolved: String,
    pub integrity: String,
    pub depends_on: Vec<String>,
}

impl ResolvedFeature {
    pub(crate) fn to_entry(&self) -> LockEntry {
        LockEntry {
            version: self.version.clone(),
            resolved: self.resolved.clone(),
            integrity: self.integrity.clone(),
            depends_on: self.depends_on.clone(),
        }
    }
}

/// Builds the new lockfile for `resolved` against `existing`.
///
/// `write` mode adds new entries, prunes ones no longer referenced, and
/// always trusts the freshly-resolved `integrity`. `frozen` mode never
/// writes: any drift from `existing` on `{version, resolved, integrity}`,
/// or a missing lockfile altogether, is `LockfileMismatch`.
pub fn plan(
    resolved: &[ResolvedFeature],
    existing: Option<&Lockfile>,
    mode: LockMode,
    override_feature_install_order: Option<Vec<String>>,
) -> CoreResult<(Lockfile, LockDiff)> {
    match mode {
        LockMode::Frozen => plan_frozen(resolved, existing),
        LockMode::Write => Ok(plan_write(resolved, existing, override_feature_install_order)),
    }
}

fn plan_frozen(
    resolved: &[ResolvedFeature],
    existing: Option<&Lockfile>,
) -> CoreResult<(Lockfile, LockDiff)> {
    let existing = existing.ok_or_else(|| {
        CoreError::lockfile_mismatch("no lockfile exists and --experimental-frozen-lockfile was set")
    })?;

    for feature in resolved {
        let candidate = feature.to_entry();
        if !existing.agrees_with(&feature.id, &candidate) {
            return Err(CoreError::lockfile_mismatch(format!(
                "feature '{}' resolved to a different version, source or integrity than the locked entry",
                feature.id
            )));
        }
    }

    Ok((existing.clone(), LockDiff::default()))
}

fn plan_write(
    resolved: &[ResolvedFeature],
    existing: Option<&Lockfile>,
    override_feature_install_order: Option<Vec<String>>,
) -> (Lockfile, LockDiff) {
    let mut diff = LockDiff::default();
    let mut new_lock = Lockfile::empty();
    new_lock.override_feature_install_order = override_feature_install_order;

    for feature in resolved {
        let candidate = feature.to_entry();
        match existing.and_then(|l| l.get(&feature.id)) {
            Some(prior) if *prior == candidate => {}
            Some(_) => diff.entries.push(LockDiffEntry::Changed(feature.id.clone())),
            None => diff.entries.push(LockDiffEntry::Added(feature.id.clone())),
        }
        new_lock.features.insert(feature.id.clone(), candidate);
    }

    if let Some(existing) = existing {
        for id in existing.features.keys() {
            if !new_lock.features.contains_key(id) {
                diff.entries.push(LockDiffEntry::Removed(id.clone()));
            }
        }
    }

    (new_lock, diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(id: &str, version: &str, integrity: &str) -> ResolvedFeature {
        ResolvedFeature {
            id: id.to_string(),
            version: version.to_string(),
            resolved: format!("ghcr.io/devcontainers/{id}:{version}"),
            integrity: integrity.to_string(),
            depends_on: vec![],
        }
    }

    #[test]
    fn write_mode_adds_new_entries() {
        let resolved = vec![feature("ruby", "1.2.3", "sha256:aaa")];
        let (lock, diff) = plan(&resolved, None, LockMode::Write, None).unwrap();
        assert_eq!(lock.features.len(), 1);
        assert_eq!(diff.entries, vec![LockDiffEntry::Added("ruby".to_string())]);
    }

    #[test]
    fn write_mode_prunes_stale_entries() {
        let mut existing = Lockfile::empty();
        existing.features.insert(
            "node".to_string(),
            LockEntry {
                version: "18.0.0".into(),
                resolved: "ghcr.io/devcontainers/node:18".into(),
                integrity: "sha256:old".into(),
                depends_on: vec![],
            },
        );
        let resolved = vec![feature("ruby", "1.2.3", "sha256:aaa")];
        let (lock, diff) = plan(&resolved, Some(&existing), LockMode::Write, None).unwrap();
        assert!(!lock.features.contains_key("node"));
        assert!(diff.entries.contains(&LockDiffEntry::Removed("node".to_string())));
    }

    #[test]
    fn write_mode_unchanged_entry_produces_no_diff() {
        let mut existing = Lockfile::empty();
        existing
            .features
            .insert("ruby".to_string(), feature("ruby", "1.2.3", "sha256:aaa").to_entry());
        let resolved = vec![feature("ruby", "1.2.3", "sha256:aaa")];
        let (_, diff) = plan(&resolved, Some(&existing), LockMode::Write, None).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn frozen_mode_fails_without_existing_lockfile() {
        let resolved = vec![feature("ruby", "1.2.3", "sha256:aaa")];
        let err = plan(&resolved, None, LockMode::Frozen, None).unwrap_err();
        assert!(err.message().starts_with("Lockfile does not match."));
    }

    #[test]
    fn frozen_mode_fails_on_integrity_drift() {
        let mut existing = Lockfile::empty();
        existing.features.insert(
            "ruby".to_string(),
            LockEntry {
                version: "1.2.3".into(),
                resolved: "ghcr.io/devcontainers/ruby:1.2.3".into(),
                integrity: "sha256:AAA".into(),
                depends_on: vec![],
            },
        );
        let resolved = vec![ResolvedFeature {
            id: "ruby".into(),
            version: "1.2.3".into(),
            resolved: "ghcr.io/devcontainers/ruby:1.2.3".into(),
            integrity: "sha256:BBB".into(),
            depends_on: vec![],
        }];
        let err = plan(&resolved, Some(&existing), LockMode::Frozen, None).unwrap_err();
        assert_eq!(err.kind(), devcontainer_types::ErrorKind::LockfileMismatch);
    }

    #[test]
    fn frozen_mode_never_mutates_on_agreement() {
        let mut existing = Lockfile::empty();
        existing
            .features
            .insert("ruby".to_string(), feature("ruby", "1.2.3", "sha256:aaa").to_entry());
        let resolved = vec![feature("ruby", "1.2.3", "sha256:aaa")];
        let (lock, diff) = plan(&resolved, Some(&existing), LockMode::Frozen, None).unwrap();
        assert_eq!(lock, existing);
        assert!(diff.is_empty());
    }
}
