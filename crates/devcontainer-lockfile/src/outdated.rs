//! `outdated`: per-feature version drift report against declared
//! constraints and the registry's published tags.

use std::collections::BTreeMap;

use devcontainer_semver::{highest, highest_matching, Constraint};
use devcontainer_types::Lockfile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutdatedEntry {
    pub id: String,
    pub current: String,
    pub wanted: Option<String>,
    pub wanted_major: Option<String>,
    pub latest: Option<String>,
    pub latest_major: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutdatedReport {
    pub entries: Vec<OutdatedEntry>,
}

/// `declared_constraints` is the config's requested tag per feature id
/// (e.g. `"1"`, `"1.0"`, `"1.2.3"`); `registry_tags` is every published tag
/// per feature id, as returned by a tag-list fetch.
pub fn outdated(
    lockfile: &Lockfile,
    declared_constraints: &BTreeMap<String, String>,
    registry_tags: &BTreeMap<String, Vec<String>>,
) -> OutdatedReport {
    let mut entries = Vec::new();

    for (id, entry) in &lockfile.features {
        let tags = registry_tags.get(id).cloned().unwrap_or_default();
        let declared = declared_constraints.get(id);

        let wanted = declared
            .and_then(|c| Constraint::parse(c))
            .and_then(|c| highest_matching(&tags, &c))
            .map(|v| v.to_string());

        let wanted_major = declared.and_then(|c| {
            c.split('.').next().and_then(|major_str| {
                let major: u64 = major_str.parse().ok()?;
                highest_matching(&tags, &Constraint::Major(major)).map(|v| v.to_string())
            })
        });

        let latest = highest(&tags).map(|v| v.to_string());
        let latest_major = highest(&tags).map(|v| v.major.to_string());

        entries.push(OutdatedEntry {
            id: id.clone(),
            current: entry.version.clone(),
            wanted,
            wanted_major,
            latest,
            latest_major,
        });
    }

    OutdatedReport { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devcontainer_types::LockEntry;

    fn lockfile_with(id: &str, version: &str) -> Lockfile {
        let mut lock = Lockfile::empty();
        lock.features.insert(
            id.to_string(),
            LockEntry {
                version: version.to_string(),
                resolved: format!("ghcr.io/devcontainers/{id}:{version}"),
                integrity: "sha256:aaa".to_string(),
                depends_on: vec![],
            },
        );
        lock
    }

    #[test]
    fn reports_current_wanted_and_latest() {
        let lock = lockfile_with("ruby", "1.0.0");
        let mut declared = BTreeMap::new();
        declared.insert("ruby".to_string(), "1".to_string());
        let mut tags = BTreeMap::new();
        tags.insert(
            "ruby".to_string(),
            vec!["1.0.0".into(), "1.5.0".into(), "2.0.0".into()],
        );

        let report = outdated(&lock, &declared, &tags);
        assert_eq!(report.entries.len(), 1);
        let entry = &report.entries[0];
        assert_eq!(entry.current, "1.0.0");
        assert_eq!(entry.wanted.as_deref(), Some("1.5.0"));
        assert_eq!(entry.latest.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn missing_registry_tags_yield_none_fields() {
        let lock = lockfile_with("ruby", "1.0.0");
        let declared = BTreeMap::new();
        let tags = BTreeMap::new();
        let report = outdated(&lock, &declared, &tags);
        assert_eq!(report.entries[0].wanted, None);
        assert_eq!(report.entries[0].latest, None);
    }
}
