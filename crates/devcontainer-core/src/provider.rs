//! Wires the resolver's [`FeatureMetadataProvider`] seam to the real Feature
//! Fetcher: a dependency discovered via `dependsOn` is fetched, extracted,
//! and parsed into a [`FeatureNode`] the same way a root Feature is.

use std::collections::BTreeMap;

use devcontainer_resolver::FeatureMetadataProvider;
use devcontainer_types::{CommandSpec, CoreResult, FeatureNode, Stage};

use crate::capabilities::Capabilities;

/// Fetches `id`, extracts its tarball if needed, and returns its descriptor.
pub(crate) fn fetch_descriptor(
    caps: &Capabilities,
    id: &str,
) -> CoreResult<devcontainer_config::FeatureDescriptor> {
    let identifier = devcontainer_identifier::parse(id)?;
    caps.log.emit(event(devcontainer_events::CoreEventKind::FetchStarted { id: id.to_string() }));

    let fetched = caps.fetcher.fetch(&identifier, None)?;

    caps.log.emit(event(devcontainer_events::CoreEventKind::FetchCompleted {
        id: id.to_string(),
        digest: fetched.digest.clone().unwrap_or_default(),
    }));

    let root = fetched.feature_root()?;
    devcontainer_config::read_feature_json(&root.join("devcontainer-feature.json"))
}

fn event(kind: devcontainer_events::CoreEventKind) -> devcontainer_events::CoreEvent {
    devcontainer_events::CoreEvent {
        timestamp: chrono::Utc::now(),
        kind,
    }
}

/// Builds the graph-facing [`FeatureNode`] for `id` out of its descriptor.
///
/// `id` — not `descriptor.id` — becomes the node's primary key: it's the
/// string every `dependsOn`/`installsAfter` edge and lockfile entry
/// actually references. When the descriptor's own `id` differs (a Feature
/// published under a short name but referenced by its full OCI ref, say),
/// it's folded into `legacyIds` so `FeatureNode::satisfies` still matches it.
pub(crate) fn node_from_descriptor(
    id: &str,
    descriptor: &devcontainer_config::FeatureDescriptor,
    options: BTreeMap<String, String>,
) -> FeatureNode {
    let mut node = FeatureNode::new(id, descriptor.version.clone());
    node.options = options;
    node.installs_after = descriptor.installs_after.iter().cloned().collect();
    node.depends_on = descriptor.depends_on.iter().cloned().collect();
    node.legacy_ids = descriptor.legacy_ids.iter().cloned().collect();
    if descriptor.id != id {
        node.legacy_ids.insert(descriptor.id.clone());
    }
    node.customizations = descriptor.customizations.clone();

    let mut hooks: BTreeMap<Stage, Vec<CommandSpec>> = BTreeMap::new();
    for (stage, spec) in descriptor.lifecycle_contributions() {
        hooks.entry(stage).or_default().push(spec);
    }
    node.lifecycle_hooks = hooks;

    node
}

pub(crate) struct FetchingMetadataProvider<'a> {
    pub caps: &'a Capabilities,
}

impl FeatureMetadataProvider for FetchingMetadataProvider<'_> {
    fn metadata(&self, id: &str) -> CoreResult<FeatureNode> {
        let descriptor = fetch_descriptor(self.caps, id)?;
        Ok(node_from_descriptor(id, &descriptor, BTreeMap::new()))
    }
}
