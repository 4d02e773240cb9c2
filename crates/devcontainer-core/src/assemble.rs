//! The Plan Assembler's single entry point: [`assemble`].
//!
//! Orchestration order follows the component dependency chain: workspace
//! and mount resolution (F) has no inputs from the others and runs first;
//! dependency resolution (D, itself built on the identifier parser,
//! OCI client and Feature fetcher — A, B, C) runs next and is bracketed by
//! the lockfile engine (E), consulted before resolving a tag-pinned
//! version and written after; the lifecycle scheduler (G) folds every
//! resolved Feature's hooks together with the config's own; variable
//! substitution (H) runs last, over both the environment maps and the
//! lifecycle commands just scheduled.

use std::collections::BTreeMap;
use std::path::Path;

use devcontainer_config::DevContainerConfig;
use devcontainer_events::{CoreEvent, CoreEventKind};
use devcontainer_lifecycle::build_schedule;
use devcontainer_lockfile::ResolvedFeature;
use devcontainer_types::{
    CommandSpec, CoreError, CoreResult, FeatureNode, Identifier, InstallPlan, LockMode, OciReference,
    PlannedFeature, Stage,
};
use devcontainer_vars::{substitute, substitute_str, SubstitutionContext};
use devcontainer_workspace::{resolve_mount, MountOptions};
use serde_json::Value;

use crate::capabilities::Capabilities;
use crate::provider::{fetch_descriptor, node_from_descriptor, FetchingMetadataProvider};

/// Composes the Workspace/Mount Resolver, Dependency Resolver, Lockfile
/// Engine, Lifecycle Scheduler and Variable Substitutor into one
/// [`InstallPlan`], per §4.I.
pub fn assemble(
    config: &DevContainerConfig,
    workspace_path: &Path,
    caps: &Capabilities,
) -> CoreResult<InstallPlan> {
    let mount_plan = resolve_mount(
        caps.fs.as_ref(),
        workspace_path,
        caps.platform,
        MountOptions {
            mount_workspace_git_root: caps.mount_workspace_git_root,
            mount_git_worktree_common_dir: caps.mount_git_worktree_common_dir,
        },
    );

    caps.log.emit(event(CoreEventKind::MountResolved {
        workspace_folder: mount_plan.workspace_folder.clone(),
        workspace_mount: mount_plan.workspace_mount.clone(),
    }));

    // Config overrides take precedence over any computed value (§4.F).
    let workspace_folder = config
        .workspace_folder
        .clone()
        .unwrap_or_else(|| mount_plan.workspace_folder.clone());
    let workspace_mount = Some(
        config
            .workspace_mount
            .clone()
            .unwrap_or_else(|| mount_plan.workspace_mount.clone()),
    );

    let mut roots = Vec::with_capacity(config.features.len());
    for (id, value) in &config.features {
        roots.push(build_root_node(caps, id, value)?);
    }

    let provider = FetchingMetadataProvider { caps };
    let override_order = config.override_feature_install_order.as_deref();
    let resolved_nodes = devcontainer_resolver::resolve(roots, &provider, override_order)?;

    caps.log.emit(event(CoreEventKind::ResolverOrderComputed {
        order: resolved_nodes.iter().map(|n| n.id.clone()).collect(),
    }));

    let (planned, resolved_features) = fetch_resolved(caps, &resolved_nodes)?;

    let (lockfile, _diff) = devcontainer_lockfile::plan(
        &resolved_features,
        caps.existing_lockfile.as_ref(),
        caps.lock_mode,
        config.override_feature_install_order.clone(),
    )?;

    if caps.lock_mode == LockMode::Write {
        if let Some(path) = &caps.lockfile_path {
            devcontainer_lockfile::write_atomic(path, &lockfile)?;
            caps.log.emit(event(CoreEventKind::LockfileWritten {
                path: path.display().to_string(),
            }));
        }
    }

    let lifecycle_schedule = build_lifecycle_schedule(caps, &planned, config, &workspace_folder)?;

    let global_ctx = SubstitutionContext {
        local_workspace_folder: Some(workspace_path.display().to_string()),
        container_workspace_folder: Some(workspace_folder.clone()),
        local_env: caps.local_env.clone().into_iter().collect(),
        feature_root: None,
    };
    let container_env = substitute_env_map(&config.container_env, &global_ctx);
    let remote_env = substitute_env_map(&config.remote_env, &global_ctx);

    Ok(InstallPlan {
        features: planned,
        workspace_folder,
        workspace_mount,
        additional_mount_string: mount_plan.additional_mount_string,
        lifecycle_schedule,
        container_env,
        remote_env,
    })
}

fn event(kind: CoreEventKind) -> CoreEvent {
    CoreEvent {
        timestamp: chrono::Utc::now(),
        kind,
    }
}

fn build_root_node(caps: &Capabilities, id: &str, value: &Value) -> CoreResult<FeatureNode> {
    let options = options_from_value(value);
    let descriptor = fetch_descriptor(caps, id)?;
    Ok(node_from_descriptor(id, &descriptor, options))
}

fn options_from_value(value: &Value) -> BTreeMap<String, String> {
    match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), scalar_to_string(v))).collect(),
        _ => BTreeMap::new(),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Fetches every resolved node's tarball, splitting local-path Features
/// (never fetched over the network, never pinned in the lockfile) from
/// everything else.
fn fetch_resolved(
    caps: &Capabilities,
    resolved: &[FeatureNode],
) -> CoreResult<(Vec<PlannedFeature>, Vec<ResolvedFeature>)> {
    let mut planned = Vec::with_capacity(resolved.len());
    let mut lockable = Vec::new();
    let mut tags_by_repo: BTreeMap<(String, String, String), Vec<String>> = BTreeMap::new();

    for node in resolved {
        let identifier = devcontainer_identifier::parse(&node.id)?;
        let identifier = resolve_oci_tag(caps, identifier, &mut tags_by_repo)?;
        let fetched = caps.fetcher.fetch(&identifier, None)?;

        let candidate_tarball = fetched.content_dir.join("feature.tgz");
        let tarball_path = if candidate_tarball.is_file() {
            candidate_tarball
        } else {
            fetched.content_dir.clone()
        };

        if !matches!(identifier, Identifier::LocalPath { .. }) {
            lockable.push(ResolvedFeature {
                id: node.id.clone(),
                version: node.version.clone(),
                resolved: identifier.canonical(),
                integrity: fetched.digest.clone().unwrap_or_default(),
                depends_on: node.depends_on.iter().cloned().collect(),
            });
        }

        planned.push(PlannedFeature {
            node: node.clone(),
            tarball_path,
            env_inputs: BTreeMap::new(),
        });
    }

    Ok((planned, lockable))
}

/// Stage 2 — version resolution (§4.D): an OCI identifier carrying a tag
/// (possibly partial, e.g. `1` or `1.0`) is resolved against the
/// repository's published tags before anything is fetched. A digest-pinned
/// identifier is never re-resolved. Tags are listed once per repo within a
/// single `assemble()` call, via `tags_by_repo`.
fn resolve_oci_tag(
    caps: &Capabilities,
    identifier: Identifier,
    tags_by_repo: &mut BTreeMap<(String, String, String), Vec<String>>,
) -> CoreResult<Identifier> {
    let Identifier::Oci {
        registry,
        namespace,
        owner,
        name,
        reference: OciReference::Tag(requested),
    } = identifier
    else {
        return Ok(identifier);
    };

    let repo_key = (registry.clone(), namespace.clone(), name.clone());
    let tags = match tags_by_repo.get(&repo_key) {
        Some(tags) => tags.clone(),
        None => {
            let tags = caps.fetcher.list_tags(&registry, &namespace, &name)?;
            tags_by_repo.insert(repo_key, tags.clone());
            tags
        }
    };

    let resolved_tag = devcontainer_resolver::resolve_tag(&requested, &tags)?;
    let resolved = Identifier::Oci {
        registry,
        namespace,
        owner,
        name,
        reference: OciReference::Tag(resolved_tag.clone()),
    };

    caps.log.emit(event(CoreEventKind::VersionResolved {
        id: resolved.canonical(),
        tag: resolved_tag,
    }));

    Ok(resolved)
}

/// Folds every planned Feature's lifecycle hooks (in resolver install
/// order) and the config's own five commands into one schedule, each
/// command substituted in its own context first.
fn build_lifecycle_schedule(
    caps: &Capabilities,
    planned: &[PlannedFeature],
    config: &DevContainerConfig,
    workspace_folder: &str,
) -> CoreResult<devcontainer_types::LifecycleSchedule> {
    let mut contributions: Vec<(Stage, CommandSpec)> = Vec::new();

    for feature in planned {
        let ctx = SubstitutionContext {
            local_workspace_folder: None,
            container_workspace_folder: Some(workspace_folder.to_string()),
            local_env: caps.local_env.clone().into_iter().collect(),
            feature_root: Some(feature.tarball_path.display().to_string()),
        };
        for (stage, specs) in &feature.node.lifecycle_hooks {
            for spec in specs {
                contributions.push((*stage, substitute_command(spec, &ctx)?));
            }
        }
    }

    let config_ctx = SubstitutionContext {
        local_workspace_folder: None,
        container_workspace_folder: Some(workspace_folder.to_string()),
        local_env: caps.local_env.clone().into_iter().collect(),
        feature_root: None,
    };
    for (stage, value) in [
        (Stage::OnCreate, &config.on_create_command),
        (Stage::UpdateContent, &config.update_content_command),
        (Stage::PostCreate, &config.post_create_command),
        (Stage::PostStart, &config.post_start_command),
        (Stage::PostAttach, &config.post_attach_command),
    ] {
        if let Some(value) = value {
            let spec: CommandSpec = serde_json::from_value(value.clone())
                .map_err(|e| CoreError::bad_config(format!("invalid {}: {e}", stage.as_str())))?;
            contributions.push((stage, substitute_command(&spec, &config_ctx)?));
        }
    }

    Ok(build_schedule(contributions))
}

fn substitute_command(spec: &CommandSpec, ctx: &SubstitutionContext) -> CoreResult<CommandSpec> {
    let value = serde_json::to_value(spec)
        .map_err(|e| CoreError::internal(format!("serializing lifecycle command: {e}")))?;
    let substituted = substitute(&value, ctx);
    serde_json::from_value(substituted)
        .map_err(|e| CoreError::internal(format!("deserializing lifecycle command: {e}")))
}

fn substitute_env_map(
    map: &BTreeMap<String, String>,
    ctx: &SubstitutionContext,
) -> BTreeMap<String, String> {
    map.iter()
        .map(|(k, v)| (k.clone(), substitute_str(v, ctx)))
        .collect()
}
