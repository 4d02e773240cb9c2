//! One handler per [`Command`] variant. Each returns an [`Outcome`]; `main`
//! is the only place that turns that into stdout JSON and an exit code.

use std::collections::BTreeMap;
use std::sync::Arc;

use devcontainer_core::assemble;
use devcontainer_events::{CoreEvent, CoreEventKind};
use devcontainer_lifecycle::{run_schedule, CommandLogger, FsMarkerStore, Invocation, ScheduleOutcome, SkipFlags};
use devcontainer_lockfile::{OutdatedReport, ResolvedFeature, UpgradeSelector};
use devcontainer_oci::OciClient;
use devcontainer_types::{CommandSpec, CoreError, CoreResult, Identifier, OciReference, Stage};

use crate::args::{Cli, Command, FeaturesAction, GlobalArgs, TemplatesAction};
use crate::context::AppContext;
use crate::output::Outcome;
use crate::runtime::DockerRuntime;

pub fn dispatch(cli: Cli) -> Outcome {
    match run(cli) {
        Ok(outcome) => outcome,
        Err(err) => err.into(),
    }
}

fn run(cli: Cli) -> CoreResult<Outcome> {
    let ctx = AppContext::build(&cli.global)?;

    match &cli.command {
        Command::Build => build(&ctx, &cli.global),
        Command::Up => up(&ctx, &cli.global),
        Command::RunUserCommands => run_user_commands(&ctx, &cli.global),
        Command::ReadConfiguration => read_configuration(&ctx, &cli.global),
        Command::Exec { command } => exec(&ctx, &cli.global, command),
        Command::SetUp => set_up(&ctx, &cli.global),
        Command::Outdated => outdated(&ctx, &cli.global),
        Command::Upgrade { feature, target_version } => {
            upgrade(&ctx, &cli.global, feature.as_deref(), target_version.as_deref())
        }
        Command::Features { action } => features(&ctx, &cli.global, action),
        Command::Templates { action } => templates(action),
    }
}

fn docker_runtime(ctx: &AppContext, base: devcontainer_config::BaseImage) -> DockerRuntime {
    DockerRuntime::new(
        ctx.docker_path.clone(),
        ctx.docker_compose_path.clone(),
        ctx.workspace_path.clone(),
        base,
    )
}

fn build(ctx: &AppContext, global: &GlobalArgs) -> CoreResult<Outcome> {
    let caps = ctx.capabilities(global)?;
    let plan = assemble(&ctx.config, &ctx.workspace_path, &caps)?;
    ctx.flush_events()?;

    let runtime = docker_runtime(ctx, ctx.config.base.clone());
    let image_id = runtime.build(&plan)?;

    let image_names = if global.image_name.is_empty() {
        vec![image_id]
    } else {
        global.image_name.clone()
    };
    Ok(Outcome::success().with_image_name(image_names))
}

fn up(ctx: &AppContext, global: &GlobalArgs) -> CoreResult<Outcome> {
    let caps = ctx.capabilities(global)?;
    let plan = assemble(&ctx.config, &ctx.workspace_path, &caps)?;

    let runtime = docker_runtime(ctx, ctx.config.base.clone());
    let image_id = runtime.build(&plan)?;
    let container_id = runtime.up(&plan, &image_id)?;

    let invocation = if global.container_id.is_some() {
        Invocation::Restart
    } else {
        Invocation::Create
    };
    run_lifecycle(ctx, global, &runtime, &container_id, &plan, invocation)?;
    ctx.flush_events()?;

    Ok(Outcome::success()
        .with_container_id(container_id)
        .with_image_name(vec![image_id]))
}

fn run_user_commands(ctx: &AppContext, global: &GlobalArgs) -> CoreResult<Outcome> {
    let container_id = global
        .container_id
        .clone()
        .ok_or_else(|| CoreError::bad_config("run-user-commands requires --container-id"))?;

    let caps = ctx.capabilities(global)?;
    let plan = assemble(&ctx.config, &ctx.workspace_path, &caps)?;
    let runtime = docker_runtime(ctx, ctx.config.base.clone());

    run_lifecycle(ctx, global, &runtime, &container_id, &plan, Invocation::Restart)?;
    ctx.flush_events()?;

    Ok(Outcome::success().with_container_id(container_id))
}

fn set_up(ctx: &AppContext, global: &GlobalArgs) -> CoreResult<Outcome> {
    let container_id = global
        .container_id
        .clone()
        .ok_or_else(|| CoreError::bad_config("set-up requires --container-id"))?;

    let caps = ctx.capabilities(global)?;
    let plan = assemble(&ctx.config, &ctx.workspace_path, &caps)?;
    let runtime = docker_runtime(ctx, ctx.config.base.clone());

    run_lifecycle(ctx, global, &runtime, &container_id, &plan, Invocation::Create)?;
    ctx.flush_events()?;

    Ok(Outcome::success().with_container_id(container_id))
}

fn read_configuration(ctx: &AppContext, global: &GlobalArgs) -> CoreResult<Outcome> {
    let caps = ctx.capabilities(global)?;
    let plan = assemble(&ctx.config, &ctx.workspace_path, &caps)?;
    ctx.flush_events()?;

    let configuration = serde_json::to_value(&ctx.config)
        .map_err(|e| CoreError::internal(format!("serializing configuration: {e}")))?;
    let merged_configuration = serde_json::json!({
        "workspaceFolder": plan.workspace_folder,
        "features": plan.feature_ids(),
        "containerEnv": plan.container_env,
        "remoteEnv": plan.remote_env,
    });

    Ok(Outcome::success()
        .with_configuration(configuration)
        .with_merged_configuration(merged_configuration))
}

fn exec(ctx: &AppContext, global: &GlobalArgs, command: &[String]) -> CoreResult<Outcome> {
    let container_id = global
        .container_id
        .clone()
        .ok_or_else(|| CoreError::bad_config("exec requires --container-id"))?;

    let runtime = docker_runtime(ctx, ctx.config.base.clone());
    let spec = CommandSpec::Argv(command.to_vec());
    let exit_code = runtime.exec(&container_id, &spec)?;

    if exit_code == 0 {
        Ok(Outcome::success().with_container_id(container_id))
    } else {
        Ok(Outcome::error(format!("command exited with code {exit_code}")).with_container_id(container_id))
    }
}

fn outdated(ctx: &AppContext, _global: &GlobalArgs) -> CoreResult<Outcome> {
    let lockfile = devcontainer_lockfile::read(&ctx.lockfile_path())?
        .ok_or_else(|| CoreError::bad_lockfile("no lockfile found; run with --experimental-lockfile first"))?;

    let mut declared_constraints = BTreeMap::new();
    let mut oci_refs: BTreeMap<String, (String, String, String)> = BTreeMap::new();
    for id in ctx.config.features.keys() {
        if let Ok(Identifier::Oci { registry, namespace, name, reference: OciReference::Tag(tag), .. }) =
            devcontainer_identifier::parse(id)
        {
            declared_constraints.insert(id.clone(), tag);
            oci_refs.insert(id.clone(), (registry, namespace, name));
        }
    }

    let http = Arc::new(
        devcontainer_oci::ReqwestHttpClient::new().map_err(|e| CoreError::network("oci", e.to_string()))?,
    );
    let client = OciClient::new(http);
    let mut registry_tags = BTreeMap::new();
    for (id, (registry, namespace, name)) in &oci_refs {
        let tags = client.list_tags(registry, namespace, name)?;
        registry_tags.insert(id.clone(), tags);
    }

    let report: OutdatedReport = devcontainer_lockfile::outdated(&lockfile, &declared_constraints, &registry_tags);
    let payload = serde_json::to_value(
        report
            .entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "id": e.id,
                    "current": e.current,
                    "wanted": e.wanted,
                    "wantedMajor": e.wanted_major,
                    "latest": e.latest,
                    "latestMajor": e.latest_major,
                })
            })
            .collect::<Vec<_>>(),
    )
    .map_err(|e| CoreError::internal(format!("serializing outdated report: {e}")))?;

    Ok(Outcome::success().with_configuration(payload))
}

fn upgrade(
    ctx: &AppContext,
    global: &GlobalArgs,
    feature: Option<&str>,
    target_version: Option<&str>,
) -> CoreResult<Outcome> {
    let lockfile_path = ctx.lockfile_path();
    let existing = devcontainer_lockfile::read(&lockfile_path)?
        .ok_or_else(|| CoreError::bad_lockfile("no lockfile found; run with --experimental-lockfile first"))?;

    let selector = match feature {
        Some(id) => UpgradeSelector::Feature(id.to_string()),
        None => UpgradeSelector::All,
    };

    let caps = ctx.capabilities(global)?;
    let ids: Vec<String> = match &selector {
        UpgradeSelector::All => existing.features.keys().cloned().collect(),
        UpgradeSelector::Feature(id) => vec![id.clone()],
    };

    let mut refreshed = Vec::new();
    for id in &ids {
        let mut identifier = devcontainer_identifier::parse(id)?;
        if let (Some(target), Identifier::Oci { reference, .. }) = (target_version, &mut identifier) {
            *reference = OciReference::Tag(target.to_string());
        }
        let fetched = caps.fetcher.fetch(&identifier, None)?;
        let version = existing
            .features
            .get(id)
            .map(|e| e.version.clone())
            .unwrap_or_else(|| identifier.canonical());
        refreshed.push(ResolvedFeature {
            id: id.clone(),
            version,
            resolved: identifier.canonical(),
            integrity: fetched.digest.unwrap_or_default(),
            depends_on: existing.features.get(id).map(|e| e.depends_on.clone()).unwrap_or_default(),
        });
    }

    let (new_lock, diff) = devcontainer_lockfile::upgrade(&existing, &selector, &refreshed);
    devcontainer_lockfile::write_atomic(&lockfile_path, &new_lock)?;

    let changed: Vec<String> = diff
        .entries
        .iter()
        .map(|e| match e {
            devcontainer_types::LockDiffEntry::Added(id) => format!("added {id}"),
            devcontainer_types::LockDiffEntry::Changed(id) => format!("changed {id}"),
            devcontainer_types::LockDiffEntry::Removed(id) => format!("removed {id}"),
        })
        .collect();

    Ok(Outcome::success().with_message(if changed.is_empty() {
        "already up to date".to_string()
    } else {
        changed.join(", ")
    }))
}

fn features(ctx: &AppContext, global: &GlobalArgs, action: &FeaturesAction) -> CoreResult<Outcome> {
    match action {
        FeaturesAction::Info { identifier } => {
            let caps = ctx.capabilities(global)?;
            let parsed = devcontainer_identifier::parse(identifier)?;
            let fetched = caps.fetcher.fetch(&parsed, None)?;
            let root = fetched.feature_root()?;
            let descriptor =
                devcontainer_config::read_feature_json(&root.join("devcontainer-feature.json"))?;
            let payload = serde_json::to_value(&descriptor)
                .map_err(|e| CoreError::internal(format!("serializing feature descriptor: {e}")))?;
            Ok(Outcome::success().with_configuration(payload))
        }
        FeaturesAction::Test | FeaturesAction::Package | FeaturesAction::Publish => Ok(Outcome::error(
            "Feature authoring (test/package/publish) is not implemented by this core; only Feature consumption is",
        )),
    }
}

fn templates(action: &TemplatesAction) -> CoreResult<Outcome> {
    let name = match action {
        TemplatesAction::Apply => "apply",
        TemplatesAction::Package => "package",
        TemplatesAction::Publish => "publish",
        TemplatesAction::GenerateDocs => "generate-docs",
        TemplatesAction::Metadata => "metadata",
    };
    Ok(Outcome::error(format!(
        "templates {name} is not implemented: the template-application subsystem is out of scope for this core"
    )))
}

/// Runs the assembled plan's lifecycle schedule against `container_id`,
/// logging each command through the context's event sink before it runs.
fn run_lifecycle(
    ctx: &AppContext,
    global: &GlobalArgs,
    runtime: &DockerRuntime,
    container_id: &str,
    plan: &devcontainer_types::InstallPlan,
    invocation: Invocation,
) -> CoreResult<()> {
    let masker = ctx.secret_masker(global)?;
    let command_runner = runtime.command_runner(container_id);
    let markers = FsMarkerStore::new(ctx.user_data_folder.join("markers").join(container_id));
    std::fs::create_dir_all(ctx.user_data_folder.join("markers").join(container_id))
        .map_err(|e| CoreError::internal(format!("failed to create markers dir: {e}")))?;

    let skip = SkipFlags {
        skip_post_create: global.skip_post_create,
        skip_post_attach: global.skip_post_attach,
        skip_non_blocking_commands: global.skip_non_blocking_commands,
    };

    let logger = EventCommandLogger { log: ctx.log_sink.clone() };
    let outcome = run_schedule(
        &plan.lifecycle_schedule,
        &command_runner,
        &markers,
        &masker,
        &logger as &dyn CommandLogger,
        invocation,
        skip,
    )?;

    if let ScheduleOutcome::Deferred { remaining } = outcome {
        let background_runner = runtime.command_runner(container_id);
        let background_markers =
            FsMarkerStore::new(ctx.user_data_folder.join("markers").join(container_id));
        let background_masker = masker.clone();
        let background_logger = EventCommandLogger { log: ctx.log_sink.clone() };
        let background_skip = SkipFlags {
            skip_non_blocking_commands: false,
            ..skip
        };
        let background_log = ctx.log_sink.clone();
        std::thread::spawn(move || {
            if let Err(e) = run_schedule(
                &remaining,
                &background_runner,
                &background_markers,
                &background_masker,
                &background_logger as &dyn CommandLogger,
                invocation,
                background_skip,
            ) {
                background_log.emit(CoreEvent {
                    timestamp: chrono::Utc::now(),
                    kind: CoreEventKind::Warning {
                        message: format!("deferred lifecycle commands failed: {e}"),
                    },
                });
            }
        });
    }
    Ok(())
}

struct EventCommandLogger {
    log: Arc<dyn devcontainer_events::LogSink>,
}

impl CommandLogger for EventCommandLogger {
    fn log(&self, stage: Stage, masked_line: &str) {
        self.log.emit(CoreEvent {
            timestamp: chrono::Utc::now(),
            kind: CoreEventKind::LifecycleCommandStarted {
                stage,
                masked_command: masked_line.to_string(),
            },
        });
    }

    fn finish(&self, stage: Stage, exit_code: i32) {
        self.log.emit(CoreEvent {
            timestamp: chrono::Utc::now(),
            kind: CoreEventKind::LifecycleCommandFinished { stage, exit_code },
        });
    }
}
