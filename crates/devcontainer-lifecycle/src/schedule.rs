//! Builds a [`LifecycleSchedule`] from ordered stage contributions: each
//! feature (in resolver install order), then the top-level config.

use devcontainer_types::{CommandBatch, CommandSpec, LifecycleSchedule, SimpleCommand, Stage};

/// Turns a single contribution's [`CommandSpec`] into the batch it expands
/// to: `Named` maps become one concurrent batch, everything else a batch
/// of one.
pub fn to_batch(spec: CommandSpec) -> CommandBatch {
    match spec {
        CommandSpec::Named(map) => CommandBatch {
            commands: map
                .into_values()
                .map(|cmd| match cmd {
                    SimpleCommand::Single(s) => CommandSpec::Single(s),
                    SimpleCommand::Argv(a) => CommandSpec::Argv(a),
                })
                .collect(),
        },
        other => CommandBatch::single(other),
    }
}

/// `contributions` must already be ordered: for a given stage, every
/// feature's contribution (in install order) precedes the config's.
pub fn build_schedule(contributions: Vec<(Stage, CommandSpec)>) -> LifecycleSchedule {
    let mut schedule = LifecycleSchedule::new();
    for (stage, spec) in contributions {
        schedule.entry(stage).or_default().push(to_batch(spec));
    }
    schedule
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn named_map_becomes_concurrent_batch() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), SimpleCommand::Single("echo a".into()));
        map.insert("b".to_string(), SimpleCommand::Single("echo b".into()));
        let batch = to_batch(CommandSpec::Named(map));
        assert!(batch.is_concurrent());
        assert_eq!(batch.commands.len(), 2);
    }

    #[test]
    fn single_command_becomes_batch_of_one() {
        let batch = to_batch(CommandSpec::Single("echo hi".into()));
        assert!(!batch.is_concurrent());
    }

    #[test]
    fn schedule_preserves_contribution_order_per_stage() {
        let contributions = vec![
            (Stage::PostCreate, CommandSpec::Single("feature-a".into())),
            (Stage::PostCreate, CommandSpec::Single("feature-b".into())),
            (Stage::PostCreate, CommandSpec::Single("config".into())),
        ];
        let schedule = build_schedule(contributions);
        let batches = &schedule[&Stage::PostCreate];
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].commands[0], CommandSpec::Single("feature-a".into()));
        assert_eq!(batches[2].commands[0], CommandSpec::Single("config".into()));
    }
}
