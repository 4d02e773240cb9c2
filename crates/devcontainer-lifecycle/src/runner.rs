//! Runs a built [`LifecycleSchedule`] stage by stage, honoring skip flags
//! and marker-file idempotence, and masking secrets in anything logged
//! before a command executes.

use devcontainer_secret_mask::SecretMasker;
use devcontainer_types::{CommandBatch, CommandSpec, CoreError, CoreResult, LifecycleSchedule, Stage};

use crate::markers::MarkerStore;

/// Executes one command and reports success/failure; the container vs.
/// host distinction lives entirely in the implementation the Plan
/// Assembler wires up.
pub trait CommandRunner: Send + Sync {
    fn run(&self, stage: Stage, command: &CommandSpec) -> CoreResult<()>;
}

/// Receives the already-masked command line for a stage before it runs.
/// The CLI adapter wires this to its own event log / stdout.
pub trait CommandLogger: Send + Sync {
    fn log(&self, stage: Stage, masked_line: &str);

    /// Called once after a stage's batch has run, with its exit code (`0`
    /// on success, `-1` on failure — `CoreError` doesn't carry the
    /// originating process's real exit code as a separate field). Default
    /// no-op; callers that want a `LifecycleCommandFinished`-shaped event
    /// override this.
    fn finish(&self, _stage: Stage, _exit_code: i32) {}
}

/// Drops every line on the floor; used where the caller doesn't care to
/// observe commands before they run.
pub struct NullLogger;

impl CommandLogger for NullLogger {
    fn log(&self, _stage: Stage, _masked_line: &str) {}
}

fn display_command(command: &CommandSpec) -> String {
    match command {
        CommandSpec::Single(s) => s.clone(),
        CommandSpec::Argv(argv) => argv.join(" "),
        CommandSpec::Named(map) => map
            .values()
            .map(|c| match c {
                devcontainer_types::SimpleCommand::Single(s) => s.clone(),
                devcontainer_types::SimpleCommand::Argv(a) => a.join(" "),
            })
            .collect::<Vec<_>>()
            .join(" && "),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SkipFlags {
    pub skip_post_create: bool,
    pub skip_post_attach: bool,
    pub skip_non_blocking_commands: bool,
}

/// How this invocation relates to the container's lifecycle: a fresh
/// container runs everything; a restart re-runs `postStart`/`postAttach`
/// only; re-attaching to an already-running container re-runs only
/// `postAttach`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    Create,
    Restart,
    AttachOnly,
}

#[derive(Debug)]
pub enum ScheduleOutcome {
    Completed,
    Deferred { remaining: LifecycleSchedule },
}

/// Runs `schedule` stage by stage in strict order, stopping early when
/// `--skip-non-blocking-commands` is set (deferring `postStart`/
/// `postAttach` to the caller) and skipping stages the skip flags or the
/// marker store say shouldn't run.
pub fn run_schedule(
    schedule: &LifecycleSchedule,
    runner: &dyn CommandRunner,
    markers: &dyn MarkerStore,
    masker: &SecretMasker,
    logger: &dyn CommandLogger,
    invocation: Invocation,
    skip: SkipFlags,
) -> CoreResult<ScheduleOutcome> {
    prepare_markers(invocation, markers);

    for (position, stage) in Stage::ALL.into_iter().enumerate() {
        if !should_run_stage(stage, invocation, skip, markers) {
            continue;
        }

        if skip.skip_non_blocking_commands && stage == Stage::PostStart {
            let remaining = Stage::ALL[position..]
                .iter()
                .filter_map(|s| schedule.get(s).map(|batches| (*s, batches.clone())))
                .collect();
            return Ok(ScheduleOutcome::Deferred { remaining });
        }

        let Some(batches) = schedule.get(&stage) else {
            mark_done(markers, stage);
            continue;
        };

        for batch in batches {
            for command in &batch.commands {
                logger.log(stage, &masker.mask(&display_command(command)));
            }
            let allow_failure = stage == Stage::PostAttach && skip.skip_post_attach;
            let result = run_batch(stage, batch, runner);
            logger.finish(stage, if result.is_ok() { 0 } else { -1 });
            if let Err(e) = result {
                if !allow_failure {
                    return Err(e);
                }
            }
        }
        mark_done(markers, stage);
    }

    Ok(ScheduleOutcome::Completed)
}

/// A restart always re-runs `postStart`/`postAttach`; their markers from
/// the previous start are stale and must not suppress that.
fn prepare_markers(invocation: Invocation, markers: &dyn MarkerStore) {
    if invocation == Invocation::Restart {
        let _ = markers.clear(Stage::PostStart);
        let _ = markers.clear(Stage::PostAttach);
    }
}

fn should_run_stage(stage: Stage, invocation: Invocation, skip: SkipFlags, markers: &dyn MarkerStore) -> bool {
    if stage == Stage::PostCreate && skip.skip_post_create {
        return false;
    }
    if stage == Stage::PostAttach && skip.skip_post_create {
        return false;
    }

    match invocation {
        Invocation::Create => true,
        Invocation::Restart => stage.runs_every_time() || stage == Stage::PostStart || !markers.exists(stage),
        Invocation::AttachOnly => stage.runs_every_time(),
    }
}

fn mark_done(markers: &dyn MarkerStore, stage: Stage) {
    let _ = markers.write(stage);
}

fn run_batch(stage: Stage, batch: &CommandBatch, runner: &dyn CommandRunner) -> CoreResult<()> {
    if !batch.is_concurrent() {
        return runner.run(stage, &batch.commands[0]);
    }

    std::thread::scope(|scope| {
        let handles: Vec<_> = batch
            .commands
            .iter()
            .map(|cmd| scope.spawn(|| runner.run(stage, cmd)))
            .collect();

        let mut first_err: Option<CoreError> = None;
        for handle in handles {
            if let Err(e) = handle.join().expect("lifecycle command thread panicked") {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::FsMarkerStore;
    use crate::schedule::build_schedule;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct RecordingRunner {
        log: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl RecordingRunner {
        fn new() -> Self {
            Self {
                log: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing(cmd: &str) -> Self {
            Self {
                log: Mutex::new(Vec::new()),
                fail_on: Some(cmd.to_string()),
            }
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, _stage: Stage, command: &CommandSpec) -> CoreResult<()> {
            let CommandSpec::Single(cmd) = command else {
                panic!("test only uses Single commands")
            };
            self.log.lock().unwrap().push(cmd.clone());
            if self.fail_on.as_deref() == Some(cmd.as_str()) {
                return Err(CoreError::lifecycle_command_failed("test", cmd, Some(1)));
            }
            Ok(())
        }
    }

    fn spec(cmd: &str) -> CommandSpec {
        CommandSpec::Single(cmd.to_string())
    }

    #[test]
    fn fresh_container_runs_every_stage_in_order() {
        let schedule = build_schedule(vec![
            (Stage::OnCreate, spec("oncreate")),
            (Stage::PostCreate, spec("postcreate")),
            (Stage::PostAttach, spec("postattach")),
        ]);
        let runner = RecordingRunner::new();
        let tmp = tempfile::tempdir().unwrap();
        let markers = FsMarkerStore::new(tmp.path());

        let outcome = run_schedule(&schedule, &runner, &markers, &SecretMasker::empty(), &NullLogger, Invocation::Create, SkipFlags::default()).unwrap();
        assert!(matches!(outcome, ScheduleOutcome::Completed));
        assert_eq!(*runner.log.lock().unwrap(), vec!["oncreate", "postcreate", "postattach"]);
        assert!(markers.exists(Stage::OnCreate));
        assert!(markers.exists(Stage::PostCreate));
    }

    #[test]
    fn restart_skips_on_create_and_post_create_but_runs_post_start_and_post_attach() {
        let schedule = build_schedule(vec![
            (Stage::OnCreate, spec("oncreate")),
            (Stage::PostCreate, spec("postcreate")),
            (Stage::PostStart, spec("poststart")),
            (Stage::PostAttach, spec("postattach")),
        ]);
        let tmp = tempfile::tempdir().unwrap();
        let markers = FsMarkerStore::new(tmp.path());
        markers.write(Stage::OnCreate).unwrap();
        markers.write(Stage::PostCreate).unwrap();

        let runner = RecordingRunner::new();
        run_schedule(&schedule, &runner, &markers, &SecretMasker::empty(), &NullLogger, Invocation::Restart, SkipFlags::default()).unwrap();
        assert_eq!(*runner.log.lock().unwrap(), vec!["poststart", "postattach"]);
    }

    #[test]
    fn attach_only_runs_post_attach_alone() {
        let schedule = build_schedule(vec![
            (Stage::PostCreate, spec("postcreate")),
            (Stage::PostAttach, spec("postattach")),
        ]);
        let tmp = tempfile::tempdir().unwrap();
        let markers = FsMarkerStore::new(tmp.path());
        let runner = RecordingRunner::new();
        run_schedule(&schedule, &runner, &markers, &SecretMasker::empty(), &NullLogger, Invocation::AttachOnly, SkipFlags::default()).unwrap();
        assert_eq!(*runner.log.lock().unwrap(), vec!["postattach"]);
    }

    #[test]
    fn skip_post_create_also_skips_post_attach_on_first_creation() {
        let schedule = build_schedule(vec![
            (Stage::PostCreate, spec("postcreate")),
            (Stage::PostAttach, spec("postattach")),
        ]);
        let tmp = tempfile::tempdir().unwrap();
        let markers = FsMarkerStore::new(tmp.path());
        let runner = RecordingRunner::new();
        let skip = SkipFlags {
            skip_post_create: true,
            ..Default::default()
        };
        run_schedule(&schedule, &runner, &markers, &SecretMasker::empty(), &NullLogger, Invocation::Create, skip).unwrap();
        assert!(runner.log.lock().unwrap().is_empty());
    }

    #[test]
    fn failing_command_is_fatal_by_default() {
        let schedule = build_schedule(vec![(Stage::OnCreate, spec("boom"))]);
        let tmp = tempfile::tempdir().unwrap();
        let markers = FsMarkerStore::new(tmp.path());
        let runner = RecordingRunner::failing("boom");
        let err = run_schedule(&schedule, &runner, &markers, &SecretMasker::empty(), &NullLogger, Invocation::Create, SkipFlags::default()).unwrap_err();
        assert_eq!(err.kind(), devcontainer_types::ErrorKind::LifecycleCommandFailed);
    }

    #[test]
    fn skip_post_attach_tolerates_post_attach_failure_only() {
        let schedule = build_schedule(vec![(Stage::PostAttach, spec("boom"))]);
        let tmp = tempfile::tempdir().unwrap();
        let markers = FsMarkerStore::new(tmp.path());
        let runner = RecordingRunner::failing("boom");
        let skip = SkipFlags {
            skip_post_attach: true,
            ..Default::default()
        };
        let outcome = run_schedule(&schedule, &runner, &markers, &SecretMasker::empty(), &NullLogger, Invocation::Create, skip).unwrap();
        assert!(matches!(outcome, ScheduleOutcome::Completed));
    }

    #[test]
    fn skip_non_blocking_commands_defers_post_start_and_post_attach() {
        let schedule = build_schedule(vec![
            (Stage::OnCreate, spec("oncreate")),
            (Stage::PostCreate, spec("postcreate")),
            (Stage::PostStart, spec("poststart")),
            (Stage::PostAttach, spec("postattach")),
        ]);
        let tmp = tempfile::tempdir().unwrap();
        let markers = FsMarkerStore::new(tmp.path());
        let runner = RecordingRunner::new();
        let skip = SkipFlags {
            skip_non_blocking_commands: true,
            ..Default::default()
        };
        let outcome = run_schedule(&schedule, &runner, &markers, &SecretMasker::empty(), &NullLogger, Invocation::Create, skip).unwrap();
        assert_eq!(*runner.log.lock().unwrap(), vec!["oncreate", "postcreate"]);
        match outcome {
            ScheduleOutcome::Deferred { remaining } => {
                assert!(remaining.contains_key(&Stage::PostStart));
                assert!(remaining.contains_key(&Stage::PostAttach));
            }
            ScheduleOutcome::Completed => panic!("expected deferred outcome"),
        }
    }

    #[test]
    fn command_lines_are_masked_before_reaching_the_logger() {
        struct CapturingLogger(Mutex<Vec<String>>);
        impl CommandLogger for CapturingLogger {
            fn log(&self, _stage: Stage, masked_line: &str) {
                self.0.lock().unwrap().push(masked_line.to_string());
            }
        }

        let schedule = build_schedule(vec![(
            Stage::OnCreate,
            CommandSpec::Single("curl -H 'token: sekrit-value'".into()),
        )]);
        let tmp = tempfile::tempdir().unwrap();
        let markers = FsMarkerStore::new(tmp.path());
        let runner = RecordingRunner::new();
        let masker = SecretMasker::new(["sekrit-value"]);
        let logger = CapturingLogger(Mutex::new(Vec::new()));

        run_schedule(
            &schedule,
            &runner,
            &markers,
            &masker,
            &logger,
            Invocation::Create,
            SkipFlags::default(),
        )
        .unwrap();

        assert_eq!(logger.0.lock().unwrap()[0], "curl -H 'token: ********'");
    }

    #[test]
    fn finish_is_called_with_zero_on_success_and_negative_one_on_failure() {
        struct RecordingLogger(Mutex<Vec<(Stage, i32)>>);
        impl CommandLogger for RecordingLogger {
            fn log(&self, _stage: Stage, _masked_line: &str) {}
            fn finish(&self, stage: Stage, exit_code: i32) {
                self.0.lock().unwrap().push((stage, exit_code));
            }
        }

        let schedule = build_schedule(vec![
            (Stage::OnCreate, spec("ok")),
            (Stage::PostCreate, spec("boom")),
        ]);
        let tmp = tempfile::tempdir().unwrap();
        let markers = FsMarkerStore::new(tmp.path());
        let runner = RecordingRunner::failing("boom");
        let logger = RecordingLogger(Mutex::new(Vec::new()));

        let err = run_schedule(
            &schedule,
            &runner,
            &markers,
            &SecretMasker::empty(),
            &logger,
            Invocation::Create,
            SkipFlags::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), devcontainer_types::ErrorKind::LifecycleCommandFailed);
        assert_eq!(
            *logger.0.lock().unwrap(),
            vec![(Stage::OnCreate, 0), (Stage::PostCreate, -1)]
        );
    }

    #[test]
    fn concurrent_batch_runs_all_named_commands() {
        let counter = AtomicUsize::new(0);
        struct CountingRunner<'a>(&'a AtomicUsize);
        impl CommandRunner for CountingRunner<'_> {
            fn run(&self, _stage: Stage, _command: &CommandSpec) -> CoreResult<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
        let batch = CommandBatch {
            commands: vec![spec("a"), spec("b"), spec("c")],
        };
        run_batch(Stage::PostCreate, &batch, &CountingRunner(&counter)).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
