//! # devcontainer-events
//!
//! The core never prints to a global logger. Instead every component emits
//! a [`CoreEvent`] through the [`LogSink`] capability; the CLI adapter
//! decides whether that becomes a line of text, a JSON blob, or a row in
//! the append-only [`EventLog`] defined here.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use devcontainer_types::Stage;
use serde::{Deserialize, Serialize};

pub const EVENTS_FILE: &str = "devcontainer-events.jsonl";

pub fn events_path(state_dir: &Path) -> PathBuf {
    state_dir.join(EVENTS_FILE)
}

/// Every structured event a core component can raise. Variants map
/// one-to-one onto a step worth surfacing to `--log-level debug`, not
/// every function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CoreEventKind {
    FetchStarted { id: String },
    FetchCompleted { id: String, digest: String },
    FetchDeduplicated { id: String },
    ResolverNodeExpanded { id: String },
    ResolverOrderComputed { order: Vec<String> },
    VersionResolved { id: String, tag: String },
    LockfileWritten { path: String },
    LockfileFrozenMismatch { id: String },
    LifecycleCommandStarted { stage: Stage, masked_command: String },
    LifecycleCommandFinished { stage: Stage, exit_code: i32 },
    LifecycleStageSkipped { stage: Stage, reason: String },
    MountResolved { workspace_folder: String, workspace_mount: String },
    Warning { message: String },
}

/// One timestamped, package-scoped event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: CoreEventKind,
}

/// Capability the core emits structured events through, mirroring the
/// `HttpClient`/`ContainerRuntime` capability-trait seams used elsewhere:
/// callers (tests, the CLI adapter) supply the implementation.
pub trait LogSink: Send + Sync {
    fn emit(&self, event: CoreEvent);
}

/// Drops every event; useful in tests that don't care about observability.
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&self, _event: CoreEvent) {}
}

/// An in-memory, append-only event log that can persist to and reload from
/// a JSONL file.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<CoreEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn record(&mut self, event: CoreEvent) {
        self.events.push(event);
    }

    /// Appends every recorded event to `path`, one JSON object per line,
    /// creating parent directories as needed. Events already on disk from a
    /// prior invocation are left untouched.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create events dir {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open events file {}", path.display()))?;
        let mut writer = std::io::BufWriter::new(file);

        for event in &self.events {
            let line = serde_json::to_string(event).context("failed to serialize event to JSON")?;
            writeln!(writer, "{line}").context("failed to write event line")?;
        }

        writer.flush().context("failed to flush events file")?;
        Ok(())
    }

    pub fn read_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let file = File::open(path)
            .with_context(|| format!("failed to open events file {}", path.display()))?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();

        for line in reader.lines() {
            let line = line
                .with_context(|| format!("failed to read line from events file {}", path.display()))?;
            let event: CoreEvent = serde_json::from_str(&line)
                .with_context(|| format!("failed to parse event JSON from line: {line}"))?;
            events.push(event);
        }

        Ok(Self { events })
    }

    pub fn all_events(&self) -> &[CoreEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl LogSink for std::sync::Mutex<EventLog> {
    fn emit(&self, event: CoreEvent) {
        self.lock().expect("event log mutex poisoned").record(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn sample(kind: CoreEventKind) -> CoreEvent {
        CoreEvent {
            timestamp: Utc::now(),
            kind,
        }
    }

    #[test]
    fn new_log_is_empty() {
        assert!(EventLog::new().is_empty());
    }

    #[test]
    fn record_adds_event() {
        let mut log = EventLog::new();
        log.record(sample(CoreEventKind::Warning {
            message: "using master as default ref".into(),
        }));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn write_then_read_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = events_path(tmp.path());

        let mut log = EventLog::new();
        log.record(sample(CoreEventKind::FetchStarted { id: "ruby".into() }));
        log.record(sample(CoreEventKind::FetchCompleted {
            id: "ruby".into(),
            digest: "sha256:abc".into(),
        }));
        log.write_to_file(&path).unwrap();

        let loaded = EventLog::read_from_file(&path).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn write_to_file_appends_across_calls() {
        let tmp = tempfile::tempdir().unwrap();
        let path = events_path(tmp.path());

        let mut first = EventLog::new();
        first.record(sample(CoreEventKind::FetchStarted { id: "ruby".into() }));
        first.write_to_file(&path).unwrap();

        let mut second = EventLog::new();
        second.record(sample(CoreEventKind::FetchCompleted {
            id: "ruby".into(),
            digest: "sha256:abc".into(),
        }));
        second.write_to_file(&path).unwrap();

        let loaded = EventLog::read_from_file(&path).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn read_missing_file_is_empty_log() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = EventLog::read_from_file(&tmp.path().join("nope.jsonl")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn mutex_event_log_implements_log_sink() {
        let sink: Mutex<EventLog> = Mutex::new(EventLog::new());
        sink.emit(sample(CoreEventKind::LifecycleCommandStarted {
            stage: Stage::PostCreate,
            masked_command: "bundle install".into(),
        }));
        assert_eq!(sink.lock().unwrap().len(), 1);
    }

    #[test]
    fn lifecycle_event_serializes_with_tagged_kind() {
        let event = sample(CoreEventKind::LifecycleCommandFinished {
            stage: Stage::PostAttach,
            exit_code: 0,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"lifecycleCommandFinished\""));
    }
}
