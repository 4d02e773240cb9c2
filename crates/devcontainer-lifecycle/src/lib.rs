//! # devcontainer-lifecycle
//!
//! Builds the five-stage lifecycle schedule from ordered feature and config
//! contributions and runs it: concurrent `Named` batches on their own
//! threads, marker-gated restart idempotence, and secret masking of every
//! command line before it reaches a log sink.

mod markers;
mod runner;
mod schedule;

pub use markers::{FsMarkerStore, MarkerStore};
pub use runner::{
    CommandLogger, CommandRunner, Invocation, NullLogger, ScheduleOutcome, SkipFlags, run_schedule,
};
pub use schedule::{build_schedule, to_batch};
