//! # devcontainer-types
//!
//! Domain types shared across every component of the orchestrator: the
//! Feature identifier forms, the OCI manifest shape used to compute content
//! digests, the resolver's `FeatureNode` graph vertex, the lockfile schema,
//! and the install plan handed to the container runtime adapter.
//!
//! This crate has no behavior of its own beyond small derived helpers
//! (`canonical()`, `agrees_with()`, ...). Parsing, fetching, resolving, and
//! scheduling all live in their own crates and depend on this one.

pub mod error;
pub mod identifier;
pub mod lockfile;
pub mod manifest;
pub mod node;
pub mod plan;

pub use error::{CoreError, CoreResult, ErrorKind};
pub use identifier::{Identifier, OciReference};
pub use lockfile::{LockDiff, LockDiffEntry, LockEntry, LockMode, Lockfile};
pub use manifest::{Manifest, ManifestConfig, ManifestLayer};
pub use node::{CommandSpec, FeatureNode, SimpleCommand, Stage};
pub use plan::{CommandBatch, InstallPlan, LifecycleSchedule, PlannedFeature, Workspace};
