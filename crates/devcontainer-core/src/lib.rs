//! # devcontainer-core
//!
//! The Plan Assembler (§4.I): the one entry point, [`assemble`], that
//! composes every other component's output — workspace/mount resolution,
//! dependency resolution (backed by identifier parsing, the OCI client and
//! the Feature fetcher), the lockfile engine, the lifecycle scheduler, and
//! variable substitution — into a single [`devcontainer_types::InstallPlan`].
//!
//! Driving that plan against an actual container engine is explicitly out
//! of scope; [`ContainerRuntime`] is the capability seam the CLI adapter
//! implements for that instead.

mod assemble;
mod capabilities;
mod provider;

pub use assemble::assemble;
pub use capabilities::{Capabilities, ContainerRuntime};
