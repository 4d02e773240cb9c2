//! # devcontainer-resolver
//!
//! Builds the Feature dependency graph from a root set, orders it
//! deterministically, and rejects conflicting options — three of the four
//! stages described for the Dependency Resolver component: expansion,
//! ordering, conflict check. The fourth, version resolution (matching a
//! possibly-partial OCI tag against a repo's published tags), needs a
//! network-backed tag listing this crate deliberately doesn't have; its
//! pure matching logic lives here as [`resolve_tag`], driven by whichever
//! caller has that capability — the Plan Assembler, same as
//! [`FeatureMetadataProvider`] for expansion.

mod conflict;
mod graph;
mod version;

pub use conflict::check_conflicts;
pub use graph::{expand, order, FeatureMetadataProvider};
pub use version::resolve_tag;

use devcontainer_types::{CoreResult, FeatureNode};

/// Runs expansion, ordering and the conflict check over a root set,
/// returning the final, deterministically-ordered install list. Version
/// resolution runs separately, against whichever nodes carry an
/// OCI tag, before their Features are fetched.
pub fn resolve(
    roots: Vec<FeatureNode>,
    provider: &dyn FeatureMetadataProvider,
    override_order: Option<&[String]>,
) -> CoreResult<Vec<FeatureNode>> {
    let expanded = graph::expand(roots, provider)?;
    let ordered = graph::order(expanded, override_order)?;
    conflict::check_conflicts(&ordered)?;
    Ok(ordered)
}
