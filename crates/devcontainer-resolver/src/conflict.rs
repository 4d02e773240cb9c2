//! Stage 4 — conflict check: two nodes that canonicalize to the same id
//! must agree on `options`.

use devcontainer_types::{CoreError, CoreResult, FeatureNode};

pub fn check_conflicts(nodes: &[FeatureNode]) -> CoreResult<()> {
    for (i, a) in nodes.iter().enumerate() {
        for b in &nodes[i + 1..] {
            if a.id == b.id && a.options != b.options {
                return Err(CoreError::option_conflict(&a.id));
            }
        }
    }
    Ok(())
}
