//! Stage 1 (expansion), Stage 3 (ordering) and the cycle detector shared by
//! both `dependsOn` and `installsAfter` edges.

use std::collections::{BTreeMap, HashMap};

use devcontainer_types::{CoreError, CoreResult, FeatureNode};

/// Supplies metadata for a Feature id discovered while expanding `dependsOn`
/// edges. The resolver never talks to the network itself; this is the seam
/// the Plan Assembler wires up to the Feature Fetcher.
pub trait FeatureMetadataProvider {
    fn metadata(&self, id: &str) -> CoreResult<FeatureNode>;
}

/// Stage 1: follow `dependsOn` edges until no new nodes appear, unifying
/// nodes that declare overlapping `legacyIds`. `installsAfter` edges never
/// add nodes — a dangling `installsAfter` target is simply absent from the
/// final graph and ignored during ordering.
pub fn expand(
    roots: Vec<FeatureNode>,
    provider: &dyn FeatureMetadataProvider,
) -> CoreResult<Vec<FeatureNode>> {
    let mut nodes: Vec<FeatureNode> = Vec::new();
    let mut queue: Vec<String> = Vec::new();

    for root in roots {
        queue.push(root.id.clone());
        insert_or_unify(&mut nodes, root);
    }

    let mut seen_deps: std::collections::HashSet<String> = std::collections::HashSet::new();
    while let Some(id) = queue.pop() {
        let deps: Vec<String> = nodes
            .iter()
            .find(|n| n.satisfies(&id))
            .map(|n| n.depends_on.iter().cloned().collect())
            .unwrap_or_default();

        for dep in deps {
            if nodes.iter().any(|n| n.satisfies(&dep)) {
                continue;
            }
            if !seen_deps.insert(dep.clone()) {
                continue;
            }
            let node = provider
                .metadata(&dep)
                .map_err(|_| CoreError::missing_hard_dependency(&id, &dep))?;
            queue.push(node.id.clone());
            insert_or_unify(&mut nodes, node);
        }
    }

    for node in &nodes {
        for dep in &node.depends_on {
            if !nodes.iter().any(|n| n.satisfies(dep)) {
                return Err(CoreError::missing_hard_dependency(&node.id, dep));
            }
        }
    }

    Ok(nodes)
}

/// Merge `incoming` into an existing node that shares an id (primary or
/// legacy), or append it as a new vertex. The newer node's id wins.
///
/// Two occurrences of the same identity with *disagreeing* `options` are
/// never merged: merging would silently keep one side's options and erase
/// the duplicate that Stage 4's conflict check needs to see. Both survive
/// as distinct entries instead, so `check_conflicts` can reject the pair.
fn insert_or_unify(nodes: &mut Vec<FeatureNode>, incoming: FeatureNode) {
    let same_identity = |n: &FeatureNode| {
        n.satisfies(&incoming.id) || incoming.legacy_ids.iter().any(|l| n.satisfies(l))
    };

    if let Some(existing) = nodes.iter().find(|n| same_identity(n)) {
        if existing.options != incoming.options {
            nodes.push(incoming);
            return;
        }
    }

    if let Some(existing) = nodes.iter_mut().find(|n| same_identity(n)) {
        let mut merged_legacy = existing.legacy_ids.clone();
        merged_legacy.insert(existing.id.clone());
        merged_legacy.extend(incoming.legacy_ids.iter().cloned());
        merged_legacy.remove(&incoming.id);

        existing.id = incoming.id;
        existing.version = incoming.version;
        existing.options = incoming.options;
        existing.depends_on = incoming.depends_on;
        existing.installs_after = incoming.installs_after;
        existing.legacy_ids = merged_legacy;
        existing.lifecycle_hooks = incoming.lifecycle_hooks;
        existing.customizations = incoming.customizations;
        return;
    }
    nodes.push(incoming);
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Explicit DFS with a three-color marker over the combined
/// `dependsOn ∪ installsAfter` precedence graph: white/unvisited,
/// gray/on-stack, black/done. A gray node reached again is the cycle.
fn detect_cycle(nodes: &[FeatureNode]) -> CoreResult<()> {
    let index: HashMap<&str, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id.as_str(), i)).collect();
    let mut color = vec![Color::White; nodes.len()];
    let mut stack: Vec<String> = Vec::new();

    fn visit(
        i: usize,
        nodes: &[FeatureNode],
        index: &HashMap<&str, usize>,
        color: &mut [Color],
        stack: &mut Vec<String>,
    ) -> CoreResult<()> {
        color[i] = Color::Gray;
        stack.push(nodes[i].id.clone());

        let successors = nodes[i]
            .depends_on
            .iter()
            .chain(nodes[i].installs_after.iter());
        for target in successors {
            let Some(&j) = index.get(target.as_str()) else {
                continue;
            };
            match color[j] {
                Color::White => visit(j, nodes, index, color, stack)?,
                Color::Gray => {
                    let mut cycle: Vec<String> = stack.clone();
                    cycle.push(nodes[j].id.clone());
                    return Err(CoreError::cyclic_dependency(&cycle));
                }
                Color::Black => {}
            }
        }

        color[i] = Color::Black;
        stack.pop();
        Ok(())
    }

    for i in 0..nodes.len() {
        if color[i] == Color::White {
            visit(i, nodes, &index, &mut color, &mut stack)?;
        }
    }
    Ok(())
}

/// Longest-path depth of each node over the combined precedence graph: a
/// node's depth is one more than the deepest edge target it points at
/// (`dependsOn` or present-`installsAfter`), or zero if it has none.
fn compute_depths(nodes: &[FeatureNode]) -> HashMap<String, u32> {
    let by_id: HashMap<&str, &FeatureNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut depths: HashMap<String, u32> = HashMap::new();

    fn depth_of<'a>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a FeatureNode>,
        depths: &mut HashMap<String, u32>,
    ) -> u32 {
        if let Some(d) = depths.get(id) {
            return *d;
        }
        let node = by_id[id];
        let mut max_parent_depth: Option<u32> = None;
        for target in node.depends_on.iter().chain(node.installs_after.iter()) {
            if let Some(&target_ref) = by_id.get(target.as_str()) {
                let d = depth_of(&target_ref.id, by_id, depths);
                max_parent_depth = Some(max_parent_depth.map_or(d, |m| m.max(d)));
            }
        }
        let depth = max_parent_depth.map_or(0, |d| d + 1);
        depths.insert(id.to_string(), depth);
        depth
    }

    for node in nodes {
        depth_of(&node.id, &by_id, &mut depths);
    }
    depths
}

/// Stage 3: a deterministic topological order — `dependsOn` edges always
/// satisfied, `installsAfter` edges respected when both ends survived
/// expansion, remaining ties broken by ascending canonical id.
///
/// `override_order` is honored verbatim for the ids it names; any id it
/// doesn't mention fills the remaining positions in algorithmic order.
pub fn order(nodes: Vec<FeatureNode>, override_order: Option<&[String]>) -> CoreResult<Vec<FeatureNode>> {
    detect_cycle(&nodes)?;
    let depths = compute_depths(&nodes);

    let mut by_id: BTreeMap<String, FeatureNode> =
        nodes.into_iter().map(|n| (n.id.clone(), n)).collect();

    let mut ordered: Vec<FeatureNode> = Vec::new();

    if let Some(overrides) = override_order {
        for id in overrides {
            if let Some(node) = by_id.remove(id) {
                ordered.push(node);
            }
        }
    }

    let mut remaining: Vec<FeatureNode> = by_id.into_values().collect();
    remaining.sort_by(|a, b| {
        let da = depths.get(&a.id).copied().unwrap_or(0);
        let db = depths.get(&b.id).copied().unwrap_or(0);
        da.cmp(&db).then_with(|| a.id.cmp(&b.id))
    });
    ordered.extend(remaining);

    Ok(ordered)
}
