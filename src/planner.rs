//! Computes the minimal exit/entry sequence for a set of requested transition
//! targets (§4.4).
//!
//! Grounded directly in the teacher's `transition_observer`: that function
//! computes a single source/target pair's exit and entry paths via a
//! lowest-common-ancestor walk (`get_path_to_root`, `lca_depth`), and expands
//! a target down to its leaves via `get_all_leaf_states`. This module
//! generalizes that to an arbitrary set of simultaneous targets (one of this
//! spec's parallel regions may transition independently of another), using
//! the same LCA-based reasoning per pair for the compatibility check (§4.4
//! step 2) and the same default-entry downward expansion
//! (`get_all_leaf_states` → `expand_default_into`) for step 1.

use std::collections::{HashMap, HashSet};

use crate::active::ActiveSet;
use crate::ids::{JointId, NodeId, NodeType, TransitTarget};
use crate::tree::{NodeKind, StateTree};

/// One step of an exit or entry sequence: either an ordinary node, or a
/// joint interleaved per §4.5 step 3b/3e.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlanStep {
    Node(NodeId),
    Joint(JointId),
}

/// The computed, ready-to-execute transition plan.
pub(crate) struct Plan {
    pub exits: Vec<PlanStep>,
    pub entries: Vec<PlanStep>,
}

impl Plan {
    pub fn empty() -> Self {
        Self { exits: Vec::new(), entries: Vec::new() }
    }
}

/// Returned when the requested targets are incompatible (§4.4 step 2) —
/// carries the node type to pass to `report_transition_error`.
pub(crate) struct Incompatible(pub NodeType);

/// Bootstrap plan for `initiate()`: enter the entire default-expansion
/// subtree from `top`, parents-first, with no exits at all. Handled as a
/// special case rather than routed through [`plan_transition`]'s general
/// outer-transition logic — see `DESIGN.md` for why: the spec's described
/// bootstrap ("active set is set to the top node alone ... forcing the full
/// default entry cascade") would otherwise make `top` its own outer
/// transition and spuriously schedule an exit for it, contradicting the
/// worked example (S1) that shows no exit at all.
pub(crate) fn plan_initiate(tree: &StateTree) -> Plan {
    let mut required = HashSet::new();
    expand_default_into(tree, tree.top(), &mut required);
    let entries = order_entries(tree, &required);
    let entries = interleave_joint_entries(tree, &ActiveSet::new(), &entries, &required);
    Plan { exits: Vec::new(), entries }
}

/// Bootstrap plan for `terminate()`: exit everything currently active,
/// leaves-first, with no entries at all.
pub(crate) fn plan_terminate(tree: &StateTree, active: &ActiveSet) -> Plan {
    let must_exit: HashSet<NodeId> = active.active_nodes().collect();
    let exit_order = order_exits(tree, &must_exit);
    let exits = interleave_joint_exits(tree, active, &exit_order);
    Plan { exits, entries: Vec::new() }
}

/// The general transition planner (§4.4 steps 1–8).
///
/// `requested` is `pending_transits`, already rewritten from any joint
/// targets to their guard nodes by the caller (the engine), matching §4.4's
/// "a transit to a joint J is first rewritten as transits to all guards of
/// J" — done once up front here rather than in the engine, since the
/// rewrite and the compatibility check both need the same expanded list.
pub(crate) fn plan_transition(
    tree: &StateTree,
    active: &ActiveSet,
    requested: &[TransitTarget],
) -> Result<Plan, Incompatible> {
    // Targets requested directly by the host (`TransitTarget::Node`) are
    // distinguished from guard nodes pulled in by rewriting a
    // `TransitTarget::Joint` to its guard set: both participate in
    // compatibility checking and required-set computation, but only the
    // former are eligible for the outer-transition rule below. S4's worked
    // example is explicit about this — `transit(J)` with guard Y1 already
    // active does not reenter Y1, even though Y1 ends up in the rewritten
    // target list; only a guard genuinely absent from the active set gets
    // entered, and none of J's guards are subject to forced exit/reenter
    // just for being named as a guard.
    let mut targets: Vec<NodeId> = Vec::new();
    let mut explicit_targets: Vec<NodeId> = Vec::new();
    for t in requested {
        match *t {
            TransitTarget::Node(n) => {
                push_unique(&mut targets, n);
                push_unique(&mut explicit_targets, n);
            }
            TransitTarget::Joint(j) => {
                for &g in &tree.joint(j).guards {
                    push_unique(&mut targets, g);
                }
            }
        }
    }
    if targets.is_empty() {
        return Ok(Plan::empty());
    }

    check_compatible(tree, &targets)?;

    let required = compute_required(tree, &targets);

    // Step 4: at every touched composite ancestor, the sibling branch that
    // was active and is not the resolved child must exit. The resolved child
    // is derived directly from each target's own path — declaration-ordered,
    // first target to reach a given composite wins — rather than by scanning
    // `required` (an unordered set that, for an untouched parallel region,
    // also holds that region's default child alongside whatever a target
    // resolved it to).
    let mut new_child_at: HashMap<NodeId, NodeId> = HashMap::new();
    for &t in &targets {
        resolved_children_along(tree, t, &mut new_child_at);
    }

    let mut must_exit: HashSet<NodeId> = HashSet::new();
    for (&composite, &new_child) in &new_child_at {
        if let NodeKind::Composite { children, .. } = &tree.node(composite).kind {
            for &child in children {
                if child != new_child && active.is_active(child) {
                    collect_active_subtree(tree, active, child, &mut must_exit);
                }
            }
        }
    }

    // Step 5: outer-transition rule — a requested target that is already
    // active gets its whole active subtree exited and reentered.
    let outer_roots: Vec<NodeId> = explicit_targets.iter().copied().filter(|&t| active.is_active(t)).collect();
    for &root in &outer_roots {
        collect_active_subtree(tree, active, root, &mut must_exit);
    }

    // Step 6: minimality — everything else active stays active.
    let mut final_active: HashSet<NodeId> =
        active.active_nodes().filter(|n| !must_exit.contains(n)).collect();
    final_active.extend(required.iter().copied());

    let mut must_enter: HashSet<NodeId> =
        final_active.iter().copied().filter(|n| !active.is_active(*n)).collect();
    for &root in &outer_roots {
        for &n in &required {
            if n == root || tree.is_ancestor_of(root, n) {
                must_enter.insert(n);
            }
        }
    }

    let exit_order = order_exits(tree, &must_exit);
    let entry_order = order_entries(tree, &must_enter);

    let exits = interleave_joint_exits(tree, active, &exit_order);
    let entries = interleave_joint_entries(tree, active, &entry_order, &final_active);

    Ok(Plan { exits, entries })
}

fn push_unique(targets: &mut Vec<NodeId>, n: NodeId) {
    if !targets.contains(&n) {
        targets.push(n);
    }
}

/// §4.4 step 2: for every pair of requested targets, their paths must agree
/// on which child of their lowest common composite ancestor is selected.
fn check_compatible(tree: &StateTree, targets: &[NodeId]) -> Result<(), Incompatible> {
    for i in 0..targets.len() {
        for j in (i + 1)..targets.len() {
            let (a, b) = (targets[i], targets[j]);
            if a == b {
                continue;
            }
            if incompatible(tree, a, b) {
                return Err(Incompatible(tree.node(b).node_type));
            }
        }
    }
    Ok(())
}

/// Whether `a` and `b` can never be simultaneously active: their lowest
/// common ancestor is a composite, and their paths through it resolve to
/// different children of it. Shared by the planner's requested-target
/// compatibility check (§4.4 step 2) and the builder's joint-guard
/// simultaneous-activatability validation (§4.1 invariant 3), which are the
/// same check applied to two different kinds of node pairs.
pub(crate) fn incompatible(tree: &StateTree, a: NodeId, b: NodeId) -> bool {
    if a == b {
        return false;
    }
    let lca = tree.lowest_common_ancestor(a, b);
    if !tree.node(lca).kind.is_composite() {
        return false;
    }
    child_through(tree, lca, a) != child_through(tree, lca, b)
}

/// The child of composite `ancestor` that `target`'s request resolves to: if
/// `target` is `ancestor` itself, that is its declared initial child
/// (default entry, §4.4 step 1); otherwise it is the element of `target`'s
/// path-to-root that is `ancestor`'s immediate child.
fn child_through(tree: &StateTree, ancestor: NodeId, target: NodeId) -> NodeId {
    if target == ancestor {
        return tree.node(ancestor).initial_child().expect("ancestor is a composite");
    }
    let mut current = target;
    loop {
        let parent = tree.parent(current).expect("ancestor is reachable from target");
        if parent == ancestor {
            return current;
        }
        current = parent;
    }
}

/// §4.4 steps 1 and 3 combined: every target's ancestor chain up to `top`
/// must be active, every target's default-entry subtree must be active, and
/// — since a `Parallel` requires *all* of its regions active — any parallel
/// newly pulled in this way pulls in the default expansion of its other
/// regions too, to a fixpoint.
fn compute_required(tree: &StateTree, targets: &[NodeId]) -> HashSet<NodeId> {
    let mut required: HashSet<NodeId> = HashSet::new();
    let mut worklist: Vec<NodeId> = Vec::new();

    for &t in targets {
        for a in tree.path_to_root(t) {
            if required.insert(a) {
                worklist.push(a);
            }
        }
        let mut subtree = HashSet::new();
        expand_default_into(tree, t, &mut subtree);
        for n in subtree {
            if required.insert(n) {
                worklist.push(n);
            }
        }
    }

    while let Some(n) = worklist.pop() {
        if let NodeKind::Parallel { regions, .. } = &tree.node(n).kind {
            for &region in regions {
                // A region already has a concrete descendant pinned by one of
                // the original targets' own path or default-entry expansion
                // (the seed loop above ran first): "parallel requires all
                // regions active" only needs to fill in the regions a target
                // didn't already resolve, not re-default a region whose real
                // child is already decided.
                let already_resolved =
                    required.iter().any(|&r| r != region && tree.is_ancestor_of(region, r));
                if already_resolved {
                    continue;
                }
                let mut subtree = HashSet::new();
                expand_default_into(tree, region, &mut subtree);
                for s in subtree {
                    if required.insert(s) {
                        worklist.push(s);
                    }
                }
            }
        }
    }

    required
}

/// Expands `node` downward through default-entry children: a composite
/// contributes its initial child (recursively), a parallel contributes every
/// region (recursively), a simple node contributes nothing more (§4.4 step 1).
fn expand_default_into(tree: &StateTree, node: NodeId, out: &mut HashSet<NodeId>) {
    if !out.insert(node) {
        return;
    }
    match &tree.node(node).kind {
        NodeKind::Simple => {}
        NodeKind::Composite { .. } => {
            if let Some(initial) = tree.node(node).initial_child() {
                expand_default_into(tree, initial, out);
            }
        }
        NodeKind::Parallel { regions, .. } => {
            for &region in regions {
                expand_default_into(tree, region, out);
            }
        }
    }
}

/// Every composite-to-resolved-child edge that `target`'s own request
/// implies: upward, the child of each composite ancestor that `target`'s
/// path actually passes through; downward, `target`'s own default-entry
/// descent through any composite below it (§4.4 steps 1 and 4 combined, read
/// off `target` directly instead of off the merged `required` set).
/// First writer wins, so calling this for each target in declaration order
/// gives a deterministic resolution when two targets agree on a shared
/// composite ancestor (the only way they can, since [`check_compatible`] has
/// already ruled out disagreement).
fn resolved_children_along(tree: &StateTree, target: NodeId, out: &mut HashMap<NodeId, NodeId>) {
    let mut current = target;
    while let Some(parent) = tree.parent(current) {
        if tree.node(parent).kind.is_composite() {
            out.entry(parent).or_insert(current);
        }
        current = parent;
    }
    collect_default_child_pairs(tree, target, out);
}

/// Downward counterpart of [`resolved_children_along`]: for every composite
/// on `node`'s default-entry descent, the edge to its default child.
fn collect_default_child_pairs(tree: &StateTree, node: NodeId, out: &mut HashMap<NodeId, NodeId>) {
    match &tree.node(node).kind {
        NodeKind::Simple => {}
        NodeKind::Composite { .. } => {
            let initial = tree.node(node).initial_child().expect("composite has initial child");
            out.entry(node).or_insert(initial);
            collect_default_child_pairs(tree, initial, out);
        }
        NodeKind::Parallel { regions, .. } => {
            for &region in regions {
                collect_default_child_pairs(tree, region, out);
            }
        }
    }
}

/// `root` plus every currently-active descendant of `root`.
fn collect_active_subtree(tree: &StateTree, active: &ActiveSet, root: NodeId, out: &mut HashSet<NodeId>) {
    if !active.is_active(root) {
        return;
    }
    if !out.insert(root) {
        return;
    }
    for &child in tree.node(root).children() {
        collect_active_subtree(tree, active, child, out);
    }
}

/// §4.4 step 7: must-exit nodes ordered leaves-first, parents-last, ties
/// broken by declaration order reversed — a post-order walk visiting
/// children (and independent exit roots) in reverse declaration order.
fn order_exits(tree: &StateTree, must_exit: &HashSet<NodeId>) -> Vec<NodeId> {
    let mut roots: Vec<NodeId> = must_exit
        .iter()
        .copied()
        .filter(|&n| tree.parent(n).map_or(true, |p| !must_exit.contains(&p)))
        .collect();
    roots.sort_by_key(|n| std::cmp::Reverse(n.index()));

    let mut order = Vec::new();
    for root in roots {
        postorder_reversed(tree, root, must_exit, &mut order);
    }
    order
}

fn postorder_reversed(tree: &StateTree, node: NodeId, scope: &HashSet<NodeId>, out: &mut Vec<NodeId>) {
    let mut children: Vec<NodeId> =
        tree.node(node).children().iter().copied().filter(|c| scope.contains(c)).collect();
    children.sort_by_key(|n| std::cmp::Reverse(n.index()));
    for child in children {
        postorder_reversed(tree, child, scope, out);
    }
    out.push(node);
}

/// §4.4 step 8: must-enter nodes ordered parents-first, leaves-last, ties
/// broken by declaration order — a pre-order walk visiting children (and
/// independent entry roots) in declaration order.
fn order_entries(tree: &StateTree, must_enter: &HashSet<NodeId>) -> Vec<NodeId> {
    let mut roots: Vec<NodeId> = must_enter
        .iter()
        .copied()
        .filter(|&n| tree.parent(n).map_or(true, |p| !must_enter.contains(&p)))
        .collect();
    roots.sort_by_key(|n| n.index());

    let mut order = Vec::new();
    for root in roots {
        preorder(tree, root, must_enter, &mut order);
    }
    order
}

fn preorder(tree: &StateTree, node: NodeId, scope: &HashSet<NodeId>, out: &mut Vec<NodeId>) {
    out.push(node);
    let mut children: Vec<NodeId> =
        tree.node(node).children().iter().copied().filter(|c| scope.contains(c)).collect();
    children.sort_by_key(|n| n.index());
    for child in children {
        preorder(tree, child, scope, out);
    }
}

/// §4.5 step 3b: a joint about to lose a guard exits before that guard, by
/// inserting its exit immediately before the first of its guards to appear
/// in `exit_order`.
fn interleave_joint_exits(tree: &StateTree, active: &ActiveSet, exit_order: &[NodeId]) -> Vec<PlanStep> {
    let exiting: HashSet<NodeId> = exit_order.iter().copied().collect();
    let mut insert_before: HashMap<NodeId, Vec<JointId>> = HashMap::new();

    let mut joint_ids: Vec<JointId> = tree.joint_ids().collect();
    joint_ids.sort_by_key(|j| j.index());
    for joint_id in joint_ids {
        if !active.is_joint_active(joint_id) {
            continue;
        }
        let joint = tree.joint(joint_id);
        if !joint.guards.iter().any(|g| exiting.contains(g)) {
            continue;
        }
        if let Some(&first_guard) = exit_order.iter().find(|n| joint.guards.contains(n)) {
            insert_before.entry(first_guard).or_default().push(joint_id);
        }
    }

    let mut result = Vec::with_capacity(exit_order.len());
    for &node in exit_order {
        if let Some(joints) = insert_before.get(&node) {
            result.extend(joints.iter().copied().map(PlanStep::Joint));
        }
        result.push(PlanStep::Node(node));
    }
    result
}

/// §4.5 step 3e: a joint that newly becomes active enters after the last of
/// its guards to appear in `entry_order`. A joint that was already active
/// does not re-enter (§4.4 step 6 minimality, extended to joints).
fn interleave_joint_entries(
    tree: &StateTree,
    active: &ActiveSet,
    entry_order: &[NodeId],
    final_active: &HashSet<NodeId>,
) -> Vec<PlanStep> {
    let entering: HashSet<NodeId> = entry_order.iter().copied().collect();
    let mut insert_after: HashMap<NodeId, Vec<JointId>> = HashMap::new();

    let mut joint_ids: Vec<JointId> = tree.joint_ids().collect();
    joint_ids.sort_by_key(|j| j.index());
    for joint_id in joint_ids {
        if active.is_joint_active(joint_id) {
            continue;
        }
        let joint = tree.joint(joint_id);
        let will_be_active = joint.guards.iter().all(|g| final_active.contains(g));
        if !will_be_active {
            continue;
        }
        if !joint.guards.iter().any(|g| entering.contains(g)) {
            // All guards were already active; nothing in this transition
            // actually brings the joint up. Nothing to interleave against,
            // so it just never becomes reachable here (cannot happen given
            // a joint requires >=1 guard and was previously inactive).
            continue;
        }
        if let Some(&last_guard) = entry_order.iter().rev().find(|n| joint.guards.contains(n)) {
            insert_after.entry(last_guard).or_default().push(joint_id);
        }
    }

    let mut result = Vec::with_capacity(entry_order.len());
    for &node in entry_order {
        result.push(PlanStep::Node(node));
        if let Some(joints) = insert_after.get(&node) {
            result.extend(joints.iter().copied().map(PlanStep::Joint));
        }
    }
    result
}
