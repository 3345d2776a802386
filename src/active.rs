//! The mutable configuration: which nodes and joints are currently active (§4.2).
//!
//! Mirrors the teacher's `StateMachine { active, active_leaves }` component,
//! generalized from an ECS `HashSet<Entity>` pair to a plain owned set (there
//! is no ECS world to store these as components of).

use std::collections::HashSet;

use crate::ids::{JointId, NodeId};
use crate::tree::StateTree;

/// The runtime configuration (§3 "Runtime state").
#[derive(Default)]
pub struct ActiveSet {
    active: HashSet<NodeId>,
    active_joints: HashSet<JointId>,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, node: NodeId) -> bool {
        self.active.contains(&node)
    }

    pub fn is_joint_active(&self, joint: JointId) -> bool {
        self.active_joints.contains(&joint)
    }

    pub fn active_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.active.iter().copied()
    }

    pub fn active_joint_ids(&self) -> impl Iterator<Item = JointId> + '_ {
        self.active_joints.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Raw primitive: used only by the planner during plan execution (§4.2).
    pub(crate) fn activate(&mut self, node: NodeId) {
        self.active.insert(node);
    }

    /// Raw primitive: used only by the planner during plan execution (§4.2).
    pub(crate) fn deactivate(&mut self, node: NodeId) {
        self.active.remove(&node);
    }

    /// Raw primitive: flips a joint's activation directly, used by the
    /// engine when executing a [`crate::planner::PlanStep::Joint`] step
    /// (the planner has already decided exactly which joints change and
    /// exactly where in the exit/entry order, per §4.5 step 3b/3e).
    pub(crate) fn activate_joint(&mut self, joint: JointId) {
        self.active_joints.insert(joint);
    }

    pub(crate) fn deactivate_joint(&mut self, joint: JointId) {
        self.active_joints.remove(&joint);
    }

    pub(crate) fn clear(&mut self) {
        self.active.clear();
        self.active_joints.clear();
    }

    /// Recomputes `active_joints` against the current `active` set, but only
    /// consults joints whose guard set intersects `changed_nodes` (§9:
    /// "`recompute_joints` only consults joints whose guard set intersects
    /// the just-changed nodes").
    ///
    /// Returns `(newly_active, newly_inactive)`. `newly_inactive` is ordered
    /// in reverse declaration order (feeds the exit sequence, deepest/latest
    /// first); `newly_active` is ordered in forward declaration order (feeds
    /// the entry sequence) — per §4.2.
    pub fn recompute_joints(
        &mut self,
        tree: &StateTree,
        changed_nodes: &[NodeId],
    ) -> (Vec<JointId>, Vec<JointId>) {
        let mut candidates: Vec<JointId> = changed_nodes
            .iter()
            .flat_map(|n| tree.joints_guarded_by(*n).iter().copied())
            .collect();
        candidates.sort_by_key(|j| j.index());
        candidates.dedup();

        let mut newly_active = Vec::new();
        let mut newly_inactive = Vec::new();
        for joint_id in candidates {
            let joint = tree.joint(joint_id);
            let should_be_active = joint.guards.iter().all(|g| self.active.contains(g));
            let was_active = self.active_joints.contains(&joint_id);
            match (was_active, should_be_active) {
                (false, true) => newly_active.push(joint_id),
                (true, false) => newly_inactive.push(joint_id),
                _ => {}
            }
        }

        newly_active.sort_by_key(|j| j.index());
        newly_inactive.sort_by_key(|j| std::cmp::Reverse(j.index()));

        for joint_id in &newly_inactive {
            self.active_joints.remove(joint_id);
        }
        for joint_id in &newly_active {
            self.active_joints.insert(*joint_id);
        }

        (newly_active, newly_inactive)
    }

    /// A snapshot of the configuration, independent of the live `ActiveSet`
    /// (§10.4: a `serde`-derivable export of the active configuration — for
    /// a host that wants to persist or transmit it; persistence itself
    /// stays out of scope).
    pub fn snapshot(&self) -> ActiveSnapshot {
        let mut active: Vec<NodeId> = self.active.iter().copied().collect();
        active.sort_by_key(|n| n.index());
        let mut active_joints: Vec<JointId> = self.active_joints.iter().copied().collect();
        active_joints.sort_by_key(|j| j.index());
        ActiveSnapshot { active, active_joints }
    }
}

/// A serializable view of an [`ActiveSet`] at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActiveSnapshot {
    pub active: Vec<NodeId>,
    pub active_joints: Vec<JointId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_has_no_active_nodes() {
        let set = ActiveSet::new();
        assert!(set.is_empty());
        assert_eq!(set.active_nodes().count(), 0);
    }

    #[test]
    fn activate_and_deactivate_are_idempotent() {
        let mut set = ActiveSet::new();
        let n = NodeId::new(0);
        set.activate(n);
        set.activate(n);
        assert!(set.is_active(n));
        assert_eq!(set.len(), 1);
        set.deactivate(n);
        set.deactivate(n);
        assert!(!set.is_active(n));
    }
}
