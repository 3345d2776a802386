//! The static, read-only state tree (§4.1).
//!
//! Built once by [`crate::builder::StateTreeBuilder`] and validated at that
//! point; everything in this module is immutable afterward. The mutable
//! configuration lives in [`crate::active::ActiveSet`].

use std::collections::HashMap;

use crate::handlers::NodeHandlers;
use crate::ids::{JointId, NodeId, NodeType};

/// The kind-specific shape of a node (§3 "Node kinds").
#[derive(Debug)]
pub enum NodeKind {
    /// Leaf; no children.
    Simple,
    /// Ordered children; exactly one active at a time. `initial` indexes
    /// into `children`.
    Composite { children: Vec<NodeId>, initial: usize },
    /// Region children, all active together, plus any joints attached to
    /// this parallel as joint-children.
    Parallel { regions: Vec<NodeId>, joints: Vec<JointId> },
}

impl NodeKind {
    pub fn is_simple(&self) -> bool {
        matches!(self, NodeKind::Simple)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, NodeKind::Composite { .. })
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, NodeKind::Parallel { .. })
    }
}

/// A declared state (§3 "Node attributes").
#[derive(Debug)]
pub struct Node {
    pub node_type: NodeType,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub handlers: NodeHandlers,
}

impl Node {
    /// The ordered set of structural children (composite children, or
    /// parallel regions). Empty for `Simple`.
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Simple => &[],
            NodeKind::Composite { children, .. } => children,
            NodeKind::Parallel { regions, .. } => regions,
        }
    }

    /// The initial child of a composite, if this node is one.
    pub fn initial_child(&self) -> Option<NodeId> {
        match &self.kind {
            NodeKind::Composite { children, initial } => children.get(*initial).copied(),
            _ => None,
        }
    }

    /// The joint-children of a parallel, if this node is one.
    pub fn joints(&self) -> &[JointId] {
        match &self.kind {
            NodeKind::Parallel { joints, .. } => joints,
            _ => &[],
        }
    }
}

/// A joint pseudo-node (§3 "Joint"). Lives in its own identity space: a
/// joint is never a structural child of anything (invariant 4), only a
/// joint-child of exactly one `Parallel`.
///
/// `guards` is restricted to ordinary tree nodes rather than `§3`'s
/// unqualified "any kind": see `DESIGN.md` for why allowing a joint to guard
/// another joint was not implemented (the spec's worked examples never
/// exercise it, and "ancestor path" for a joint is otherwise undefined).
#[derive(Debug)]
pub struct Joint {
    pub joint_type: NodeType,
    pub guards: Vec<NodeId>,
    pub parallel: NodeId,
    pub handlers: NodeHandlers,
}

/// The validated, static state tree.
#[derive(Debug)]
pub struct StateTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) joints: Vec<Joint>,
    pub(crate) top: NodeId,
    pub(crate) type_index: HashMap<NodeType, NodeId>,
    pub(crate) joint_type_index: HashMap<NodeType, JointId>,
    /// Reverse index: node -> joints whose guard set includes it (§9:
    /// "a mapping from every node to the set of joints whose guard set
    /// includes it"). Maintained once at construction so
    /// `recompute_joints` only has to consult joints touched by the nodes
    /// that actually changed.
    pub(crate) joints_guarded_by: HashMap<NodeId, Vec<JointId>>,
}

impl StateTree {
    pub fn top(&self) -> NodeId {
        self.top
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn joint(&self, id: JointId) -> &Joint {
        &self.joints[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(|i| NodeId::new(i as u32))
    }

    pub fn joint_ids(&self) -> impl Iterator<Item = JointId> {
        (0..self.joints.len()).map(|i| JointId::new(i as u32))
    }

    pub fn node_by_type(&self, node_type: NodeType) -> Option<NodeId> {
        self.type_index.get(node_type).copied()
    }

    pub fn joint_by_type(&self, joint_type: NodeType) -> Option<JointId> {
        self.joint_type_index.get(joint_type).copied()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Joints guarding (at least in part) on `node`.
    pub fn joints_guarded_by(&self, node: NodeId) -> &[JointId] {
        self.joints_guarded_by.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `id`, then its parent, then its parent's parent, ... ending at `top`.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            path.push(parent);
            current = parent;
        }
        path
    }

    /// An iterator over `id`'s strict ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut current = self.parent(id);
        std::iter::from_fn(move || {
            let next = current?;
            current = self.parent(next);
            Some(next)
        })
    }

    pub fn is_ancestor_of(&self, ancestor: NodeId, descendant: NodeId) -> bool {
        self.ancestors(descendant).any(|a| a == ancestor)
    }

    /// The lowest common ancestor of `a` and `b`, or `None` if one is an
    /// ancestor of (or equal to) the other with nothing shared above both —
    /// in a single-rooted tree this is only `None` for unrelated ids, which
    /// cannot occur for two ids from the same `StateTree`.
    pub fn lowest_common_ancestor(&self, a: NodeId, b: NodeId) -> NodeId {
        let path_a = self.path_to_root(a);
        let path_b = self.path_to_root(b);
        let set_a: std::collections::HashSet<NodeId> = path_a.iter().copied().collect();
        path_b
            .into_iter()
            .find(|n| set_a.contains(n))
            .expect("single-rooted tree: top is always common")
    }
}
