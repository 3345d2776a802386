//! A minimal imperative builder for declaring a [`StateTree`] (§10.4).
//!
//! The spec leaves state *declaration* syntax entirely to the host; this
//! exists so the crate's own tests and doc examples have something concrete
//! to build trees with, grounded in the teacher's `GearboxPlugin`
//! registration style (declare, then resolve references, then validate)
//! generalized away from an ECS `App`/`World` into a plain method-chaining
//! builder over node-type symbols.

use std::collections::HashMap;

use crate::error::ConfigError;
use crate::handlers::{DispatchContext, HandlerFn, NodeHandlers};
use crate::ids::{AnyEvent, JointId, NodeId, NodeType};
use crate::planner;
use crate::tree::{Joint, Node, NodeKind, StateTree};

enum PendingKind {
    Simple,
    Composite { children: Vec<NodeType>, initial: NodeType },
    Parallel { regions: Vec<NodeType> },
}

struct PendingJoint {
    guards: Vec<NodeType>,
    parallel: NodeType,
    handlers: NodeHandlers,
}

/// Builds a [`StateTree`] node by node, then validates it (§4.1).
#[derive(Default)]
pub struct StateTreeBuilder {
    declared_order: Vec<NodeType>,
    declared_count: HashMap<NodeType, u32>,
    kinds: HashMap<NodeType, PendingKind>,
    handlers: HashMap<NodeType, NodeHandlers>,
    joint_order: Vec<NodeType>,
    joints: HashMap<NodeType, PendingJoint>,
}

impl StateTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn declare(&mut self, node_type: NodeType, kind: PendingKind) {
        self.declared_order.push(node_type);
        *self.declared_count.entry(node_type).or_insert(0) += 1;
        self.kinds.insert(node_type, kind);
    }

    pub fn simple(mut self, node_type: NodeType) -> Self {
        self.declare(node_type, PendingKind::Simple);
        self
    }

    pub fn composite(mut self, node_type: NodeType, children: &[NodeType], initial: NodeType) -> Self {
        self.declare(node_type, PendingKind::Composite { children: children.to_vec(), initial });
        self
    }

    pub fn parallel(mut self, node_type: NodeType, regions: &[NodeType]) -> Self {
        self.declare(node_type, PendingKind::Parallel { regions: regions.to_vec() });
        self
    }

    /// Declares a joint guarded by `guards`, attached to `parallel` as a
    /// joint-child (§3 "Joint").
    pub fn joint(mut self, joint_type: NodeType, guards: &[NodeType], parallel: NodeType) -> Self {
        self.joint_order.push(joint_type);
        self.joints.insert(
            joint_type,
            PendingJoint { guards: guards.to_vec(), parallel, handlers: NodeHandlers::default() },
        );
        self
    }

    pub fn on_enter<E, F>(mut self, node_type: NodeType, handler: F) -> Self
    where
        E: std::any::Any + 'static,
        F: Fn(&AnyEvent, &mut DispatchContext<'_>) -> bool + 'static,
    {
        self.handlers.entry(node_type).or_default().enter.add_typed::<E>(wrap(handler));
        self
    }

    pub fn on_enter_any<F>(mut self, node_type: NodeType, handler: F) -> Self
    where
        F: Fn(&AnyEvent, &mut DispatchContext<'_>) -> bool + 'static,
    {
        self.handlers.entry(node_type).or_default().enter.add_generic(wrap(handler));
        self
    }

    pub fn on_exit<E, F>(mut self, node_type: NodeType, handler: F) -> Self
    where
        E: std::any::Any + 'static,
        F: Fn(&AnyEvent, &mut DispatchContext<'_>) -> bool + 'static,
    {
        self.handlers.entry(node_type).or_default().exit.add_typed::<E>(wrap(handler));
        self
    }

    pub fn on_exit_any<F>(mut self, node_type: NodeType, handler: F) -> Self
    where
        F: Fn(&AnyEvent, &mut DispatchContext<'_>) -> bool + 'static,
    {
        self.handlers.entry(node_type).or_default().exit.add_generic(wrap(handler));
        self
    }

    pub fn on_handle<E, F>(mut self, node_type: NodeType, handler: F) -> Self
    where
        E: std::any::Any + 'static,
        F: Fn(&AnyEvent, &mut DispatchContext<'_>) -> bool + 'static,
    {
        self.handlers.entry(node_type).or_default().handle.add_typed::<E>(wrap(handler));
        self
    }

    pub fn on_joint_enter<E, F>(mut self, joint_type: NodeType, handler: F) -> Self
    where
        E: std::any::Any + 'static,
        F: Fn(&AnyEvent, &mut DispatchContext<'_>) -> bool + 'static,
    {
        if let Some(j) = self.joints.get_mut(joint_type) {
            j.handlers.enter.add_typed::<E>(wrap(handler));
        }
        self
    }

    pub fn on_joint_exit<E, F>(mut self, joint_type: NodeType, handler: F) -> Self
    where
        E: std::any::Any + 'static,
        F: Fn(&AnyEvent, &mut DispatchContext<'_>) -> bool + 'static,
    {
        if let Some(j) = self.joints.get_mut(joint_type) {
            j.handlers.exit.add_typed::<E>(wrap(handler));
        }
        self
    }

    pub fn on_joint_handle<E, F>(mut self, joint_type: NodeType, handler: F) -> Self
    where
        E: std::any::Any + 'static,
        F: Fn(&AnyEvent, &mut DispatchContext<'_>) -> bool + 'static,
    {
        if let Some(j) = self.joints.get_mut(joint_type) {
            j.handlers.handle.add_typed::<E>(wrap(handler));
        }
        self
    }

    /// Runs the §4.1 validation pass and produces a [`StateTree`].
    pub fn build(mut self) -> Result<StateTree, ConfigError> {
        for (&node_type, &count) in &self.declared_count {
            if count > 1 {
                return Err(ConfigError::DuplicateNode(node_type));
            }
        }

        let mut seen_joints: HashMap<NodeType, u32> = HashMap::new();
        for &jt in &self.joint_order {
            *seen_joints.entry(jt).or_insert(0) += 1;
        }
        for (&joint_type, &count) in &seen_joints {
            if count > 1 {
                return Err(ConfigError::DuplicateNode(joint_type));
            }
        }

        // Assign NodeIds in first-declaration order.
        let mut order: Vec<NodeType> = Vec::new();
        for &t in &self.declared_order {
            if !order.contains(&t) {
                order.push(t);
            }
        }
        let mut type_index: HashMap<NodeType, NodeId> = HashMap::new();
        for (i, &t) in order.iter().enumerate() {
            type_index.insert(t, NodeId::new(i as u32));
        }

        let resolve = |t: NodeType, type_index: &HashMap<NodeType, NodeId>| -> Result<NodeId, ConfigError> {
            type_index.get(t).copied().ok_or(ConfigError::UnknownNode(t))
        };

        // Determine parents from composite children / parallel regions, and
        // validate every reference resolves.
        let mut parent: HashMap<NodeId, NodeId> = HashMap::new();
        for &t in &order {
            let id = type_index[t];
            match &self.kinds[t] {
                PendingKind::Simple => {}
                PendingKind::Composite { children, .. } => {
                    if children.is_empty() {
                        return Err(ConfigError::EmptyComposite(t));
                    }
                    for &c in children {
                        let cid = resolve(c, &type_index)?;
                        parent.insert(cid, id);
                    }
                }
                PendingKind::Parallel { regions } => {
                    for &r in regions {
                        let rid = resolve(r, &type_index)?;
                        parent.insert(rid, id);
                    }
                }
            }
        }

        let roots: Vec<NodeId> = order
            .iter()
            .map(|&t| type_index[t])
            .filter(|id| !parent.contains_key(id))
            .collect();
        let top = match roots.as_slice() {
            [single] => *single,
            [] => return Err(ConfigError::MalformedTree("no root: every node has a parent".to_string())),
            _ => {
                return Err(ConfigError::MalformedTree(format!(
                    "more than one root: {} nodes are never referenced as a child",
                    roots.len()
                )))
            }
        };

        // Build Node values.
        let mut nodes: Vec<Node> = Vec::with_capacity(order.len());
        for &t in &order {
            let id = type_index[t];
            let kind = match &self.kinds[t] {
                PendingKind::Simple => NodeKind::Simple,
                PendingKind::Composite { children, initial } => {
                    let children: Vec<NodeId> =
                        children.iter().map(|&c| resolve(c, &type_index)).collect::<Result<_, _>>()?;
                    let initial_id = resolve(*initial, &type_index)?;
                    let initial_idx = children.iter().position(|&c| c == initial_id).ok_or_else(|| {
                        ConfigError::InitialNotAChild { composite: t, initial: *initial }
                    })?;
                    NodeKind::Composite { children, initial: initial_idx }
                }
                PendingKind::Parallel { regions } => {
                    let regions: Vec<NodeId> =
                        regions.iter().map(|&r| resolve(r, &type_index)).collect::<Result<_, _>>()?;
                    NodeKind::Parallel { regions, joints: Vec::new() }
                }
            };
            nodes.push(Node {
                node_type: t,
                parent: parent.get(&id).copied(),
                kind,
                handlers: self.handlers.remove(t).unwrap_or_default(),
            });
            debug_assert_eq!(nodes.len() - 1, id.index());
        }

        // Attach joints to their declared parallel, validating the target
        // exists and is actually a Parallel.
        let mut joint_type_index: HashMap<NodeType, JointId> = HashMap::new();
        for (i, &jt) in self.joint_order.iter().enumerate() {
            joint_type_index.insert(jt, JointId::new(i as u32));
        }
        let mut joints: Vec<Joint> = Vec::with_capacity(self.joint_order.len());
        for &jt in &self.joint_order {
            let pending = self.joints.remove(jt).expect("declared in joint_order");
            let guards: Vec<NodeId> = pending
                .guards
                .iter()
                .map(|&g| {
                    type_index.get(g).copied().ok_or(ConfigError::UnresolvedGuard { joint: jt, guard: g })
                })
                .collect::<Result<_, _>>()?;
            let parallel_id = resolve(pending.parallel, &type_index)?;
            match &mut nodes[parallel_id.index()].kind {
                NodeKind::Parallel { joints: region_joints, .. } => {
                    region_joints.push(joint_type_index[jt]);
                }
                _ => return Err(ConfigError::JointNotAttached(jt)),
            }
            joints.push(Joint { joint_type: jt, guards, parallel: parallel_id, handlers: pending.handlers });
        }

        let mut joints_guarded_by: HashMap<NodeId, Vec<JointId>> = HashMap::new();
        for (i, joint) in joints.iter().enumerate() {
            for &g in &joint.guards {
                joints_guarded_by.entry(g).or_default().push(JointId::new(i as u32));
            }
        }

        let mut tree =
            StateTree { nodes, joints: Vec::new(), top, type_index, joint_type_index, joints_guarded_by };

        // §4.1 invariant 3: every pair of a joint's guards must be
        // simultaneously activatable. Checked against `tree` before joints
        // are installed on it, since the check only needs node structure.
        for joint in &joints {
            for i in 0..joint.guards.len() {
                for j in (i + 1)..joint.guards.len() {
                    let (a, b) = (joint.guards[i], joint.guards[j]);
                    if planner::incompatible(&tree, a, b) {
                        return Err(ConfigError::IncompatibleGuards {
                            joint: joint.joint_type,
                            first: tree.node(a).node_type,
                            second: tree.node(b).node_type,
                        });
                    }
                }
            }
        }

        tree.joints = joints;
        Ok(tree)
    }
}

fn wrap<F>(handler: F) -> HandlerFn
where
    F: Fn(&AnyEvent, &mut DispatchContext<'_>) -> bool + 'static,
{
    Box::new(handler)
}
