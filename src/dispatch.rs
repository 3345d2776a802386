//! Event propagation across the active tree (§4.3).
//!
//! The teacher's generic `TransitionEdgeListener<E>` / `transition_edge_listener<E>`
//! pair dispatches one node at a time, keyed by event type; this module adds
//! the hierarchy-walking rule on top — descend into active children first,
//! run a node's own handlers only when nothing below it handled the event.

use crate::handlers::{dispatch_typed_then_generic, DispatchContext, Phase};
use crate::ids::{AnyEvent, AnyReply, NodeId, NodeType, TransitTarget};
use crate::tree::{NodeKind, StateTree};
use crate::active::ActiveSet;

/// A bundle of the three callback sinks every handler invocation needs,
/// reborrowed at each recursive step instead of moved (trait-object
/// references can't be copied, and the traversal is recursive).
pub(crate) struct DispatchSinks<'a> {
    pub reply: &'a mut dyn FnMut(AnyReply),
    pub transit: &'a mut dyn FnMut(TransitTarget),
    pub transition_error: &'a mut dyn FnMut(NodeType),
}

impl<'a> DispatchSinks<'a> {
    pub fn reborrow(&mut self) -> DispatchSinks<'_> {
        DispatchSinks {
            reply: &mut *self.reply,
            transit: &mut *self.transit,
            transition_error: &mut *self.transition_error,
        }
    }
}

/// Runs the `handle` phase for `event` across the whole active tree,
/// starting at `tree.top()`. Returns whether the event was handled anywhere.
pub(crate) fn dispatch_handle(
    tree: &StateTree,
    active: &ActiveSet,
    event: &AnyEvent,
    sinks: &mut DispatchSinks<'_>,
) -> bool {
    handle_node(tree, active, tree.top(), event, sinks)
}

fn handle_node(
    tree: &StateTree,
    active: &ActiveSet,
    node_id: NodeId,
    event: &AnyEvent,
    sinks: &mut DispatchSinks<'_>,
) -> bool {
    let node = tree.node(node_id);

    let children_handled = match &node.kind {
        NodeKind::Simple => false,
        NodeKind::Composite { .. } => node
            .children()
            .iter()
            .copied()
            .find(|&c| active.is_active(c))
            .map(|active_child| handle_node(tree, active, active_child, event, &mut sinks.reborrow()))
            .unwrap_or(false),
        NodeKind::Parallel { regions, joints } => {
            let mut any_handled = false;
            for &region in regions {
                if active.is_active(region) {
                    if handle_node(tree, active, region, event, &mut sinks.reborrow()) {
                        any_handled = true;
                    }
                }
            }
            // Joints dispatch after their parallel's regions but before the
            // parallel itself (§4.3: "Joint states attached to a parallel
            // are dispatched after that parallel's region children but
            // before the parallel itself").
            for &joint_id in joints {
                if active.is_joint_active(joint_id) {
                    if handle_joint(tree, joint_id, event, &mut sinks.reborrow()) {
                        any_handled = true;
                    }
                }
            }
            any_handled
        }
    };

    if children_handled {
        return true;
    }

    let typed = node.handlers.handle.typed_for(event.type_id());
    let mut ctx = DispatchContext::new(
        Phase::Handle,
        node.node_type,
        &mut *sinks.reply,
        Some(&mut *sinks.transit),
        &mut *sinks.transition_error,
    );
    dispatch_typed_then_generic(typed, None, event, &mut ctx)
}

fn handle_joint(
    tree: &StateTree,
    joint_id: crate::ids::JointId,
    event: &AnyEvent,
    sinks: &mut DispatchSinks<'_>,
) -> bool {
    let joint = tree.joint(joint_id);
    let typed = joint.handlers.handle.typed_for(event.type_id());
    let mut ctx = DispatchContext::new(
        Phase::Handle,
        joint.joint_type,
        &mut *sinks.reply,
        Some(&mut *sinks.transit),
        &mut *sinks.transition_error,
    );
    dispatch_typed_then_generic(typed, None, event, &mut ctx)
}

/// Runs the `enter` phase for a single node (called by the engine once per
/// entry-order item — §4.4 step 8 — not recursively).
pub(crate) fn dispatch_enter(
    tree: &StateTree,
    node_id: NodeId,
    event: &AnyEvent,
    sinks: &mut DispatchSinks<'_>,
) -> bool {
    let node = tree.node(node_id);
    let typed = node.handlers.enter.typed_for(event.type_id());
    let generic = node.handlers.enter.generic();
    let mut ctx = DispatchContext::new(Phase::Enter, node.node_type, &mut *sinks.reply, None, &mut *sinks.transition_error);
    dispatch_typed_then_generic(typed, Some(generic), event, &mut ctx)
}

/// Runs the `exit` phase for a single node (called by the engine once per
/// exit-order item — §4.4 step 7).
pub(crate) fn dispatch_exit(
    tree: &StateTree,
    node_id: NodeId,
    event: &AnyEvent,
    sinks: &mut DispatchSinks<'_>,
) -> bool {
    let node = tree.node(node_id);
    let typed = node.handlers.exit.typed_for(event.type_id());
    let generic = node.handlers.exit.generic();
    let mut ctx = DispatchContext::new(Phase::Exit, node.node_type, &mut *sinks.reply, None, &mut *sinks.transition_error);
    dispatch_typed_then_generic(typed, Some(generic), event, &mut ctx)
}

/// Runs the `enter` phase for a joint (§4.4 step 8: joints enter after the
/// last of their guards).
pub(crate) fn dispatch_joint_enter(
    tree: &StateTree,
    joint_id: crate::ids::JointId,
    event: &AnyEvent,
    sinks: &mut DispatchSinks<'_>,
) -> bool {
    let joint = tree.joint(joint_id);
    let typed = joint.handlers.enter.typed_for(event.type_id());
    let generic = joint.handlers.enter.generic();
    let mut ctx = DispatchContext::new(Phase::Enter, joint.joint_type, &mut *sinks.reply, None, &mut *sinks.transition_error);
    dispatch_typed_then_generic(typed, Some(generic), event, &mut ctx)
}

/// Runs the `exit` phase for a joint (§4.5 step 3b: a joint about to lose a
/// guard exits before that guard does).
pub(crate) fn dispatch_joint_exit(
    tree: &StateTree,
    joint_id: crate::ids::JointId,
    event: &AnyEvent,
    sinks: &mut DispatchSinks<'_>,
) -> bool {
    let joint = tree.joint(joint_id);
    let typed = joint.handlers.exit.typed_for(event.type_id());
    let generic = joint.handlers.exit.generic();
    let mut ctx = DispatchContext::new(Phase::Exit, joint.joint_type, &mut *sinks.reply, None, &mut *sinks.transition_error);
    dispatch_typed_then_generic(typed, Some(generic), event, &mut ctx)
}
