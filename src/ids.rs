//! Stable, cheap identity for tree nodes, joints, and host-declared event/reply types.
//!
//! Nodes and joints are identified by a dense `u32` index assigned in declaration
//! order, the same "inexpensive token, usable as a vector index" idiom the wider
//! hierarchical-state-machine corpus uses for state identity. This lets the active
//! set and handler tables be indexed directly instead of hashing opaque host types.

use std::any::{Any, TypeId};
use std::fmt;

/// Identifies a node in the declared [`crate::tree::StateTree`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// The dense index backing this id. Stable for the lifetime of a [`crate::tree::StateTree`].
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Identifies a joint state in the declared [`crate::tree::StateTree`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointId(pub(crate) u32);

impl JointId {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JointId({})", self.0)
    }
}

/// A type-erased event instance plus the [`TypeId`] it was constructed with.
///
/// Handlers are keyed by event type, not by a closed enum of events (§9 of the
/// spec: "Event types are host-declared nominal tags"). This mirrors the
/// generic, type-keyed listener pattern the teacher crate uses
/// (`TransitionEdgeListener<E: Event>`), collapsed into a single erased value
/// so one handler table can hold callbacks for many distinct host event types.
pub struct AnyEvent {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn Any + Send>,
}

impl AnyEvent {
    pub fn new<E: Any + Send + 'static>(event: E) -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            value: Box::new(event),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.value.downcast_ref::<E>()
    }
}

impl fmt::Debug for AnyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyEvent").field("type", &self.type_name).finish()
    }
}

/// A type-erased reply instance, analogous to [`AnyEvent`] but for the
/// engine-to-host `reply` surface (§6).
pub struct AnyReply {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn Any + Send>,
}

impl AnyReply {
    pub fn new<R: Any + Send + 'static>(reply: R) -> Self {
        Self {
            type_id: TypeId::of::<R>(),
            type_name: std::any::type_name::<R>(),
            value: Box::new(reply),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<R: Any>(&self) -> Option<&R> {
        self.value.downcast_ref::<R>()
    }

    pub fn downcast<R: Any>(self) -> Result<R, Self> {
        if self.value.is::<R>() {
            Ok(*self.value.downcast::<R>().expect("type checked above"))
        } else {
            Err(self)
        }
    }
}

impl fmt::Debug for AnyReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyReply").field("type", &self.type_name).finish()
    }
}

/// The host-declared symbol for a node, used for lookup-by-type (§4.1) and for
/// diagnostics that name a node (`report_transition_error(node_type)`, §6).
///
/// Kept as a plain interned string rather than a closed Rust enum because the
/// spec leaves the declaration surface to the host (§1).
pub type NodeType = &'static str;

/// The target of a `transit` request: either an ordinary tree node, or a
/// joint (rewritten to its guard set at the start of planning, §4.4 step 1
/// preamble — "a transit to a joint J is first rewritten as transits to all
/// guards of J").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitTarget {
    Node(NodeId),
    Joint(JointId),
}

impl From<NodeId> for TransitTarget {
    fn from(id: NodeId) -> Self {
        TransitTarget::Node(id)
    }
}

impl From<JointId> for TransitTarget {
    fn from(id: JointId) -> Self {
        TransitTarget::Joint(id)
    }
}
