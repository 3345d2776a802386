//! Per-node handler tables and the dispatch-time context passed to callbacks.
//!
//! Handlers are plain closures rather than an ECS component/system pair (the
//! teacher registers `enter`/`exit`/event-listener *systems* against
//! components; here a node's handler table holds the callbacks directly,
//! since there is no ECS scheduler to register against). Multiple handlers
//! may share one (phase, event-type) slot — the spec's "force forward" idiom
//! depends on combining several handlers for the same event via OR (§9).

use std::any::TypeId;
use std::collections::HashMap;

use crate::ids::{AnyEvent, AnyReply, NodeType, TransitTarget};

/// Which of the three dispatch phases a handler belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Enter,
    Exit,
    Handle,
}

/// A handler's verdict: `true` ("handled"/"allow") unless it explicitly
/// returns `false` ("refuse"). Absence of an explicit return in a host
/// language maps to `true`; in Rust the closure must return a `bool`, so a
/// handler that wants the default just ends with `true`.
pub type Verdict = bool;

/// Context passed to every handler invocation. Exposes `reply` in every
/// phase, and `transit` only when dispatching is currently in the `Handle`
/// phase — an enter/exit handler that calls `transit` gets routed to the
/// engine's transition-error diagnostic instead of silently doing nothing
/// (the recommended resolution of the spec's open question on this point),
/// not a compile error, since the same handler closure type is shared across
/// all three phases.
pub struct DispatchContext<'a> {
    phase: Phase,
    node_type: NodeType,
    reply_sink: &'a mut dyn FnMut(AnyReply),
    transit_sink: Option<&'a mut dyn FnMut(TransitTarget)>,
    transition_error_sink: &'a mut dyn FnMut(NodeType),
}

impl<'a> DispatchContext<'a> {
    pub fn new(
        phase: Phase,
        node_type: NodeType,
        reply_sink: &'a mut dyn FnMut(AnyReply),
        transit_sink: Option<&'a mut dyn FnMut(TransitTarget)>,
        transition_error_sink: &'a mut dyn FnMut(NodeType),
    ) -> Self {
        Self { phase, node_type, reply_sink, transit_sink, transition_error_sink }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The node (or joint) this handler was registered on.
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Emit a reply. During the `Handle` phase this is buffered by the
    /// engine and flushed after the transition's exits run (§4.5 step 3d);
    /// during `Enter`/`Exit` it is emitted immediately (§4.5 steps 3c/3e).
    pub fn reply<R: std::any::Any + Send + 'static>(&mut self, reply: R) {
        (self.reply_sink)(AnyReply::new(reply));
    }

    /// Request a transition target. Only meaningful during the `Handle`
    /// phase; calling it from `Enter`/`Exit` reports a transition error and
    /// is otherwise ignored (§4.5 step 3c, §9 open question).
    pub fn transit(&mut self, target: impl Into<TransitTarget>) {
        let target = target.into();
        match self.transit_sink.as_deref_mut() {
            Some(sink) => sink(target),
            None => (self.transition_error_sink)(self.node_type),
        }
    }
}

/// A single host-supplied callback. Takes the triggering event and the
/// dispatch context, returns the handler's verdict (§4.3 step 2).
pub type HandlerFn = Box<dyn Fn(&AnyEvent, &mut DispatchContext<'_>) -> Verdict>;

/// Handler table for a phase that has both typed and generic handlers
/// (`enter`/`exit` — §4.1: "Generic handlers exist only for enter/exit.").
#[derive(Default)]
pub struct TypedAndGenericHandlers {
    typed: HashMap<TypeId, Vec<HandlerFn>>,
    generic: Vec<HandlerFn>,
}

impl std::fmt::Debug for TypedAndGenericHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedAndGenericHandlers")
            .field("typed", &self.typed.len())
            .field("generic", &self.generic.len())
            .finish()
    }
}

impl TypedAndGenericHandlers {
    pub fn add_typed<E: 'static>(&mut self, handler: HandlerFn) {
        self.typed.entry(TypeId::of::<E>()).or_default().push(handler);
    }

    pub fn add_generic(&mut self, handler: HandlerFn) {
        self.generic.push(handler);
    }

    pub fn typed_for(&self, type_id: TypeId) -> Option<&[HandlerFn]> {
        self.typed.get(&type_id).map(|v| v.as_slice())
    }

    pub fn generic(&self) -> &[HandlerFn] {
        &self.generic
    }
}

/// Handler table for the `handle` phase, which has no generic variant
/// (§4.1).
#[derive(Default)]
pub struct TypedOnlyHandlers {
    typed: HashMap<TypeId, Vec<HandlerFn>>,
}

impl std::fmt::Debug for TypedOnlyHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedOnlyHandlers").field("typed", &self.typed.len()).finish()
    }
}

impl TypedOnlyHandlers {
    pub fn add_typed<E: 'static>(&mut self, handler: HandlerFn) {
        self.typed.entry(TypeId::of::<E>()).or_default().push(handler);
    }

    pub fn typed_for(&self, type_id: TypeId) -> Option<&[HandlerFn]> {
        self.typed.get(&type_id).map(|v| v.as_slice())
    }
}

/// The complete handler table attached to one node (§3 "Node attributes").
#[derive(Default, Debug)]
pub struct NodeHandlers {
    pub enter: TypedAndGenericHandlers,
    pub exit: TypedAndGenericHandlers,
    pub handle: TypedOnlyHandlers,
}

/// Runs the §4.3 steps 1–4 dispatch rule for one node/phase/event and returns
/// whether the node is considered handled.
///
/// `generic` is `None` for the `handle` phase (no generic fallback exists).
pub(crate) fn dispatch_typed_then_generic(
    typed: Option<&[HandlerFn]>,
    generic: Option<&[HandlerFn]>,
    event: &AnyEvent,
    ctx: &mut DispatchContext<'_>,
) -> bool {
    let typed = typed.unwrap_or(&[]);
    if !typed.is_empty() {
        // Run every typed handler; OR their verdicts (§9 "force forward" idiom).
        let mut any_accepted = false;
        for handler in typed {
            if handler(event, ctx) {
                any_accepted = true;
            }
        }
        if any_accepted {
            return true;
        }
        // Every typed handler refused: fall through to generic, if any.
    }
    if let Some(generic) = generic {
        let mut any_accepted = false;
        for handler in generic {
            if handler(event, ctx) {
                any_accepted = true;
            }
        }
        return any_accepted;
    }
    false
}
