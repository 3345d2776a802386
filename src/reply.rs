//! The engine-to-host reply dispatch surface (§6: "`reply(reply_instance)`
//! handler — dispatched by reply type, one or many handlers per type").
//!
//! Mirrors [`crate::handlers::TypedOnlyHandlers`]'s type-keyed table shape,
//! but lives at the engine level rather than per-node: a reply is not
//! addressed to a state, it is addressed to whatever part of the host
//! registered interest in that reply type.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::ids::AnyReply;

type ReplyHandlerFn = Box<dyn FnMut(&AnyReply)>;

/// The host's registered reply handlers, keyed by reply type.
#[derive(Default)]
pub(crate) struct ReplyHandlers {
    handlers: HashMap<TypeId, Vec<ReplyHandlerFn>>,
}

impl ReplyHandlers {
    pub fn add<R, F>(&mut self, mut handler: F)
    where
        R: Any + Send + 'static,
        F: FnMut(&R) + 'static,
    {
        let erased: ReplyHandlerFn = Box::new(move |reply: &AnyReply| {
            if let Some(r) = reply.downcast_ref::<R>() {
                handler(r);
            }
        });
        self.handlers.entry(TypeId::of::<R>()).or_default().push(erased);
    }

    /// Dispatches `reply` to every handler registered for its type. Returns
    /// whether at least one handler was registered (§7 `UnprocessedReply`:
    /// "a reply was sent with no matching reply handler").
    pub fn dispatch(&mut self, reply: &AnyReply) -> bool {
        match self.handlers.get_mut(&reply.type_id()) {
            Some(handlers) if !handlers.is_empty() => {
                for handler in handlers {
                    handler(reply);
                }
                true
            }
            _ => false,
        }
    }
}

/// A buffer of replies collected during the event-handler phase, flushed
/// after exits but before entries (§4.5 steps 1 and 3d).
#[derive(Default)]
pub(crate) struct ReplyBuffer {
    pending: Vec<AnyReply>,
}

impl ReplyBuffer {
    pub fn push(&mut self, reply: AnyReply) {
        self.pending.push(reply);
    }

    /// Drains the buffer in collected order, leaving it empty.
    pub fn drain(&mut self) -> Vec<AnyReply> {
        std::mem::take(&mut self.pending)
    }
}
