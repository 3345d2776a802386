//! Shared test helpers: an event-order log and a recording `Diagnostics` impl.

use std::cell::RefCell;
use std::rc::Rc;

use statecraft::prelude::*;

/// A cloneable, interior-mutable log of strings, used to record handler
/// firing order (enter/exit order, reply order) across closures that the
/// builder moves independently.
#[derive(Clone, Default)]
pub struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

/// A `Diagnostics` implementation that records every hook invocation by name
/// instead of discarding it, so tests can assert on exactly which conditions
/// fired (and how many times).
#[derive(Clone, Default)]
pub struct RecordingDiagnostics {
    pub log: Log,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn report_unprocessed_event(&self) {
        self.log.push("unprocessed_event");
    }

    fn report_unprocessed_reply(&self, reply: &AnyReply) {
        self.log.push(format!("unprocessed_reply:{}", reply.type_name()));
    }

    fn report_transition_error(&self, node_type: NodeType) {
        self.log.push(format!("transition_error:{node_type}"));
    }

    fn report_not_initiated(&self) {
        self.log.push("not_initiated");
    }

    fn report_transitions(&self, nodes: &[NodeId]) {
        self.log.push(format!("transitions:{}", nodes.len()));
    }

    fn report_event_finished(&self, event: &AnyEvent) {
        self.log.push(format!("event_finished:{}", event.type_name()));
    }
}
