//! The host-overridable diagnostic callback surface (§6, §7).
//!
//! This is the engine's *public* reporting contract, distinct from the crate's
//! own internal `tracing` instrumentation (see the engine/dispatch/planner
//! modules) — a host that never overrides a single method here still gets
//! `RUST_LOG` visibility into the engine's execution, and a host that wants to
//! turn `TransitionError` into a panic overrides `report_transition_error`
//! without touching anything else.
//!
//! Message factories are deferred (`&dyn Fn() -> String`, not `String`) so a
//! host that leaves `log` at its no-op default never pays for formatting.

use crate::ids::{AnyEvent, AnyReply, NodeId, NodeType};

/// Host-overridable diagnostic hooks. All methods have defaults that funnel
/// into `report_error` / `report_info` / `log`, per the forwarding chain
/// documented in the spec's external-interfaces section.
pub trait Diagnostics {
    /// The terminal sink. Defaults to a no-op — the actual sink (stdout, a
    /// file, a telemetry pipeline) is a host concern, out of scope for this
    /// crate (§1).
    fn log(&self, _message: &dyn Fn() -> String) {}

    /// Called by the four specific-error hooks below, by default.
    fn report_error(&self, message: &dyn Fn() -> String) {
        self.log(message);
    }

    /// Called by the two info hooks below, by default.
    fn report_info(&self, message: &dyn Fn() -> String) {
        self.log(message);
    }

    /// No active state handled an event, after full propagation (§4.3, §7).
    fn report_unprocessed_event(&self) {
        self.report_error(&|| "unprocessed event: no active state handled it".to_string());
    }

    /// A reply was sent with no matching reply handler (§7).
    fn report_unprocessed_reply(&self, reply: &AnyReply) {
        self.report_error(&|| format!("unprocessed reply of type {}", reply.type_name()));
    }

    /// Requested transition targets were incompatible or invalid (§4.4 step 2, §7).
    fn report_transition_error(&self, node_type: NodeType) {
        self.report_error(&|| format!("transition error involving node {node_type:?}"));
    }

    /// `process` was called before `initiate` for a non-lifecycle event (§4.6, §7).
    fn report_not_initiated(&self) {
        self.report_error(&|| "process called before initiate".to_string());
    }

    /// A transition plan was computed and is about to execute (§4.5 step 3a).
    fn report_transitions(&self, nodes: &[NodeId]) {
        self.report_info(&|| format!("computed transition touching {} node(s)", nodes.len()));
    }

    /// An event finished processing (§4.5 step 3f / step 2).
    fn report_event_finished(&self, event: &AnyEvent) {
        self.report_info(&|| format!("event {} finished processing", event.type_name()));
    }
}

/// The default `Diagnostics` implementation: every hook forwards to `log`,
/// which does nothing. A host wires up its own sink by implementing
/// [`Diagnostics`] directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {}
