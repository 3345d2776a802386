//! The engine loop (§4.5, §4.6): owns the tree, the active configuration,
//! the reply/diagnostics surfaces, and the single-threaded FIFO reentrancy
//! queue.
//!
//! Grounded in the teacher's `StateMachine` component plus its
//! `transition_observer` entry point, generalized from an ECS observer
//! callback triggered by the scheduler into a plain `process` method driving
//! an explicit FIFO queue — there is no ECS schedule here to hang the
//! reentrancy behavior off of.

use std::any::Any;
use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::active::ActiveSet;
use crate::diagnostics::{Diagnostics, NoopDiagnostics};
use crate::dispatch::{self, DispatchSinks};
use crate::ids::{AnyEvent, AnyReply, NodeId, NodeType, TransitTarget};
use crate::planner::{self, Incompatible, Plan, PlanStep};
use crate::reply::{ReplyBuffer, ReplyHandlers};
use crate::tree::StateTree;

/// Synthetic event dispatched during `initiate()`'s default-entry cascade
/// (§4.6: "`initiate()` ≡ `process(Initiate)`").
#[derive(Debug, Clone, Copy)]
pub struct Initiate;

/// Synthetic event dispatched during `terminate()`'s full-exit cascade.
#[derive(Debug, Clone, Copy)]
pub struct Terminate;

/// The runtime engine: a declared, validated [`StateTree`] plus the mutable
/// machinery that drives it through events (§4.6).
pub struct Engine<D: Diagnostics = NoopDiagnostics> {
    tree: StateTree,
    active: ActiveSet,
    diagnostics: D,
    reply_handlers: ReplyHandlers,
    initiated: bool,
    processing: bool,
    event_queue: VecDeque<AnyEvent>,
}

impl Engine<NoopDiagnostics> {
    /// Builds an engine with the default no-op diagnostics sink.
    pub fn new(tree: StateTree) -> Self {
        Self::with_diagnostics(tree, NoopDiagnostics)
    }
}

impl<D: Diagnostics> Engine<D> {
    pub fn with_diagnostics(tree: StateTree, diagnostics: D) -> Self {
        Self {
            tree,
            active: ActiveSet::new(),
            diagnostics,
            reply_handlers: ReplyHandlers::default(),
            initiated: false,
            processing: false,
            event_queue: VecDeque::new(),
        }
    }

    pub fn tree(&self) -> &StateTree {
        &self.tree
    }

    pub fn active(&self) -> &ActiveSet {
        &self.active
    }

    pub fn is_initiated(&self) -> bool {
        self.initiated
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    /// Registers a reply handler for reply type `R` (§6: "dispatched by
    /// reply type, one or many handlers per type; receives one reply
    /// instance").
    pub fn on_reply<R, F>(&mut self, handler: F)
    where
        R: Any + Send + 'static,
        F: FnMut(&R) + 'static,
    {
        self.reply_handlers.add::<R, F>(handler);
    }

    /// §4.6 `initiate()`. Calling it twice without an intervening
    /// `terminate()` is an open question in the spec; this resolves it as
    /// recommended there — `report_transition_error`, no state change.
    pub fn initiate(&mut self) {
        if self.initiated {
            self.diagnostics.report_transition_error(self.tree.node(self.tree.top()).node_type);
            return;
        }
        debug!("initiate");
        self.active.activate(self.tree.top());
        self.initiated = true;

        let plan = planner::plan_initiate(&self.tree);
        let event = AnyEvent::new(Initiate);
        self.execute_plan(&plan, &event, Vec::new());
        self.diagnostics.report_event_finished(&event);
    }

    /// §4.6 `terminate()`.
    pub fn terminate(&mut self) {
        if !self.initiated {
            self.diagnostics.report_not_initiated();
            return;
        }
        debug!("terminate");
        let plan = planner::plan_terminate(&self.tree, &self.active);
        let event = AnyEvent::new(Terminate);
        self.execute_plan(&plan, &event, Vec::new());
        self.active.clear();
        self.initiated = false;
        self.diagnostics.report_event_finished(&event);
    }

    /// §4.6 `process(event)`. Runs to completion, or enqueues and returns
    /// immediately if already processing (reentrant call from a reply
    /// handler, §5 "Reentrancy").
    pub fn process<E: Any + Send + 'static>(&mut self, event: E) {
        self.process_erased(AnyEvent::new(event));
    }

    fn process_erased(&mut self, event: AnyEvent) {
        if self.processing {
            trace!(event = event.type_name(), "reentrant process() call, enqueued");
            self.event_queue.push_back(event);
            return;
        }
        self.processing = true;
        self.run_event(event);
        while let Some(next) = self.event_queue.pop_front() {
            self.run_event(next);
        }
        self.processing = false;
    }

    fn run_event(&mut self, event: AnyEvent) {
        if !self.initiated {
            self.diagnostics.report_not_initiated();
            return;
        }
        trace!(event = event.type_name(), "processing event");

        // §4.5 step 1: event-handler phase.
        let mut pending_replies = ReplyBuffer::default();
        let mut pending_transits: Vec<TransitTarget> = Vec::new();
        let mut transition_errors: Vec<NodeType> = Vec::new();
        {
            let mut sinks = DispatchSinks {
                reply: &mut |r| pending_replies.push(r),
                transit: &mut |t| pending_transits.push(t),
                transition_error: &mut |n| transition_errors.push(n),
            };
            let handled = dispatch::dispatch_handle(&self.tree, &self.active, &event, &mut sinks);
            if !handled {
                tracing::warn!(event = event.type_name(), "unprocessed event");
                self.diagnostics.report_unprocessed_event();
            }
        }
        for node_type in transition_errors {
            tracing::warn!(node_type, "transit called outside the handle phase");
            self.diagnostics.report_transition_error(node_type);
        }

        // §4.5 step 2: decision.
        if pending_transits.is_empty() {
            self.flush_replies(pending_replies.drain());
            self.diagnostics.report_event_finished(&event);
            return;
        }

        // §4.5 step 3: transition phase.
        match planner::plan_transition(&self.tree, &self.active, &pending_transits) {
            Ok(plan) => {
                self.diagnostics.report_transitions(&plan_touched_nodes(&plan));
                self.execute_plan(&plan, &event, pending_replies.drain());
            }
            Err(Incompatible(node_type)) => {
                tracing::warn!(node_type, "incompatible transition targets");
                self.diagnostics.report_transition_error(node_type);
                self.flush_replies(pending_replies.drain());
            }
        }
        self.diagnostics.report_event_finished(&event);
    }

    /// Runs a computed plan's exits, flushes `carried_replies` (the
    /// pre-transition `pending_replies`, empty for `initiate`/`terminate`),
    /// then runs its entries (§4.5 step 3c/3d/3e).
    fn execute_plan(&mut self, plan: &Plan, event: &AnyEvent, carried_replies: Vec<AnyReply>) {
        for &step in &plan.exits {
            let replies = self.run_exit_step(step, event);
            self.flush_replies(replies);
        }

        self.flush_replies(carried_replies);

        for &step in &plan.entries {
            let replies = self.run_entry_step(step, event);
            self.flush_replies(replies);
        }
    }

    /// Runs one exit step. Exit handlers may reply (emitted immediately,
    /// §4.5 step 3c) but may not `transit` — `DispatchSinks::transit` has no
    /// sink here, so a `transit` call is routed to `transition_error`.
    fn run_exit_step(&mut self, step: PlanStep, event: &AnyEvent) -> Vec<AnyReply> {
        let mut replies = Vec::new();
        let mut transition_errors = Vec::new();
        {
            let mut sinks = DispatchSinks {
                reply: &mut |r| replies.push(r),
                transit: &mut |_| {}, // unreachable: handlers.rs routes exit-phase transit() to transition_error instead
                transition_error: &mut |n| transition_errors.push(n),
            };
            match step {
                PlanStep::Node(n) => {
                    dispatch::dispatch_exit(&self.tree, n, event, &mut sinks);
                    self.active.deactivate(n);
                }
                PlanStep::Joint(j) => {
                    dispatch::dispatch_joint_exit(&self.tree, j, event, &mut sinks);
                    self.active.deactivate_joint(j);
                }
            }
        }
        for node_type in transition_errors {
            self.diagnostics.report_transition_error(node_type);
        }
        replies
    }

    /// Runs one entry step, symmetric to [`Self::run_exit_step`].
    fn run_entry_step(&mut self, step: PlanStep, event: &AnyEvent) -> Vec<AnyReply> {
        let mut replies = Vec::new();
        let mut transition_errors = Vec::new();
        {
            let mut sinks = DispatchSinks {
                reply: &mut |r| replies.push(r),
                transit: &mut |_| {},
                transition_error: &mut |n| transition_errors.push(n),
            };
            match step {
                PlanStep::Node(n) => {
                    self.active.activate(n);
                    dispatch::dispatch_enter(&self.tree, n, event, &mut sinks);
                }
                PlanStep::Joint(j) => {
                    self.active.activate_joint(j);
                    dispatch::dispatch_joint_enter(&self.tree, j, event, &mut sinks);
                }
            }
        }
        for node_type in transition_errors {
            self.diagnostics.report_transition_error(node_type);
        }
        replies
    }

    fn flush_replies(&mut self, replies: Vec<AnyReply>) {
        for reply in replies {
            if !self.reply_handlers.dispatch(&reply) {
                self.diagnostics.report_unprocessed_reply(&reply);
            }
        }
    }
}

fn plan_touched_nodes(plan: &Plan) -> Vec<NodeId> {
    plan.exits
        .iter()
        .chain(plan.entries.iter())
        .filter_map(|step| match step {
            PlanStep::Node(n) => Some(*n),
            PlanStep::Joint(_) => None,
        })
        .collect()
}
