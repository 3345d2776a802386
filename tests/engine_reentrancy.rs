//! Engine loop: FIFO reentrancy queue, `initiate`/`terminate` lifecycle,
//! and `process` before `initiate` (§4.6, §5, §8 scenario S6).

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::Log;
use statecraft::prelude::*;

#[derive(Debug, Clone, Copy)]
struct E1;
#[derive(Debug, Clone, Copy)]
struct E2;

#[derive(Debug)]
struct Trigger;

#[test]
fn reentrant_process_call_is_deferred_until_the_outer_event_completes() {
    // A reply handler for E1 calls process(E2). E2 must not run until E1's
    // own event_finished has already been recorded (S6).
    let log = Log::new();
    let tree = StateTreeBuilder::new()
        .simple("Top")
        .on_handle::<E1, _>("Top", |_e, ctx| {
            ctx.reply(Trigger);
            true
        })
        .on_handle::<E2, _>("Top", {
            let log = log.clone();
            move |_e, _ctx| {
                log.push("E2-handled");
                true
            }
        })
        .build()
        .unwrap();

    // `Engine::process` needs `&mut self`, but the reply handler closure also
    // needs to call back into it — share the engine through a `RefCell` the
    // way a host embedding this engine inside its own event loop would.
    let engine = Rc::new(RefCell::new(Engine::new(tree)));
    let engine_in_handler = engine.clone();
    let log_in_handler = log.clone();
    engine.borrow_mut().on_reply::<Trigger, _>(move |_r| {
        log_in_handler.push("E1-reply-handler-fired");
        engine_in_handler.borrow_mut().process(E2);
        // The inner call enqueued rather than ran: nothing past this point
        // has observed E2 yet.
        log_in_handler.push("E1-reply-handler-returned");
    });

    engine.borrow_mut().initiate();
    engine.borrow_mut().process(E1);

    assert_eq!(
        log.snapshot(),
        vec!["E1-reply-handler-fired", "E1-reply-handler-returned", "E2-handled"]
    );
}

#[test]
fn process_before_initiate_reports_not_initiated_and_drops_the_event() {
    let diagnostics = common::RecordingDiagnostics::new();
    let tree = StateTreeBuilder::new().simple("Top").build().unwrap();
    let mut engine = Engine::with_diagnostics(tree, diagnostics.clone());

    engine.process(E1);

    assert!(engine.active().is_empty());
    assert!(diagnostics.log.snapshot().contains(&"not_initiated".to_string()));
}

#[test]
fn initiate_then_terminate_returns_to_empty_and_balances_enter_exit_counts() {
    let enter_count = Rc::new(std::cell::Cell::new(0u32));
    let exit_count = Rc::new(std::cell::Cell::new(0u32));
    let (enter_counter, exit_counter) = (enter_count.clone(), exit_count.clone());

    let tree = StateTreeBuilder::new()
        .composite("Top", &["A", "B"], "A")
        .simple("A")
        .simple("B")
        .on_enter_any("Top", {
            let c = enter_counter.clone();
            move |_e, _ctx| {
                c.set(c.get() + 1);
                true
            }
        })
        .on_enter_any("A", move |_e, _ctx| {
            enter_counter.set(enter_counter.get() + 1);
            true
        })
        .on_exit_any("Top", {
            let c = exit_counter.clone();
            move |_e, _ctx| {
                c.set(c.get() + 1);
                true
            }
        })
        .on_exit_any("A", move |_e, _ctx| {
            exit_counter.set(exit_counter.get() + 1);
            true
        })
        .build()
        .unwrap();

    let mut engine = Engine::new(tree);
    engine.initiate();
    engine.terminate();

    assert!(engine.active().is_empty());
    assert!(!engine.is_initiated());
    assert_eq!(enter_count.get(), exit_count.get());
    assert_eq!(enter_count.get(), 2);
}

#[test]
fn double_initiate_reports_transition_error_without_changing_state() {
    let diagnostics = common::RecordingDiagnostics::new();
    let tree = StateTreeBuilder::new().simple("Top").build().unwrap();
    let mut engine = Engine::with_diagnostics(tree, diagnostics.clone());

    engine.initiate();
    let before = engine.active().snapshot();
    engine.initiate();

    assert_eq!(engine.active().snapshot(), before);
    assert!(diagnostics.log.snapshot().iter().any(|l| l.starts_with("transition_error")));
}
