//! Literal transcriptions of §8's worked scenarios S1-S7.

mod common;

use common::Log;
use statecraft::prelude::*;

#[derive(Debug, Clone, Copy)]
struct E;
#[derive(Debug, Clone, Copy)]
struct Reenter;
#[derive(Debug)]
struct AReply;

/// S1: Top = Composite[A, B]; `initiate()` -> enter-order [Top, A]; active = {Top, A}.
#[test]
fn s1_composite_default_entry() {
    let log = Log::new();
    let tree = StateTreeBuilder::new()
        .composite("Top", &["A", "B"], "A")
        .simple("A")
        .simple("B")
        .on_enter_any("Top", {
            let log = log.clone();
            move |_e, _ctx| {
                log.push("Top");
                true
            }
        })
        .on_enter_any("A", {
            let log = log.clone();
            move |_e, _ctx| {
                log.push("A");
                true
            }
        })
        .build()
        .unwrap();

    let mut engine = Engine::new(tree);
    engine.initiate();

    assert_eq!(log.snapshot(), vec!["Top", "A"]);
    let top = engine.tree().node_by_type("Top").unwrap();
    let a = engine.tree().node_by_type("A").unwrap();
    assert!(engine.active().is_active(top));
    assert!(engine.active().is_active(a));
    assert_eq!(engine.active().len(), 2);
}

/// S2: from S1, dispatch event E whose handler on A calls `transit(B)`. Exit
/// order [A]; entry order [B]; active = {Top, B}. A's reply is delivered
/// after A's exit and before B's entry.
#[test]
fn s2_transition_inside_composite() {
    let log = Log::new();
    let b_cell = std::rc::Rc::new(std::cell::Cell::new(None));
    let b_cell_in_closure = b_cell.clone();

    let tree = StateTreeBuilder::new()
        .composite("Top", &["A", "B"], "A")
        .simple("A")
        .simple("B")
        .on_handle::<E, _>("A", move |_e, ctx| {
            ctx.reply(AReply);
            ctx.transit(b_cell_in_closure.get().unwrap());
            true
        })
        .on_exit_any("A", {
            let log = log.clone();
            move |_e, _ctx| {
                log.push("exit:A");
                true
            }
        })
        .on_enter_any("B", {
            let log = log.clone();
            move |_e, _ctx| {
                log.push("enter:B");
                true
            }
        })
        .build()
        .unwrap();

    let b = tree.node_by_type("B").unwrap();
    b_cell.set(Some(b));

    let mut engine = Engine::new(tree);
    engine.on_reply::<AReply, _>({
        let log = log.clone();
        move |_r| log.push("reply:A")
    });
    engine.initiate();
    engine.process(E);

    assert_eq!(log.snapshot(), vec!["exit:A", "reply:A", "enter:B"]);
    let top = engine.tree().node_by_type("Top").unwrap();
    assert!(engine.active().is_active(top));
    assert!(engine.active().is_active(b));
    assert_eq!(engine.active().len(), 2);
}

fn s3_tree_and_log() -> (StateTree, Log, std::rc::Rc<std::cell::Cell<Option<NodeId>>>) {
    let log = Log::new();
    let x2_cell = std::rc::Rc::new(std::cell::Cell::new(None));
    let x2_cell_in_closure = x2_cell.clone();

    let mut builder = StateTreeBuilder::new()
        .parallel("Top", &["R1", "R2"])
        .composite("R1", &["X1", "X2"], "X1")
        .simple("X1")
        .simple("X2")
        .composite("R2", &["Y1", "Y2"], "Y1")
        .simple("Y1")
        .simple("Y2")
        .joint("J", &["X1", "Y1"], "Top")
        .on_handle::<E, _>("X1", move |_e, ctx| {
            ctx.transit(x2_cell_in_closure.get().unwrap());
            true
        })
        .on_joint_enter::<Initiate, _>("J", {
            let log = log.clone();
            move |_e, _ctx| {
                log.push("J");
                true
            }
        })
        .on_joint_exit::<E, _>("J", {
            let log = log.clone();
            move |_e, _ctx| {
                log.push("exit:J");
                true
            }
        });

    for node_type in ["Top", "R1", "X1", "R2", "Y1"] {
        let log = log.clone();
        builder = builder.on_enter_any(node_type, move |_e, _ctx| {
            log.push(node_type);
            true
        });
    }
    builder = builder.on_exit_any("X1", {
        let log = log.clone();
        move |_e, _ctx| {
            log.push("exit:X1");
            true
        }
    });
    builder = builder.on_enter_any("X2", {
        let log = log.clone();
        move |_e, _ctx| {
            log.push("X2");
            true
        }
    });

    (builder.build().unwrap(), log, x2_cell)
}

/// S3: Top = Parallel[R1=Composite[X1,X2], R2=Composite[Y1,Y2]], joints =
/// [J with guards={X1,Y1}]. `initiate()` -> enter: [Top,R1,X1,R2,Y1,J].
/// Transit X1->X2 under event E: exits [J,X1], entries [X2]; active_joints
/// becomes empty.
#[test]
fn s3_parallel_with_joints() {
    let (tree, log, x2_cell) = s3_tree_and_log();
    let x2 = tree.node_by_type("X2").unwrap();
    x2_cell.set(Some(x2));

    let mut engine = Engine::new(tree);
    engine.initiate();

    assert_eq!(log.snapshot(), vec!["Top", "R1", "X1", "R2", "Y1", "J"]);
    let j = engine.tree().joint_by_type("J").unwrap();
    assert!(engine.active().is_joint_active(j));

    engine.process(E);

    assert_eq!(
        log.snapshot(),
        vec!["Top", "R1", "X1", "R2", "Y1", "J", "exit:J", "exit:X1", "X2"]
    );
    assert!(!engine.active().is_joint_active(j));
    assert!(engine.active().is_active(x2));
}

/// S4: from S3's post-transit config {Top,R1,X2,R2,Y1}, an event handler
/// calls `transit(J)`. The planner rewrites this to {X1,Y1}; Y1 is already
/// active, so exit: [X2], entry: [X1,J]; no Y1 entry.
#[test]
fn s4_joint_transition_rewrites_to_guards() {
    let (tree, log, x2_cell) = s3_tree_and_log();
    let x2 = tree.node_by_type("X2").unwrap();
    x2_cell.set(Some(x2));
    let j = tree.joint_by_type("J").unwrap();

    // Extend the tree with a handler on X2 that requests the joint itself.
    // Declaration order is fixed by `s3_tree_and_log`, so resolve J's id from
    // that same build and rebuild with the extra handler wired in.
    let tree = rebuild_with_joint_transit(j, log.clone(), x2_cell.clone());

    let mut engine = Engine::new(tree);
    engine.initiate();
    engine.process(E); // X1 -> X2, per S3.

    let before_len = log.snapshot().len();
    engine.process(Reenter); // triggers transit(J) on X2.

    let y1 = engine.tree().node_by_type("Y1").unwrap();
    let x1 = engine.tree().node_by_type("X1").unwrap();
    let after = log.snapshot();
    assert_eq!(&after[before_len..], vec!["exit:X2", "X1", "J"]);
    assert!(engine.active().is_active(x1));
    assert!(engine.active().is_active(y1));
    assert!(engine.active().is_joint_active(j));
}

fn rebuild_with_joint_transit(
    j: JointId,
    log: Log,
    x2_cell: std::rc::Rc<std::cell::Cell<Option<NodeId>>>,
) -> StateTree {
    let mut builder = StateTreeBuilder::new()
        .parallel("Top", &["R1", "R2"])
        .composite("R1", &["X1", "X2"], "X1")
        .simple("X1")
        .simple("X2")
        .composite("R2", &["Y1", "Y2"], "Y1")
        .simple("Y1")
        .simple("Y2")
        .joint("J", &["X1", "Y1"], "Top")
        .on_handle::<E, _>("X1", move |_e, ctx| {
            ctx.transit(x2_cell.get().unwrap());
            true
        })
        .on_handle::<Reenter, _>("X2", move |_e, ctx| {
            ctx.transit(j);
            true
        })
        .on_joint_enter::<Initiate, _>("J", {
            let log = log.clone();
            move |_e, _ctx| {
                log.push("J");
                true
            }
        })
        .on_joint_enter::<Reenter, _>("J", {
            let log = log.clone();
            move |_e, _ctx| {
                log.push("J");
                true
            }
        })
        .on_joint_exit::<E, _>("J", {
            let log = log.clone();
            move |_e, _ctx| {
                log.push("exit:J");
                true
            }
        })
        .on_exit_any("X1", {
            let log = log.clone();
            move |_e, _ctx| {
                log.push("exit:X1");
                true
            }
        })
        .on_exit_any("X2", {
            let log = log.clone();
            move |_e, _ctx| {
                log.push("exit:X2");
                true
            }
        })
        .on_enter_any("X1", {
            let log = log.clone();
            move |_e, _ctx| {
                log.push("X1");
                true
            }
        })
        .on_enter_any("X2", {
            let log = log.clone();
            move |_e, _ctx| {
                log.push("X2");
                true
            }
        });
    for node_type in ["Top", "R1", "R2", "Y1"] {
        let log = log.clone();
        builder = builder.on_enter_any(node_type, move |_e, _ctx| {
            log.push(node_type);
            true
        });
    }
    builder.build().unwrap()
}

/// S5: Top = Simple with no `handle` for event E; `process(E)` ->
/// `report_unprocessed_event` invoked once; active unchanged; `event_finished`
/// still called.
#[test]
fn s5_unprocessed_event() {
    let diagnostics = common::RecordingDiagnostics::new();
    let tree = StateTreeBuilder::new().simple("Top").build().unwrap();
    let mut engine = Engine::with_diagnostics(tree, diagnostics.clone());
    engine.initiate();
    let before = engine.active().snapshot();

    engine.process(E);

    assert_eq!(engine.active().snapshot(), before);
    let log = diagnostics.log.snapshot();
    assert_eq!(log.iter().filter(|l| *l == "unprocessed_event").count(), 1);
    assert!(log.iter().any(|l| l.starts_with("event_finished")));
}

/// S6: a reply handler calls `process(E2)` during event E1's reply flush. E2
/// is not observed mid-E1: E1 completes fully, then E2 is drained.
#[test]
fn s6_reentrant_reply_defers_the_nested_event() {
    #[derive(Debug)]
    struct Trigger;

    let log = Log::new();
    let tree = StateTreeBuilder::new()
        .simple("Top")
        .on_handle::<E, _>("Top", |_e, ctx| {
            ctx.reply(Trigger);
            true
        })
        .on_handle::<Reenter, _>("Top", {
            let log = log.clone();
            move |_e, _ctx| {
                log.push("Reenter-handled");
                true
            }
        })
        .build()
        .unwrap();

    let engine = std::rc::Rc::new(std::cell::RefCell::new(Engine::new(tree)));
    let engine_in_handler = engine.clone();
    let log_in_handler = log.clone();
    engine.borrow_mut().on_reply::<Trigger, _>(move |_r| {
        log_in_handler.push("E1-flush-observed");
        engine_in_handler.borrow_mut().process(Reenter);
        log_in_handler.push("E1-flush-continues");
    });

    engine.borrow_mut().initiate();
    engine.borrow_mut().process(E);

    assert_eq!(log.snapshot(), vec!["E1-flush-observed", "E1-flush-continues", "Reenter-handled"]);
}

/// S7: two handlers under the same composite request sibling children X and
/// Y simultaneously -> `report_transition_error`, configuration unchanged,
/// collected replies still flushed.
#[test]
fn s7_inconsistent_simultaneous_transits() {
    let diagnostics = common::RecordingDiagnostics::new();
    let x_cell = std::rc::Rc::new(std::cell::Cell::new(None));
    let y_cell = std::rc::Rc::new(std::cell::Cell::new(None));
    let (x_cell_in_closure, y_cell_in_closure) = (x_cell.clone(), y_cell.clone());

    let tree = StateTreeBuilder::new()
        .parallel("Top", &["R1", "R2"])
        .composite("R1", &["X", "Y"], "X")
        .simple("X")
        .simple("Y")
        .simple("R2")
        .on_handle::<E, _>("X", move |_e, ctx| {
            ctx.transit(x_cell_in_closure.get().unwrap());
            true
        })
        .on_handle::<E, _>("R2", move |_e, ctx| {
            ctx.transit(y_cell_in_closure.get().unwrap());
            true
        })
        .build()
        .unwrap();

    let x = tree.node_by_type("X").unwrap();
    let y = tree.node_by_type("Y").unwrap();
    x_cell.set(Some(x));
    y_cell.set(Some(y));

    let mut engine = Engine::with_diagnostics(tree, diagnostics.clone());
    engine.initiate();
    let before = engine.active().snapshot();

    engine.process(E);

    assert_eq!(engine.active().snapshot(), before);
    let log = diagnostics.log.snapshot();
    assert!(log.iter().any(|l| l.starts_with("transition_error")));
}
