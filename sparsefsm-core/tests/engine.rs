//! Engine behaviour tests: resolution order, queue discipline, re-entrancy
//! and concurrent submission.

use parking_lot::Mutex;
use sparsefsm_core::{Action, Diagnostic, Engine, StateDef, StateKey, Target};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum St {
    A,
    B,
    C,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Ev {
    Go,
    Back,
    First,
    Second,
    Tick,
    Other,
    Unknown,
}

type Log = Arc<Mutex<Vec<String>>>;
type Def = StateDef<St, Ev, u32>;

fn logging(log: &Log, name: &str) -> Action<St, Ev, u32> {
    let log = Arc::clone(log);
    let entry = name.to_string();
    Action::new(name, move |_, payload| {
        match payload {
            Some(p) => log.lock().push(format!("{}:{}", entry, p)),
            None => log.lock().push(entry.clone()),
        }
        Ok(())
    })
}

#[test]
fn local_fallback_takes_precedence_over_default_state() {
    let log = Log::default();
    let defs: Vec<Def> = vec![
        StateDef::new(St::A)
            .on(Ev::Go, St::B)
            .otherwise(Target::Stay, Some(logging(&log, "a_fallback"))),
        StateDef::new(St::B).on(Ev::Back, St::A),
        StateDef::default_state().on_with(Ev::Other, St::C, logging(&log, "default_other")),
        StateDef::new(St::C).on(Ev::Back, St::A),
    ];
    let engine = Engine::new(defs, St::A);

    engine.submit_event(Ev::Other, 7).unwrap();
    assert_eq!(engine.current_state(), Some(StateKey::Id(St::A)));
    assert_eq!(*log.lock(), vec!["a_fallback:7"]);
}

#[test]
fn default_state_answers_when_current_state_cannot() {
    let log = Log::default();
    let defs: Vec<Def> = vec![
        StateDef::new(St::A).on(Ev::Go, St::B),
        StateDef::new(St::B).on(Ev::Back, St::A),
        StateDef::new(St::C).on(Ev::Back, St::A),
        StateDef::default_state()
            .on_with(Ev::Other, St::C, logging(&log, "default_other"))
            .otherwise(St::A, Some(logging(&log, "default_fallback"))),
    ];
    let engine = Engine::new(defs, St::A);

    // Explicit transition of the default state.
    engine.submit_event(Ev::Other, 1).unwrap();
    assert_eq!(engine.current_state(), Some(StateKey::Id(St::C)));

    // The default state's own fallback.
    engine.submit_event(Ev::Tick, 2).unwrap();
    assert_eq!(engine.current_state(), Some(StateKey::Id(St::A)));
    assert_eq!(*log.lock(), vec!["default_other:1", "default_fallback:2"]);
}

#[test]
fn entry_submitted_event_resolves_before_next_external_event() {
    let log = Log::default();
    let entry_log = Arc::clone(&log);
    let defs: Vec<Def> = vec![
        StateDef::new(St::A).on_with(Ev::Go, St::B, logging(&log, "go")),
        StateDef::new(St::B)
            .on_entry(Action::new("enter_b", move |ctx, _| {
                entry_log.lock().push("enter_b".to_string());
                ctx.submit_event(Ev::First, 10).map_err(|d| format!("{:?}", d))?;
                Ok(())
            }))
            .on_with(Ev::First, St::C, logging(&log, "first")),
        StateDef::new(St::C).on_with(Ev::Second, Target::Stay, logging(&log, "second")),
    ];
    let engine = Engine::new(defs, St::A);

    engine.submit_event(Ev::Go, 1).unwrap();
    assert_eq!(engine.pending_events(), 0);
    assert_eq!(engine.current_state(), Some(StateKey::Id(St::C)));

    engine.submit_event(Ev::Second, 2).unwrap();
    assert_eq!(*log.lock(), vec!["go:1", "enter_b", "first:10", "second:2"]);
}

#[test]
fn action_submissions_queue_behind_current_event() {
    let log = Log::default();
    let action_log = Arc::clone(&log);
    let defs: Vec<Def> = vec![
        StateDef::new(St::A)
            .on_exit(logging(&log, "exit_a"))
            .on_with(
                Ev::Go,
                St::B,
                Action::new("fan_out", move |ctx, _| {
                    ctx.submit_event(Ev::First, 1).map_err(|d| format!("{:?}", d))?;
                    ctx.submit_event(Ev::Second, 2).map_err(|d| format!("{:?}", d))?;
                    action_log.lock().push("fan_out".to_string());
                    Ok(())
                }),
            ),
        StateDef::new(St::B)
            .on_entry(logging(&log, "enter_b"))
            .on_with(Ev::First, Target::Stay, logging(&log, "first"))
            .on_with(Ev::Second, Target::Stay, logging(&log, "second")),
    ];
    let engine = Engine::new(defs, St::A);

    engine.submit_event(Ev::Go, 0).unwrap();
    assert_eq!(
        *log.lock(),
        vec!["fan_out", "exit_a:0", "enter_b:0", "first:1", "second:2"]
    );
}

#[test]
fn reentrant_submission_never_nests() {
    let depth = Arc::new(AtomicUsize::new(0));
    let max_depth = Arc::new(AtomicUsize::new(0));
    let ticks = Arc::new(AtomicUsize::new(0));

    let (d, m, t) = (Arc::clone(&depth), Arc::clone(&max_depth), Arc::clone(&ticks));
    let defs: Vec<Def> = vec![StateDef::new(St::A).on_with(
        Ev::Tick,
        Target::Stay,
        Action::new("tick", move |ctx, payload| {
            let now = d.fetch_add(1, Ordering::SeqCst) + 1;
            m.fetch_max(now, Ordering::SeqCst);
            t.fetch_add(1, Ordering::SeqCst);
            let remaining = payload.copied().unwrap_or(0);
            if remaining > 0 {
                // Returns before the new event is processed.
                ctx.submit_event(Ev::Tick, remaining - 1)
                    .map_err(|d| format!("{:?}", d))?;
            }
            d.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }),
    )];
    let engine = Engine::new(defs, St::A);

    engine.submit_event(Ev::Tick, 50).unwrap();
    assert_eq!(ticks.load(Ordering::SeqCst), 51);
    assert_eq!(max_depth.load(Ordering::SeqCst), 1);
    assert_eq!(engine.pending_events(), 0);
}

#[test]
fn unresolved_event_discards_queue() {
    let log = Log::default();
    let defs: Vec<Def> = vec![StateDef::new(St::A)
        .on_with(
            Ev::Go,
            Target::Stay,
            Action::new("queue_more", |ctx, _| {
                ctx.submit_event(Ev::Unknown, 0).map_err(|d| format!("{:?}", d))?;
                ctx.submit_event(Ev::Tick, 0).map_err(|d| format!("{:?}", d))?;
                Ok(())
            }),
        )
        .on_with(Ev::Tick, Target::Stay, logging(&log, "tick"))];
    let engine = Engine::new(defs, St::A);

    let err = engine.submit_event(Ev::Go, 0).unwrap_err();
    assert!(matches!(&err[..], [Diagnostic::UnresolvedEvent { .. }]));
    assert_eq!(engine.pending_events(), 0);
    assert!(log.lock().is_empty());
    assert!(engine.is_halted());
}

#[test]
fn reinitialize_replaces_definitions() {
    let defs: Vec<Def> = vec![StateDef::new(St::A).on(Ev::Go, St::A)];
    let engine = Engine::new(defs, St::A);
    let _ = engine.submit_event(Ev::Back, 0);
    assert!(engine.is_halted());

    let diagnostics = engine.reinitialize(
        vec![
            StateDef::new(St::B).on(Ev::Back, St::C),
            StateDef::new(St::C).on(Ev::Go, St::B),
        ],
        St::B,
    );
    assert!(diagnostics.is_empty());
    assert_eq!(engine.definitions().len(), 2);
    assert_eq!(engine.current_state(), Some(StateKey::Id(St::B)));

    engine.submit_event(Ev::Back, 0).unwrap();
    assert_eq!(engine.current_state(), Some(StateKey::Id(St::C)));
}

#[test]
fn concurrent_submitters_are_serialized() {
    let in_action = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let total = Arc::new(Mutex::new(0u64));

    let (busy, overlap, sum) = (
        Arc::clone(&in_action),
        Arc::clone(&overlaps),
        Arc::clone(&total),
    );
    let defs: Vec<Def> = vec![
        StateDef::new(St::A)
            .on(Ev::Go, St::B)
            .otherwise(
                Target::Stay,
                Some(Action::new("accumulate", move |_, payload| {
                    if busy.fetch_add(1, Ordering::SeqCst) != 0 {
                        overlap.fetch_add(1, Ordering::SeqCst);
                    }
                    *sum.lock() += u64::from(payload.copied().unwrap_or(0));
                    busy.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })),
            ),
        StateDef::new(St::B).on(Ev::Back, St::A),
    ];
    let engine = Arc::new(Engine::new(defs, St::A));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..100 {
                    engine.submit_event(Ev::Tick, 1).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(*total.lock(), 800);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(engine.current_state(), Some(StateKey::Id(St::A)));
}

#[test]
fn independent_instances_do_not_share_state() {
    let defs = || -> Vec<Def> {
        vec![
            StateDef::new(St::A).on(Ev::Go, St::B),
            StateDef::new(St::B).on(Ev::Back, St::A),
        ]
    };
    let first = Engine::new(defs(), St::A);
    let second = Engine::new(defs(), St::A);

    first.submit_event(Ev::Go, 0).unwrap();
    let _ = second.submit_event(Ev::Back, 0);

    assert_eq!(first.current_state(), Some(StateKey::Id(St::B)));
    assert!(!first.is_halted());
    assert!(second.is_halted());
}
