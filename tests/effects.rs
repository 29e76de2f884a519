// ============================================================================
// weft-reactive - Effect Behavior Tests
// Schedulers, recursion, debug hooks, and scopes over live dependencies
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use weft_reactive::{
    effect, effect_scope, effect_with_options, on_scope_dispose, DebugEvent, EffectOptions, Ref,
    Value,
};

#[test]
fn scheduler_replaces_auto_rerun() {
    let r = Ref::new(Value::Int(0));
    let runs = Rc::new(Cell::new(0));
    let scheduled = Rc::new(Cell::new(0));

    let runs_clone = runs.clone();
    let r_clone = r.clone();
    let scheduled_clone = scheduled.clone();
    let runner = effect_with_options(
        move || {
            let _ = r_clone.get();
            runs_clone.set(runs_clone.get() + 1);
        },
        EffectOptions {
            scheduler: Some(Rc::new(move || {
                scheduled_clone.set(scheduled_clone.get() + 1);
            })),
            ..Default::default()
        },
    );
    assert_eq!(runs.get(), 1);
    assert_eq!(scheduled.get(), 0);

    // Writes invoke the scheduler; the effect body waits for a manual
    // run.
    r.set(Value::Int(1));
    r.set(Value::Int(2));
    assert_eq!(runs.get(), 1);
    assert_eq!(scheduled.get(), 2);

    runner.run();
    assert_eq!(runs.get(), 2);
}

#[test]
fn self_write_does_not_recurse_by_default() {
    let r = Ref::new(Value::Int(0));
    let runs = Rc::new(Cell::new(0));

    let runs_clone = runs.clone();
    let r_clone = r.clone();
    let _runner = effect(move || {
        let current = r_clone.get().as_int().unwrap();
        runs_clone.set(runs_clone.get() + 1);
        // Writing the dep we just read must not re-enter this effect.
        r_clone.set(Value::Int(current + 1));
    });
    assert_eq!(runs.get(), 1);
    assert_eq!(r.get(), Value::Int(1));

    // An external write re-fires exactly once more.
    r.set(Value::Int(10));
    assert_eq!(runs.get(), 2);
    assert_eq!(r.get(), Value::Int(11));
}

#[test]
fn allow_recurse_routes_self_writes_to_the_scheduler() {
    let r = Ref::new(Value::Int(0));
    let scheduled = Rc::new(Cell::new(0));

    let scheduled_clone = scheduled.clone();
    let r_clone = r.clone();
    let _runner = effect_with_options(
        move || {
            let current = r_clone.get().as_int().unwrap();
            if current < 3 {
                r_clone.set(Value::Int(current + 1));
            }
        },
        EffectOptions {
            allow_recurse: true,
            scheduler: Some(Rc::new(move || {
                scheduled_clone.set(scheduled_clone.get() + 1);
            })),
            ..Default::default()
        },
    );

    // The initial run wrote the ref once; with allow_recurse the write
    // reaches the scheduler instead of being swallowed.
    assert_eq!(scheduled.get(), 1);
    assert_eq!(r.get(), Value::Int(1));
}

#[test]
fn debug_hooks_observe_track_and_trigger() {
    let r = Ref::new(Value::Int(0));
    let tracks = Rc::new(Cell::new(0));
    let triggers = Rc::new(RefCell::new(Vec::new()));

    let tracks_clone = tracks.clone();
    let triggers_clone = triggers.clone();
    let r_clone = r.clone();
    let _runner = effect_with_options(
        move || {
            let _ = r_clone.get();
        },
        EffectOptions {
            on_track: Some(Rc::new(move |event| {
                if matches!(event, DebugEvent::Track { .. }) {
                    tracks_clone.set(tracks_clone.get() + 1);
                }
            })),
            on_trigger: Some(Rc::new(move |event| {
                if let DebugEvent::Trigger { op, .. } = event {
                    triggers_clone.borrow_mut().push(format!("{op:?}"));
                }
            })),
            ..Default::default()
        },
    );
    assert_eq!(tracks.get(), 1);

    r.set(Value::Int(1));
    assert_eq!(*triggers.borrow(), vec!["Set".to_string()]);
    // The re-run re-tracked the dep.
    assert_eq!(tracks.get(), 2);
}

#[test]
fn scope_stops_its_effects_and_children() {
    let r = Ref::new(Value::Int(0));
    let runs_a = Rc::new(Cell::new(0));
    let runs_b = Rc::new(Cell::new(0));
    let disposed = Rc::new(Cell::new(false));

    let scope = effect_scope(false);
    scope.run(|| {
        let runs = runs_a.clone();
        let dep = r.clone();
        let _a = effect(move || {
            let _ = dep.get();
            runs.set(runs.get() + 1);
        });

        let inner = effect_scope(false);
        inner.run(|| {
            let runs = runs_b.clone();
            let dep = r.clone();
            let _b = effect(move || {
                let _ = dep.get();
                runs.set(runs.get() + 1);
            });

            let disposed_clone = disposed.clone();
            on_scope_dispose(move || disposed_clone.set(true));
        });
    });

    r.set(Value::Int(1));
    assert_eq!(runs_a.get(), 2);
    assert_eq!(runs_b.get(), 2);

    scope.stop();
    assert!(disposed.get());

    r.set(Value::Int(2));
    assert_eq!(runs_a.get(), 2);
    assert_eq!(runs_b.get(), 2);
}

#[test]
fn explicit_scope_option_overrides_active_scope() {
    let r = Ref::new(Value::Int(0));
    let runs = Rc::new(Cell::new(0));

    let target_scope = effect_scope(false);
    let other_scope = effect_scope(false);

    let runs_clone = runs.clone();
    let r_clone = r.clone();
    other_scope.run(|| {
        let _runner = effect_with_options(
            move || {
                let _ = r_clone.get();
                runs_clone.set(runs_clone.get() + 1);
            },
            EffectOptions {
                scope: Some(target_scope.clone()),
                ..Default::default()
            },
        );
    });

    // Stopping the ambient scope leaves the effect alive.
    other_scope.stop();
    r.set(Value::Int(1));
    assert_eq!(runs.get(), 2);

    // Stopping the explicit scope kills it.
    target_scope.stop();
    r.set(Value::Int(2));
    assert_eq!(runs.get(), 2);
}

#[test]
fn cascading_effects_propagate_writes() {
    let source = Ref::new(Value::Int(1));
    let middle = Ref::new(Value::Int(0));
    let seen = Rc::new(Cell::new(0i64));

    let source_clone = source.clone();
    let middle_writer = middle.clone();
    let _forward = effect(move || {
        let v = source_clone.get().as_int().unwrap();
        middle_writer.set(Value::Int(v * 10));
    });

    let seen_clone = seen.clone();
    let middle_reader = middle.clone();
    let _observe = effect(move || {
        seen_clone.set(middle_reader.get().as_int().unwrap_or(0));
    });
    assert_eq!(seen.get(), 10);

    source.set(Value::Int(5));
    assert_eq!(seen.get(), 50);
}
