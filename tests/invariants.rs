// ============================================================================
// weft-reactive - Invariant Tests
// Identity stability, subscription lifetime, and tracking granularity
// ============================================================================

use std::cell::Cell;
use std::rc::Rc;

use weft_reactive::{
    effect, is_ref, pause_tracking, reactive, reset_tracking, to_raw, unref, untrack, Obj, Ref,
    Value,
};

#[test]
fn wrapping_is_identity_stable() {
    let raw = Obj::record_from([("x", Value::Int(1))]);

    let p1 = reactive(&raw);
    let p2 = reactive(&raw);
    assert_eq!(p1, p2);
    assert_eq!(reactive(&p1), p1);
    assert_eq!(to_raw(&p1), raw);
}

#[test]
fn ref_constructors_are_idempotent() {
    let x = Value::Int(1);
    assert!(!is_ref(&x));

    let r = Ref::new(x);
    assert!(is_ref(&Value::Ref(r.clone())));

    let rewrapped = Ref::new(Value::Ref(r.clone()));
    assert!(r.same_ref(&rewrapped));
}

#[test]
fn unref_is_inverse_of_ref_for_primitives() {
    assert_eq!(unref(&Value::Ref(Ref::new(Value::Int(42)))), Value::Int(42));
    assert_eq!(unref(&Value::Ref(Ref::new(Value::str("s")))), Value::str("s"));
    assert_eq!(unref(&Value::Bool(true)), Value::Bool(true));
}

#[test]
fn stopped_runner_never_refires() {
    let r = Ref::new(Value::Int(0));
    let o = reactive(&Obj::record_from([("k", Value::Int(0))]));
    let runs = Rc::new(Cell::new(0));

    let runs_clone = runs.clone();
    let r_clone = r.clone();
    let o_clone = o.clone();
    let runner = effect(move || {
        let _ = r_clone.get();
        let _ = o_clone.get("k");
        runs_clone.set(runs_clone.get() + 1);
    });
    assert_eq!(runs.get(), 1);

    runner.stop();

    r.set(Value::Int(1));
    o.set("k", Value::Int(1));
    assert_eq!(runs.get(), 1);
}

#[test]
fn dropping_the_last_handle_stops_the_effect() {
    let r = Ref::new(Value::Int(0));
    let runs = Rc::new(Cell::new(0));

    {
        let runs_clone = runs.clone();
        let r_clone = r.clone();
        let _runner = effect(move || {
            let _ = r_clone.get();
            runs_clone.set(runs_clone.get() + 1);
        });
        r.set(Value::Int(1));
        assert_eq!(runs.get(), 2);
    }

    r.set(Value::Int(2));
    assert_eq!(runs.get(), 2);
}

#[test]
fn index_tracking_is_per_slot() {
    let list = reactive(&Obj::list_from([
        Value::Int(0),
        Value::Int(1),
        Value::Int(2),
    ]));
    let runs = Rc::new(Cell::new(0));

    let runs_clone = runs.clone();
    let list_clone = list.clone();
    let _runner = effect(move || {
        let _ = list_clone.get(1usize);
        runs_clone.set(runs_clone.get() + 1);
    });
    assert_eq!(runs.get(), 1);

    list.set(1usize, Value::Int(10));
    assert_eq!(runs.get(), 2);

    // A different slot does not re-fire.
    list.set(0usize, Value::Int(10));
    assert_eq!(runs.get(), 2);

    // Same-value write does not re-fire.
    list.set(1usize, Value::Int(10));
    assert_eq!(runs.get(), 2);
}

#[test]
fn iteration_subscribes_to_structure() {
    let list = reactive(&Obj::list_from([Value::Int(0)]));
    let runs = Rc::new(Cell::new(0));

    let runs_clone = runs.clone();
    let list_clone = list.clone();
    let _runner = effect(move || {
        let _ = list_clone.to_vec();
        runs_clone.set(runs_clone.get() + 1);
    });
    assert_eq!(runs.get(), 1);

    list.push(Value::Int(1));
    assert_eq!(runs.get(), 2);
}

#[test]
fn record_key_addition_fires_enumerators_not_readers() {
    let o = reactive(&Obj::record_from([("a", Value::Int(1))]));

    let key_runs = Rc::new(Cell::new(0));
    let read_runs = Rc::new(Cell::new(0));

    let key_clone = key_runs.clone();
    let o_keys = o.clone();
    let _enumerator = effect(move || {
        let _ = o_keys.keys();
        key_clone.set(key_clone.get() + 1);
    });

    let read_clone = read_runs.clone();
    let o_read = o.clone();
    let _reader = effect(move || {
        let _ = o_read.get("a");
        read_clone.set(read_clone.get() + 1);
    });

    // Adding a key fires the enumerator only.
    o.set("b", Value::Int(2));
    assert_eq!(key_runs.get(), 2);
    assert_eq!(read_runs.get(), 1);

    // Removing it fires the enumerator again.
    o.remove("b");
    assert_eq!(key_runs.get(), 3);
    assert_eq!(read_runs.get(), 1);
}

#[test]
fn membership_tests_subscribe_to_their_key() {
    let o = reactive(&Obj::record());
    let seen = Rc::new(Cell::new(false));

    let seen_clone = seen.clone();
    let o_clone = o.clone();
    let _runner = effect(move || {
        seen_clone.set(o_clone.has("flag"));
    });
    assert!(!seen.get());

    o.set("flag", Value::Bool(true));
    assert!(seen.get());

    o.remove("flag");
    assert!(!seen.get());
}

#[test]
fn untrack_suppresses_subscription() {
    let a = Ref::new(Value::Int(1));
    let b = Ref::new(Value::Int(2));
    let runs = Rc::new(Cell::new(0));

    let runs_clone = runs.clone();
    let a_clone = a.clone();
    let b_clone = b.clone();
    let _runner = effect(move || {
        let _ = a_clone.get();
        let _ = untrack(|| b_clone.get());
        runs_clone.set(runs_clone.get() + 1);
    });
    assert_eq!(runs.get(), 1);

    b.set(Value::Int(20));
    assert_eq!(runs.get(), 1);

    a.set(Value::Int(10));
    assert_eq!(runs.get(), 2);
}

#[test]
fn paused_tracking_spans_reads_until_reset() {
    let a = Ref::new(Value::Int(1));
    let runs = Rc::new(Cell::new(0));

    let runs_clone = runs.clone();
    let a_clone = a.clone();
    let _runner = effect(move || {
        pause_tracking();
        let _ = a_clone.get();
        reset_tracking();
        runs_clone.set(runs_clone.get() + 1);
    });
    assert_eq!(runs.get(), 1);

    a.set(Value::Int(2));
    assert_eq!(runs.get(), 1);
}

#[test]
fn deep_nesting_falls_back_to_full_cleanup() {
    fn build(depth: u32, r: Ref, counter: Rc<Cell<u32>>) {
        if depth == 0 {
            let _ = r.get();
            counter.set(counter.get() + 1);
        } else {
            let r_next = r.clone();
            let counter_next = counter.clone();
            let _child = effect(move || build(depth - 1, r_next.clone(), counter_next.clone()));
        }
    }

    let r = Ref::new(Value::Int(0));
    let counter = Rc::new(Cell::new(0));

    let r_clone = r.clone();
    let counter_clone = counter.clone();
    // 34 nested levels: the innermost reader runs past the marker-bit
    // depth cap and must still subscribe correctly.
    let _root = effect(move || build(34, r_clone.clone(), counter_clone.clone()));
    assert_eq!(counter.get(), 1);

    r.set(Value::Int(1));
    assert_eq!(counter.get(), 2);
}
