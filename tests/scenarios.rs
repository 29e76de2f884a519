// ============================================================================
// weft-reactive - End-to-End Scenarios
// The composed behaviors a consumer of the reactivity core relies on
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use weft_reactive::{computed, effect, reactive, Obj, Ref, Value};

fn log_cell() -> Rc<RefCell<Vec<Value>>> {
    Rc::new(RefCell::new(Vec::new()))
}

#[test]
fn ref_read_write_skips_duplicate_values() {
    let r = Ref::new(Value::Int(1));
    let log = log_cell();

    let log_clone = log.clone();
    let r_clone = r.clone();
    let _runner = effect(move || {
        log_clone.borrow_mut().push(r_clone.get());
    });

    r.set(Value::Int(2));
    r.set(Value::Int(2));
    r.set(Value::Int(3));

    assert_eq!(
        *log.borrow(),
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
}

#[test]
fn dynamic_dep_set_drops_stale_branches() {
    let o = reactive(&Obj::record_from([
        ("a", Value::Int(1)),
        ("b", Value::Int(2)),
        ("c", Value::Bool(true)),
    ]));
    let log = log_cell();

    let log_clone = log.clone();
    let o_clone = o.clone();
    let _runner = effect(move || {
        let branch = if o_clone.get("c") == Value::Bool(true) {
            o_clone.get("a")
        } else {
            o_clone.get("b")
        };
        log_clone.borrow_mut().push(branch);
    });

    o.set("c", Value::Bool(false));

    // The re-run re-tracked only `c` and `b`; `a` was reconciled away, so
    // writing it must not re-fire.
    o.set("a", Value::Int(10));

    assert_eq!(*log.borrow(), vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn computed_is_lazy_until_first_read() {
    let a = Ref::new(Value::Int(1));
    let calls = Rc::new(Cell::new(0));

    let calls_clone = calls.clone();
    let a_clone = a.clone();
    let c = computed(move || {
        calls_clone.set(calls_clone.get() + 1);
        Value::Int(a_clone.get().as_int().unwrap() * 2)
    });

    a.set(Value::Int(2));
    a.set(Value::Int(3));
    assert_eq!(calls.get(), 0);

    assert_eq!(c.get(), Value::Int(6));
    assert_eq!(calls.get(), 1);
}

#[test]
fn computed_caches_between_mutations() {
    let a = Ref::new(Value::Int(3));
    let calls = Rc::new(Cell::new(0));

    let calls_clone = calls.clone();
    let a_clone = a.clone();
    let c = computed(move || {
        calls_clone.set(calls_clone.get() + 1);
        Value::Int(a_clone.get().as_int().unwrap() * 2)
    });

    assert_eq!(c.get(), Value::Int(6));
    assert_eq!(c.get(), Value::Int(6));
    assert_eq!(c.get(), Value::Int(6));
    assert_eq!(calls.get(), 1);

    a.set(Value::Int(4));
    assert_eq!(c.get(), Value::Int(8));
    assert_eq!(c.get(), Value::Int(8));
    assert_eq!(calls.get(), 2);
}

#[test]
fn nested_effects_detach_stale_inner() {
    let r1 = Ref::new(Value::Int(0));
    let r2 = Ref::new(Value::Int(0));
    let outer_runs = Rc::new(Cell::new(0));
    let inner_runs = Rc::new(Cell::new(0));

    let r1_outer = r1.clone();
    let r2_outer = r2.clone();
    let outer_clone = outer_runs.clone();
    let inner_clone = inner_runs.clone();
    let _outer = effect(move || {
        let _ = r1_outer.get();
        outer_clone.set(outer_clone.get() + 1);

        let r2_inner = r2_outer.clone();
        let inner_count = inner_clone.clone();
        let _inner = effect(move || {
            let _ = r2_inner.get();
            inner_count.set(inner_count.get() + 1);
        });
    });

    assert_eq!(outer_runs.get(), 1);
    assert_eq!(inner_runs.get(), 1);

    // Inner dep: only the inner re-fires.
    r2.set(Value::Int(1));
    assert_eq!(outer_runs.get(), 1);
    assert_eq!(inner_runs.get(), 2);

    // Outer dep: outer re-runs and builds a fresh inner.
    r1.set(Value::Int(1));
    assert_eq!(outer_runs.get(), 2);
    assert_eq!(inner_runs.get(), 3);

    // The stale inner is detached: only the fresh inner fires.
    r2.set(Value::Int(2));
    assert_eq!(outer_runs.get(), 2);
    assert_eq!(inner_runs.get(), 4);
}

#[test]
fn list_search_hits_raw_identity_through_wrapper() {
    let element = Obj::record_from([("x", Value::Int(1))]);
    let list = reactive(&Obj::list_from([Value::Obj(element.clone())]));

    // Searching for the raw element succeeds even though reads through
    // the list hand out wrapped handles.
    assert!(list.includes(&Value::Obj(element.clone())));

    // And searching for the wrapped form also succeeds.
    let wrapped = list.get(0usize);
    assert!(list.includes(&wrapped));
}

#[test]
fn plain_effect_sees_fresh_computed_state_in_same_trigger() {
    let a = Ref::new(Value::Int(1));

    let a_for_computed = a.clone();
    let c = computed(move || Value::Int(a_for_computed.get().as_int().unwrap() * 2));

    // The effect tracks both the source and the computed, so the trigger
    // reaches it twice; every observation must be internally consistent
    // because computed invalidation propagates first.
    let observations = Rc::new(RefCell::new(Vec::new()));
    let observations_clone = observations.clone();
    let a_clone = a.clone();
    let c_clone = c.clone();
    let _runner = effect(move || {
        let base = a_clone.get().as_int().unwrap();
        let doubled = c_clone.get().as_int().unwrap();
        observations_clone.borrow_mut().push((base, doubled));
    });

    a.set(Value::Int(2));
    a.set(Value::Int(5));

    for (base, doubled) in observations.borrow().iter() {
        assert_eq!(*doubled, base * 2, "stale computed observed: {base} -> {doubled}");
    }
}
