// ============================================================================
// weft-reactive - Refs
// Single-cell observable boxes
// ============================================================================
//
// A ref is one observable slot with its dep held inline rather than in the
// registry. The public `Ref` handle erases the flavor behind a trait:
// plain refs own a value, custom refs delegate to user closures, and
// property refs read/write through a container (their tracking happens in
// the container's registry entries, so they carry no dep of their own).
// Computeds implement the same trait, which is what makes a computed a
// ref.
// ============================================================================

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::containers::reactive::{
    is_readonly_value, is_shallow_value, to_raw_value, to_reactive_value,
};
use crate::core::value::{Obj, ObjKind, Value};
use crate::core::warning::dev_warn;
use crate::reactivity::dep::Dep;
use crate::reactivity::equality::{has_changed, rc_addr};
use crate::reactivity::tracking::{
    track_effects, trigger_effects, DebugEvent, Key, TrackOp, TriggerOp,
};

// =============================================================================
// REF SOURCE TRAIT
// =============================================================================

/// The behavior behind a `Ref` handle.
pub trait RefSource {
    /// Tracked read of the current value.
    fn get(&self) -> Value;

    /// Write a new value, triggering subscribers when it changed.
    fn set(&self, value: Value);

    /// The inline dep, when this flavor owns one.
    fn dep(&self) -> Option<Rc<Dep>>;

    fn is_shallow(&self) -> bool {
        false
    }

    /// Readonly refs (computeds without a setter) reject container writes
    /// that would otherwise delegate to them.
    fn is_readonly(&self) -> bool {
        false
    }
}

/// Subscribe the active effect to a ref's inline dep.
pub(crate) fn track_ref_dep(dep: &Rc<Dep>) {
    track_effects(
        dep,
        DebugEvent::Track {
            op: TrackOp::Get,
            key: None,
        },
    );
}

/// Fire a ref's inline dep.
pub(crate) fn trigger_ref_dep(dep: &Rc<Dep>) {
    trigger_effects(
        dep,
        DebugEvent::Trigger {
            op: TriggerOp::Set,
            key: None,
        },
    );
}

// =============================================================================
// REF HANDLE
// =============================================================================

/// Handle to a single-cell observable. Cloning shares the cell.
#[derive(Clone)]
pub struct Ref {
    source: Rc<dyn RefSource>,
}

impl Ref {
    /// Box a value into a ref. A ref input is returned unchanged.
    pub fn new(value: Value) -> Ref {
        match value {
            Value::Ref(r) => r,
            other => Ref {
                source: Rc::new(PlainRef::new(other, false)),
            },
        }
    }

    /// Box a value without reactive-wrapping nested containers.
    pub fn shallow(value: Value) -> Ref {
        match value {
            Value::Ref(r) => r,
            other => Ref {
                source: Rc::new(PlainRef::new(other, true)),
            },
        }
    }

    pub(crate) fn from_source(source: Rc<dyn RefSource>) -> Ref {
        Ref { source }
    }

    /// Tracked read.
    pub fn get(&self) -> Value {
        self.source.get()
    }

    /// Write; subscribers fire only when the value changed.
    pub fn set(&self, value: Value) {
        self.source.set(value);
    }

    pub fn is_shallow(&self) -> bool {
        self.source.is_shallow()
    }

    pub(crate) fn is_readonly(&self) -> bool {
        self.source.is_readonly()
    }

    pub(crate) fn dep(&self) -> Option<Rc<Dep>> {
        self.source.dep()
    }

    /// Identity: two handles to the same cell.
    pub fn same_ref(&self, other: &Ref) -> bool {
        self.source_addr() == other.source_addr()
    }

    pub(crate) fn source_addr(&self) -> usize {
        rc_addr(&self.source)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref(@{:x})", self.source_addr())
    }
}

// =============================================================================
// PLAIN REF
// =============================================================================

struct PlainRef {
    /// The raw (unwrapped) value, used for change detection.
    raw: RefCell<Value>,
    /// The exposed value: reactive-wrapped unless shallow.
    value: RefCell<Value>,
    dep: Rc<Dep>,
    shallow: bool,
}

impl PlainRef {
    fn new(value: Value, shallow: bool) -> Self {
        let raw = if shallow {
            value.clone()
        } else {
            to_raw_value(&value)
        };
        let exposed = if shallow {
            value
        } else {
            to_reactive_value(raw.clone())
        };
        Self {
            raw: RefCell::new(raw),
            value: RefCell::new(exposed),
            dep: Dep::new(),
            shallow,
        }
    }
}

impl RefSource for PlainRef {
    fn get(&self) -> Value {
        track_ref_dep(&self.dep);
        self.value.borrow().clone()
    }

    fn set(&self, value: Value) {
        // Shallow or already-wrapped inputs are stored as handed in;
        // everything else is compared and stored raw.
        let direct = self.shallow || is_shallow_value(&value) || is_readonly_value(&value);
        let new = if direct { value } else { to_raw_value(&value) };

        if has_changed(&new, &self.raw.borrow()) {
            *self.raw.borrow_mut() = new.clone();
            *self.value.borrow_mut() = if direct {
                new
            } else {
                to_reactive_value(new)
            };
            trigger_ref_dep(&self.dep);
        }
    }

    fn dep(&self) -> Option<Rc<Dep>> {
        Some(self.dep.clone())
    }

    fn is_shallow(&self) -> bool {
        self.shallow
    }
}

// =============================================================================
// CUSTOM REF
// =============================================================================

/// Track/trigger callbacks handed to a `custom_ref` factory.
pub type RefCallback = Rc<dyn Fn()>;

struct CustomRef {
    get_fn: Box<dyn Fn() -> Value>,
    set_fn: Box<dyn Fn(Value)>,
    dep: Rc<Dep>,
}

impl RefSource for CustomRef {
    fn get(&self) -> Value {
        (self.get_fn)()
    }

    fn set(&self, value: Value) {
        (self.set_fn)(value);
    }

    fn dep(&self) -> Option<Rc<Dep>> {
        Some(self.dep.clone())
    }
}

/// Build a ref with user-defined get/set. The factory receives `track` and
/// `trigger` callbacks wired to the ref's internally managed dep.
pub fn custom_ref(
    factory: impl FnOnce(RefCallback, RefCallback) -> (Box<dyn Fn() -> Value>, Box<dyn Fn(Value)>),
) -> Ref {
    let dep = Dep::new();

    let track = {
        let dep = dep.clone();
        Rc::new(move || track_ref_dep(&dep)) as RefCallback
    };
    let trigger = {
        let dep = dep.clone();
        Rc::new(move || trigger_ref_dep(&dep)) as RefCallback
    };

    let (get_fn, set_fn) = factory(track, trigger);
    Ref::from_source(Rc::new(CustomRef {
        get_fn,
        set_fn,
        dep,
    }))
}

// =============================================================================
// PROPERTY REF (to_ref)
// =============================================================================

struct PropertyRef {
    obj: Obj,
    key: Key,
    default: Option<Value>,
}

impl RefSource for PropertyRef {
    fn get(&self) -> Value {
        // Tracking happens through the container's registry slot.
        let value = self.obj.get(self.key.clone());
        match (&value, &self.default) {
            (Value::Unit, Some(fallback)) => fallback.clone(),
            _ => value,
        }
    }

    fn set(&self, value: Value) {
        self.obj.set(self.key.clone(), value);
    }

    fn dep(&self) -> Option<Rc<Dep>> {
        None
    }
}

/// A ref that reads and writes through `obj[key]`. If the slot already
/// holds a ref, that ref is returned directly.
pub fn to_ref(obj: &Obj, key: impl Into<Key>, default: Option<Value>) -> Ref {
    let key = key.into();
    if let Value::Ref(existing) = obj.raw_get(&key) {
        return existing;
    }
    Ref::from_source(Rc::new(PropertyRef {
        obj: obj.clone(),
        key,
        default,
    }))
}

/// Map every entry of a record or list to a property ref, returned as a
/// raw record (or list) of refs.
pub fn to_refs(obj: &Obj) -> Obj {
    if !crate::containers::reactive::is_proxy(obj) {
        dev_warn!("to_refs() expects a reactive or readonly container");
    }
    match obj.obj_kind() {
        ObjKind::Record => {
            let keys = obj.raw_record_keys();
            Obj::record_from(
                keys.into_iter()
                    .map(|k| (k.clone(), Value::Ref(to_ref(obj, Key::Str(k), None)))),
            )
        }
        ObjKind::List => {
            let len = obj.raw_len();
            Obj::list_from((0..len).map(|i| Value::Ref(to_ref(obj, Key::Index(i), None))))
        }
        kind => {
            dev_warn!("to_refs() does not apply to a {}", kind.name());
            Obj::record()
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Whether a value is a ref.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// Unwrap one level: a ref yields its (tracked) value, anything else
/// passes through.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.get(),
        other => other.clone(),
    }
}

/// Manually fire a ref's subscribers, e.g. after in-place mutation of a
/// shallow ref's contents.
pub fn trigger_ref(r: &Ref) {
    if let Some(dep) = r.dep() {
        trigger_ref_dep(&dep);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::effect::effect;
    use std::cell::Cell;

    #[test]
    fn ref_of_ref_is_identity() {
        let r = Ref::new(Value::Int(1));
        let wrapped = Ref::new(Value::Ref(r.clone()));
        assert!(r.same_ref(&wrapped));
    }

    #[test]
    fn unref_returns_inner_for_primitives() {
        let r = Ref::new(Value::Int(5));
        assert_eq!(unref(&Value::Ref(r)), Value::Int(5));
        assert_eq!(unref(&Value::Int(7)), Value::Int(7));
    }

    #[test]
    fn duplicate_write_does_not_refire() {
        let r = Ref::new(Value::Int(1));
        let runs = Rc::new(Cell::new(0));

        let runs_clone = runs.clone();
        let r_clone = r.clone();
        let _runner = effect(move || {
            let _ = r_clone.get();
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        r.set(Value::Int(2));
        assert_eq!(runs.get(), 2);

        r.set(Value::Int(2));
        assert_eq!(runs.get(), 2);

        r.set(Value::Int(3));
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn nan_overwrite_does_not_refire() {
        let r = Ref::new(Value::Float(f64::NAN));
        let runs = Rc::new(Cell::new(0));

        let runs_clone = runs.clone();
        let r_clone = r.clone();
        let _runner = effect(move || {
            let _ = r_clone.get();
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        r.set(Value::Float(f64::NAN));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn trigger_ref_fires_without_a_write() {
        let r = Ref::shallow(Value::Int(0));
        let runs = Rc::new(Cell::new(0));

        let runs_clone = runs.clone();
        let r_clone = r.clone();
        let _runner = effect(move || {
            let _ = r_clone.get();
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        trigger_ref(&r);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn dep_markers_are_zero_outside_runs() {
        let r = Ref::new(Value::Int(1));
        let r2 = Ref::new(Value::Int(2));

        let outer_dep = r.clone();
        let inner_dep = r2.clone();
        let _outer = effect(move || {
            let _ = outer_dep.get();
            let nested = inner_dep.clone();
            let _inner = effect(move || {
                let _ = nested.get();
            });
        });

        assert_eq!(r.dep().unwrap().marker_state(), (0, 0));
        assert_eq!(r2.dep().unwrap().marker_state(), (0, 0));

        r.set(Value::Int(5));
        assert_eq!(r.dep().unwrap().marker_state(), (0, 0));
        assert_eq!(r2.dep().unwrap().marker_state(), (0, 0));
    }

    #[test]
    fn stop_clears_the_subscription_both_ways() {
        let r = Ref::new(Value::Int(1));

        let dep_reader = r.clone();
        let runner = effect(move || {
            let _ = dep_reader.get();
        });
        assert_eq!(r.dep().unwrap().subscribers().len(), 1);

        runner.stop();
        assert_eq!(r.dep().unwrap().subscribers().len(), 0);
    }

    #[test]
    fn custom_ref_controls_tracking() {
        let r = custom_ref(|track, trigger| {
            let cell = Rc::new(RefCell::new(Value::Int(0)));
            let cell_get = cell.clone();
            let get: Box<dyn Fn() -> Value> = Box::new(move || {
                track();
                cell_get.borrow().clone()
            });
            let set: Box<dyn Fn(Value)> = Box::new(move |v| {
                *cell.borrow_mut() = v;
                trigger();
            });
            (get, set)
        });

        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let r_clone = r.clone();
        let _runner = effect(move || {
            let _ = r_clone.get();
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        r.set(Value::Int(9));
        assert_eq!(runs.get(), 2);
        assert_eq!(r.get(), Value::Int(9));
    }
}
