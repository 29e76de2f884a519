// ============================================================================
// weft-reactive - Reactive Containers
// Wrap-kind constructors and the observed record/list accessors
// ============================================================================
//
// The accessor methods here are the proxy handlers of this system: every
// read routes through `track`, every write through `trigger`. Reads
// unwrap ref values (except list integer slots) and lazily wrap nested
// containers in the reader's own kind; writes normalize values to raw,
// delegate ref-valued slots to the ref itself, and fire ADD/SET/DELETE.
//
// Raw handles bypass everything: mutating a container through a raw
// handle is invisible to the graph, exactly like touching the raw target
// behind a proxy.
// ============================================================================

use crate::core::value::{Obj, ObjKind, Storage, Value, WrapKind};
use crate::core::warning::dev_warn;
use crate::primitives::refs::is_ref;
use crate::reactivity::equality::has_changed;
use crate::reactivity::tracking::{track, trigger, Key, TrackOp, TriggerOp};

// =============================================================================
// WRAP-KIND CREATION
// =============================================================================

fn create_wrapper(target: &Obj, kind: WrapKind) -> Obj {
    if target.kind == kind {
        return target.clone();
    }
    // A container annotated with mark_raw never becomes observed; hand the
    // raw target back.
    if target.data.skip.get() {
        return target.with_kind(WrapKind::Raw);
    }
    target.with_kind(kind)
}

/// Deeply observed, mutable view of a container.
pub fn reactive(target: &Obj) -> Obj {
    // A readonly wrapper stays readonly.
    if target.kind.is_readonly() {
        return target.clone();
    }
    create_wrapper(target, WrapKind::Reactive)
}

/// Deeply observed view whose writes warn and no-op.
pub fn readonly(target: &Obj) -> Obj {
    create_wrapper(target, WrapKind::Readonly)
}

/// Observed view that neither wraps nested containers nor unwraps refs.
pub fn shallow_reactive(target: &Obj) -> Obj {
    if target.kind.is_readonly() {
        return target.clone();
    }
    create_wrapper(target, WrapKind::ShallowReactive)
}

/// Readonly view without nested wrapping.
pub fn shallow_readonly(target: &Obj) -> Obj {
    create_wrapper(target, WrapKind::ShallowReadonly)
}

/// Ref-unwrapping view of a plain container: reads unref, writes delegate
/// to ref-valued slots. An already-reactive container passes through (its
/// own get handler unwraps).
pub fn proxy_refs(target: &Obj) -> Obj {
    if is_reactive(target) {
        return target.clone();
    }
    target.with_kind(WrapKind::RefUnwrap)
}

// =============================================================================
// PREDICATES
// =============================================================================

pub fn is_reactive(target: &Obj) -> bool {
    target.kind.tracks()
}

pub fn is_readonly(target: &Obj) -> bool {
    target.kind.is_readonly()
}

pub fn is_shallow(target: &Obj) -> bool {
    target.kind.is_shallow()
}

pub fn is_proxy(target: &Obj) -> bool {
    is_reactive(target) || is_readonly(target)
}

/// The raw handle behind any wrapper.
pub fn to_raw(target: &Obj) -> Obj {
    target.with_kind(WrapKind::Raw)
}

/// Annotate a container so it never becomes reactive; wrap attempts hand
/// back the raw target.
pub fn mark_raw(target: &Obj) -> Obj {
    target.data.skip.set(true);
    target.clone()
}

// =============================================================================
// VALUE-LEVEL HELPERS
// =============================================================================

/// Strip wrappers from a container value; other values pass through.
pub fn to_raw_value(value: &Value) -> Value {
    match value {
        Value::Obj(o) => Value::Obj(to_raw(o)),
        other => other.clone(),
    }
}

/// Wrap a container value reactively; other values pass through.
pub fn to_reactive_value(value: Value) -> Value {
    match value {
        Value::Obj(o) => Value::Obj(reactive(&o)),
        other => other,
    }
}

/// Wrap a container value readonly; other values pass through.
pub fn to_readonly_value(value: Value) -> Value {
    match value {
        Value::Obj(o) => Value::Obj(readonly(&o)),
        other => other,
    }
}

pub(crate) fn is_readonly_value(value: &Value) -> bool {
    matches!(value, Value::Obj(o) if o.kind.is_readonly())
}

pub(crate) fn is_shallow_value(value: &Value) -> bool {
    matches!(value, Value::Obj(o) if o.kind.is_shallow())
}

/// Wrap a nested read result in the reader's kind, deferring deep
/// reactivity until access.
fn wrap_nested(value: Value, reader: WrapKind) -> Value {
    match value {
        Value::Obj(o) => {
            if reader.is_readonly() {
                Value::Obj(readonly(&o))
            } else {
                Value::Obj(reactive(&o))
            }
        }
        other => other,
    }
}

// =============================================================================
// RAW STORAGE ACCESS
// =============================================================================

impl Obj {
    /// Untracked, unwrapped fetch straight from storage.
    pub(crate) fn raw_get(&self, key: &Key) -> Value {
        let storage = self.data.storage.borrow();
        match (&*storage, key) {
            (Storage::Record(map), Key::Str(name)) => {
                map.get(name).cloned().unwrap_or(Value::Unit)
            }
            (Storage::List(items), Key::Index(index)) => {
                items.get(*index).cloned().unwrap_or(Value::Unit)
            }
            (Storage::List(items), Key::Length) => Value::Int(items.len() as i64),
            (Storage::Map(map), Key::Val(k)) => map.get(k).cloned().unwrap_or(Value::Unit),
            _ => Value::Unit,
        }
    }

    pub(crate) fn raw_has(&self, key: &Key) -> bool {
        let storage = self.data.storage.borrow();
        match (&*storage, key) {
            (Storage::Record(map), Key::Str(name)) => map.contains_key(name),
            (Storage::List(items), Key::Index(index)) => *index < items.len(),
            (Storage::List(_), Key::Length) => true,
            (Storage::Map(map), Key::Val(k)) => map.contains_key(k),
            (Storage::Set(set), Key::Val(k)) => set.contains(k),
            _ => false,
        }
    }

    /// Untracked write. Returns false for a key that does not apply to
    /// this container kind (warned at the tracked layer).
    pub(crate) fn raw_set(&self, key: &Key, value: Value) -> bool {
        let mut storage = self.data.storage.borrow_mut();
        match (&mut *storage, key) {
            (Storage::Record(map), Key::Str(name)) => {
                map.insert(name.clone(), value);
                true
            }
            (Storage::List(items), Key::Index(index)) => {
                if *index < items.len() {
                    items[*index] = value;
                } else {
                    // Writing past the end extends with holes, then lands
                    // the value at the requested index.
                    items.resize(*index, Value::Unit);
                    items.push(value);
                }
                true
            }
            (Storage::Map(map), Key::Val(k)) => {
                map.insert(k.clone(), value);
                true
            }
            _ => false,
        }
    }

    /// Untracked removal. Returns whether the key was present. List slots
    /// become holes (`Unit`) so sibling indices keep their meaning.
    pub(crate) fn raw_remove(&self, key: &Key) -> bool {
        let mut storage = self.data.storage.borrow_mut();
        match (&mut *storage, key) {
            (Storage::Record(map), Key::Str(name)) => map.shift_remove(name).is_some(),
            (Storage::List(items), Key::Index(index)) => {
                if *index < items.len() {
                    items[*index] = Value::Unit;
                    true
                } else {
                    false
                }
            }
            (Storage::Map(map), Key::Val(k)) => map.shift_remove(k).is_some(),
            (Storage::Set(set), Key::Val(k)) => set.shift_remove(k),
            _ => false,
        }
    }

    pub(crate) fn raw_len(&self) -> usize {
        let storage = self.data.storage.borrow();
        match &*storage {
            Storage::Record(map) => map.len(),
            Storage::List(items) => items.len(),
            Storage::Map(map) => map.len(),
            Storage::Set(set) => set.len(),
        }
    }

    pub(crate) fn raw_record_keys(&self) -> Vec<std::rc::Rc<str>> {
        let storage = self.data.storage.borrow();
        match &*storage {
            Storage::Record(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

// =============================================================================
// OBSERVED ACCESSORS
// =============================================================================

impl Obj {
    /// Observed read of `key`.
    ///
    /// Through reactive kinds this tracks the slot, unwraps ref values
    /// (except integer slots of lists), and wraps nested containers in the
    /// reader's kind. Shallow kinds return the stored value as-is.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        match self.kind {
            WrapKind::Raw => self.raw_get(&key),
            WrapKind::RefUnwrap => match self.raw_get(&key) {
                Value::Ref(r) => r.get(),
                other => other,
            },
            kind => {
                if kind.tracks() {
                    track(&self.data, TrackOp::Get, key.clone());
                }
                let value = self.raw_get(&key);
                if kind.is_shallow() {
                    return value;
                }
                if let Value::Ref(r) = &value {
                    let keep_ref =
                        self.obj_kind() == ObjKind::List && matches!(key, Key::Index(_));
                    if !keep_ref {
                        return r.get();
                    }
                    return value;
                }
                wrap_nested(value, kind)
            }
        }
    }

    /// Observed write of `key`.
    pub fn set(&self, key: impl Into<Key>, value: Value) {
        let key = key.into();
        match self.kind {
            WrapKind::Raw => {
                self.raw_set(&key, value);
            }
            WrapKind::RefUnwrap => {
                // Writing a plain value over a ref-valued slot updates the
                // ref in place.
                match (self.raw_get(&key), is_ref(&value)) {
                    (Value::Ref(slot), false) => slot.set(value),
                    _ => {
                        self.raw_set(&key, value);
                    }
                }
            }
            WrapKind::Readonly | WrapKind::ShallowReadonly => {
                dev_warn!("set on a readonly container was ignored (key {:?})", key);
            }
            kind => {
                if self.obj_kind() == ObjKind::List && key == Key::Length {
                    match value.as_int() {
                        Some(n) if n >= 0 => self.set_len(n as usize),
                        _ => dev_warn!("list length must be a non-negative integer"),
                    }
                    return;
                }

                let old = self.raw_get(&key);

                if let Value::Ref(old_ref) = &old {
                    if old_ref.is_readonly() && !is_ref(&value) {
                        dev_warn!(
                            "write through a readonly ref slot was ignored (key {:?})",
                            key
                        );
                        return;
                    }
                }

                let mut value = value;
                if !kind.is_shallow() {
                    if !is_readonly_value(&value) && !is_shallow_value(&value) {
                        value = to_raw_value(&value);
                    }
                    if self.obj_kind() != ObjKind::List {
                        if let Value::Ref(old_ref) = &old {
                            if !is_ref(&value) {
                                // Ref assignment: the ref's own dep fires.
                                old_ref.set(value);
                                return;
                            }
                        }
                    }
                }

                let had = self.raw_has(&key);
                if !self.raw_set(&key, value.clone()) {
                    dev_warn!(
                        "key {:?} does not apply to a {}",
                        key,
                        self.obj_kind().name()
                    );
                    return;
                }

                if !had {
                    trigger(&self.data, TriggerOp::Add, Some(key), None);
                } else if has_changed(&value, &old) {
                    trigger(&self.data, TriggerOp::Set, Some(key), None);
                }
            }
        }
    }

    /// Observed removal. Reports presence of the key before removal; a
    /// readonly handle warns and reports success without touching
    /// anything.
    pub fn remove(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        match self.kind {
            WrapKind::Raw | WrapKind::RefUnwrap => self.raw_remove(&key),
            WrapKind::Readonly | WrapKind::ShallowReadonly => {
                dev_warn!(
                    "remove on a readonly container was ignored (key {:?})",
                    key
                );
                true
            }
            _ => {
                let had = self.raw_remove(&key);
                if had {
                    trigger(&self.data, TriggerOp::Delete, Some(key), None);
                }
                had
            }
        }
    }

    /// Observed membership test.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if self.kind.tracks() {
            track(&self.data, TrackOp::Has, key.clone());
        }
        self.raw_has(&key)
    }

    /// Observed enumeration of own keys. Subscribes to the iterate
    /// sentinel (records) or to length (lists).
    pub fn keys(&self) -> Vec<Key> {
        match self.obj_kind() {
            ObjKind::Record => {
                if self.kind.tracks() {
                    track(&self.data, TrackOp::Iterate, Key::Iterate);
                }
                self.raw_record_keys().into_iter().map(Key::Str).collect()
            }
            ObjKind::List => {
                if self.kind.tracks() {
                    track(&self.data, TrackOp::Iterate, Key::Length);
                }
                (0..self.raw_len()).map(Key::Index).collect()
            }
            kind => {
                dev_warn!("keys() does not apply to a {}; see map_keys()", kind.name());
                Vec::new()
            }
        }
    }

    /// Observed list length.
    pub fn len(&self) -> usize {
        if self.obj_kind() == ObjKind::List && self.kind.tracks() {
            track(&self.data, TrackOp::Get, Key::Length);
        }
        self.raw_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// TESTS
// =============================================================================
