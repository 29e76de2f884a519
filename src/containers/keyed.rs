// ============================================================================
// weft-reactive - Keyed Collection Instrumentation
// Observed map and set operations
// ============================================================================
//
// Keyed collections take whole values as keys, so keys normalize to raw
// before storage and lookup tries the argument as given before retrying
// its raw form. Iteration and size subscribe to the iterate sentinel;
// key-only iteration of a map subscribes to the map-key sentinel, which
// ADD and DELETE fire but SET does not (a value overwrite leaves the key
// set untouched).
// ============================================================================

use crate::core::value::{Obj, ObjKind, Storage, Value, WrapKind};
use crate::core::warning::dev_warn;
use crate::reactivity::equality::has_changed;
use crate::reactivity::tracking::{track, trigger, Key, TrackOp, TriggerOp};

use super::reactive::{to_raw_value, to_readonly_value, to_reactive_value};

impl Obj {
    fn is_keyed(&self) -> bool {
        matches!(self.obj_kind(), ObjKind::Map | ObjKind::Set)
    }

    fn expect_keyed(&self, op: &str) -> bool {
        if !self.is_keyed() {
            dev_warn!("{op}() does not apply to a {}", self.obj_kind().name());
            return false;
        }
        true
    }

    fn mutable_keyed(&self, op: &str) -> bool {
        if !self.expect_keyed(op) {
            return false;
        }
        if self.kind.is_readonly() {
            dev_warn!("{op}() on a readonly container was ignored");
            return false;
        }
        true
    }

    /// Wrap a read result in the reader's kind (no ref unwrapping in
    /// keyed collections).
    fn wrap_read(&self, value: Value) -> Value {
        match self.kind {
            WrapKind::Reactive => to_reactive_value(value),
            WrapKind::Readonly => to_readonly_value(value),
            _ => value,
        }
    }

    /// Resolve the stored key: as given first, then its raw form.
    fn resolve_key(&self, key: &Value) -> Value {
        if self.raw_has(&Key::Val(key.clone())) {
            return key.clone();
        }
        to_raw_value(key)
    }

    // =========================================================================
    // MAP OPERATIONS
    // =========================================================================

    /// Observed lookup of a map entry (`Unit` when absent).
    pub fn entry_get(&self, key: &Value) -> Value {
        if !self.expect_keyed("entry_get") || self.obj_kind() != ObjKind::Map {
            return Value::Unit;
        }
        let stored = self.resolve_key(key);
        if self.kind.tracks() {
            track(&self.data, TrackOp::Get, Key::Val(stored.clone()));
        }
        self.wrap_read(self.raw_get(&Key::Val(stored)))
    }

    /// Observed membership test for a map key or set member.
    pub fn entry_has(&self, key: &Value) -> bool {
        if !self.expect_keyed("entry_has") {
            return false;
        }
        let stored = self.resolve_key(key);
        if self.kind.tracks() {
            track(&self.data, TrackOp::Has, Key::Val(stored.clone()));
        }
        self.raw_has(&Key::Val(stored))
    }

    /// Observed write of a map entry.
    pub fn entry_set(&self, key: Value, value: Value) {
        if !self.mutable_keyed("entry_set") || self.obj_kind() != ObjKind::Map {
            if self.obj_kind() == ObjKind::Set {
                dev_warn!("entry_set() does not apply to a set; see add_entry()");
            }
            return;
        }
        if self.kind == WrapKind::Raw {
            self.raw_set(&Key::Val(key), value);
            return;
        }

        let key = to_raw_value(&key);
        let value = if self.kind.is_shallow() {
            value
        } else {
            to_raw_value(&value)
        };

        let had = self.raw_has(&Key::Val(key.clone()));
        let old = self.raw_get(&Key::Val(key.clone()));
        self.raw_set(&Key::Val(key.clone()), value.clone());

        if !self.kind.tracks() {
            return;
        }
        if !had {
            trigger(&self.data, TriggerOp::Add, Some(Key::Val(key)), None);
        } else if has_changed(&value, &old) {
            trigger(&self.data, TriggerOp::Set, Some(Key::Val(key)), None);
        }
    }

    // =========================================================================
    // SET OPERATIONS
    // =========================================================================

    /// Observed insertion of a set member.
    pub fn add_entry(&self, value: Value) {
        if !self.mutable_keyed("add_entry") || self.obj_kind() != ObjKind::Set {
            if self.obj_kind() == ObjKind::Map {
                dev_warn!("add_entry() does not apply to a map; see entry_set()");
            }
            return;
        }
        if self.kind == WrapKind::Raw {
            let mut storage = self.data.storage.borrow_mut();
            if let Storage::Set(set) = &mut *storage {
                set.insert(value);
            }
            return;
        }

        let value = to_raw_value(&value);
        let had = self.raw_has(&Key::Val(value.clone()));
        if had {
            return;
        }
        {
            let mut storage = self.data.storage.borrow_mut();
            if let Storage::Set(set) = &mut *storage {
                set.insert(value.clone());
            }
        }
        if self.kind.tracks() {
            trigger(&self.data, TriggerOp::Add, Some(Key::Val(value)), None);
        }
    }

    /// Observed removal of a map entry or set member; reports presence.
    pub fn delete_entry(&self, key: &Value) -> bool {
        if !self.expect_keyed("delete_entry") {
            return false;
        }
        if self.kind.is_readonly() {
            dev_warn!("delete_entry() on a readonly container was ignored");
            return true;
        }

        let stored = self.resolve_key(key);
        let had = self.raw_remove(&Key::Val(stored.clone()));
        if had && self.kind.tracks() {
            trigger(&self.data, TriggerOp::Delete, Some(Key::Val(stored)), None);
        }
        had
    }

    // =========================================================================
    // SHARED OPERATIONS
    // =========================================================================

    /// Observed clear: every observer of the collection fires.
    pub fn clear(&self) {
        if !self.mutable_keyed("clear") {
            return;
        }

        let had_entries = self.raw_len() > 0;
        {
            let mut storage = self.data.storage.borrow_mut();
            match &mut *storage {
                Storage::Map(map) => map.clear(),
                Storage::Set(set) => set.clear(),
                _ => unreachable!("checked by expect_keyed"),
            }
        }
        if had_entries && self.kind.tracks() {
            trigger(&self.data, TriggerOp::Clear, None, None);
        }
    }

    /// Observed entry count.
    pub fn size(&self) -> usize {
        if !self.expect_keyed("size") {
            return 0;
        }
        if self.kind.tracks() {
            track(&self.data, TrackOp::Iterate, Key::Iterate);
        }
        self.raw_len()
    }

    /// Observed iteration over (value, key) pairs. Sets pass the member as
    /// both.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value)) {
        for (key, value) in self.entries() {
            f(value, key);
        }
    }

    /// Observed iteration over (key, value) pairs.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        if !self.expect_keyed("entries") {
            return Vec::new();
        }
        if self.kind.tracks() {
            track(&self.data, TrackOp::Iterate, Key::Iterate);
        }
        let snapshot: Vec<(Value, Value)> = {
            let storage = self.data.storage.borrow();
            match &*storage {
                Storage::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                Storage::Set(set) => set.iter().map(|v| (v.clone(), v.clone())).collect(),
                _ => unreachable!("checked by expect_keyed"),
            }
        };
        snapshot
            .into_iter()
            .map(|(k, v)| (self.wrap_read(k), self.wrap_read(v)))
            .collect()
    }

    /// Observed key iteration. Map keys subscribe to the map-key sentinel:
    /// value overwrites do not re-fire, key additions and removals do.
    pub fn map_keys(&self) -> Vec<Value> {
        if !self.expect_keyed("map_keys") {
            return Vec::new();
        }
        if self.kind.tracks() {
            let sentinel = if self.obj_kind() == ObjKind::Map {
                Key::MapKeyIterate
            } else {
                Key::Iterate
            };
            track(&self.data, TrackOp::Iterate, sentinel);
        }
        let storage = self.data.storage.borrow();
        let keys: Vec<Value> = match &*storage {
            Storage::Map(map) => map.keys().cloned().collect(),
            Storage::Set(set) => set.iter().cloned().collect(),
            _ => unreachable!("checked by expect_keyed"),
        };
        drop(storage);
        keys.into_iter().map(|k| self.wrap_read(k)).collect()
    }

    /// Observed value iteration.
    pub fn map_values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
