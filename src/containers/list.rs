// ============================================================================
// weft-reactive - List Instrumentation
// Identity-sensitive search and length-mutating list operations
// ============================================================================
//
// Search ops track every index first, so later mutations re-fire the
// searching effect, then compare against the raw elements twice: once
// with the argument as given (which may be a wrapped handle) and once
// with it unwrapped to raw. Either form finds the element.
//
// Length mutators run with tracking paused: they touch length and index
// slots internally, and observing those reads from inside the mutation
// would wire an effect to its own writes.
// ============================================================================

use crate::core::value::{Obj, ObjKind, Storage, Value, WrapKind};
use crate::core::warning::dev_warn;
use crate::reactivity::equality::same_value_zero;
use crate::reactivity::tracking::{
    pause_tracking, reset_tracking, track, trigger, trigger_list_resize, Key, TrackOp, TriggerOp,
};

use super::reactive::to_raw_value;

impl Obj {
    fn expect_list(&self, op: &str) -> bool {
        if self.obj_kind() != ObjKind::List {
            dev_warn!("{op}() does not apply to a {}", self.obj_kind().name());
            return false;
        }
        true
    }

    fn mutable_list(&self, op: &str) -> bool {
        if !self.expect_list(op) {
            return false;
        }
        if self.kind.is_readonly() {
            dev_warn!("{op}() on a readonly container was ignored");
            return false;
        }
        true
    }

    /// Store-normalized form of a value entering the list.
    fn incoming(&self, value: Value) -> Value {
        if self.kind.is_shallow() || self.kind == WrapKind::Raw {
            value
        } else {
            to_raw_value(&value)
        }
    }

    fn with_items<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let mut storage = self.data.storage.borrow_mut();
        match &mut *storage {
            Storage::List(items) => f(items),
            _ => unreachable!("checked by expect_list"),
        }
    }

    // =========================================================================
    // IDENTITY-SENSITIVE SEARCH
    // =========================================================================

    /// Whether the list contains `needle`, searching by same-value-zero
    /// identity with a raw-unwrapped retry.
    pub fn includes(&self, needle: &Value) -> bool {
        self.index_of(needle).is_some()
    }

    /// First index of `needle`, if present.
    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        self.search(needle, false)
    }

    /// Last index of `needle`, if present.
    pub fn last_index_of(&self, needle: &Value) -> Option<usize> {
        self.search(needle, true)
    }

    fn search(&self, needle: &Value, from_end: bool) -> Option<usize> {
        if !self.expect_list("search") {
            return None;
        }

        // Subscribe to every index: a future mutation anywhere in the
        // list can change the answer.
        if self.kind.tracks() {
            for i in 0..self.raw_len() {
                track(&self.data, TrackOp::Get, Key::Index(i));
            }
        }

        let items: Vec<Value> = self.with_items(|items| items.clone());
        let find = |needle: &Value| -> Option<usize> {
            if from_end {
                items.iter().rposition(|item| same_value_zero(item, needle))
            } else {
                items.iter().position(|item| same_value_zero(item, needle))
            }
        };

        if let Some(found) = find(needle) {
            return Some(found);
        }
        // The argument may be a wrapped handle while the list stores raw
        // values; retry with the raw form.
        let raw_needle = to_raw_value(needle);
        if !same_value_zero(&raw_needle, needle) {
            return find(&raw_needle);
        }
        None
    }

    // =========================================================================
    // LENGTH MUTATORS
    // =========================================================================

    /// Append a value; returns the new length.
    pub fn push(&self, value: Value) -> usize {
        if !self.mutable_list("push") {
            return self.raw_len();
        }
        let value = self.incoming(value);

        pause_tracking();
        let index = self.with_items(|items| {
            items.push(value);
            items.len() - 1
        });
        reset_tracking();

        if self.kind.tracks() {
            trigger(&self.data, TriggerOp::Add, Some(Key::Index(index)), None);
        }
        index + 1
    }

    /// Remove and return the last value (`Unit` when empty).
    pub fn pop(&self) -> Value {
        if !self.mutable_list("pop") {
            return Value::Unit;
        }

        pause_tracking();
        let popped = self.with_items(|items| items.pop());
        reset_tracking();

        match popped {
            Some(value) => {
                if self.kind.tracks() {
                    trigger_list_resize(&self.data, self.raw_len(), true);
                }
                value
            }
            None => Value::Unit,
        }
    }

    /// Remove and return the first value (`Unit` when empty); every
    /// remaining element shifts down.
    pub fn shift(&self) -> Value {
        if !self.mutable_list("shift") {
            return Value::Unit;
        }

        pause_tracking();
        let shifted = self.with_items(|items| {
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        });
        reset_tracking();

        match shifted {
            Some(value) => {
                if self.kind.tracks() {
                    trigger_list_resize(&self.data, 0, true);
                }
                value
            }
            None => Value::Unit,
        }
    }

    /// Prepend a value; returns the new length.
    pub fn unshift(&self, value: Value) -> usize {
        if !self.mutable_list("unshift") {
            return self.raw_len();
        }
        let value = self.incoming(value);

        pause_tracking();
        let len = self.with_items(|items| {
            items.insert(0, value);
            items.len()
        });
        reset_tracking();

        if self.kind.tracks() {
            trigger_list_resize(&self.data, 0, true);
        }
        len
    }

    /// Remove `delete_count` elements at `start`, inserting `items` in
    /// their place; returns the removed elements.
    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Vec<Value> {
        if !self.mutable_list("splice") {
            return Vec::new();
        }
        let items: Vec<Value> = items.into_iter().map(|v| self.incoming(v)).collect();

        pause_tracking();
        let (removed, old_len, new_len, start) = self.with_items(|list| {
            let old_len = list.len();
            let start = start.min(old_len);
            let end = start + delete_count.min(old_len - start);
            let removed: Vec<Value> = list.splice(start..end, items).collect();
            (removed, old_len, list.len(), start)
        });
        reset_tracking();

        if self.kind.tracks() && (old_len != new_len || !removed.is_empty()) {
            trigger_list_resize(&self.data, start, old_len != new_len);
        }
        removed
    }

    /// Resize the list. Shrinking fires every index at or past the new
    /// length; growing extends with holes and fires length observers only.
    pub fn set_len(&self, new_len: usize) {
        if !self.mutable_list("set_len") {
            return;
        }

        let old_len = self.raw_len();
        if old_len == new_len {
            return;
        }

        pause_tracking();
        self.with_items(|items| items.resize(new_len, Value::Unit));
        reset_tracking();

        if self.kind.tracks() {
            if new_len < old_len {
                trigger_list_resize(&self.data, new_len, true);
            } else {
                trigger_list_resize(&self.data, usize::MAX, true);
            }
        }
    }

    /// Observed snapshot of the list: subscribes to length and every
    /// index, applying the reader's unwrap/wrap rules per element.
    pub fn to_vec(&self) -> Vec<Value> {
        if !self.expect_list("to_vec") {
            return Vec::new();
        }
        let len = self.len();
        (0..len).map(|i| self.get(Key::Index(i))).collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
