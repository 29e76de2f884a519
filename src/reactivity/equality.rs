// ============================================================================
// weft-reactive - Value Equality
// Same-value-zero comparison used by every change check
// ============================================================================
//
// Write propagation fires only when a value actually changed. "Changed"
// uses same-value-zero semantics: NaN equals NaN (a NaN overwrite is not a
// change), positive and negative zero are equal, ints and floats compare
// numerically, and containers/refs compare by reference identity.
// ============================================================================

use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::core::value::Value;

// =============================================================================
// COMPARISON
// =============================================================================

/// Same-value-zero equality for dynamic values.
pub fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Unit, Value::Unit) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => float_eq(*x, *y),
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => {
            float_eq(*x as f64, *y)
        }
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Obj(x), Value::Obj(y)) => x == y,
        (Value::Ref(x), Value::Ref(y)) => x.same_ref(y),
        _ => false,
    }
}

/// Whether a write from `old` to `new` counts as a change.
pub fn has_changed(new: &Value, old: &Value) -> bool {
    !same_value_zero(new, old)
}

/// Float equality with NaN == NaN. `==` already collapses +0 and -0.
fn float_eq(a: f64, b: f64) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b
}

// =============================================================================
// HASHING
// =============================================================================

/// Hash consistent with `same_value_zero`: integral floats hash like ints,
/// every NaN hashes to one bucket, and ±0 collapse.
pub fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Unit => state.write_u8(0),
        Value::Bool(b) => {
            state.write_u8(1);
            b.hash(state);
        }
        Value::Int(i) => {
            state.write_u8(2);
            i.hash(state);
        }
        Value::Float(f) => hash_number(*f, state),
        Value::Str(s) => {
            state.write_u8(4);
            s.hash(state);
        }
        Value::Obj(o) => {
            state.write_u8(5);
            o.hash(state);
        }
        Value::Ref(r) => {
            state.write_u8(6);
            r.source_addr().hash(state);
        }
    }
}

fn hash_number<H: Hasher>(f: f64, state: &mut H) {
    // Integral floats must collide with the equal Int. -0.0 is integral and
    // casts to 0, which also collapses the zero signs.
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        state.write_u8(2);
        (f as i64).hash(state);
    } else if f.is_nan() {
        state.write_u8(3);
        state.write_u64(f64::NAN.to_bits());
    } else {
        state.write_u8(3);
        state.write_u64(f.to_bits());
    }
}

/// Pointer identity for `Rc` allocations, erased to a thin address.
pub(crate) fn rc_addr<T: ?Sized>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

// =============================================================================
// TESTS
// =============================================================================
