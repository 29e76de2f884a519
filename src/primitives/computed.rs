// ============================================================================
// weft-reactive - Computed
// Lazy cached derivations built on an effect plus an output ref
// ============================================================================
//
// A computed owns an effect whose body is the user getter. The effect
// never auto-re-runs: its scheduler only flips the dirty flag and fires
// the computed's output dep, so invalidation propagates eagerly while
// recomputation stays lazy. Because the scheduler runs during trigger and
// computed-owning effects fire first, a plain effect reading the computed
// in the same trigger always observes the freshly-dirtied state.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::core::value::Value;
use crate::core::warning::dev_warn;
use crate::primitives::effect::{run_effect, DebugHook, EffectInner, SchedulerFn};
use crate::primitives::refs::{track_ref_dep, trigger_ref_dep, Ref, RefSource};
use crate::reactivity::dep::Dep;

// =============================================================================
// COMPUTED INNER
// =============================================================================

pub struct ComputedInner {
    /// Cached getter result; meaningless while dirty.
    value: RefCell<Value>,

    /// Set on construction and whenever an underlying dep triggers;
    /// cleared by the next read.
    dirty: Cell<bool>,

    /// False disables memoization (server-side rendering mode).
    cacheable: bool,

    /// Output dep: effects reading this computed subscribe here.
    dep: Rc<Dep>,

    /// The owned effect; its body is the user getter.
    effect: Rc<EffectInner>,

    setter: Option<Box<dyn Fn(Value)>>,
}

impl RefSource for ComputedInner {
    fn get(&self) -> Value {
        track_ref_dep(&self.dep);

        let was_dirty = self.dirty.replace(false);
        if was_dirty || !self.cacheable {
            let result = run_effect(&self.effect);
            *self.value.borrow_mut() = result;
        }
        self.value.borrow().clone()
    }

    fn set(&self, value: Value) {
        match &self.setter {
            Some(setter) => setter(value),
            None => {
                dev_warn!("write to a computed without a setter was ignored");
            }
        }
    }

    fn dep(&self) -> Option<Rc<Dep>> {
        Some(self.dep.clone())
    }

    fn is_readonly(&self) -> bool {
        self.setter.is_none()
    }
}

// =============================================================================
// PUBLIC WRAPPER
// =============================================================================

/// A cached, lazy derivation whose result is itself observable.
#[derive(Clone)]
pub struct Computed {
    inner: Rc<ComputedInner>,
}

impl Computed {
    /// Read the computed value, recomputing if an underlying dep changed
    /// since the last read. Subscribes the active effect to the output.
    pub fn get(&self) -> Value {
        self.inner.get()
    }

    /// Delegate to the user setter; warns when there is none.
    pub fn set(&self, value: Value) {
        self.inner.set(value);
    }

    /// View this computed as a ref (it is one: same cell, same dep).
    pub fn as_ref_handle(&self) -> Ref {
        Ref::from_source(self.inner.clone())
    }

    #[cfg(test)]
    pub(crate) fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }
}

// =============================================================================
// OPTIONS AND CREATION
// =============================================================================

pub struct ComputedOptions {
    /// Makes the computed writable.
    pub setter: Option<Box<dyn Fn(Value)>>,
    /// Disable memoization (every read re-runs the getter).
    pub cacheable: bool,
    pub on_track: Option<DebugHook>,
    pub on_trigger: Option<DebugHook>,
}

impl Default for ComputedOptions {
    fn default() -> Self {
        Self {
            setter: None,
            cacheable: true,
            on_track: None,
            on_trigger: None,
        }
    }
}

/// Create a lazy computed from a getter. The getter does not run until the
/// first read.
pub fn computed(getter: impl Fn() -> Value + 'static) -> Computed {
    computed_with_options(getter, ComputedOptions::default())
}

/// Create a computed with a setter, SSR mode, or debug hooks.
pub fn computed_with_options(
    getter: impl Fn() -> Value + 'static,
    options: ComputedOptions,
) -> Computed {
    let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner>| {
        // The scheduler replaces auto-re-run: first invalidation flips the
        // dirty flag and fires the output dep; repeats are absorbed.
        let scheduler: SchedulerFn = {
            let weak = weak.clone();
            Rc::new(move || {
                if let Some(this) = weak.upgrade() {
                    if !this.dirty.replace(true) {
                        trigger_ref_dep(&this.dep);
                    }
                }
            })
        };

        let effect = EffectInner::new(Box::new(move || getter()), Some(scheduler));
        effect.set_computed();
        effect.set_debug_hooks(options.on_track, options.on_trigger);

        ComputedInner {
            value: RefCell::new(Value::Unit),
            dirty: Cell::new(true),
            cacheable: options.cacheable,
            dep: Dep::new(),
            effect,
            setter: options.setter,
        }
    });

    Computed { inner }
}

// =============================================================================
// TESTS
// =============================================================================
