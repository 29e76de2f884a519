// ============================================================================
// weft-reactive - Effect Scope
// Group effects for batch disposal
// ============================================================================
//
// A scope collects every effect created while it is active, so a whole
// subtree of computations can be torn down with one stop() call. Scopes
// nest: a child scope created inside run() stops with its parent unless
// detached.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::core::context::with_context;
use crate::core::warning::dev_warn;
use crate::primitives::effect::{stop_inner, EffectInner};

// =============================================================================
// SCOPE INNER
// =============================================================================

/// Cleanup callback registered via `on_scope_dispose`.
pub type ScopeCleanupFn = Box<dyn FnOnce()>;

pub struct ScopeInner {
    active: Cell<bool>,

    /// Effects created while this scope was active.
    effects: RefCell<Vec<Rc<EffectInner>>>,

    /// Cleanup callbacks, run in reverse order on stop.
    cleanups: RefCell<Vec<ScopeCleanupFn>>,

    /// Child scopes, stopped with this one.
    scopes: RefCell<Vec<Rc<ScopeInner>>>,

    /// Parent scope for de-registration on stop.
    parent: RefCell<Option<Weak<ScopeInner>>>,

    self_weak: RefCell<Weak<ScopeInner>>,
}

impl ScopeInner {
    fn new(detached: bool) -> Rc<Self> {
        let parent = if detached {
            None
        } else {
            with_context(|ctx| ctx.active_scope())
        };

        let scope = Rc::new(Self {
            active: Cell::new(true),
            effects: RefCell::new(Vec::new()),
            cleanups: RefCell::new(Vec::new()),
            scopes: RefCell::new(Vec::new()),
            parent: RefCell::new(parent.as_ref().map(Rc::downgrade)),
            self_weak: RefCell::new(Weak::new()),
        });
        *scope.self_weak.borrow_mut() = Rc::downgrade(&scope);

        if let Some(parent_scope) = parent {
            parent_scope.scopes.borrow_mut().push(scope.clone());
        }

        scope
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn add_effect(&self, effect: Rc<EffectInner>) {
        self.effects.borrow_mut().push(effect);
    }

    fn add_cleanup(&self, cleanup: ScopeCleanupFn) {
        self.cleanups.borrow_mut().push(cleanup);
    }

    fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.active.get() {
            dev_warn!("cannot run on an inactive effect scope");
            return None;
        }
        let self_rc = self.self_weak.borrow().upgrade()?;

        struct ScopeGuard {
            prev: Option<Rc<ScopeInner>>,
        }
        impl Drop for ScopeGuard {
            fn drop(&mut self) {
                let prev = self.prev.take();
                with_context(|ctx| ctx.set_active_scope(prev));
            }
        }

        let prev = with_context(|ctx| ctx.set_active_scope(Some(self_rc)));
        let _guard = ScopeGuard { prev };
        Some(f())
    }

    fn stop(&self) {
        if !self.active.replace(false) {
            return;
        }

        let effects: Vec<_> = self.effects.borrow_mut().drain(..).collect();
        for effect in effects {
            stop_inner(&effect);
        }

        let cleanups: Vec<_> = self.cleanups.borrow_mut().drain(..).collect();
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }

        let children: Vec<_> = self.scopes.borrow_mut().drain(..).collect();
        for child in children {
            child.stop();
        }

        // De-register from the parent so the parent's list stays tight.
        if let Some(parent) = self.parent.borrow().as_ref().and_then(Weak::upgrade) {
            if let Some(self_rc) = self.self_weak.borrow().upgrade() {
                parent
                    .scopes
                    .borrow_mut()
                    .retain(|s| !Rc::ptr_eq(s, &self_rc));
            }
        }
    }
}

// =============================================================================
// PUBLIC WRAPPER
// =============================================================================

/// Groups effects for collective disposal.
#[derive(Clone)]
pub struct EffectScope {
    inner: Rc<ScopeInner>,
}

impl Drop for EffectScope {
    fn drop(&mut self) {
        // Only this handle is left (a parent scope would hold another
        // strong reference): tear the scope down.
        if Rc::strong_count(&self.inner) == 1 {
            self.inner.stop();
        }
    }
}

impl EffectScope {
    fn from_inner(inner: Rc<ScopeInner>) -> Self {
        Self { inner }
    }

    pub fn active(&self) -> bool {
        self.inner.is_active()
    }

    /// Run a closure with this scope active; effects created inside are
    /// collected. Returns `None` if the scope was already stopped.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        self.inner.run(f)
    }

    /// Stop every collected effect, run cleanups in reverse order, and
    /// stop child scopes.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub(crate) fn inner(&self) -> &Rc<ScopeInner> {
        &self.inner
    }
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Create an effect scope. A detached scope is not collected (or stopped)
/// by its parent.
pub fn effect_scope(detached: bool) -> EffectScope {
    EffectScope::from_inner(ScopeInner::new(detached))
}

/// The currently active scope, if inside a `run` call.
pub fn get_current_scope() -> Option<EffectScope> {
    with_context(|ctx| ctx.active_scope()).map(EffectScope::from_inner)
}

/// Register a cleanup on the current scope; warns and does nothing when no
/// scope is active.
pub fn on_scope_dispose(f: impl FnOnce() + 'static) {
    match with_context(|ctx| ctx.active_scope()) {
        Some(scope) => scope.add_cleanup(Box::new(f)),
        None => {
            dev_warn!("on_scope_dispose() called outside of an active effect scope");
        }
    }
}

/// Attach a freshly created effect to the explicit scope, or the active
/// one. Called from effect creation.
pub(crate) fn record_effect(effect: &Rc<EffectInner>, explicit: Option<&EffectScope>) {
    match explicit {
        Some(scope) => scope.inner().add_effect(effect.clone()),
        None => {
            if let Some(scope) = with_context(|ctx| ctx.active_scope()) {
                scope.add_effect(effect.clone());
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn run_returns_value_and_restores_scope() {
        let scope = effect_scope(false);
        assert!(get_current_scope().is_none());

        let result = scope.run(|| {
            assert!(get_current_scope().is_some());
            42
        });

        assert_eq!(result, Some(42));
        assert!(get_current_scope().is_none());
    }

    #[test]
    fn stopped_scope_run_returns_none() {
        let scope = effect_scope(false);
        scope.stop();
        assert_eq!(scope.run(|| 1), None);
        assert!(!scope.active());
    }

    #[test]
    fn cleanups_run_in_reverse_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let (o1, o2, o3) = (order.clone(), order.clone(), order.clone());

        let scope = effect_scope(false);
        scope.run(|| {
            on_scope_dispose(move || o1.borrow_mut().push(1));
            on_scope_dispose(move || o2.borrow_mut().push(2));
            on_scope_dispose(move || o3.borrow_mut().push(3));
        });
        scope.stop();

        assert_eq!(*order.borrow(), vec![3, 2, 1]);
    }

    #[test]
    fn nested_scope_stops_with_parent() {
        let inner_cleanup = Rc::new(Cell::new(false));
        let inner_clone = inner_cleanup.clone();

        let outer = effect_scope(false);
        outer.run(|| {
            let inner = effect_scope(false);
            inner.run(|| {
                on_scope_dispose(move || inner_clone.set(true));
            });
        });

        outer.stop();
        assert!(inner_cleanup.get());
    }

    #[test]
    fn detached_scope_survives_parent_stop() {
        let cleanup = Rc::new(Cell::new(false));
        let cleanup_clone = cleanup.clone();

        let parent = effect_scope(false);
        let detached = parent
            .run(|| {
                let detached = effect_scope(true);
                detached.run(|| {
                    on_scope_dispose(move || cleanup_clone.set(true));
                });
                detached
            })
            .unwrap();

        parent.stop();
        assert!(!cleanup.get());
        assert!(detached.active());

        detached.stop();
        assert!(cleanup.get());
    }

    #[test]
    fn double_stop_is_idempotent() {
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();

        let scope = effect_scope(false);
        scope.run(|| {
            on_scope_dispose(move || runs_clone.set(runs_clone.get() + 1));
        });

        scope.stop();
        scope.stop();
        assert_eq!(runs.get(), 1);
    }
}
