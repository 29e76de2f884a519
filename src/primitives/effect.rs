// ============================================================================
// weft-reactive - Effect
// Side-effecting computations that re-run when their observed inputs change
// ============================================================================
//
// An effect owns a closure and the list of deps it subscribed to during its
// last run. Running an effect makes it the active effect: every observed
// read inside the closure wires a dep to it. Nested runs stack through the
// effects' own `parent` links rather than a separate stack.
//
// Re-tracking is incremental: before a run, every current dep is marked
// "was tracked" at this nesting level; reads mark "new tracked"; after the
// run a single compaction pass drops subscriptions that did not recur.
// Past the depth cap the marker words are exhausted and the effect falls
// back to full cleanup before the run.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::core::constants::MAX_MARKER_BITS;
use crate::core::context::with_context;
use crate::core::value::Value;
use crate::primitives::scope::{record_effect, EffectScope};
use crate::reactivity::dep::{finalize_dep_markers, init_dep_markers, Dep};
use crate::reactivity::tracking::DebugEvent;

// =============================================================================
// TYPE ALIASES
// =============================================================================

/// The runnable body of an effect. Computed getters reuse the same run
/// path, so the body yields a value; plain effects yield `Unit`.
pub type EffectFn = Box<dyn FnMut() -> Value>;

/// Called in place of `run` when a triggered effect has a scheduler.
pub type SchedulerFn = Rc<dyn Fn()>;

/// Debug hook for track/trigger events.
pub type DebugHook = Rc<dyn Fn(&DebugEvent)>;

// =============================================================================
// EFFECT INNER
// =============================================================================

pub struct EffectInner {
    /// The computation.
    func: RefCell<EffectFn>,

    /// Optional scheduler invoked instead of `run` on trigger.
    scheduler: Option<SchedulerFn>,

    /// Deps this effect currently subscribes to (strong side of the link).
    pub(crate) deps: RefCell<Vec<Rc<Dep>>>,

    /// The effect that was active when this one last began executing.
    /// Holds the save slot of the active-effect stack; cleared on exit.
    parent: RefCell<Option<Rc<EffectInner>>>,

    /// Effects created during this effect's current run; stopped before
    /// the next run so stale nested effects detach.
    children: RefCell<Vec<Rc<EffectInner>>>,

    active: Cell<bool>,
    defer_stop: Cell<bool>,
    allow_recurse: Cell<bool>,

    /// Set when a computed owns this effect; orders it ahead of plain
    /// effects during trigger.
    computed: Cell<bool>,

    on_stop: RefCell<Option<Box<dyn FnOnce()>>>,
    on_track: RefCell<Option<DebugHook>>,
    on_trigger: RefCell<Option<DebugHook>>,
}

impl EffectInner {
    pub(crate) fn new(func: EffectFn, scheduler: Option<SchedulerFn>) -> Rc<Self> {
        Rc::new(Self {
            func: RefCell::new(func),
            scheduler,
            deps: RefCell::new(Vec::new()),
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
            active: Cell::new(true),
            defer_stop: Cell::new(false),
            allow_recurse: Cell::new(false),
            computed: Cell::new(false),
            on_stop: RefCell::new(None),
            on_track: RefCell::new(None),
            on_trigger: RefCell::new(None),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn is_computed(&self) -> bool {
        self.computed.get()
    }

    pub(crate) fn set_computed(&self) {
        self.computed.set(true);
    }

    pub fn allows_recurse(&self) -> bool {
        self.allow_recurse.get()
    }

    pub(crate) fn set_allow_recurse(&self, value: bool) {
        self.allow_recurse.set(value);
    }

    pub(crate) fn scheduler(&self) -> Option<SchedulerFn> {
        self.scheduler.clone()
    }

    pub(crate) fn set_debug_hooks(&self, on_track: Option<DebugHook>, on_trigger: Option<DebugHook>) {
        *self.on_track.borrow_mut() = on_track;
        *self.on_trigger.borrow_mut() = on_trigger;
    }

    pub(crate) fn set_on_stop(&self, callback: Box<dyn FnOnce()>) {
        *self.on_stop.borrow_mut() = Some(callback);
    }

    pub(crate) fn parent(&self) -> Option<Rc<EffectInner>> {
        self.parent.borrow().clone()
    }

    fn add_child(&self, child: &Rc<EffectInner>) {
        self.children.borrow_mut().push(child.clone());
    }

    fn take_children(&self) -> Vec<Rc<EffectInner>> {
        std::mem::take(&mut *self.children.borrow_mut())
    }

    /// Invoke the on-track hook, if any. The hook is cloned out first so
    /// user code runs without an open borrow.
    pub(crate) fn notify_track(&self, event: &DebugEvent) {
        let hook = self.on_track.borrow().clone();
        if let Some(hook) = hook {
            hook(event);
        }
    }

    pub(crate) fn notify_trigger(&self, event: &DebugEvent) {
        let hook = self.on_trigger.borrow().clone();
        if let Some(hook) = hook {
            hook(event);
        }
    }
}

// =============================================================================
// RUN
// =============================================================================

/// Run an effect with dependency tracking.
///
/// A stopped effect just invokes its closure untracked. A running effect
/// found anywhere in the active parent chain returns immediately: an
/// effect that writes a dep it reads cannot re-enter itself.
pub fn run_effect(effect: &Rc<EffectInner>) -> Value {
    if !effect.active.get() {
        return (effect.func.borrow_mut())();
    }

    let mut cursor = with_context(|ctx| ctx.active_effect());
    while let Some(current) = cursor {
        if Rc::ptr_eq(&current, effect) {
            return Value::Unit;
        }
        cursor = current.parent();
    }

    // Nested effects from the previous run detach before this run
    // rebuilds them.
    for child in effect.take_children() {
        stop_inner(&child);
    }

    let prev_should_track = with_context(|ctx| {
        *effect.parent.borrow_mut() = ctx.set_active_effect(Some(effect.clone()));
        let prev = ctx.set_should_track(true);
        let depth = ctx.enter_run();
        if depth <= MAX_MARKER_BITS {
            init_dep_markers(effect);
        } else {
            cleanup_effect(effect);
        }
        prev
    });

    let _guard = RunGuard {
        effect: effect.clone(),
        prev_should_track,
    };

    // Bind before returning so the closure borrow ends ahead of the
    // guard's restoration work.
    let result = (effect.func.borrow_mut())();
    result
}

/// Restores the tracking stack on exit, including the unwind path: a panic
/// in user code must not leave a stale active effect or depth bit behind.
struct RunGuard {
    effect: Rc<EffectInner>,
    prev_should_track: bool,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        with_context(|ctx| {
            if ctx.track_depth() <= MAX_MARKER_BITS {
                finalize_dep_markers(&self.effect);
            }
            ctx.exit_run();
            let parent = self.effect.parent.borrow_mut().take();
            ctx.set_active_effect(parent);
            ctx.set_should_track(self.prev_should_track);
        });

        if self.effect.defer_stop.get() {
            stop_inner(&self.effect);
        }
    }
}

// =============================================================================
// STOP
// =============================================================================

/// Remove the effect from every dep it subscribes to and deactivate it.
/// Called on the effect's own run when self-stopped (deferred to run
/// exit).
pub(crate) fn stop_inner(effect: &Rc<EffectInner>) {
    if !effect.active.get() {
        return;
    }

    let is_running = with_context(|ctx| {
        ctx.active_effect()
            .is_some_and(|active| Rc::ptr_eq(&active, effect))
    });
    if is_running {
        effect.defer_stop.set(true);
        return;
    }

    for child in effect.take_children() {
        stop_inner(&child);
    }

    cleanup_effect(effect);

    if let Some(callback) = effect.on_stop.borrow_mut().take() {
        callback();
    }

    effect.active.set(false);
    effect.defer_stop.set(false);
}

/// Unsubscribe from every dep and clear the dep list (the depth-cap
/// fallback and the stop path).
pub(crate) fn cleanup_effect(effect: &Rc<EffectInner>) {
    let deps = std::mem::take(&mut *effect.deps.borrow_mut());
    for dep in deps {
        dep.remove_effect(effect);
    }
}

// =============================================================================
// PUBLIC WRAPPER
// =============================================================================

/// Handle to a created effect: re-run it manually or stop it.
///
/// Deps hold their effects weakly, so the handle (together with any
/// owning parent effect or scope) keeps the effect alive; dropping the
/// last handle stops it.
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Drop for Effect {
    fn drop(&mut self) {
        // Last strong reference: nothing can reach the effect any more,
        // so detach it from the graph.
        if Rc::strong_count(&self.inner) == 1 {
            stop_inner(&self.inner);
        }
    }
}

impl Effect {
    pub(crate) fn from_inner(inner: Rc<EffectInner>) -> Self {
        Self { inner }
    }

    /// Run the effect now, re-tracking its dependencies.
    pub fn run(&self) -> Value {
        run_effect(&self.inner)
    }

    /// Stop the effect: it unsubscribes from every dep and never re-runs.
    pub fn stop(&self) {
        stop_inner(&self.inner);
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }
}

/// Stop an effect (free-function form).
pub fn stop(runner: &Effect) {
    runner.stop();
}

// =============================================================================
// OPTIONS AND CREATION
// =============================================================================

#[derive(Default)]
pub struct EffectOptions {
    /// Skip the initial run; the caller drives the first run.
    pub lazy: bool,
    /// Invoked instead of `run` on trigger (batching/deferral hook).
    pub scheduler: Option<SchedulerFn>,
    /// Let the effect re-fire itself from its own writes.
    pub allow_recurse: bool,
    /// Register with this scope instead of the currently active one.
    pub scope: Option<EffectScope>,
    pub on_stop: Option<Box<dyn FnOnce()>>,
    pub on_track: Option<DebugHook>,
    pub on_trigger: Option<DebugHook>,
}

/// Create an effect that runs immediately and re-runs when any observed
/// value it read changes.
pub fn effect(f: impl FnMut() + 'static) -> Effect {
    effect_with_options(f, EffectOptions::default())
}

/// Create an effect with explicit options.
pub fn effect_with_options(mut f: impl FnMut() + 'static, options: EffectOptions) -> Effect {
    let inner = EffectInner::new(
        Box::new(move || {
            f();
            Value::Unit
        }),
        options.scheduler,
    );
    inner.set_allow_recurse(options.allow_recurse);
    if let Some(callback) = options.on_stop {
        inner.set_on_stop(callback);
    }
    inner.set_debug_hooks(options.on_track, options.on_trigger);

    // An effect created while another runs becomes its child and detaches
    // when the parent re-runs.
    if let Some(active) = with_context(|ctx| ctx.active_effect()) {
        active.add_child(&inner);
    }
    record_effect(&inner, options.scope.as_ref());

    let runner = Effect::from_inner(inner);
    if !options.lazy {
        runner.run();
    }
    runner
}

// =============================================================================
// TESTS
// =============================================================================
