// ============================================================================
// weft-reactive - Reactive Context
// Thread-local state for the currently running effect and tracking mode
// ============================================================================
//
// All global reactivity state lives in one thread-local struct: the active
// effect pointer, the effect-run depth plus its single-bit mask, and the
// should-track flag with its pause stack. Effects form the save/restore
// stack themselves through their `parent` links, so no separate stack of
// effects is kept here.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::constants::INITIAL_TRACK_BIT;
use crate::primitives::effect::EffectInner;
use crate::primitives::scope::ScopeInner;

// =============================================================================
// REACTIVE CONTEXT
// =============================================================================

/// Thread-local reactive context holding all global state for reactivity.
pub struct ReactiveContext {
    /// Currently executing effect, if any. Held strongly for the duration
    /// of the run; restored from the effect's `parent` link on exit.
    active_effect: RefCell<Option<Rc<EffectInner>>>,

    /// Currently active effect scope (for scope registration).
    active_scope: RefCell<Option<Rc<ScopeInner>>>,

    /// Effect-run recursion depth. Zero when no effect is running.
    track_depth: Cell<u32>,

    /// Single-bit mask for the current depth: `1 << track_depth`.
    track_op_bit: Cell<u32>,

    /// Whether reads are currently tracked as dependencies.
    should_track: Cell<bool>,

    /// Saved `should_track` values for pause/enable/reset.
    track_stack: RefCell<Vec<bool>>,
}

impl ReactiveContext {
    fn new() -> Self {
        Self {
            active_effect: RefCell::new(None),
            active_scope: RefCell::new(None),
            track_depth: Cell::new(0),
            track_op_bit: Cell::new(INITIAL_TRACK_BIT),
            should_track: Cell::new(true),
            track_stack: RefCell::new(Vec::new()),
        }
    }

    // =========================================================================
    // ACTIVE EFFECT
    // =========================================================================

    /// Replace the active effect, returning the previous one.
    pub fn set_active_effect(
        &self,
        effect: Option<Rc<EffectInner>>,
    ) -> Option<Rc<EffectInner>> {
        self.active_effect.replace(effect)
    }

    /// Get the active effect.
    pub fn active_effect(&self) -> Option<Rc<EffectInner>> {
        self.active_effect.borrow().clone()
    }

    /// Check if there is an active effect.
    pub fn has_active_effect(&self) -> bool {
        self.active_effect.borrow().is_some()
    }

    // =========================================================================
    // ACTIVE SCOPE
    // =========================================================================

    /// Replace the active scope, returning the previous one.
    pub fn set_active_scope(
        &self,
        scope: Option<Rc<ScopeInner>>,
    ) -> Option<Rc<ScopeInner>> {
        self.active_scope.replace(scope)
    }

    /// Get the active scope.
    pub fn active_scope(&self) -> Option<Rc<ScopeInner>> {
        self.active_scope.borrow().clone()
    }

    // =========================================================================
    // RUN DEPTH AND TRACK-OP BIT
    // =========================================================================

    /// Increment the run depth, updating the track-op bit. Returns the new
    /// depth. Past the marker cap the bit is meaningless (reconciliation
    /// falls back to full cleanup), so the shift saturates.
    pub fn enter_run(&self) -> u32 {
        let depth = self.track_depth.get() + 1;
        self.track_depth.set(depth);
        self.track_op_bit.set(1 << depth.min(31));
        depth
    }

    /// Decrement the run depth, updating the track-op bit.
    pub fn exit_run(&self) {
        let depth = self.track_depth.get().saturating_sub(1);
        self.track_depth.set(depth);
        self.track_op_bit.set(1 << depth.min(31));
    }

    /// Current run depth.
    pub fn track_depth(&self) -> u32 {
        self.track_depth.get()
    }

    /// Current single-bit depth mask.
    pub fn track_op_bit(&self) -> u32 {
        self.track_op_bit.get()
    }

    // =========================================================================
    // SHOULD-TRACK FLAG
    // =========================================================================

    /// Whether reads are tracked right now.
    pub fn should_track(&self) -> bool {
        self.should_track.get()
    }

    /// Set the should-track flag directly, returning the previous value.
    pub fn set_should_track(&self, value: bool) -> bool {
        self.should_track.replace(value)
    }

    /// Push the current should-track value and disable tracking.
    pub fn pause_tracking(&self) {
        self.track_stack.borrow_mut().push(self.should_track.get());
        self.should_track.set(false);
    }

    /// Push the current should-track value and enable tracking.
    pub fn enable_tracking(&self) {
        self.track_stack.borrow_mut().push(self.should_track.get());
        self.should_track.set(true);
    }

    /// Pop the last saved should-track value. Resets to `true` when the
    /// stack is empty (an unbalanced reset is misuse, not an error).
    pub fn reset_tracking(&self) {
        let last = self.track_stack.borrow_mut().pop();
        self.should_track.set(last.unwrap_or(true));
    }
}

// =============================================================================
// THREAD-LOCAL ACCESS
// =============================================================================

thread_local! {
    static CONTEXT: ReactiveContext = ReactiveContext::new();
}

/// Access the thread-local reactive context.
pub fn with_context<R>(f: impl FnOnce(&ReactiveContext) -> R) -> R {
    CONTEXT.with(f)
}

/// Check if reads are currently tracked: an effect is active and tracking
/// has not been paused.
pub fn is_tracking() -> bool {
    with_context(|ctx| ctx.should_track() && ctx.has_active_effect())
}

// =============================================================================
// TESTS
// =============================================================================
