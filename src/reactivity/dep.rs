// ============================================================================
// weft-reactive - Dep
// The subscriber set for one observable slot, plus re-tracking marker bits
// ============================================================================
//
// A dep exists per observable slot: one per (target, key) pair in the
// registry, one inline per ref, one inline per computed. Effects hold
// their deps strongly; deps hold their effects weakly, so neither side
// owns the other's lifetime. Dead weak entries are pruned on the next
// trigger pass.
//
// The `was`/`new` cells carry one marker bit per effect-run nesting level
// (the track-op bit). Outside a tracking pass both are zero.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::core::constants::MAX_MARKER_BITS;
use crate::core::context::with_context;
use crate::primitives::effect::EffectInner;
use crate::reactivity::equality::rc_addr;

// =============================================================================
// DEP
// =============================================================================

pub struct Dep {
    /// Subscribed effects, weakly held.
    subs: RefCell<Vec<Weak<EffectInner>>>,

    /// Marker bits: slot was tracked in the previous run at this level.
    was: Cell<u32>,

    /// Marker bits: slot has been tracked in the current run at this level.
    new: Cell<u32>,
}

impl Dep {
    pub fn new() -> Rc<Dep> {
        Rc::new(Dep {
            subs: RefCell::new(Vec::new()),
            was: Cell::new(0),
            new: Cell::new(0),
        })
    }

    pub fn was_tracked(&self, bit: u32) -> bool {
        self.was.get() & bit != 0
    }

    pub fn new_tracked(&self, bit: u32) -> bool {
        self.new.get() & bit != 0
    }

    pub fn mark_was(&self, bit: u32) {
        self.was.set(self.was.get() | bit);
    }

    pub fn mark_new(&self, bit: u32) {
        self.new.set(self.new.get() | bit);
    }

    /// Clear both marker bits for one nesting level.
    pub fn clear_markers(&self, bit: u32) {
        self.was.set(self.was.get() & !bit);
        self.new.set(self.new.get() & !bit);
    }

    /// Subscribe an effect.
    pub fn add_effect(&self, effect: &Rc<EffectInner>) {
        self.subs.borrow_mut().push(Rc::downgrade(effect));
    }

    /// Unsubscribe an effect by pointer identity, dropping dead entries on
    /// the way.
    pub fn remove_effect(&self, effect: &Rc<EffectInner>) {
        let target = rc_addr(effect);
        self.subs.borrow_mut().retain(|weak| match weak.upgrade() {
            Some(rc) => rc_addr(&rc) != target,
            None => false,
        });
    }

    /// Membership test by pointer identity (the depth-cap fallback path).
    pub fn contains(&self, effect: &Rc<EffectInner>) -> bool {
        let target = rc_addr(effect);
        self.subs
            .borrow()
            .iter()
            .any(|weak| weak.upgrade().is_some_and(|rc| rc_addr(&rc) == target))
    }

    /// Collect live subscribers into a fresh list, pruning dead entries.
    /// Iterating the snapshot keeps firing stable against membership
    /// changes made by the effects themselves.
    pub fn subscribers(&self) -> Vec<Rc<EffectInner>> {
        let mut subs = self.subs.borrow_mut();
        subs.retain(|weak| weak.strong_count() > 0);
        subs.iter().filter_map(Weak::upgrade).collect()
    }

    #[cfg(test)]
    pub(crate) fn marker_state(&self) -> (u32, u32) {
        (self.was.get(), self.new.get())
    }
}

// =============================================================================
// MARKER PASSES
// =============================================================================

/// Before an effect runs: mark every currently-subscribed dep as "was
/// tracked" at this nesting level.
pub fn init_dep_markers(effect: &Rc<EffectInner>) {
    let bit = with_context(|ctx| ctx.track_op_bit());
    for dep in effect.deps.borrow().iter() {
        dep.mark_was(bit);
    }
}

/// After an effect runs: drop deps that were tracked last time but not
/// this time, compact the rest forward, and clear this level's marker
/// bits. O(deps) scan, O(changed) subscription mutations.
pub fn finalize_dep_markers(effect: &Rc<EffectInner>) {
    let bit = with_context(|ctx| ctx.track_op_bit());
    let mut deps = effect.deps.borrow_mut();
    let mut kept = 0;
    for i in 0..deps.len() {
        let dep = deps[i].clone();
        if dep.was_tracked(bit) && !dep.new_tracked(bit) {
            dep.remove_effect(effect);
        } else {
            deps.swap(kept, i);
            kept += 1;
        }
        dep.clear_markers(bit);
    }
    deps.truncate(kept);
}

/// Whether the current nesting level still fits the marker words.
pub fn markers_usable() -> bool {
    with_context(|ctx| ctx.track_depth() <= MAX_MARKER_BITS)
}

// =============================================================================
// TESTS
// =============================================================================
