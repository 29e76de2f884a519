// ============================================================================
// weft-reactive - Dependency Tracking
// The registry of deps per (target, key) and the track/trigger entry points
// ============================================================================
//
// Every observed read lands in `track`, every observed write in `trigger`.
// The registry maps a target's address to its per-key deps; targets evict
// their entry on drop, so the map cannot outgrow the live containers.
//
// Borrow discipline: dep subscriber lists are snapshotted before firing
// (collect-then-mutate), because running an effect mutates the very lists
// being iterated.
// ============================================================================

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use fxhash::{FxHashMap, FxHashSet};

use crate::core::context::{is_tracking, with_context};
use crate::core::value::{ObjData, ObjKind, Value};
use crate::primitives::effect::{run_effect, EffectInner};
use crate::reactivity::dep::{markers_usable, Dep};
use crate::reactivity::equality::rc_addr;

// =============================================================================
// KEYS AND OPERATION KINDS
// =============================================================================

/// Registry key for one observable slot of a target.
///
/// `Iterate` and `MapKeyIterate` are synthetic keys standing for "any key":
/// enumeration subscribes to them, and structural writes fire them.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Index(usize),
    Length,
    Val(Value),
    Iterate,
    MapKeyIterate,
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => write!(f, "{s:?}"),
            Key::Index(i) => write!(f, "[{i}]"),
            Key::Length => write!(f, "length"),
            Key::Val(v) => write!(f, "{v:?}"),
            Key::Iterate => write!(f, "<iterate>"),
            Key::MapKeyIterate => write!(f, "<map-key-iterate>"),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(Rc::from(s))
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

/// Kind of observed read, reported to debug hooks.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// Kind of observed write.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TriggerOp {
    Set,
    Add,
    Delete,
    Clear,
}

/// Payload handed to `on_track`/`on_trigger` debug hooks.
#[derive(Clone, Debug)]
pub enum DebugEvent {
    Track { op: TrackOp, key: Option<Key> },
    Trigger { op: TriggerOp, key: Option<Key> },
}

// =============================================================================
// REGISTRY
// =============================================================================

thread_local! {
    /// target address -> key -> dep
    static TARGET_MAP: RefCell<FxHashMap<usize, FxHashMap<Key, Rc<Dep>>>> =
        RefCell::new(FxHashMap::default());
}

/// Drop a target's dep map. Called from `ObjData::drop`; the thread-local
/// may already be gone during thread teardown.
pub(crate) fn evict_target(target_id: usize) {
    let _ = TARGET_MAP.try_with(|m| {
        m.borrow_mut().remove(&target_id);
    });
}

fn dep_for(target_id: usize, key: Key) -> Rc<Dep> {
    TARGET_MAP.with(|m| {
        m.borrow_mut()
            .entry(target_id)
            .or_default()
            .entry(key)
            .or_insert_with(Dep::new)
            .clone()
    })
}

fn existing_dep(target_id: usize, key: &Key) -> Option<Rc<Dep>> {
    TARGET_MAP.with(|m| m.borrow().get(&target_id)?.get(key).cloned())
}

// =============================================================================
// TRACK
// =============================================================================

/// Record that the active effect read `key` of `target`. No-op when
/// tracking is paused or no effect is running.
pub fn track(target: &Rc<ObjData>, op: TrackOp, key: Key) {
    if !is_tracking() {
        return;
    }
    let dep = dep_for(Rc::as_ptr(target) as usize, key.clone());
    track_effects(
        &dep,
        DebugEvent::Track {
            op,
            key: Some(key),
        },
    );
}

/// Subscribe the active effect to a dep, using the marker-bit protocol to
/// skip subscriptions that already exist from the previous run. The
/// depth-cap fallback degrades to a membership scan.
pub(crate) fn track_effects(dep: &Rc<Dep>, event: DebugEvent) {
    let tracked = with_context(|ctx| {
        if !ctx.should_track() {
            return None;
        }
        let effect = ctx.active_effect()?;

        let should_track = if markers_usable() {
            let bit = ctx.track_op_bit();
            if !dep.new_tracked(bit) {
                dep.mark_new(bit);
                !dep.was_tracked(bit)
            } else {
                false
            }
        } else {
            !dep.contains(&effect)
        };

        if should_track {
            dep.add_effect(&effect);
            effect.deps.borrow_mut().push(dep.clone());
            Some(effect)
        } else {
            None
        }
    });

    if let Some(effect) = tracked {
        effect.notify_track(&event);
    }
}

// =============================================================================
// TRIGGER
// =============================================================================

/// Re-run the subscribers affected by a write to `key` of `target`.
///
/// `new_len` carries the new length for list length writes, which also
/// fire every index dep at or beyond the new length.
pub fn trigger(target: &Rc<ObjData>, op: TriggerOp, key: Option<Key>, new_len: Option<usize>) {
    let target_id = Rc::as_ptr(target) as usize;
    let is_list = target.storage.borrow().kind() == ObjKind::List;
    let is_map = target.storage.borrow().kind() == ObjKind::Map;

    let mut deps: Vec<Rc<Dep>> = Vec::new();

    let present = TARGET_MAP.with(|m| m.borrow().contains_key(&target_id));
    if !present {
        return;
    }

    if op == TriggerOp::Clear {
        // Whole collection cleared: every slot is affected.
        TARGET_MAP.with(|m| {
            if let Some(map) = m.borrow().get(&target_id) {
                deps.extend(map.values().cloned());
            }
        });
    } else if is_list && key == Some(Key::Length) {
        // Length shrink: length observers plus every index at or past the
        // new length.
        deps = collect_list_resize(target_id, new_len.unwrap_or(0), true);
    } else {
        if let Some(k) = &key {
            if let Some(dep) = existing_dep(target_id, k) {
                deps.push(dep);
            }
        }
        match op {
            TriggerOp::Add => {
                if !is_list {
                    push_existing(&mut deps, target_id, &Key::Iterate);
                    if is_map {
                        push_existing(&mut deps, target_id, &Key::MapKeyIterate);
                    }
                } else if matches!(key, Some(Key::Index(_))) {
                    push_existing(&mut deps, target_id, &Key::Length);
                }
            }
            TriggerOp::Delete => {
                if !is_list {
                    push_existing(&mut deps, target_id, &Key::Iterate);
                    if is_map {
                        push_existing(&mut deps, target_id, &Key::MapKeyIterate);
                    }
                }
            }
            TriggerOp::Set => {
                // The map-key iteration dep deliberately stays quiet on
                // SET: the key set did not change.
                if is_map {
                    push_existing(&mut deps, target_id, &Key::Iterate);
                }
            }
            TriggerOp::Clear => unreachable!(),
        }
    }

    trigger_deps(deps, DebugEvent::Trigger { op, key });
}

fn push_existing(deps: &mut Vec<Rc<Dep>>, target_id: usize, key: &Key) {
    if let Some(dep) = existing_dep(target_id, key) {
        deps.push(dep);
    }
}

fn collect_list_resize(target_id: usize, min_index: usize, include_length: bool) -> Vec<Rc<Dep>> {
    let mut deps = Vec::new();
    TARGET_MAP.with(|m| {
        if let Some(map) = m.borrow().get(&target_id) {
            for (k, dep) in map.iter() {
                match k {
                    Key::Length if include_length => deps.push(dep.clone()),
                    Key::Index(i) if *i >= min_index => deps.push(dep.clone()),
                    _ => {}
                }
            }
        }
    });
    deps
}

/// Fire a list's structural observers in one pass: every index dep at or
/// past `min_index`, plus the length dep when the length changed. One
/// merged firing keeps an effect that watches several affected slots from
/// re-running once per slot.
pub(crate) fn trigger_list_resize(target: &Rc<ObjData>, min_index: usize, include_length: bool) {
    let target_id = Rc::as_ptr(target) as usize;
    let deps = collect_list_resize(target_id, min_index, include_length);
    trigger_deps(
        deps,
        DebugEvent::Trigger {
            op: TriggerOp::Set,
            key: Some(Key::Length),
        },
    );
}

/// Fire the subscribers of a single dep (refs and computeds).
pub(crate) fn trigger_effects(dep: &Rc<Dep>, event: DebugEvent) {
    run_subscribers(dep.subscribers(), event);
}

/// Fire the merged subscribers of several deps. A single dep iterates its
/// own snapshot; several are flattened into a fresh de-duplicated list so
/// concurrent membership changes cannot skip or double-fire an effect.
fn trigger_deps(deps: Vec<Rc<Dep>>, event: DebugEvent) {
    match deps.len() {
        0 => {}
        1 => run_subscribers(deps[0].subscribers(), event),
        _ => {
            let mut seen = FxHashSet::default();
            let mut effects = Vec::new();
            for dep in &deps {
                for effect in dep.subscribers() {
                    if seen.insert(rc_addr(&effect)) {
                        effects.push(effect);
                    }
                }
            }
            run_subscribers(effects, event);
        }
    }
}

/// Computed-owning effects fire before plain effects, so invalidation
/// reaches a computed before any plain effect re-reads it.
fn run_subscribers(effects: Vec<Rc<EffectInner>>, event: DebugEvent) {
    for effect in effects.iter().filter(|e| e.is_computed()) {
        fire(effect, &event);
    }
    for effect in effects.iter().filter(|e| !e.is_computed()) {
        fire(effect, &event);
    }
}

fn fire(effect: &Rc<EffectInner>, event: &DebugEvent) {
    if !effect.is_active() {
        return;
    }
    // The running effect never re-fires itself unless it asked to.
    let is_self = with_context(|ctx| {
        ctx.active_effect()
            .is_some_and(|active| Rc::ptr_eq(&active, effect))
    });
    if is_self && !effect.allows_recurse() {
        return;
    }

    effect.notify_trigger(event);

    if let Some(scheduler) = effect.scheduler() {
        scheduler();
    } else {
        run_effect(effect);
    }
}

// =============================================================================
// PAUSE / RESUME
// =============================================================================

/// Disable dependency tracking until the matching `reset_tracking`.
pub fn pause_tracking() {
    with_context(|ctx| ctx.pause_tracking());
}

/// Enable dependency tracking until the matching `reset_tracking`.
pub fn enable_tracking() {
    with_context(|ctx| ctx.enable_tracking());
}

/// Pop the last pause/enable frame.
pub fn reset_tracking() {
    with_context(|ctx| ctx.reset_tracking());
}

/// Run a closure with tracking paused. The guard restores the previous
/// mode even if the closure panics.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    struct UntrackGuard;

    impl Drop for UntrackGuard {
        fn drop(&mut self) {
            reset_tracking();
        }
    }

    pause_tracking();
    let _guard = UntrackGuard;
    f()
}

#[cfg(test)]
pub(crate) fn registry_dep(target: &Rc<ObjData>, key: &Key) -> Option<Rc<Dep>> {
    existing_dep(Rc::as_ptr(target) as usize, key)
}

// =============================================================================
// TESTS
// =============================================================================
