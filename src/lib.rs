// ============================================================================
// weft-reactive - A Fine-Grained Reactivity Core for Rust
// ============================================================================
//
// The engine of a dependency-tracking system: observed reads record which
// computation depended on which value, observed writes re-run exactly
// those computations. Four abstractions compose:
//
// - Reactive containers: records, lists, maps, and sets whose accessors
//   are observed (`reactive`, `readonly`, and their shallow variants)
// - Refs: single-cell observable boxes (`Ref`, `custom_ref`, `to_ref`)
// - Effects: side-effecting computations that re-run on change (`effect`)
// - Computeds: lazy cached derivations whose output is itself a ref
//   (`computed`)
//
// The model is single-threaded and cooperative: all graph state lives in
// a thread-local context, and triggers run their subscribers
// synchronously.
// ============================================================================

pub mod containers;
pub mod core;
pub mod primitives;
pub mod reactivity;

// Re-export the value model at the crate root
pub use crate::core::value::{Obj, ObjKind, Value, WrapKind};

// Re-export container creation and predicates
pub use containers::{
    is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, proxy_refs, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, to_raw_value, to_reactive_value, to_readonly_value,
};

// Re-export refs
pub use primitives::refs::{custom_ref, is_ref, to_ref, to_refs, trigger_ref, unref, Ref};

// Re-export computeds
pub use primitives::computed::{computed, computed_with_options, Computed, ComputedOptions};

// Re-export effects and scopes
pub use primitives::effect::{
    effect, effect_with_options, stop, DebugHook, Effect, EffectOptions, SchedulerFn,
};
pub use primitives::scope::{effect_scope, get_current_scope, on_scope_dispose, EffectScope};

// Re-export tracking control
pub use reactivity::tracking::{
    enable_tracking, pause_tracking, reset_tracking, untrack, DebugEvent, Key, TrackOp, TriggerOp,
};
