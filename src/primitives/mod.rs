// ============================================================================
// weft-reactive - Primitives Module
// Effects, refs, computeds, and effect scopes
// ============================================================================

pub mod computed;
pub mod effect;
pub mod refs;
pub mod scope;

// Re-export the user-facing surface
pub use computed::{computed, computed_with_options, Computed, ComputedOptions};
pub use effect::{
    effect, effect_with_options, run_effect, stop, DebugHook, Effect, EffectOptions, SchedulerFn,
};
pub use refs::{custom_ref, is_ref, to_ref, to_refs, trigger_ref, unref, Ref, RefSource};
pub use scope::{effect_scope, get_current_scope, on_scope_dispose, EffectScope};
