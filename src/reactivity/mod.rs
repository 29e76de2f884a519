// ============================================================================
// weft-reactive - Reactivity Module
// Deps, the tracking registry, and write propagation
// ============================================================================

pub mod dep;
pub mod equality;
pub mod tracking;

// Re-export main tracking entry points
pub use dep::Dep;
pub use equality::{has_changed, same_value_zero};
pub use tracking::{
    enable_tracking, pause_tracking, reset_tracking, track, trigger, untrack, DebugEvent, Key,
    TrackOp, TriggerOp,
};
