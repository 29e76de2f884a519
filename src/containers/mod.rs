// ============================================================================
// weft-reactive - Containers Module
// Observed records, lists, maps, and sets behind wrap-kind handles
// ============================================================================
//
// The accessor layer lives here: `reactive.rs` holds wrap-kind creation
// and the record/list handlers, `list.rs` the identity-sensitive and
// length-mutating list instrumentation, `keyed.rs` the map/set
// instrumentation.
// ============================================================================

mod keyed;
mod list;
pub mod reactive;

pub use reactive::{
    is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, proxy_refs, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, to_raw_value, to_reactive_value, to_readonly_value,
};
