// ============================================================================
// weft-reactive - Value Model
// Dynamic values and the containers the reactivity layer observes
// ============================================================================
//
// Rust has no transparent proxy, so observation goes through explicit
// accessors on a container handle. The handle is a cheap (Rc, wrap-kind)
// pair: the same underlying allocation viewed through different wrap kinds
// yields distinct proxy identities, while two handles with the same
// allocation and kind are the same proxy. Deep wrapping is therefore O(1):
// "wrapping" a nested container is just re-tagging its handle.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::primitives::refs::Ref;
use crate::reactivity::equality::{hash_value, same_value_zero};

// =============================================================================
// WRAP KINDS
// =============================================================================

/// How a container handle observes its target.
///
/// `Raw` handles bypass the reactivity layer entirely. `RefUnwrap` backs
/// `proxy_refs`: it unwraps ref-valued entries on read and delegates
/// writes to them, without tracking the container itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum WrapKind {
    Raw,
    Reactive,
    ShallowReactive,
    Readonly,
    ShallowReadonly,
    RefUnwrap,
}

impl WrapKind {
    /// Reads through this kind register dependencies.
    pub fn tracks(self) -> bool {
        matches!(self, WrapKind::Reactive | WrapKind::ShallowReactive)
    }

    /// Writes through this kind are rejected.
    pub fn is_readonly(self) -> bool {
        matches!(self, WrapKind::Readonly | WrapKind::ShallowReadonly)
    }

    /// Nested containers are not wrapped and refs are not unwrapped.
    pub fn is_shallow(self) -> bool {
        matches!(self, WrapKind::ShallowReactive | WrapKind::ShallowReadonly)
    }
}

// =============================================================================
// STORAGE
// =============================================================================

/// The kind of container, independent of wrap kind.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ObjKind {
    Record,
    List,
    Map,
    Set,
}

impl ObjKind {
    pub fn name(self) -> &'static str {
        match self {
            ObjKind::Record => "record",
            ObjKind::List => "list",
            ObjKind::Map => "map",
            ObjKind::Set => "set",
        }
    }
}

/// Backing storage for a container. Records and maps keep insertion order,
/// matching enumeration expectations of the observed object model.
pub enum Storage {
    Record(IndexMap<Rc<str>, Value>),
    List(Vec<Value>),
    Map(IndexMap<Value, Value>),
    Set(IndexSet<Value>),
}

impl Storage {
    pub fn kind(&self) -> ObjKind {
        match self {
            Storage::Record(_) => ObjKind::Record,
            Storage::List(_) => ObjKind::List,
            Storage::Map(_) => ObjKind::Map,
            Storage::Set(_) => ObjKind::Set,
        }
    }
}

/// The shared allocation behind every handle to one container.
pub struct ObjData {
    pub(crate) storage: RefCell<Storage>,
    /// Marked by `mark_raw`: this container never becomes reactive.
    pub(crate) skip: Cell<bool>,
}

impl Drop for ObjData {
    fn drop(&mut self) {
        // The registry keys targets by address; dropping the target evicts
        // its dep map so dead targets do not leak registry entries.
        crate::reactivity::tracking::evict_target(self as *const ObjData as usize);
    }
}

// =============================================================================
// OBJ HANDLE
// =============================================================================

/// A handle to a container: the allocation plus the wrap kind it is viewed
/// through. Cloning a handle never clones the data.
#[derive(Clone)]
pub struct Obj {
    pub(crate) data: Rc<ObjData>,
    pub(crate) kind: WrapKind,
}

impl Obj {
    fn from_storage(storage: Storage) -> Self {
        Self {
            data: Rc::new(ObjData {
                storage: RefCell::new(storage),
                skip: Cell::new(false),
            }),
            kind: WrapKind::Raw,
        }
    }

    /// Create an empty raw record.
    pub fn record() -> Self {
        Self::from_storage(Storage::Record(IndexMap::new()))
    }

    /// Create a raw record from key/value pairs.
    pub fn record_from<K: Into<Rc<str>>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        let map = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect::<IndexMap<_, _>>();
        Self::from_storage(Storage::Record(map))
    }

    /// Create an empty raw list.
    pub fn list() -> Self {
        Self::from_storage(Storage::List(Vec::new()))
    }

    /// Create a raw list from values.
    pub fn list_from(values: impl IntoIterator<Item = Value>) -> Self {
        Self::from_storage(Storage::List(values.into_iter().collect()))
    }

    /// Create an empty raw map.
    pub fn map() -> Self {
        Self::from_storage(Storage::Map(IndexMap::new()))
    }

    /// Create a raw map from entries.
    pub fn map_from(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Self::from_storage(Storage::Map(entries.into_iter().collect()))
    }

    /// Create an empty raw set.
    pub fn empty_set() -> Self {
        Self::from_storage(Storage::Set(IndexSet::new()))
    }

    /// Create a raw set from members.
    pub fn set_from(members: impl IntoIterator<Item = Value>) -> Self {
        Self::from_storage(Storage::Set(members.into_iter().collect()))
    }

    /// The container kind (record/list/map/set).
    pub fn obj_kind(&self) -> ObjKind {
        self.data.storage.borrow().kind()
    }

    /// The wrap kind of this handle.
    pub fn wrap_kind(&self) -> WrapKind {
        self.kind
    }

    /// Registry identity of the underlying allocation.
    pub(crate) fn target_id(&self) -> usize {
        Rc::as_ptr(&self.data) as usize
    }

    /// A handle to the same allocation viewed through another wrap kind.
    pub(crate) fn with_kind(&self, kind: WrapKind) -> Obj {
        Obj {
            data: self.data.clone(),
            kind,
        }
    }

    /// Whether the two handles share the underlying allocation, regardless
    /// of wrap kind.
    pub fn same_target(&self, other: &Obj) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl PartialEq for Obj {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data) && self.kind == other.kind
    }
}

impl Eq for Obj {}

impl Hash for Obj {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.data) as usize).hash(state);
        self.kind.hash(state);
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Obj({:?} {} @{:p})",
            self.kind,
            self.obj_kind().name(),
            Rc::as_ptr(&self.data)
        )
    }
}

// =============================================================================
// VALUE
// =============================================================================

/// A dynamic observed value.
///
/// Equality is same-value-zero: `NaN == NaN`, `+0 == -0`, `Int` and
/// `Float` compare numerically, and containers and refs compare by
/// reference identity.
#[derive(Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Obj(Obj),
    Ref(Ref),
}

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Value {
        Value::Str(s.into())
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_obj(&self) -> Option<&Obj> {
        match self {
            Value::Obj(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_ref_handle(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Obj(_) => "obj",
            Value::Ref(_) => "ref",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        same_value_zero(self, other)
    }
}

// Same-value-zero is reflexive (NaN == NaN), so Eq holds.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(self, state);
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "unit"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Obj(o) => o.fmt(f),
            Value::Ref(r) => r.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Rc::from(v.as_str()))
    }
}

impl From<Obj> for Value {
    fn from(v: Obj) -> Self {
        Value::Obj(v)
    }
}

impl From<Ref> for Value {
    fn from(v: Ref) -> Self {
        Value::Ref(v)
    }
}

// =============================================================================
// TESTS
// =============================================================================
