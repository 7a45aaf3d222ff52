//! Object model and class metadata.
//!
//! Classes, interfaces, and their members are plain data registered at
//! runtime. Method and constructor behavior is supplied as closures, so a
//! class definition is both the introspection record and the dispatch
//! table. Instances are flat slot vectors laid out root-first along the
//! inheritance chain.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::Thrown;
use crate::value::{ObjRef, TypeTag, Value};

/// Index of a class in the registry.
pub type ClassId = usize;

/// Index of an interface in the registry.
pub type InterfaceId = usize;

// ============================================================================
// Objects
// ============================================================================

/// Global object ID counter.
static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a unique object ID.
fn generate_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A heap object: an identity plus one value slot per instance field,
/// inherited fields first.
#[derive(Debug)]
pub struct Object {
    /// Unique identity, stable for the object's lifetime.
    pub object_id: u64,
    /// Class this object instantiates.
    pub class_id: ClassId,
    /// Field slots for the whole inheritance chain, root-first.
    pub fields: Vec<Value>,
}

impl Object {
    /// Create an object with all slots null.
    pub fn new(class_id: ClassId, field_count: usize) -> Self {
        Self {
            object_id: generate_object_id(),
            class_id,
            fields: vec![Value::Null; field_count],
        }
    }

    /// Read a field slot.
    pub fn field(&self, slot: usize) -> Option<&Value> {
        self.fields.get(slot)
    }

    /// Overwrite a field slot. Returns false when the slot is out of range.
    pub fn set_field(&mut self, slot: usize, value: Value) -> bool {
        match self.fields.get_mut(slot) {
            Some(s) => {
                *s = value;
                true
            }
            None => false,
        }
    }
}

// ============================================================================
// Member definitions
// ============================================================================

/// Declared visibility of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Reachable through the checked surface without any locator step.
    Public,
    /// Reachable only after a locator has opened the member.
    Protected,
    /// Reachable only after a locator has opened the member.
    Private,
}

/// An instance field declaration.
#[derive(Debug)]
pub struct FieldDef {
    /// Field name, unique within the declaring class.
    pub name: String,
    /// Declared value type.
    pub ty: TypeTag,
    /// Declared visibility.
    pub visibility: Visibility,
    /// Value the slot starts with.
    pub initial: Value,
    /// Set once a locator has opened the field; public fields start open.
    accessible: AtomicBool,
}

impl FieldDef {
    /// Create a field declaration.
    pub fn new(
        name: impl Into<String>,
        ty: TypeTag,
        visibility: Visibility,
        initial: Value,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            visibility,
            initial,
            accessible: AtomicBool::new(visibility == Visibility::Public),
        }
    }

    /// Whether the field may be used through checked entry points.
    pub fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Relaxed)
    }

    /// Open the field. Idempotent and never reversed.
    pub fn mark_accessible(&self) {
        self.accessible.store(true, Ordering::Relaxed);
    }
}

/// A static field declaration. The slot itself lives here, guarded for
/// concurrent access.
#[derive(Debug)]
pub struct StaticFieldDef {
    /// Field name, unique within the declaring class.
    pub name: String,
    /// Declared value type.
    pub ty: TypeTag,
    /// Declared visibility.
    pub visibility: Visibility,
    slot: RwLock<Value>,
    accessible: AtomicBool,
}

impl StaticFieldDef {
    /// Create a static field declaration with its initial value.
    pub fn new(
        name: impl Into<String>,
        ty: TypeTag,
        visibility: Visibility,
        initial: Value,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            visibility,
            slot: RwLock::new(initial),
            accessible: AtomicBool::new(visibility == Visibility::Public),
        }
    }

    /// Read the current value.
    pub fn get(&self) -> Value {
        self.slot.read().clone()
    }

    /// Overwrite the value. Type conformance is the caller's job.
    pub fn set(&self, value: Value) {
        *self.slot.write() = value;
    }

    /// Whether the field may be used through checked entry points.
    pub fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Relaxed)
    }

    /// Open the field. Idempotent and never reversed.
    pub fn mark_accessible(&self) {
        self.accessible.store(true, Ordering::Relaxed);
    }
}

/// Body of an instance method. Receives the receiver handle and the
/// argument list; locking the receiver is the body's responsibility.
pub type InstanceFn = Arc<dyn Fn(&ObjRef, &[Value]) -> Result<Value, Thrown> + Send + Sync>;

/// Body of a static method.
pub type StaticFn = Arc<dyn Fn(&[Value]) -> Result<Value, Thrown> + Send + Sync>;

/// Body of a constructor. Receives the freshly allocated instance with
/// declared initializers already applied.
pub type CtorFn = Arc<dyn Fn(&ObjRef, &[Value]) -> Result<(), Thrown> + Send + Sync>;

/// Executable body of a method.
#[derive(Clone)]
pub enum MethodBody {
    /// Dispatched with a receiver.
    Instance(InstanceFn),
    /// Dispatched without a receiver.
    Static(StaticFn),
}

/// A method declaration.
pub struct MethodDef {
    /// Method name; overloads share it.
    pub name: String,
    /// Declared parameter types, receiver excluded.
    pub params: Vec<TypeTag>,
    /// Declared return type.
    pub ret: TypeTag,
    /// Declared visibility.
    pub visibility: Visibility,
    /// Executable body.
    pub body: MethodBody,
    accessible: AtomicBool,
}

impl MethodDef {
    /// Create a method declaration.
    pub fn new(
        name: impl Into<String>,
        params: Vec<TypeTag>,
        ret: TypeTag,
        visibility: Visibility,
        body: MethodBody,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
            visibility,
            body,
            accessible: AtomicBool::new(visibility == Visibility::Public),
        }
    }

    /// True when the body dispatches without a receiver.
    pub fn is_static(&self) -> bool {
        matches!(self.body, MethodBody::Static(_))
    }

    /// Whether the method may be used through checked entry points.
    pub fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Relaxed)
    }

    /// Open the method. Idempotent and never reversed.
    pub fn mark_accessible(&self) {
        self.accessible.store(true, Ordering::Relaxed);
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .field("visibility", &self.visibility)
            .field("is_static", &self.is_static())
            .finish_non_exhaustive()
    }
}

/// A constructor declaration.
pub struct ConstructorDef {
    /// Declared parameter types. For inner classes the first entry is the
    /// enclosing instance.
    pub params: Vec<TypeTag>,
    /// Declared visibility.
    pub visibility: Visibility,
    /// Executable body, run after field initializers.
    pub body: CtorFn,
    accessible: AtomicBool,
}

impl ConstructorDef {
    /// Create a constructor declaration.
    pub fn new(params: Vec<TypeTag>, visibility: Visibility, body: CtorFn) -> Self {
        Self {
            params,
            visibility,
            body,
            accessible: AtomicBool::new(visibility == Visibility::Public),
        }
    }

    /// Whether the constructor may be used through checked entry points.
    pub fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Relaxed)
    }

    /// Open the constructor. Idempotent and never reversed.
    pub fn mark_accessible(&self) {
        self.accessible.store(true, Ordering::Relaxed);
    }
}

impl fmt::Debug for ConstructorDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDef")
            .field("params", &self.params)
            .field("visibility", &self.visibility)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Classes
// ============================================================================

/// How a class nests inside another class, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nesting {
    /// Top-level class.
    None,
    /// Nested class with no enclosing-instance requirement.
    Static(ClassId),
    /// Inner class; every constructor takes the enclosing instance as its
    /// first parameter.
    Inner(ClassId),
}

impl Nesting {
    /// The enclosing class, for nested classes of either kind.
    pub fn enclosing(&self) -> Option<ClassId> {
        match self {
            Nesting::None => None,
            Nesting::Static(id) | Nesting::Inner(id) => Some(*id),
        }
    }

    /// True only for inner (enclosing-instance-bound) classes.
    pub fn is_inner(&self) -> bool {
        matches!(self, Nesting::Inner(_))
    }
}

/// A registered class: metadata and dispatch table in one record.
#[derive(Debug)]
pub struct ClassDef {
    /// Registry index of this class.
    pub id: ClassId,
    /// Qualified name; nested classes use `Outer::Inner`.
    pub name: String,
    /// Superclass, `None` only for the root.
    pub parent_id: Option<ClassId>,
    /// Nesting relationship.
    pub nesting: Nesting,
    /// First slot of this class's declared fields in the object layout.
    pub slot_base: usize,
    /// Instance fields declared by this class (inherited ones excluded).
    pub fields: Vec<FieldDef>,
    /// Static fields declared by this class.
    pub static_fields: Vec<StaticFieldDef>,
    /// Methods declared by this class.
    pub methods: Vec<MethodDef>,
    /// Constructors declared by this class.
    pub constructors: Vec<ConstructorDef>,
    pub(crate) field_index: FxHashMap<String, usize>,
    pub(crate) static_index: FxHashMap<String, usize>,
}

impl ClassDef {
    /// Total slot count for instances of this class, inherited fields
    /// included.
    pub fn field_count(&self) -> usize {
        self.slot_base + self.fields.len()
    }

    /// Look up a declared instance field by name. Returns its index within
    /// this class's declarations.
    pub fn declared_field(&self, name: &str) -> Option<(usize, &FieldDef)> {
        let idx = *self.field_index.get(name)?;
        Some((idx, &self.fields[idx]))
    }

    /// Look up a declared static field by name.
    pub fn declared_static_field(&self, name: &str) -> Option<(usize, &StaticFieldDef)> {
        let idx = *self.static_index.get(name)?;
        Some((idx, &self.static_fields[idx]))
    }

    /// Iterate declared methods sharing a name, in declaration order.
    pub fn methods_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (usize, &'a MethodDef)> + 'a {
        self.methods
            .iter()
            .enumerate()
            .filter(move |(_, m)| m.name == name)
    }
}

// ============================================================================
// Interfaces
// ============================================================================

/// An abstract method signature on an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSig {
    /// Method name.
    pub name: String,
    /// Declared parameter types.
    pub params: Vec<TypeTag>,
    /// Declared return type.
    pub ret: TypeTag,
}

/// A registered capability interface: named method signatures with no
/// bodies, bindable against a target by the proxy binder.
#[derive(Debug)]
pub struct InterfaceDef {
    /// Registry index of this interface.
    pub id: InterfaceId,
    /// Interface name.
    pub name: String,
    /// Extended interfaces, flattened into the bindable surface.
    pub extends: Vec<InterfaceId>,
    /// Signatures declared directly on this interface.
    pub methods: Vec<MethodSig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_are_unique() {
        let a = Object::new(0, 0);
        let b = Object::new(0, 0);
        assert_ne!(a.object_id, b.object_id);
    }

    #[test]
    fn object_slots_start_null() {
        let obj = Object::new(2, 3);
        assert_eq!(obj.fields.len(), 3);
        assert!(obj.field(0).is_some_and(Value::is_null));
        assert!(obj.field(3).is_none());
    }

    #[test]
    fn set_field_respects_bounds() {
        let mut obj = Object::new(0, 1);
        assert!(obj.set_field(0, Value::Int(7)));
        assert_eq!(obj.field(0), Some(&Value::Int(7)));
        assert!(!obj.set_field(1, Value::Int(8)));
    }

    #[test]
    fn public_members_start_accessible() {
        let open = FieldDef::new("a", TypeTag::Int, Visibility::Public, Value::Int(0));
        let shut = FieldDef::new("b", TypeTag::Int, Visibility::Private, Value::Int(0));
        assert!(open.is_accessible());
        assert!(!shut.is_accessible());
        shut.mark_accessible();
        shut.mark_accessible();
        assert!(shut.is_accessible());
    }

    #[test]
    fn static_field_holds_its_slot() {
        let sf = StaticFieldDef::new("serial", TypeTag::Int, Visibility::Private, Value::Int(1));
        assert_eq!(sf.get(), Value::Int(1));
        sf.set(Value::Int(2));
        assert_eq!(sf.get(), Value::Int(2));
    }

    #[test]
    fn nesting_queries() {
        assert_eq!(Nesting::None.enclosing(), None);
        assert_eq!(Nesting::Static(4).enclosing(), Some(4));
        assert!(Nesting::Inner(4).is_inner());
        assert!(!Nesting::Static(4).is_inner());
    }

    #[test]
    fn method_staticness_follows_body() {
        let inst = MethodDef::new(
            "m",
            vec![],
            TypeTag::Unit,
            Visibility::Public,
            MethodBody::Instance(Arc::new(|_, _| Ok(Value::Null))),
        );
        let stat = MethodDef::new(
            "s",
            vec![],
            TypeTag::Unit,
            Visibility::Public,
            MethodBody::Static(Arc::new(|_| Ok(Value::Null))),
        );
        assert!(!inst.is_static());
        assert!(stat.is_static());
    }
}
