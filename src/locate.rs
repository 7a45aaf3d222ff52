//! Member location across inheritance chains.
//!
//! A locator searches a class and its ancestors for a declared member,
//! most derived class first, and deliberately stops before the root:
//! the root's universal methods are never located, only called through
//! the checked surface.
//!
//! Location has one side effect: the found member is opened, so later
//! checked access to it succeeds regardless of declared visibility. The
//! returned refs are cheap copyable handles; their operations re-check
//! accessibility, receiver class, and argument conformance on every use.

use crate::error::{AccessError, AccessResult};
use crate::object::{ClassId, MethodBody, MethodDef};
use crate::registry::{TypeRegistry, ROOT_CLASS};
use crate::value::{ObjRef, TypeTag, Value};

/// A located field, either kind.
#[derive(Debug, Clone)]
pub enum LocatedField {
    /// Per-instance field.
    Instance(FieldRef),
    /// Class-level field.
    Static(StaticFieldRef),
}

impl LocatedField {
    /// Open the underlying field.
    pub(crate) fn open(&self, registry: &TypeRegistry) {
        match self {
            LocatedField::Instance(f) => f.open(registry),
            LocatedField::Static(f) => f.open(registry),
        }
    }

    /// Declared value type of the field.
    pub fn ty(&self, registry: &TypeRegistry) -> Option<TypeTag> {
        match self {
            LocatedField::Instance(f) => f.def(registry).map(|(_, d)| d.ty),
            LocatedField::Static(f) => f.def(registry).map(|d| d.ty),
        }
    }
}

// ============================================================================
// Refs
// ============================================================================

/// Handle to a located instance field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRef {
    declaring: ClassId,
    index: usize,
    slot: usize,
}

impl FieldRef {
    fn def<'r>(
        &self,
        registry: &'r TypeRegistry,
    ) -> Option<(&'r crate::object::ClassDef, &'r crate::object::FieldDef)> {
        let class = registry.class(self.declaring)?;
        let field = class.fields.get(self.index)?;
        Some((class, field))
    }

    fn resolve<'r>(
        &self,
        registry: &'r TypeRegistry,
    ) -> AccessResult<(&'r crate::object::ClassDef, &'r crate::object::FieldDef)> {
        self.def(registry).ok_or_else(|| AccessError::MemberNotFound {
            class: registry.class_name(self.declaring),
            member: format!("field #{}", self.index),
        })
    }

    fn open(&self, registry: &TypeRegistry) {
        if let Some((_, field)) = self.def(registry) {
            field.mark_accessible();
        }
    }

    /// Class that declares the field.
    pub fn declaring(&self) -> ClassId {
        self.declaring
    }

    /// Read the field from an instance of the declaring class or a
    /// subclass of it.
    pub fn get(&self, registry: &TypeRegistry, target: &ObjRef) -> AccessResult<Value> {
        let (class, field) = self.resolve(registry)?;
        if !field.is_accessible() {
            return Err(AccessError::NotAccessible {
                class: class.name.clone(),
                member: field.name.clone(),
            });
        }
        let obj = target.read();
        if !registry.is_subclass(obj.class_id, self.declaring) {
            return Err(AccessError::TypeMismatch {
                expected: format!("instance of {}", class.name),
                found: registry.class_name(obj.class_id),
            });
        }
        obj.field(self.slot)
            .cloned()
            .ok_or_else(|| AccessError::TypeMismatch {
                expected: format!("instance of {}", class.name),
                found: format!("object with {} field slot(s)", obj.fields.len()),
            })
    }

    /// Write the field on an instance of the declaring class or a subclass
    /// of it. The value must conform to the declared type.
    pub fn set(&self, registry: &TypeRegistry, target: &ObjRef, value: Value) -> AccessResult<()> {
        let (class, field) = self.resolve(registry)?;
        if !field.is_accessible() {
            return Err(AccessError::NotAccessible {
                class: class.name.clone(),
                member: field.name.clone(),
            });
        }
        if !registry.value_conforms(&value, field.ty) {
            return Err(AccessError::TypeMismatch {
                expected: format!("{} for field `{}`", registry.type_name(field.ty), field.name),
                found: registry.value_type_name(&value),
            });
        }
        let mut obj = target.write();
        if !registry.is_subclass(obj.class_id, self.declaring) {
            return Err(AccessError::TypeMismatch {
                expected: format!("instance of {}", class.name),
                found: registry.class_name(obj.class_id),
            });
        }
        if obj.set_field(self.slot, value) {
            Ok(())
        } else {
            Err(AccessError::TypeMismatch {
                expected: format!("instance of {}", class.name),
                found: format!("object with {} field slot(s)", obj.fields.len()),
            })
        }
    }
}

/// Handle to a located static field.
#[derive(Debug, Clone, Copy)]
pub struct StaticFieldRef {
    declaring: ClassId,
    index: usize,
}

impl StaticFieldRef {
    fn def<'r>(&self, registry: &'r TypeRegistry) -> Option<&'r crate::object::StaticFieldDef> {
        registry.class(self.declaring)?.static_fields.get(self.index)
    }

    fn resolve<'r>(
        &self,
        registry: &'r TypeRegistry,
    ) -> AccessResult<&'r crate::object::StaticFieldDef> {
        self.def(registry).ok_or_else(|| AccessError::MemberNotFound {
            class: registry.class_name(self.declaring),
            member: format!("static field #{}", self.index),
        })
    }

    fn open(&self, registry: &TypeRegistry) {
        if let Some(field) = self.def(registry) {
            field.mark_accessible();
        }
    }

    /// Class that declares the field.
    pub fn declaring(&self) -> ClassId {
        self.declaring
    }

    /// Read the current value.
    pub fn get(&self, registry: &TypeRegistry) -> AccessResult<Value> {
        let field = self.resolve(registry)?;
        if !field.is_accessible() {
            return Err(AccessError::NotAccessible {
                class: registry.class_name(self.declaring),
                member: field.name.clone(),
            });
        }
        Ok(field.get())
    }

    /// Overwrite the value. It must conform to the declared type.
    pub fn set(&self, registry: &TypeRegistry, value: Value) -> AccessResult<()> {
        let field = self.resolve(registry)?;
        if !field.is_accessible() {
            return Err(AccessError::NotAccessible {
                class: registry.class_name(self.declaring),
                member: field.name.clone(),
            });
        }
        if !registry.value_conforms(&value, field.ty) {
            return Err(AccessError::TypeMismatch {
                expected: format!("{} for field `{}`", registry.type_name(field.ty), field.name),
                found: registry.value_type_name(&value),
            });
        }
        field.set(value);
        Ok(())
    }
}

/// Handle to a located method.
#[derive(Debug, Clone, Copy)]
pub struct MethodRef {
    declaring: ClassId,
    index: usize,
}

impl MethodRef {
    pub(crate) fn new(declaring: ClassId, index: usize) -> Self {
        Self { declaring, index }
    }

    /// Declaration behind this handle.
    pub fn def<'r>(&self, registry: &'r TypeRegistry) -> Option<&'r MethodDef> {
        registry.class(self.declaring)?.methods.get(self.index)
    }

    fn resolve<'r>(&self, registry: &'r TypeRegistry) -> AccessResult<&'r MethodDef> {
        self.def(registry).ok_or_else(|| AccessError::MemberNotFound {
            class: registry.class_name(self.declaring),
            member: format!("method #{}", self.index),
        })
    }

    pub(crate) fn open(&self, registry: &TypeRegistry) {
        if let Some(method) = self.def(registry) {
            method.mark_accessible();
        }
    }

    /// Class that declares the method.
    pub fn declaring(&self) -> ClassId {
        self.declaring
    }

    /// Invoke the method. Instance methods need a receiver that is an
    /// instance of the declaring class; static methods ignore the receiver.
    /// A failure raised by the body comes back as `TargetFailure` with its
    /// cause intact.
    pub fn invoke(
        &self,
        registry: &TypeRegistry,
        receiver: Option<&ObjRef>,
        args: &[Value],
    ) -> AccessResult<Value> {
        let method = self.resolve(registry)?;
        if !method.is_accessible() {
            return Err(AccessError::NotAccessible {
                class: registry.class_name(self.declaring),
                member: method.name.clone(),
            });
        }
        let what = format!(
            "{}::{}({})",
            registry.class_name(self.declaring),
            method.name,
            registry.render_params(&method.params)
        );
        registry.check_args(&what, &method.params, args)?;
        match (&method.body, receiver) {
            (MethodBody::Static(body), _) => body(args).map_err(AccessError::TargetFailure),
            (MethodBody::Instance(body), Some(recv)) => {
                let recv_class = recv.read().class_id;
                if !registry.is_subclass(recv_class, self.declaring) {
                    return Err(AccessError::TypeMismatch {
                        expected: format!("instance of {}", registry.class_name(self.declaring)),
                        found: registry.class_name(recv_class),
                    });
                }
                body(recv, args).map_err(AccessError::TargetFailure)
            }
            (MethodBody::Instance(_), None) => Err(AccessError::TypeMismatch {
                expected: format!("receiver for {what}"),
                found: "no receiver".to_string(),
            }),
        }
    }
}

/// Handle to a located constructor.
#[derive(Debug, Clone, Copy)]
pub struct CtorRef {
    class: ClassId,
    index: usize,
}

impl CtorRef {
    pub(crate) fn new(class: ClassId, index: usize) -> Self {
        Self { class, index }
    }

    fn resolve<'r>(
        &self,
        registry: &'r TypeRegistry,
    ) -> AccessResult<(&'r crate::object::ClassDef, &'r crate::object::ConstructorDef)> {
        let class = registry.class_ref(self.class)?;
        let ctor = class
            .constructors
            .get(self.index)
            .ok_or_else(|| AccessError::MemberNotFound {
                class: class.name.clone(),
                member: format!("constructor #{}", self.index),
            })?;
        Ok((class, ctor))
    }

    /// Class this constructor builds.
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Build an instance: allocate, run declared initializers root-first,
    /// then run the constructor body. A failure raised by the body comes
    /// back as `TargetFailure` with its cause intact.
    pub fn construct(&self, registry: &TypeRegistry, args: &[Value]) -> AccessResult<Value> {
        Ok(Value::Obj(self.construct_raw(registry, args)?))
    }

    pub(crate) fn construct_raw(&self, registry: &TypeRegistry, args: &[Value]) -> AccessResult<ObjRef> {
        let (class, ctor) = self.resolve(registry)?;
        if !ctor.is_accessible() {
            return Err(AccessError::NotAccessible {
                class: class.name.clone(),
                member: format!("constructor({})", registry.render_params(&ctor.params)),
            });
        }
        let what = format!(
            "{}::constructor({})",
            class.name,
            registry.render_params(&ctor.params)
        );
        registry.check_args(&what, &ctor.params, args)?;
        let instance = registry.new_object(self.class)?;
        (ctor.body)(&instance, args).map_err(AccessError::TargetFailure)?;
        Ok(instance)
    }
}

// ============================================================================
// Search
// ============================================================================

/// Walk the chain from `class` looking for a declared field, instance
/// fields before static ones within each class.
pub(crate) fn find_field_from(
    registry: &TypeRegistry,
    class: ClassId,
    name: &str,
    include_root: bool,
) -> Option<LocatedField> {
    let mut current = Some(class);
    while let Some(id) = current {
        if !include_root && id == ROOT_CLASS {
            break;
        }
        let def = registry.class(id)?;
        if let Some((index, _)) = def.declared_field(name) {
            return Some(LocatedField::Instance(FieldRef {
                declaring: id,
                index,
                slot: def.slot_base + index,
            }));
        }
        if let Some((index, _)) = def.declared_static_field(name) {
            return Some(LocatedField::Static(StaticFieldRef {
                declaring: id,
                index,
            }));
        }
        current = def.parent_id;
    }
    None
}

/// Walk the chain from `class` looking for a method by name that satisfies
/// `pred`; within each class, declaration order decides.
pub(crate) fn find_method_from<F>(
    registry: &TypeRegistry,
    class: ClassId,
    name: &str,
    include_root: bool,
    pred: F,
) -> Option<MethodRef>
where
    F: Fn(&MethodDef) -> bool,
{
    let mut current = Some(class);
    while let Some(id) = current {
        if !include_root && id == ROOT_CLASS {
            break;
        }
        let def = registry.class(id)?;
        for (index, method) in def.methods_named(name) {
            if pred(method) {
                return Some(MethodRef {
                    declaring: id,
                    index,
                });
            }
        }
        current = def.parent_id;
    }
    None
}

// ============================================================================
// Locators
// ============================================================================

/// Find a field by name on `class` or an ancestor below the root. The
/// found field is opened as a side effect, whatever its visibility.
pub fn locate_field(
    registry: &TypeRegistry,
    class: ClassId,
    name: &str,
) -> AccessResult<LocatedField> {
    match find_field_from(registry, class, name, false) {
        Some(found) => {
            found.open(registry);
            Ok(found)
        }
        None => Err(AccessError::MemberNotFound {
            class: registry.class_name(class),
            member: name.to_string(),
        }),
    }
}

/// Find a method by name and exact parameter types on `class` or an
/// ancestor below the root, opening it as a side effect.
pub fn locate_method(
    registry: &TypeRegistry,
    class: ClassId,
    name: &str,
    params: &[TypeTag],
) -> AccessResult<MethodRef> {
    match find_method_from(registry, class, name, false, |m| m.params == params) {
        Some(found) => {
            found.open(registry);
            Ok(found)
        }
        None => Err(AccessError::MemberNotFound {
            class: registry.class_name(class),
            member: format!("{}({})", name, registry.render_params(params)),
        }),
    }
}

/// Find a method by name and parameter count on `class` or an ancestor
/// below the root, opening it as a side effect. Within one class the first
/// declared method with that name and arity wins, whatever its types.
pub fn locate_method_by_arity(
    registry: &TypeRegistry,
    class: ClassId,
    name: &str,
    arity: usize,
) -> AccessResult<MethodRef> {
    match find_method_from(registry, class, name, false, |m| m.params.len() == arity) {
        Some(found) => {
            found.open(registry);
            Ok(found)
        }
        None => Err(AccessError::MemberNotFound {
            class: registry.class_name(class),
            member: format!("{name}/{arity}"),
        }),
    }
}

/// Find a constructor by exact parameter types. Constructors are never
/// inherited, so only the class itself is searched. The found constructor
/// is opened as a side effect.
pub fn locate_constructor(
    registry: &TypeRegistry,
    class: ClassId,
    params: &[TypeTag],
) -> AccessResult<CtorRef> {
    let def = registry.class_ref(class)?;
    for (index, ctor) in def.constructors.iter().enumerate() {
        if ctor.params == params {
            ctor.mark_accessible();
            return Ok(CtorRef { class, index });
        }
    }
    Err(AccessError::MemberNotFound {
        class: def.name.clone(),
        member: format!("constructor({})", registry.render_params(params)),
    })
}
