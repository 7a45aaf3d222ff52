//! Type registry for classes and interfaces.
//!
//! The registry owns every [`ClassDef`] and [`InterfaceDef`], keyed by dense
//! IDs with a shared name table on top. It seeds itself with the root class
//! `Object`, which every other class transitively extends and which member
//! location deliberately never searches.
//!
//! Two access surfaces hang off the registry. The checked surface
//! ([`TypeRegistry::get_field`], [`TypeRegistry::call`], and friends)
//! respects visibility: non-public members fail with `NotAccessible` until
//! a locator has opened them. The locators in [`crate::locate`] are the
//! opening mechanism.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{AccessError, AccessResult, Thrown};
use crate::locate::{find_field_from, LocatedField, MethodRef};
use crate::object::{
    ClassDef, ClassId, ConstructorDef, FieldDef, InterfaceDef, InterfaceId, MethodBody, MethodDef,
    MethodSig, Nesting, Object, StaticFieldDef, Visibility,
};
use crate::value::{ObjRef, TypeTag, Value};

/// ID of the seeded root class.
pub const ROOT_CLASS: ClassId = 0;

/// Name of the seeded root class.
const ROOT_NAME: &str = "Object";

/// What a registered name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeEntry {
    /// A class ID.
    Class(ClassId),
    /// An interface ID.
    Interface(InterfaceId),
}

/// Registry of runtime types.
#[derive(Debug)]
pub struct TypeRegistry {
    classes: Vec<ClassDef>,
    interfaces: Vec<InterfaceDef>,
    names: FxHashMap<String, TypeEntry>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a registry containing only the root class.
    pub fn new() -> Self {
        let mut registry = Self {
            classes: Vec::new(),
            interfaces: Vec::new(),
            names: FxHashMap::default(),
        };
        registry.seed_root();
        registry
    }

    /// Install the root class `Object` at ID 0 with its universal methods.
    fn seed_root(&mut self) {
        let methods = vec![
            MethodDef::new(
                "toString",
                vec![],
                TypeTag::Str,
                Visibility::Public,
                MethodBody::Instance(Arc::new(|recv, _| {
                    Ok(Value::str(format!("Object@{}", recv.read().object_id)))
                })),
            ),
            MethodDef::new(
                "hashCode",
                vec![],
                TypeTag::Int,
                Visibility::Public,
                MethodBody::Instance(Arc::new(|recv, _| {
                    Ok(Value::Int(recv.read().object_id as i32))
                })),
            ),
            MethodDef::new(
                "equals",
                vec![TypeTag::Object(ROOT_CLASS)],
                TypeTag::Bool,
                Visibility::Public,
                MethodBody::Instance(Arc::new(|recv, args| {
                    let same = match args.first() {
                        Some(Value::Obj(other)) => {
                            // ptr_eq first so the same lock is never taken twice
                            Arc::ptr_eq(recv, other)
                                || recv.read().object_id == other.read().object_id
                        }
                        _ => false,
                    };
                    Ok(Value::Bool(same))
                })),
            ),
        ];
        self.classes.push(ClassDef {
            id: ROOT_CLASS,
            name: ROOT_NAME.to_string(),
            parent_id: None,
            nesting: Nesting::None,
            slot_base: 0,
            fields: Vec::new(),
            static_fields: Vec::new(),
            methods,
            constructors: vec![ConstructorDef::new(
                vec![],
                Visibility::Public,
                Arc::new(|_, _| Ok(())),
            )],
            field_index: FxHashMap::default(),
            static_index: FxHashMap::default(),
        });
        self.names
            .insert(ROOT_NAME.to_string(), TypeEntry::Class(ROOT_CLASS));
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a class. Nested classes get their name qualified with the
    /// enclosing class, `Outer::Inner`. Classes declaring no constructor
    /// receive an implicit public zero-argument one (taking the enclosing
    /// instance for inner classes).
    pub fn register_class(&mut self, builder: ClassBuilder) -> AccessResult<ClassId> {
        let ClassBuilder {
            name,
            parent,
            nesting,
            fields,
            static_fields,
            methods,
            mut constructors,
        } = builder;

        let parent_id = parent.unwrap_or(ROOT_CLASS);
        let slot_base = self.class_ref(parent_id)?.field_count();

        let qualified = match nesting.enclosing() {
            Some(enclosing) => format!("{}::{}", self.class_ref(enclosing)?.name, name),
            None => name,
        };
        if self.names.contains_key(&qualified) {
            return Err(AccessError::InvalidShape(format!(
                "type `{qualified}` is already registered"
            )));
        }

        let mut field_index = FxHashMap::default();
        for (i, field) in fields.iter().enumerate() {
            if field_index.insert(field.name.clone(), i).is_some() {
                return Err(AccessError::InvalidShape(format!(
                    "field `{}` is declared twice on `{qualified}`",
                    field.name
                )));
            }
        }
        let mut static_index = FxHashMap::default();
        for (i, field) in static_fields.iter().enumerate() {
            if field_index.contains_key(&field.name)
                || static_index.insert(field.name.clone(), i).is_some()
            {
                return Err(AccessError::InvalidShape(format!(
                    "field `{}` is declared twice on `{qualified}`",
                    field.name
                )));
            }
        }
        for (i, method) in methods.iter().enumerate() {
            let dup = methods[..i]
                .iter()
                .any(|m| m.name == method.name && m.params == method.params);
            if dup {
                return Err(AccessError::InvalidShape(format!(
                    "method `{}` is declared twice on `{qualified}` with the same parameters",
                    method.name
                )));
            }
        }
        for (i, ctor) in constructors.iter().enumerate() {
            if constructors[..i].iter().any(|c| c.params == ctor.params) {
                return Err(AccessError::InvalidShape(format!(
                    "`{qualified}` declares two constructors with the same parameters"
                )));
            }
        }

        if constructors.is_empty() {
            let params = match nesting {
                Nesting::Inner(enclosing) => vec![TypeTag::Object(enclosing)],
                _ => vec![],
            };
            constructors.push(ConstructorDef::new(
                params,
                Visibility::Public,
                Arc::new(|_, _| Ok(())),
            ));
        }

        let id = self.classes.len();
        self.classes.push(ClassDef {
            id,
            name: qualified.clone(),
            parent_id: Some(parent_id),
            nesting,
            slot_base,
            fields,
            static_fields,
            methods,
            constructors,
            field_index,
            static_index,
        });
        self.names.insert(qualified, TypeEntry::Class(id));
        Ok(id)
    }

    /// Register a capability interface.
    pub fn register_interface(&mut self, builder: InterfaceBuilder) -> AccessResult<InterfaceId> {
        let InterfaceBuilder {
            name,
            extends,
            methods,
        } = builder;

        if self.names.contains_key(&name) {
            return Err(AccessError::InvalidShape(format!(
                "type `{name}` is already registered"
            )));
        }
        for &sup in &extends {
            if self.interfaces.get(sup).is_none() {
                return Err(AccessError::UnknownType(format!("interface #{sup}")));
            }
        }
        for (i, sig) in methods.iter().enumerate() {
            let dup = methods[..i]
                .iter()
                .any(|m| m.name == sig.name && m.params == sig.params);
            if dup {
                return Err(AccessError::InvalidShape(format!(
                    "method `{}` is declared twice on `{name}` with the same parameters",
                    sig.name
                )));
            }
        }

        let id = self.interfaces.len();
        self.interfaces.push(InterfaceDef {
            id,
            name: name.clone(),
            extends,
            methods,
        });
        self.names.insert(name, TypeEntry::Interface(id));
        Ok(id)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Look up a class by ID.
    pub fn class(&self, id: ClassId) -> Option<&ClassDef> {
        self.classes.get(id)
    }

    /// Look up a class by qualified name.
    pub fn class_by_name(&self, name: &str) -> Option<&ClassDef> {
        match self.names.get(name) {
            Some(TypeEntry::Class(id)) => self.classes.get(*id),
            _ => None,
        }
    }

    /// Look up an interface by ID.
    pub fn interface(&self, id: InterfaceId) -> Option<&InterfaceDef> {
        self.interfaces.get(id)
    }

    /// Resolve an interface by name. A class registered under the name is
    /// an `InvalidShape` error, not a miss.
    pub fn interface_by_name(&self, name: &str) -> AccessResult<&InterfaceDef> {
        match self.names.get(name) {
            Some(TypeEntry::Interface(id)) => Ok(&self.interfaces[*id]),
            Some(TypeEntry::Class(_)) => Err(AccessError::InvalidShape(format!(
                "`{name}` is a class, not an interface"
            ))),
            None => Err(AccessError::UnknownType(name.to_string())),
        }
    }

    /// Look up any registered type by name.
    pub fn lookup(&self, name: &str) -> Option<TypeEntry> {
        self.names.get(name).copied()
    }

    /// Class by ID with a uniform error for stale IDs.
    pub(crate) fn class_ref(&self, id: ClassId) -> AccessResult<&ClassDef> {
        self.classes
            .get(id)
            .ok_or_else(|| AccessError::UnknownType(format!("class #{id}")))
    }

    /// Class name for error messages, tolerant of stale IDs.
    pub(crate) fn class_name(&self, id: ClassId) -> String {
        self.classes
            .get(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("class #{id}"))
    }

    // ========================================================================
    // Hierarchy and type algebra
    // ========================================================================

    /// Whether `sub` is `sup` itself or a transitive subclass of it.
    pub fn is_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        let mut current = Some(sub);
        while let Some(id) = current {
            if id == sup {
                return true;
            }
            current = self.classes.get(id).and_then(|c| c.parent_id);
        }
        false
    }

    /// Inheritance chain of a class, most derived first, root last.
    pub fn hierarchy(&self, class: ClassId) -> Vec<&ClassDef> {
        let mut chain = Vec::new();
        let mut current = self.classes.get(class);
        while let Some(def) = current {
            chain.push(def);
            current = def.parent_id.and_then(|p| self.classes.get(p));
        }
        chain
    }

    /// Whether a value of declared type `from` may occupy a slot of type
    /// `to`. Primitives must match exactly; object types widen along the
    /// class chain. There is no numeric widening.
    pub fn is_assignable(&self, from: TypeTag, to: TypeTag) -> bool {
        match (from, to) {
            (TypeTag::Object(a), TypeTag::Object(b)) => self.is_subclass(a, b),
            (a, b) => a == b,
        }
    }

    /// Whether a runtime value may occupy a slot of type `to`. Null
    /// conforms to any reference type.
    pub fn value_conforms(&self, value: &Value, to: TypeTag) -> bool {
        match (value, to) {
            (Value::Null, tag) => tag.is_reference(),
            (Value::Bool(_), TypeTag::Bool) => true,
            (Value::Int(_), TypeTag::Int) => true,
            (Value::Float(_), TypeTag::Float) => true,
            (Value::Str(_), TypeTag::Str) => true,
            (Value::Obj(o), TypeTag::Object(b)) => self.is_subclass(o.read().class_id, b),
            _ => false,
        }
    }

    /// Class of an object value, if it is one.
    pub fn value_class(&self, value: &Value) -> Option<ClassId> {
        value.as_obj().map(|o| o.read().class_id)
    }

    /// Render a declared type for error messages.
    pub fn type_name(&self, tag: TypeTag) -> String {
        match tag {
            TypeTag::Unit => "unit".to_string(),
            TypeTag::Bool => "bool".to_string(),
            TypeTag::Int => "int".to_string(),
            TypeTag::Float => "float".to_string(),
            TypeTag::Str => "str".to_string(),
            TypeTag::Object(id) => self.class_name(id),
        }
    }

    /// Render a runtime value's type for error messages.
    pub fn value_type_name(&self, value: &Value) -> String {
        match value {
            Value::Obj(o) => self.class_name(o.read().class_id),
            other => other.kind_name().to_string(),
        }
    }

    /// Render a parameter list, e.g. `int, str`.
    pub(crate) fn render_params(&self, params: &[TypeTag]) -> String {
        params
            .iter()
            .map(|p| self.type_name(*p))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Render an argument list by value types.
    pub(crate) fn render_args(&self, args: &[Value]) -> String {
        args.iter()
            .map(|a| self.value_type_name(a))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Validate an argument list against declared parameters, rendering a
    /// precise mismatch when it fails.
    pub(crate) fn check_args(
        &self,
        what: &str,
        params: &[TypeTag],
        args: &[Value],
    ) -> AccessResult<()> {
        if params.len() != args.len() {
            return Err(AccessError::TypeMismatch {
                expected: format!("{} argument(s) for {what}", params.len()),
                found: format!("{} argument(s)", args.len()),
            });
        }
        for (param, arg) in params.iter().zip(args) {
            if !self.value_conforms(arg, *param) {
                return Err(AccessError::TypeMismatch {
                    expected: format!("{} for {what}", self.type_name(*param)),
                    found: self.value_type_name(arg),
                });
            }
        }
        Ok(())
    }

    /// True when every argument conforms to the parameter list.
    pub(crate) fn args_conform(&self, params: &[TypeTag], args: &[Value]) -> bool {
        params.len() == args.len()
            && params
                .iter()
                .zip(args)
                .all(|(p, a)| self.value_conforms(a, *p))
    }

    /// Bindable surface of an interface: its own signatures first, then
    /// inherited ones depth-first. Repeated (name, parameters) pairs keep
    /// the first occurrence.
    pub fn flattened_methods(&self, interface: InterfaceId) -> AccessResult<Vec<MethodSig>> {
        let mut out = Vec::new();
        let mut seen: FxHashSet<(String, Vec<TypeTag>)> = FxHashSet::default();
        self.flatten_into(interface, &mut out, &mut seen)?;
        Ok(out)
    }

    fn flatten_into(
        &self,
        interface: InterfaceId,
        out: &mut Vec<MethodSig>,
        seen: &mut FxHashSet<(String, Vec<TypeTag>)>,
    ) -> AccessResult<()> {
        let def = self
            .interfaces
            .get(interface)
            .ok_or_else(|| AccessError::UnknownType(format!("interface #{interface}")))?;
        for sig in &def.methods {
            if seen.insert((sig.name.clone(), sig.params.clone())) {
                out.push(sig.clone());
            }
        }
        // registration order keeps extension acyclic
        for &sup in &def.extends {
            self.flatten_into(sup, out, seen)?;
        }
        Ok(())
    }

    // ========================================================================
    // Instantiation
    // ========================================================================

    /// Allocate an instance with declared initializers applied root-first.
    /// Constructor bodies are not run here.
    pub(crate) fn new_object(&self, class: ClassId) -> AccessResult<ObjRef> {
        let def = self.class_ref(class)?;
        let mut object = Object::new(class, def.field_count());
        for ancestor in self.hierarchy(class).into_iter().rev() {
            for (i, field) in ancestor.fields.iter().enumerate() {
                object.set_field(ancestor.slot_base + i, field.initial.clone());
            }
        }
        Ok(Arc::new(RwLock::new(object)))
    }

    // ========================================================================
    // Checked access
    // ========================================================================

    /// Construct an instance through the first accessible constructor whose
    /// parameters accept the arguments.
    pub fn construct(&self, class: ClassId, args: &[Value]) -> AccessResult<Value> {
        let def = self.class_ref(class)?;
        for (idx, ctor) in def.constructors.iter().enumerate() {
            if !self.args_conform(&ctor.params, args) {
                continue;
            }
            if !ctor.is_accessible() {
                return Err(AccessError::NotAccessible {
                    class: def.name.clone(),
                    member: format!("constructor({})", self.render_params(&ctor.params)),
                });
            }
            return crate::locate::CtorRef::new(class, idx).construct(self, args);
        }
        Err(AccessError::MemberNotFound {
            class: def.name.clone(),
            member: format!("constructor({})", self.render_args(args)),
        })
    }

    /// Read an instance field by name, searching the whole chain including
    /// the root. Non-public fields must have been opened by a locator.
    pub fn get_field(&self, target: &ObjRef, name: &str) -> AccessResult<Value> {
        let class_id = target.read().class_id;
        match find_field_from(self, class_id, name, true) {
            Some(LocatedField::Instance(field)) => field.get(self, target),
            Some(LocatedField::Static(_)) => Err(AccessError::InvalidShape(format!(
                "field `{name}` is static; access it through its class"
            ))),
            None => Err(AccessError::MemberNotFound {
                class: self.class_name(class_id),
                member: name.to_string(),
            }),
        }
    }

    /// Write an instance field by name. Same search and visibility rules
    /// as [`TypeRegistry::get_field`].
    pub fn set_field(&self, target: &ObjRef, name: &str, value: Value) -> AccessResult<()> {
        let class_id = target.read().class_id;
        match find_field_from(self, class_id, name, true) {
            Some(LocatedField::Instance(field)) => field.set(self, target, value),
            Some(LocatedField::Static(_)) => Err(AccessError::InvalidShape(format!(
                "field `{name}` is static; access it through its class"
            ))),
            None => Err(AccessError::MemberNotFound {
                class: self.class_name(class_id),
                member: name.to_string(),
            }),
        }
    }

    /// Invoke a method by name on an instance. Overloads are tried in
    /// declaration order, most derived class first; the root's universal
    /// methods are reachable here.
    pub fn call(&self, target: &ObjRef, name: &str, args: &[Value]) -> AccessResult<Value> {
        let class_id = target.read().class_id;
        let mut name_seen = false;
        let mut current = Some(class_id);
        while let Some(id) = current {
            let class = self.class_ref(id)?;
            let mut selected = None;
            for (idx, method) in class.methods_named(name) {
                name_seen = true;
                if self.args_conform(&method.params, args) {
                    selected = Some(idx);
                    break;
                }
            }
            if let Some(idx) = selected {
                return MethodRef::new(id, idx).invoke(self, Some(target), args);
            }
            current = class.parent_id;
        }
        if name_seen {
            Err(AccessError::TypeMismatch {
                expected: format!("arguments matching an overload of `{name}`"),
                found: format!("({})", self.render_args(args)),
            })
        } else {
            Err(AccessError::MemberNotFound {
                class: self.class_name(class_id),
                member: name.to_string(),
            })
        }
    }

    /// Invoke a static method by name on a class, searching the chain.
    pub fn call_static(&self, class: ClassId, name: &str, args: &[Value]) -> AccessResult<Value> {
        let mut saw_instance = false;
        let mut saw_static = false;
        let mut current = Some(class);
        while let Some(id) = current {
            let def = self.class_ref(id)?;
            let mut selected = None;
            for (idx, method) in def.methods_named(name) {
                if !method.is_static() {
                    saw_instance = true;
                    continue;
                }
                saw_static = true;
                if self.args_conform(&method.params, args) {
                    selected = Some(idx);
                    break;
                }
            }
            if let Some(idx) = selected {
                return MethodRef::new(id, idx).invoke(self, None, args);
            }
            current = def.parent_id;
        }
        if saw_static {
            Err(AccessError::TypeMismatch {
                expected: format!("arguments matching a static overload of `{name}`"),
                found: format!("({})", self.render_args(args)),
            })
        } else if saw_instance {
            Err(AccessError::InvalidShape(format!(
                "method `{name}` on `{}` is not static",
                self.class_name(class)
            )))
        } else {
            Err(AccessError::MemberNotFound {
                class: self.class_name(class),
                member: name.to_string(),
            })
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Fluent definition of a class, consumed by
/// [`TypeRegistry::register_class`].
pub struct ClassBuilder {
    name: String,
    parent: Option<ClassId>,
    nesting: Nesting,
    fields: Vec<FieldDef>,
    static_fields: Vec<StaticFieldDef>,
    methods: Vec<MethodDef>,
    constructors: Vec<ConstructorDef>,
}

impl ClassBuilder {
    /// Start a class definition. The name is the simple name; nesting adds
    /// qualification at registration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            nesting: Nesting::None,
            fields: Vec::new(),
            static_fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
        }
    }

    /// Extend a registered class. Defaults to the root.
    pub fn parent(mut self, class: ClassId) -> Self {
        self.parent = Some(class);
        self
    }

    /// Declare this a static nested class of `enclosing`.
    pub fn nested_in(mut self, enclosing: ClassId) -> Self {
        self.nesting = Nesting::Static(enclosing);
        self
    }

    /// Declare this an inner class of `enclosing`; every constructor gains
    /// the enclosing instance as its leading parameter.
    pub fn inner_of(mut self, enclosing: ClassId) -> Self {
        self.nesting = Nesting::Inner(enclosing);
        self
    }

    /// Declare an instance field. Slots are assigned in declaration order
    /// after the inherited ones.
    pub fn field(
        mut self,
        name: &str,
        ty: TypeTag,
        visibility: Visibility,
        initial: Value,
    ) -> Self {
        self.fields.push(FieldDef::new(name, ty, visibility, initial));
        self
    }

    /// Declare a static field.
    pub fn static_field(
        mut self,
        name: &str,
        ty: TypeTag,
        visibility: Visibility,
        initial: Value,
    ) -> Self {
        self.static_fields
            .push(StaticFieldDef::new(name, ty, visibility, initial));
        self
    }

    /// Declare an instance method.
    pub fn method<F>(
        mut self,
        name: &str,
        params: &[TypeTag],
        ret: TypeTag,
        visibility: Visibility,
        body: F,
    ) -> Self
    where
        F: Fn(&ObjRef, &[Value]) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        self.methods.push(MethodDef::new(
            name,
            params.to_vec(),
            ret,
            visibility,
            MethodBody::Instance(Arc::new(body)),
        ));
        self
    }

    /// Declare a static method.
    pub fn static_method<F>(
        mut self,
        name: &str,
        params: &[TypeTag],
        ret: TypeTag,
        visibility: Visibility,
        body: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        self.methods.push(MethodDef::new(
            name,
            params.to_vec(),
            ret,
            visibility,
            MethodBody::Static(Arc::new(body)),
        ));
        self
    }

    /// Declare a constructor. For inner classes the first parameter must be
    /// the enclosing instance.
    pub fn constructor<F>(mut self, params: &[TypeTag], visibility: Visibility, body: F) -> Self
    where
        F: Fn(&ObjRef, &[Value]) -> Result<(), Thrown> + Send + Sync + 'static,
    {
        self.constructors
            .push(ConstructorDef::new(params.to_vec(), visibility, Arc::new(body)));
        self
    }
}

/// Fluent definition of a capability interface, consumed by
/// [`TypeRegistry::register_interface`].
pub struct InterfaceBuilder {
    name: String,
    extends: Vec<InterfaceId>,
    methods: Vec<MethodSig>,
}

impl InterfaceBuilder {
    /// Start an interface definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Extend a registered interface.
    pub fn extends(mut self, interface: InterfaceId) -> Self {
        self.extends.push(interface);
        self
    }

    /// Declare an abstract method signature.
    pub fn method(mut self, name: &str, params: &[TypeTag], ret: TypeTag) -> Self {
        self.methods.push(MethodSig {
            name: name.to_string(),
            params: params.to_vec(),
            ret,
        });
        self
    }
}
