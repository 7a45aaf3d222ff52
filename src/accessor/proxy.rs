//! Capability-interface proxy binding.
//!
//! The binder takes a registered interface and a target and resolves every
//! interface method to a member of the target's class, eagerly and
//! all-or-nothing. Method names following the `is`/`get`/`set` naming
//! conventions may land on fields; everything else must land on a method.
//!
//! Resolution of one interface method, in order:
//!
//! 1. The method name is translated through the rename table, if any.
//! 2. The method's shape is classified from its original name and
//!    signature. A convention prefix counts only when followed by a
//!    non-empty rest starting uppercase: `izzy`, `issue`, and a bare `get`
//!    are all direct calls. A prefixed name with the wrong signature for
//!    its shape aborts the bind.
//! 3. A method candidate is searched first: for convention shapes the
//!    nearest method with the translated name, the shape's arity, and a
//!    compatible type; when no such method exists the search falls through
//!    to the field candidate. Direct calls match on exact parameter types
//!    and have no fallback.
//! 4. The field candidate's name is derived by stripping the prefix and
//!    decapitalizing the rest, then translated through the rename table
//!    again. A name-matching field with an incompatible type is a binding
//!    error, never skipped.
//! 5. The resolved member's kind must match the target: class targets
//!    bind only static members, instance targets only instance members.
//!
//! Any failure aborts the whole bind. A successfully bound proxy has no
//! resolution left to fail at call time; its calls fail only for bad
//! arguments or failures raised by the target itself.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::{AccessError, AccessResult};
use crate::locate::{find_field_from, find_method_from, LocatedField, MethodRef};
use crate::object::{ClassId, InterfaceId, MethodSig};
use crate::registry::TypeRegistry;
use crate::value::{ObjRef, TypeTag, Value};

/// What a proxy is bound against.
#[derive(Debug, Clone)]
pub enum Target {
    /// A live instance; binds instance members of its class.
    Instance(ObjRef),
    /// A class; binds static members only.
    Static(ClassId),
}

impl Target {
    /// Class whose members are searched.
    pub fn class_id(&self) -> ClassId {
        match self {
            Target::Instance(obj) => obj.read().class_id,
            Target::Static(class) => *class,
        }
    }

    /// True when only static members may be bound.
    pub fn is_static(&self) -> bool {
        matches!(self, Target::Static(_))
    }
}

/// Interface-name to target-name translations applied during binding.
///
/// A translation applies twice: once to the interface method name before
/// the member search, and once more to the field name derived from a
/// convention-shaped method.
#[derive(Debug, Clone, Default)]
pub struct RenameTable {
    map: FxHashMap<String, String>,
}

impl RenameTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a translation.
    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.map.insert(from.into(), to.into());
        self
    }

    /// Translate a name, returning it unchanged when absent.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.map.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Number of translations.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no translations are present.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ============================================================================
// Shape classification
// ============================================================================

/// Conventional shape of an interface method, classified from its original
/// name and signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// `is<Rest>()` returning bool; may bind a bool field.
    Predicate,
    /// `get<Rest>()` returning a value; may bind a field.
    Getter,
    /// `set<Rest>(value)`; may bind a field.
    Setter,
    /// Anything else; binds a method only.
    Direct,
}

/// Split a convention prefix off `name`. The prefix counts only when the
/// rest is non-empty and starts uppercase.
fn convention_rest<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = name.strip_prefix(prefix)?;
    let first = rest.chars().next()?;
    first.is_uppercase().then_some(rest)
}

/// Lowercase the first character, the conventional property-name form.
fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Classify an interface method, rejecting prefixed names whose signature
/// does not fit the shape the prefix announces.
fn classify(registry: &TypeRegistry, sig: &MethodSig) -> Result<Shape, String> {
    if convention_rest(&sig.name, "is").is_some() {
        if !sig.params.is_empty() {
            return Err(format!("predicate `{}` must take no parameters", sig.name));
        }
        if sig.ret != TypeTag::Bool {
            return Err(format!(
                "predicate `{}` must return bool, not {}",
                sig.name,
                registry.type_name(sig.ret)
            ));
        }
        return Ok(Shape::Predicate);
    }
    if convention_rest(&sig.name, "get").is_some() {
        if !sig.params.is_empty() {
            return Err(format!("getter `{}` must take no parameters", sig.name));
        }
        if sig.ret == TypeTag::Unit {
            return Err(format!("getter `{}` must return a value", sig.name));
        }
        return Ok(Shape::Getter);
    }
    if convention_rest(&sig.name, "set").is_some() {
        if sig.params.len() != 1 {
            return Err(format!(
                "setter `{}` must take exactly one parameter",
                sig.name
            ));
        }
        return Ok(Shape::Setter);
    }
    Ok(Shape::Direct)
}

// ============================================================================
// Binding resolution
// ============================================================================

/// How one bound interface method reaches the target.
#[derive(Debug, Clone)]
enum BindingKind {
    /// Read a field.
    GetField(LocatedField),
    /// Write a field and yield `Null`.
    SetField(LocatedField),
    /// Invoke a method.
    Invoke(MethodRef),
}

/// One bound interface method.
#[derive(Debug, Clone)]
struct Binding {
    sig: MethodSig,
    kind: BindingKind,
}

/// A member producing `from` satisfies an interface slot declared `to`.
/// A unit interface return accepts any member and discards the value.
fn ret_compatible(registry: &TypeRegistry, from: TypeTag, to: TypeTag) -> bool {
    to == TypeTag::Unit || registry.is_assignable(from, to)
}

/// Reject members whose kind contradicts the target.
fn check_kind(target: &Target, member_is_static: bool, what: &str) -> Result<(), String> {
    if target.is_static() && !member_is_static {
        Err(format!("{what} is not static but the target is a class"))
    } else if !target.is_static() && member_is_static {
        Err(format!("{what} is static but the target is an instance"))
    } else {
        Ok(())
    }
}

/// Field name a convention-shaped method falls back to.
fn derived_field_name(target_name: &str, prefix: &str, renames: &RenameTable) -> String {
    let base = match convention_rest(target_name, prefix) {
        Some(rest) => decapitalize(rest),
        None => target_name.to_string(),
    };
    renames.resolve(&base).to_string()
}

/// Resolve one interface method to a member of the target's class,
/// returning the access mode or the reason binding is impossible.
fn resolve_binding(
    registry: &TypeRegistry,
    target: &Target,
    renames: &RenameTable,
    sig: &MethodSig,
) -> Result<BindingKind, String> {
    let shape = classify(registry, sig)?;
    let target_name = renames.resolve(&sig.name);
    match shape {
        Shape::Predicate => resolve_accessor(registry, target, renames, sig, target_name, "is"),
        Shape::Getter => resolve_accessor(registry, target, renames, sig, target_name, "get"),
        Shape::Setter => resolve_setter(registry, target, renames, sig, target_name),
        Shape::Direct => resolve_direct(registry, target, sig, target_name),
    }
}

/// Select a found method: kind-check it against the target and open it.
/// A wrong-kind member is terminal, never skipped.
fn bind_method(
    registry: &TypeRegistry,
    target: &Target,
    method: MethodRef,
    target_name: &str,
) -> Result<BindingKind, String> {
    let Some(def) = method.def(registry) else {
        return Err(format!("method `{target_name}` could not be resolved"));
    };
    check_kind(target, def.is_static(), &format!("method `{target_name}`"))?;
    method.open(registry);
    Ok(BindingKind::Invoke(method))
}

/// Resolve a predicate or getter: nearest zero-argument method with a
/// compatible return first, bool or assignable field second. A method
/// whose name matches but whose type does not falls through to the field.
fn resolve_accessor(
    registry: &TypeRegistry,
    target: &Target,
    renames: &RenameTable,
    sig: &MethodSig,
    target_name: &str,
    prefix: &str,
) -> Result<BindingKind, String> {
    let class = target.class_id();
    if let Some(method) = find_method_from(registry, class, target_name, false, |m| {
        m.params.is_empty() && ret_compatible(registry, m.ret, sig.ret)
    }) {
        return bind_method(registry, target, method, target_name);
    }

    let field_name = derived_field_name(target_name, prefix, renames);
    let Some(field) = find_field_from(registry, class, &field_name, false) else {
        return Err(format!(
            "no zero-argument method `{target_name}` or field `{field_name}` on `{}`",
            registry.class_name(class)
        ));
    };
    check_kind(
        target,
        matches!(field, LocatedField::Static(_)),
        &format!("field `{field_name}`"),
    )?;
    let Some(field_ty) = field.ty(registry) else {
        return Err(format!("field `{field_name}` could not be resolved"));
    };
    if !registry.is_assignable(field_ty, sig.ret) {
        return Err(format!(
            "field `{field_name}` has type {}, interface wants {}",
            registry.type_name(field_ty),
            registry.type_name(sig.ret)
        ));
    }
    field.open(registry);
    Ok(BindingKind::GetField(field))
}

/// Resolve a setter: nearest one-argument method accepting the supplied
/// type first, assignable field second. Overloads sharing the name and
/// arity are tried in declaration order. A field-backed setter must
/// declare a unit return.
fn resolve_setter(
    registry: &TypeRegistry,
    target: &Target,
    renames: &RenameTable,
    sig: &MethodSig,
    target_name: &str,
) -> Result<BindingKind, String> {
    let Some(&value_ty) = sig.params.first() else {
        return Err(format!(
            "setter `{}` must take exactly one parameter",
            sig.name
        ));
    };
    let class = target.class_id();
    if let Some(method) = find_method_from(registry, class, target_name, false, |m| {
        m.params.len() == 1
            && m.params
                .first()
                .is_some_and(|&p| registry.is_assignable(value_ty, p))
            && ret_compatible(registry, m.ret, sig.ret)
    }) {
        return bind_method(registry, target, method, target_name);
    }

    let field_name = derived_field_name(target_name, "set", renames);
    let Some(field) = find_field_from(registry, class, &field_name, false) else {
        return Err(format!(
            "no one-argument method `{target_name}` or field `{field_name}` on `{}`",
            registry.class_name(class)
        ));
    };
    check_kind(
        target,
        matches!(field, LocatedField::Static(_)),
        &format!("field `{field_name}`"),
    )?;
    if sig.ret != TypeTag::Unit {
        return Err(format!(
            "field-backed setter `{}` must return unit, not {}",
            sig.name,
            registry.type_name(sig.ret)
        ));
    }
    let Some(field_ty) = field.ty(registry) else {
        return Err(format!("field `{field_name}` could not be resolved"));
    };
    if !registry.is_assignable(value_ty, field_ty) {
        return Err(format!(
            "field `{field_name}` has type {}, setter supplies {}",
            registry.type_name(field_ty),
            registry.type_name(value_ty)
        ));
    }
    field.open(registry);
    Ok(BindingKind::SetField(field))
}

/// Resolve a direct call: a method with the translated name and exactly
/// the interface parameter types. No field fallback.
fn resolve_direct(
    registry: &TypeRegistry,
    target: &Target,
    sig: &MethodSig,
    target_name: &str,
) -> Result<BindingKind, String> {
    let class = target.class_id();
    let Some(method) = find_method_from(registry, class, target_name, false, |m| {
        m.params == sig.params
    }) else {
        return Err(format!(
            "no method `{}({})` on `{}`",
            target_name,
            registry.render_params(&sig.params),
            registry.class_name(class)
        ));
    };
    let Some(def) = method.def(registry) else {
        return Err(format!("method `{target_name}` could not be resolved"));
    };
    if !ret_compatible(registry, def.ret, sig.ret) {
        return Err(format!(
            "method `{target_name}` returns {}, interface wants {}",
            registry.type_name(def.ret),
            registry.type_name(sig.ret)
        ));
    }
    check_kind(target, def.is_static(), &format!("method `{target_name}`"))?;
    method.open(registry);
    Ok(BindingKind::Invoke(method))
}

// ============================================================================
// Proxy accessor
// ============================================================================

/// A capability interface bound to a target.
///
/// Construction resolves every interface method eagerly; a proxy that
/// exists is fully bound. Calls are dispatched by interface method name
/// with overloads selected by argument conformance.
pub struct ProxyAccessor<'r> {
    registry: &'r TypeRegistry,
    interface: InterfaceId,
    target: Target,
    bindings: Vec<Binding>,
    by_name: FxHashMap<String, Vec<usize>>,
}

impl<'r> ProxyAccessor<'r> {
    /// Bind `interface` against `target` with no renames.
    pub fn bind(
        interface: InterfaceId,
        target: Target,
        registry: &'r TypeRegistry,
    ) -> AccessResult<Self> {
        let renames = RenameTable::new();
        Self::bind_with(interface, target, &renames, registry)
    }

    /// Bind `interface` against `target`, translating names through
    /// `renames`.
    pub fn bind_renamed(
        interface: InterfaceId,
        target: Target,
        renames: &RenameTable,
        registry: &'r TypeRegistry,
    ) -> AccessResult<Self> {
        Self::bind_with(interface, target, renames, registry)
    }

    fn bind_with(
        interface: InterfaceId,
        target: Target,
        renames: &RenameTable,
        registry: &'r TypeRegistry,
    ) -> AccessResult<Self> {
        let iface_name = registry
            .interface(interface)
            .ok_or_else(|| AccessError::UnknownType(format!("interface #{interface}")))?
            .name
            .clone();
        registry.class_ref(target.class_id())?;

        let sigs = registry.flattened_methods(interface)?;
        let mut bindings = Vec::with_capacity(sigs.len());
        let mut by_name: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for sig in sigs {
            let kind = resolve_binding(registry, &target, renames, &sig).map_err(|reason| {
                AccessError::Binding {
                    interface: iface_name.clone(),
                    method: sig.name.clone(),
                    reason,
                }
            })?;
            by_name
                .entry(sig.name.clone())
                .or_default()
                .push(bindings.len());
            bindings.push(Binding { sig, kind });
        }
        Ok(Self {
            registry,
            interface,
            target,
            bindings,
            by_name,
        })
    }

    /// Interface this proxy implements.
    pub fn interface(&self) -> InterfaceId {
        self.interface
    }

    /// Target this proxy is bound to.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Number of bound interface methods.
    pub fn method_count(&self) -> usize {
        self.bindings.len()
    }

    /// Invoke an interface method by name. Overloads are tried in the
    /// interface's flattened order; the first whose parameters accept the
    /// arguments wins. Unit-returning interface methods yield `Null`.
    pub fn invoke(&self, name: &str, args: &[Value]) -> AccessResult<Value> {
        let Some(indexes) = self.by_name.get(name) else {
            return Err(AccessError::MemberNotFound {
                class: self.interface_name(),
                member: name.to_string(),
            });
        };
        for &idx in indexes {
            let binding = &self.bindings[idx];
            if self.registry.args_conform(&binding.sig.params, args) {
                return self.dispatch(binding, args);
            }
        }
        Err(AccessError::TypeMismatch {
            expected: format!("arguments matching an overload of `{name}`"),
            found: format!("({})", self.registry.render_args(args)),
        })
    }

    /// Invoke an interface method and discard its result.
    pub fn invoke_void(&self, name: &str, args: &[Value]) -> AccessResult<()> {
        self.invoke(name, args).map(|_| ())
    }

    fn interface_name(&self) -> String {
        self.registry
            .interface(self.interface)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| format!("interface #{}", self.interface))
    }

    fn dispatch(&self, binding: &Binding, args: &[Value]) -> AccessResult<Value> {
        match &binding.kind {
            BindingKind::Invoke(method) => {
                let receiver = match &self.target {
                    Target::Instance(obj) => Some(obj),
                    Target::Static(_) => None,
                };
                let value = method.invoke(self.registry, receiver, args)?;
                // a unit interface slot discards whatever the member returned
                Ok(if binding.sig.ret == TypeTag::Unit {
                    Value::Null
                } else {
                    value
                })
            }
            BindingKind::GetField(field) => self.field_get(field),
            BindingKind::SetField(field) => {
                let Some(value) = args.first() else {
                    return Err(AccessError::TypeMismatch {
                        expected: "a value to assign".to_string(),
                        found: "no arguments".to_string(),
                    });
                };
                self.field_set(field, value.clone())?;
                Ok(Value::Null)
            }
        }
    }

    fn field_get(&self, field: &LocatedField) -> AccessResult<Value> {
        match (field, &self.target) {
            (LocatedField::Static(f), _) => f.get(self.registry),
            (LocatedField::Instance(f), Target::Instance(obj)) => f.get(self.registry, obj),
            // binding-time kind checks keep instance fields away from
            // class targets
            (LocatedField::Instance(_), Target::Static(class)) => {
                Err(bad_instance_binding(self.registry, *class))
            }
        }
    }

    fn field_set(&self, field: &LocatedField, value: Value) -> AccessResult<()> {
        match (field, &self.target) {
            (LocatedField::Static(f), _) => f.set(self.registry, value),
            (LocatedField::Instance(f), Target::Instance(obj)) => f.set(self.registry, obj, value),
            (LocatedField::Instance(_), Target::Static(class)) => {
                Err(bad_instance_binding(self.registry, *class))
            }
        }
    }
}

fn bad_instance_binding(registry: &TypeRegistry, class: ClassId) -> AccessError {
    AccessError::TypeMismatch {
        expected: "an instance target".to_string(),
        found: format!("class {}", registry.class_name(class)),
    }
}

impl fmt::Debug for ProxyAccessor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyAccessor")
            .field("interface", &self.interface_name())
            .field(
                "target_class",
                &self.registry.class_name(self.target.class_id()),
            )
            .field("static", &self.target.is_static())
            .field("methods", &self.bindings.len())
            .finish()
    }
}
