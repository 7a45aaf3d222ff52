//! Lockpick - reflective access over registered runtime types
//!
//! This crate provides validated, visibility-aware access to a registry of
//! runtime classes and interfaces:
//! - **Registry**: class and interface definitions with a checked access
//!   surface (`registry` module)
//! - **Locators**: member search across inheritance chains that opens
//!   non-public members as a side effect (`locate` module)
//! - **Accessors**: typed handles for fields, methods, constructors, and
//!   classes (`accessor` module)
//! - **Proxies**: capability interfaces bound to a target, resolving
//!   `is`/`get`/`set` naming conventions against its members
//!   (`accessor::proxy`)
//!
//! # Example
//!
//! ```rust,ignore
//! use lockpick::{bind_proxy, ClassBuilder, InterfaceBuilder, Target, TypeRegistry, TypeTag, Value, Visibility};
//!
//! let mut registry = TypeRegistry::new();
//! let vault = registry.register_class(
//!     ClassBuilder::new("Vault")
//!         .field("value", TypeTag::Int, Visibility::Private, Value::Int(41)),
//! )?;
//! let peek = registry.register_interface(
//!     InterfaceBuilder::new("Peek").method("getValue", &[], TypeTag::Int),
//! )?;
//!
//! // Bind the interface to an instance; `getValue` lands on the private
//! // field `value`, opening it.
//! let target = registry.construct(vault, &[])?;
//! let proxy = bind_proxy(peek, Target::Instance(target.as_obj().unwrap().clone()), &registry)?;
//! assert_eq!(proxy.invoke("getValue", &[])?, Value::Int(41));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod accessor;
pub mod error;
pub mod locate;
pub mod object;
pub mod registry;
pub mod value;

pub use accessor::{
    ClassAccessor, ConstructorAccessor, FieldAccessor, MethodAccessor, ProxyAccessor, RenameTable,
    StaticFieldAccessor, Target, VoidMethodAccessor,
};
pub use error::{AccessError, AccessResult, ThrowKind, Thrown};
pub use locate::{
    locate_constructor, locate_field, locate_method, locate_method_by_arity, CtorRef, FieldRef,
    LocatedField, MethodRef, StaticFieldRef,
};
pub use object::{ClassId, InterfaceId, MethodSig, Nesting, Object, Visibility};
pub use registry::{ClassBuilder, InterfaceBuilder, TypeEntry, TypeRegistry, ROOT_CLASS};
pub use value::{ObjRef, TypeTag, Value};

// ============================================================================
// Facade
// ============================================================================

/// Locate an instance field and wrap it in an accessor.
pub fn access_field<'r>(
    name: &str,
    class: ClassId,
    registry: &'r TypeRegistry,
) -> AccessResult<FieldAccessor<'r>> {
    FieldAccessor::new(name, class, registry)
}

/// Locate a field on the target's class and read it once. The name must
/// resolve to an instance field; a static field is `InvalidShape`, same as
/// constructing a [`FieldAccessor`] for it.
pub fn read_field(name: &str, target: &ObjRef, registry: &TypeRegistry) -> AccessResult<Value> {
    let class = target.read().class_id;
    FieldAccessor::new(name, class, registry)?.get(target)
}

/// Locate a static field declared by `class` and wrap it in an accessor.
pub fn access_static_field<'r>(
    name: &str,
    class: ClassId,
    registry: &'r TypeRegistry,
) -> AccessResult<StaticFieldAccessor<'r>> {
    StaticFieldAccessor::new(name, class, registry)
}

/// Locate a method on the target's class and bind it to the target.
pub fn access_method<'r>(
    name: &str,
    target: &ObjRef,
    params: &[TypeTag],
    registry: &'r TypeRegistry,
) -> AccessResult<MethodAccessor<'r>> {
    MethodAccessor::new(name, target, params, registry)
}

/// Locate a method on the target's class whose result will be discarded.
pub fn access_void_method<'r>(
    name: &str,
    target: &ObjRef,
    params: &[TypeTag],
    registry: &'r TypeRegistry,
) -> AccessResult<VoidMethodAccessor<'r>> {
    VoidMethodAccessor::new(name, target, params, registry)
}

/// Resolve a class by qualified name.
pub fn access_class<'r>(name: &str, registry: &'r TypeRegistry) -> AccessResult<ClassAccessor<'r>> {
    ClassAccessor::new(name, registry)
}

/// Resolve a class nested inside `enclosing` by its simple (or dotted)
/// name.
pub fn access_inner_class<'r>(
    enclosing: ClassId,
    name: &str,
    registry: &'r TypeRegistry,
) -> AccessResult<ClassAccessor<'r>> {
    ClassAccessor::of(enclosing, registry)?.for_inner(name)
}

/// Bind a capability interface to a target, resolving every interface
/// method eagerly.
pub fn bind_proxy<'r>(
    interface: InterfaceId,
    target: Target,
    registry: &'r TypeRegistry,
) -> AccessResult<ProxyAccessor<'r>> {
    ProxyAccessor::bind(interface, target, registry)
}

/// Bind a capability interface to a target with interface-to-target name
/// translations.
pub fn bind_proxy_renamed<'r>(
    interface: InterfaceId,
    target: Target,
    renames: &RenameTable,
    registry: &'r TypeRegistry,
) -> AccessResult<ProxyAccessor<'r>> {
    ProxyAccessor::bind_renamed(interface, target, renames, registry)
}
