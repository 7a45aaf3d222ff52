//! Class resolution and constructor access.

use crate::accessor::proxy::{ProxyAccessor, RenameTable, Target};
use crate::error::{AccessError, AccessResult};
use crate::locate::{locate_constructor, CtorRef};
use crate::object::{ClassId, InterfaceId, Nesting};
use crate::registry::{TypeEntry, TypeRegistry};
use crate::value::{ObjRef, TypeTag, Value};

/// Accessor for a registered class, resolved by name.
#[derive(Debug, Clone)]
pub struct ClassAccessor<'r> {
    registry: &'r TypeRegistry,
    class: ClassId,
}

impl<'r> ClassAccessor<'r> {
    /// Resolve a class by qualified name. Dots are accepted as nesting
    /// separators and normalized to `::`. A name registered as an
    /// interface is `InvalidShape`, not a miss.
    pub fn new(name: &str, registry: &'r TypeRegistry) -> AccessResult<Self> {
        let normalized = name.replace('.', "::");
        match registry.lookup(&normalized) {
            Some(TypeEntry::Class(class)) => Ok(Self { registry, class }),
            Some(TypeEntry::Interface(_)) => Err(AccessError::InvalidShape(format!(
                "`{name}` is an interface, not a class"
            ))),
            None => Err(AccessError::UnknownType(name.to_string())),
        }
    }

    /// Wrap an already-resolved class ID.
    pub fn of(class: ClassId, registry: &'r TypeRegistry) -> AccessResult<Self> {
        registry.class_ref(class)?;
        Ok(Self { registry, class })
    }

    /// The accessed class.
    pub fn accessed_class(&self) -> ClassId {
        self.class
    }

    /// Resolve a class nested inside this one. `name` may itself be a
    /// dotted path of nested classes.
    pub fn for_inner(&self, name: &str) -> AccessResult<ClassAccessor<'r>> {
        let outer = self.registry.class_ref(self.class)?;
        let qualified = format!("{}::{}", outer.name, name.replace('.', "::"));
        ClassAccessor::new(&qualified, self.registry)
    }

    /// Locate a constructor by exact parameter types, opening it as a side
    /// effect. Inner classes cannot be built this way; bind an enclosing
    /// instance instead.
    pub fn constructor(&self, params: &[TypeTag]) -> AccessResult<ConstructorAccessor<'r>> {
        let def = self.registry.class_ref(self.class)?;
        if def.nesting.is_inner() {
            return Err(AccessError::InvalidShape(format!(
                "`{}` is an inner class; its constructors need an enclosing instance",
                def.name
            )));
        }
        let ctor = locate_constructor(self.registry, self.class, params)?;
        Ok(ConstructorAccessor {
            registry: self.registry,
            ctor,
            enclosing: None,
        })
    }

    /// Locate an inner-class constructor and bind the enclosing instance
    /// it will build against. `params` excludes the enclosing instance,
    /// which is prepended automatically.
    pub fn constructor_with_enclosing(
        &self,
        enclosing: &Value,
        params: &[TypeTag],
    ) -> AccessResult<ConstructorAccessor<'r>> {
        let def = self.registry.class_ref(self.class)?;
        let Nesting::Inner(enclosing_class) = def.nesting else {
            return Err(AccessError::InvalidShape(format!(
                "`{}` is not an inner class",
                def.name
            )));
        };
        if enclosing.is_null() {
            return Err(AccessError::NullArgument("enclosing instance".to_string()));
        }
        if !self
            .registry
            .value_conforms(enclosing, TypeTag::Object(enclosing_class))
        {
            return Err(AccessError::InvalidShape(format!(
                "enclosing instance is not a `{}`",
                self.registry.class_name(enclosing_class)
            )));
        }
        let mut full = Vec::with_capacity(params.len() + 1);
        full.push(TypeTag::Object(enclosing_class));
        full.extend_from_slice(params);
        let ctor = locate_constructor(self.registry, self.class, &full)?;
        Ok(ConstructorAccessor {
            registry: self.registry,
            ctor,
            enclosing: Some(enclosing.clone()),
        })
    }
}

/// Accessor for one located constructor, optionally carrying a bound
/// enclosing instance that is prepended to every argument list.
#[derive(Debug, Clone)]
pub struct ConstructorAccessor<'r> {
    registry: &'r TypeRegistry,
    ctor: CtorRef,
    enclosing: Option<Value>,
}

impl<'r> ConstructorAccessor<'r> {
    fn build(&self, args: &[Value]) -> AccessResult<ObjRef> {
        match &self.enclosing {
            Some(enclosing) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(enclosing.clone());
                full.extend_from_slice(args);
                self.ctor.construct_raw(self.registry, &full)
            }
            None => self.ctor.construct_raw(self.registry, args),
        }
    }

    /// Build an instance. A failure raised by the constructor body comes
    /// back as `TargetFailure` with its cause intact.
    pub fn new_instance(&self, args: &[Value]) -> AccessResult<Value> {
        Ok(Value::Obj(self.build(args)?))
    }

    /// Build an instance and bind it to a capability interface.
    pub fn new_proxy(
        &self,
        interface: InterfaceId,
        args: &[Value],
    ) -> AccessResult<ProxyAccessor<'r>> {
        let instance = self.build(args)?;
        ProxyAccessor::bind(interface, Target::Instance(instance), self.registry)
    }

    /// Build an instance and bind it to a capability interface with a
    /// rename table.
    pub fn new_proxy_renamed(
        &self,
        interface: InterfaceId,
        renames: &RenameTable,
        args: &[Value],
    ) -> AccessResult<ProxyAccessor<'r>> {
        let instance = self.build(args)?;
        ProxyAccessor::bind_renamed(interface, Target::Instance(instance), renames, self.registry)
    }
}
