//! Direct accessors for methods, bound to one receiver.

use crate::error::AccessResult;
use crate::locate::{locate_method, MethodRef};
use crate::registry::TypeRegistry;
use crate::value::{ObjRef, TypeTag, Value};

/// Accessor for one method on one receiver, located once and reused.
#[derive(Debug, Clone)]
pub struct MethodAccessor<'r> {
    registry: &'r TypeRegistry,
    target: ObjRef,
    method: MethodRef,
}

impl<'r> MethodAccessor<'r> {
    /// Locate `name` with exact parameter types on the target's class or
    /// an ancestor below the root, opening it as a side effect.
    pub fn new(
        name: &str,
        target: &ObjRef,
        params: &[TypeTag],
        registry: &'r TypeRegistry,
    ) -> AccessResult<Self> {
        let class = target.read().class_id;
        let method = locate_method(registry, class, name, params)?;
        Ok(Self {
            registry,
            target: target.clone(),
            method,
        })
    }

    /// Invoke on the bound receiver. A failure raised by the body comes
    /// back as `TargetFailure` with its cause intact.
    pub fn invoke(&self, args: &[Value]) -> AccessResult<Value> {
        self.method.invoke(self.registry, Some(&self.target), args)
    }
}

/// Accessor for one method on one receiver whose result is discarded.
#[derive(Debug, Clone)]
pub struct VoidMethodAccessor<'r> {
    inner: MethodAccessor<'r>,
}

impl<'r> VoidMethodAccessor<'r> {
    /// Locate `name` with exact parameter types on the target's class or
    /// an ancestor below the root.
    pub fn new(
        name: &str,
        target: &ObjRef,
        params: &[TypeTag],
        registry: &'r TypeRegistry,
    ) -> AccessResult<Self> {
        Ok(Self {
            inner: MethodAccessor::new(name, target, params, registry)?,
        })
    }

    /// Invoke on the bound receiver, discarding any result.
    pub fn invoke(&self, args: &[Value]) -> AccessResult<()> {
        self.inner.invoke(args).map(|_| ())
    }
}
