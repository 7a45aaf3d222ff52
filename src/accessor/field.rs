//! Direct accessors for instance and static fields.

use crate::error::{AccessError, AccessResult};
use crate::locate::{locate_field, FieldRef, LocatedField, StaticFieldRef};
use crate::object::ClassId;
use crate::registry::TypeRegistry;
use crate::value::{ObjRef, Value};

/// Accessor for one instance field, located once and reused.
///
/// The field may be declared anywhere on the chain below the root and with
/// any visibility; location opens it.
#[derive(Debug, Clone)]
pub struct FieldAccessor<'r> {
    registry: &'r TypeRegistry,
    field: FieldRef,
}

impl<'r> FieldAccessor<'r> {
    /// Locate `name` on `class` or an ancestor below the root. A name that
    /// resolves to a static field is `InvalidShape`.
    pub fn new(name: &str, class: ClassId, registry: &'r TypeRegistry) -> AccessResult<Self> {
        match locate_field(registry, class, name)? {
            LocatedField::Instance(field) => Ok(Self { registry, field }),
            LocatedField::Static(_) => Err(AccessError::InvalidShape(format!(
                "field `{name}` is static; use a static field accessor"
            ))),
        }
    }

    /// Read the field from `target`, which must be an instance of the
    /// declaring class or a subclass.
    pub fn get(&self, target: &ObjRef) -> AccessResult<Value> {
        self.field.get(self.registry, target)
    }

    /// Write the field on `target`. The value must conform to the declared
    /// type.
    pub fn set(&self, target: &ObjRef, value: Value) -> AccessResult<()> {
        self.field.set(self.registry, target, value)
    }
}

/// Accessor for one static field.
///
/// Unlike instance fields, a static field must be declared by exactly the
/// class it is requested on; the chain is not searched on the declaring
/// side.
#[derive(Debug, Clone)]
pub struct StaticFieldAccessor<'r> {
    registry: &'r TypeRegistry,
    field: StaticFieldRef,
}

impl<'r> StaticFieldAccessor<'r> {
    /// Locate static field `name` declared by `class` itself.
    pub fn new(name: &str, class: ClassId, registry: &'r TypeRegistry) -> AccessResult<Self> {
        match locate_field(registry, class, name)? {
            LocatedField::Static(field) => {
                if field.declaring() != class {
                    return Err(AccessError::InvalidShape(format!(
                        "static field `{name}` is not declared by `{}`",
                        registry.class_name(class)
                    )));
                }
                Ok(Self { registry, field })
            }
            LocatedField::Instance(_) => Err(AccessError::InvalidShape(format!(
                "field `{name}` is not static"
            ))),
        }
    }

    /// Read the current value.
    pub fn get(&self) -> AccessResult<Value> {
        self.field.get(self.registry)
    }

    /// Overwrite the value. It must conform to the declared type.
    pub fn set(&self, value: Value) -> AccessResult<()> {
        self.field.set(self.registry, value)
    }
}
