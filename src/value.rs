//! Runtime values and the signature type algebra.
//!
//! Members declare their types as [`TypeTag`]s and carry their data as
//! [`Value`]s. The algebra is deliberately small: four value kinds, shared
//! strings, and references to registered classes. There is no numeric
//! widening; `int` does not conform to `float`. Reference kinds (`Str` and
//! `Object`) are nullable, value kinds are not.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::object::{ClassId, Object};

/// Shared handle to a heap object.
pub type ObjRef = Arc<RwLock<Object>>;

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent reference.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit float.
    Float(f64),
    /// Shared immutable string.
    Str(Arc<str>),
    /// Reference to a registered object.
    Obj(ObjRef),
}

impl Value {
    /// Build a string value from anything string-like.
    pub fn str(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    /// Wrap a freshly built object into a shared reference value.
    pub fn obj(object: Object) -> Self {
        Value::Obj(Arc::new(RwLock::new(object)))
    }

    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Extract a boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract an integer, if this is one.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract a float, if this is one.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Borrow the string contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the object handle, if this is an object.
    pub fn as_obj(&self) -> Option<&ObjRef> {
        match self {
            Value::Obj(o) => Some(o),
            _ => None,
        }
    }

    /// Short name of the value's kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Obj(_) => "object",
        }
    }
}

impl PartialEq for Value {
    /// Structural equality for primitives, identity for object references.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Obj(a), Value::Obj(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

/// Declared type of a field, parameter, or return slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// No value; only meaningful as a return type.
    Unit,
    /// Boolean.
    Bool,
    /// 32-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// Shared string.
    Str,
    /// Instance of the given class or any subclass.
    Object(ClassId),
}

impl TypeTag {
    /// True for nullable reference types.
    pub fn is_reference(&self) -> bool {
        matches!(self, TypeTag::Str | TypeTag::Object(_))
    }
}
