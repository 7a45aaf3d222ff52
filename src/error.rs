//! Error types for the access toolkit.
//!
//! Every toolkit operation reports failure through [`AccessError`]; library
//! code never panics. Failures raised by target code (method and constructor
//! bodies) are carried as a [`Thrown`] payload so the original cause stays
//! inspectable after the uniform wrapping.

use std::fmt;

/// Result type used throughout the toolkit.
pub type AccessResult<T> = Result<T, AccessError>;

/// Classification of a failure raised by target code.
///
/// The three-way split mirrors the usual runtime taxonomy: ordinary
/// unchecked failures, fatal errors, and declared (checked) failures.
/// The kind survives [`AccessError::TargetFailure`] wrapping verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrowKind {
    /// Ordinary unchecked runtime failure.
    Unchecked,
    /// Fatal error that target code is not expected to recover from.
    Fatal,
    /// Declared, checked failure.
    Checked,
}

/// A failure raised by a method or constructor body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thrown {
    /// Failure classification.
    pub kind: ThrowKind,
    /// Failure type name, e.g. `"TestFailure"`.
    pub name: String,
    /// Human-readable message.
    pub message: String,
}

impl Thrown {
    /// Create an unchecked failure.
    pub fn unchecked(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ThrowKind::Unchecked,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a fatal failure.
    pub fn fatal(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ThrowKind::Fatal,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a checked failure.
    pub fn checked(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ThrowKind::Checked,
            name: name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Errors produced by locators, accessors, the registry, and the binder.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AccessError {
    /// The named member does not exist on the class or any superclass
    /// below the root.
    #[error("no such member: {class}::{member}")]
    MemberNotFound {
        /// Class the search started from.
        class: String,
        /// Member name, with parameter types for methods and constructors.
        member: String,
    },

    /// No class or interface is registered under this name.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// Proxy binding failed for one interface method.
    #[error("cannot bind {interface}::{method}: {reason}")]
    Binding {
        /// Interface being bound.
        interface: String,
        /// Interface method that failed to resolve.
        method: String,
        /// Why resolution failed.
        reason: String,
    },

    /// A request was malformed for the member it named: wrong member kind,
    /// wrong nesting kind, or a class where an interface was required.
    #[error("{0}")]
    InvalidShape(String),

    /// The member exists but has not been opened by a locator and is not
    /// public.
    #[error("member {class}::{member} is not accessible")]
    NotAccessible {
        /// Declaring class.
        class: String,
        /// Member name.
        member: String,
    },

    /// A required argument was null.
    #[error("{0} must not be null")]
    NullArgument(String),

    /// A value did not conform to a declared type, or an argument list did
    /// not match a signature.
    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        /// What the declaration requires.
        expected: String,
        /// What the caller supplied.
        found: String,
    },

    /// Target code raised a failure; the cause is preserved.
    #[error("target raised: {0}")]
    TargetFailure(Thrown),
}
