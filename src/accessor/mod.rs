//! Typed accessor handles over located members.
//!
//! Each accessor locates its member once at construction, opening it as a
//! side effect, and then performs validated access for as long as it lives.
//! All of them borrow the registry they were resolved against.

mod class;
mod field;
mod method;
mod proxy;

pub use class::{ClassAccessor, ConstructorAccessor};
pub use field::{FieldAccessor, StaticFieldAccessor};
pub use method::{MethodAccessor, VoidMethodAccessor};
pub use proxy::{ProxyAccessor, RenameTable, Target};
