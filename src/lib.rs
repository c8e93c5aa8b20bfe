//! Declarative, bidirectional transformations from native parser trees into a role-annotated
//! universal tree.
//!
//! Rules are built from [`transform::Op`] shapes that can both match a node and rebuild one,
//! so the same rule describes normalization and its inverse.

pub use crate::errors::{ErrorKind, Result, TransformError};
pub use crate::node::{Node, Object, Value};
pub use crate::role::Role;

pub mod catalog;
pub mod cli;
pub mod driver;
pub mod errors;
pub mod node;
pub mod protocol;
pub mod role;
pub mod transform;
