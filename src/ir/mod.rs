//! Canonical intermediate representation and its consistency checks.

pub mod types;
pub mod validate;

pub use types::*;
pub use validate::{validate_ir, IrValidationError};
