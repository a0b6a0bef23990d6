//! Polymorphic function registry: associates named function definitions
//! with one or more implementations, selected at call time by a
//! `supports(context)` predicate, plus the validator bridge that checks
//! argument maps against a declared schema.

mod definition;
mod error;
mod registry;
mod validator;

pub use definition::{FunctionDefinition, FunctionImplementation, ImplementationFactory};
pub use error::{RegistryError, RegistryResult};
pub use registry::{FunctionDefinitionMeta, FunctionRegistry};
pub use validator::{validate, ArgumentSchema, ConstraintKind, FieldConstraint};
