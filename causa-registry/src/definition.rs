use crate::error::RegistryResult;
use crate::validator::ArgumentSchema;
use async_trait::async_trait;
use causa_value::Value;

/// An abstract operation, identified by a unique type name.
///
/// Elsewhere this kind of association is a runtime class bound to its
/// implementations by inheritance; here it is resolved at compile time:
/// `D::NAME` is the registry key, and `D::schema()` is what
/// `validate_arguments` checks argument maps against.
pub trait FunctionDefinition: Send + Sync + 'static {
    /// The definition's unique name within a registry.
    const NAME: &'static str;

    /// The declared argument schema, used by the validator bridge.
    fn schema() -> ArgumentSchema {
        ArgumentSchema::default()
    }
}

/// A concrete realization of a [`FunctionDefinition`], materialized fresh
/// from a caller-supplied argument map for each dispatch.
///
/// `supports` must be side-effect free: it is called once per freshly
/// materialized instance and may read both the instance's own fields
/// (i.e. the call's arguments) and `ctx`.
#[async_trait]
pub trait FunctionImplementation<Ctx>: Send + Sync
where
    Ctx: Send + Sync,
{
    /// Whether this implementation is the right one for `ctx`.
    fn supports(&self, ctx: &Ctx) -> bool;

    /// Executes the implementation.
    async fn call(&self, ctx: &Ctx) -> RegistryResult<Value>;
}

/// Builds a [`FunctionImplementation`] trait object from a raw argument
/// map.
///
/// Implemented generically for any `T: DeserializeOwned +
/// FunctionImplementation<Ctx>` via [`crate::registry::TypedFactory`];
/// most callers never implement this by hand.
pub trait ImplementationFactory<Ctx>: Send + Sync {
    /// Constructs an implementation instance whose fields equal the
    /// corresponding argument keys. Extra keys are not stripped here —
    /// whitelist enforcement is the validator bridge's job
    /// (`validate_arguments`), not materialization's.
    fn build(&self, args: &Value) -> RegistryResult<Box<dyn FunctionImplementation<Ctx>>>;
}
