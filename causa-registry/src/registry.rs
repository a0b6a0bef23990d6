use crate::definition::{FunctionDefinition, FunctionImplementation, ImplementationFactory};
use crate::error::{RegistryError, RegistryResult};
use crate::validator::{self, ArgumentSchema};
use causa_value::Value;
use serde::de::DeserializeOwned;
use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

/// Snapshot metadata about a registered function, returned by
/// [`FunctionRegistry::get_definitions`].
#[derive(Debug, Clone)]
pub struct FunctionDefinitionMeta {
    /// The definition's unique name.
    pub name: String,
    /// The declared argument schema.
    pub schema: ArgumentSchema,
}

struct RegisteredFunction<Ctx> {
    definition_type: TypeId,
    schema: ArgumentSchema,
    implementations: Vec<Arc<dyn ImplementationFactory<Ctx>>>,
}

/// Materializes `T` (an implementation type) from a raw argument map via
/// `serde`, bridging [`causa_value::Value`] through `serde_json::Value`
/// the way the rest of the workspace converts between value
/// representations.
struct TypedFactory<T>(PhantomData<T>);

impl<T> TypedFactory<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self(PhantomData))
    }
}

impl<Ctx, T> ImplementationFactory<Ctx> for TypedFactory<T>
where
    Ctx: Send + Sync,
    T: DeserializeOwned + FunctionImplementation<Ctx> + 'static,
{
    fn build(&self, args: &Value) -> RegistryResult<Box<dyn FunctionImplementation<Ctx>>> {
        let json = serde_json::to_value(args).map_err(|source| RegistryError::Materialization {
            definition: std::any::type_name::<T>().to_string(),
            source,
        })?;
        let instance: T = serde_json::from_value(json).map_err(|source| RegistryError::Materialization {
            definition: std::any::type_name::<T>().to_string(),
            source,
        })?;
        Ok(Box::new(instance))
    }
}

/// Maps operation names to a definition plus a set of implementations,
/// selecting and dispatching by a runtime `supports(context)` predicate.
pub struct FunctionRegistry<Ctx> {
    functions: HashMap<String, RegisteredFunction<Ctx>>,
}

impl<Ctx> Default for FunctionRegistry<Ctx> {
    fn default() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }
}

impl<Ctx> FunctionRegistry<Ctx>
where
    Ctx: Send + Sync,
{
    /// Builds an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an implementation `T` under definition `D`. Fails with
    /// [`RegistryError::FunctionDefinitionDoesNotMatch`] if `D::NAME` was
    /// previously registered under a different definition type.
    pub fn register<D, T>(&mut self) -> RegistryResult<()>
    where
        D: FunctionDefinition,
        T: DeserializeOwned + FunctionImplementation<Ctx> + 'static,
    {
        let type_id = TypeId::of::<D>();
        match self.functions.get_mut(D::NAME) {
            Some(entry) if entry.definition_type == type_id => {
                entry.implementations.push(TypedFactory::<T>::new());
            }
            Some(_) => {
                return Err(RegistryError::FunctionDefinitionDoesNotMatch {
                    name: D::NAME.to_string(),
                })
            }
            None => {
                self.functions.insert(
                    D::NAME.to_string(),
                    RegisteredFunction {
                        definition_type: type_id,
                        schema: D::schema(),
                        implementations: vec![TypedFactory::<T>::new()],
                    },
                );
            }
        }
        trace!(name = D::NAME, "registered function implementation");
        Ok(())
    }

    /// A snapshot of every registered definition.
    pub fn get_definitions(&self) -> Vec<FunctionDefinitionMeta> {
        self.functions
            .iter()
            .map(|(name, f)| FunctionDefinitionMeta {
                name: name.clone(),
                schema: f.schema.clone(),
            })
            .collect()
    }

    /// Materializes every implementation registered under `name` with
    /// `args`, returning the ones whose `supports(ctx)` returns `true`,
    /// in registration order.
    pub fn get_implementations(
        &self,
        name: &str,
        args: &Value,
        ctx: &Ctx,
    ) -> RegistryResult<Vec<Box<dyn FunctionImplementation<Ctx>>>> {
        let entry = self.functions.get(name).ok_or_else(|| RegistryError::NoImplementationFound {
            definition: name.to_string(),
        })?;
        let mut supporting = Vec::new();
        for factory in &entry.implementations {
            let instance = factory.build(args)?;
            if instance.supports(ctx) {
                supporting.push(instance);
            }
        }
        Ok(supporting)
    }

    /// Asserts exactly one implementation supports `ctx`.
    pub fn get_implementation(
        &self,
        name: &str,
        args: &Value,
        ctx: &Ctx,
    ) -> RegistryResult<Box<dyn FunctionImplementation<Ctx>>> {
        let mut matches = self.get_implementations(name, args, ctx)?;
        match matches.len() {
            0 => Err(RegistryError::NoImplementationFound {
                definition: name.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            _ => Err(RegistryError::TooManyImplementations {
                definition: name.to_string(),
            }),
        }
    }

    /// Equivalent to `get_implementation(...).call(ctx)`.
    pub async fn call(&self, name: &str, args: &Value, ctx: &Ctx) -> RegistryResult<Value> {
        let implementation = self.get_implementation(name, args, ctx)?;
        implementation.call(ctx).await
    }

    /// Validates `args` against the declared schema of the function
    /// registered under `name`, returning its metadata on success.
    pub fn validate_arguments(&self, name: &str, args: &Value) -> RegistryResult<FunctionDefinitionMeta> {
        let entry = self.functions.get(name).ok_or_else(|| RegistryError::NoImplementationFound {
            definition: name.to_string(),
        })?;
        let failures = validator::validate(&entry.schema, args);
        if !failures.is_empty() {
            return Err(RegistryError::InvalidFunctionArgument {
                definition: name.to_string(),
                messages: failures.join("; "),
            });
        }
        Ok(FunctionDefinitionMeta {
            name: name.to_string(),
            schema: entry.schema.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Deserialize;

    struct TestContext {
        n: i32,
    }

    struct Greet;
    impl FunctionDefinition for Greet {
        const NAME: &'static str = "greet";
        fn schema() -> ArgumentSchema {
            ArgumentSchema::new(vec![crate::validator::FieldConstraint::string("name")])
        }
    }

    #[derive(Deserialize)]
    struct GreetWhenOne {
        name: String,
    }

    #[async_trait]
    impl FunctionImplementation<TestContext> for GreetWhenOne {
        fn supports(&self, ctx: &TestContext) -> bool {
            ctx.n == 1
        }
        async fn call(&self, _ctx: &TestContext) -> RegistryResult<Value> {
            Ok(Value::from(format!("hello {}", self.name)))
        }
    }

    #[derive(Deserialize)]
    struct GreetWhenTwo {
        #[allow(dead_code)]
        name: String,
    }

    #[async_trait]
    impl FunctionImplementation<TestContext> for GreetWhenTwo {
        fn supports(&self, ctx: &TestContext) -> bool {
            ctx.n == 2
        }
        async fn call(&self, _ctx: &TestContext) -> RegistryResult<Value> {
            Ok(Value::from("two"))
        }
    }

    fn args(name: &str) -> Value {
        let mut m = causa_value::Map::new();
        m.insert("name".to_string(), Value::from(name));
        Value::Map(m)
    }

    #[tokio::test]
    async fn dispatches_to_the_single_supporting_implementation() {
        let mut registry = FunctionRegistry::<TestContext>::new();
        registry.register::<Greet, GreetWhenOne>().unwrap();
        registry.register::<Greet, GreetWhenTwo>().unwrap();

        let ctx = TestContext { n: 1 };
        let result = registry.call("greet", &args("world"), &ctx).await.unwrap();
        assert_eq!(result, Value::from("hello world"));
    }

    #[tokio::test]
    async fn zero_supporters_is_not_found() {
        let mut registry = FunctionRegistry::<TestContext>::new();
        registry.register::<Greet, GreetWhenOne>().unwrap();
        let ctx = TestContext { n: 99 };
        let err = registry.call("greet", &args("world"), &ctx).await.unwrap_err();
        assert!(matches!(err, RegistryError::NoImplementationFound { .. }));
    }

    #[test]
    fn conflicting_definition_types_are_rejected() {
        struct OtherGreet;
        impl FunctionDefinition for OtherGreet {
            const NAME: &'static str = "greet";
        }

        let mut registry = FunctionRegistry::<TestContext>::new();
        registry.register::<Greet, GreetWhenOne>().unwrap();
        let err = registry.register::<OtherGreet, GreetWhenTwo>().unwrap_err();
        assert!(matches!(err, RegistryError::FunctionDefinitionDoesNotMatch { .. }));
    }

    #[test]
    fn validate_arguments_rejects_missing_required_field() {
        let mut registry = FunctionRegistry::<TestContext>::new();
        registry.register::<Greet, GreetWhenOne>().unwrap();
        let err = registry
            .validate_arguments("greet", &Value::Map(causa_value::Map::new()))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidFunctionArgument { .. }));
    }
}
