//! Secret resolution: looks up `secrets.<id>`, determines the backend,
//! and dispatches a `SecretFetch` call through the function registry,
//! translating two error shapes on the way out.

use crate::context::Context;
use crate::error::{WorkspaceError, WorkspaceResult};
use causa_config::GetOptions;
use causa_registry::{ArgumentSchema, FieldConstraint, FunctionDefinition, RegistryError};
use causa_value::{Map, Value};

/// The well-known function definition backends register implementations
/// against. Its name is internal dispatch only — it is never exposed to
/// templates as a fetcher.
pub struct SecretFetch;

impl FunctionDefinition for SecretFetch {
    const NAME: &'static str = "secret_fetch";

    fn schema() -> ArgumentSchema {
        ArgumentSchema::new(vec![
            FieldConstraint::string("backend"),
            FieldConstraint {
                name: "configuration".to_string(),
                kind: causa_registry::ConstraintKind::Object,
                allow_missing: false,
                allow_null: false,
            },
        ])
    }
}

pub(crate) async fn resolve(context: &Context, id: &str) -> WorkspaceResult<String> {
    let record = context
        .reader()
        .get_or_throw(&format!("secrets.{id}"), GetOptions { unsafe_access: true })?;
    let record_map = record.as_map().ok_or_else(|| WorkspaceError::InvalidSecretDefinition {
        message: "Expected an object.".to_string(),
        secret_id: Some(id.to_string()),
    })?;

    let backend = record_map
        .get("backend")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            context
                .reader()
                .get(Some("causa.secrets.defaultBackend"), GetOptions::default())
                .ok()
                .flatten()
                .and_then(|v| v.as_str().map(str::to_string))
        })
        .ok_or_else(|| WorkspaceError::SecretBackendNotSpecified(id.to_string()))?;

    let mut configuration = record_map.clone();
    configuration.shift_remove("backend");

    let mut args = Map::new();
    args.insert("backend".to_string(), Value::from(backend.clone()));
    args.insert("configuration".to_string(), Value::Map(configuration));

    match context.call_by_name(SecretFetch::NAME, &Value::Map(args)).await {
        Ok(value) => value.as_str().map(str::to_string).ok_or(WorkspaceError::SecretValueNotFound),
        Err(WorkspaceError::Registry(RegistryError::NoImplementationFound { .. })) => {
            Err(WorkspaceError::SecretBackendNotFound(backend))
        }
        Err(WorkspaceError::Registry(RegistryError::InvalidFunctionArgument { messages, .. })) => {
            Err(WorkspaceError::InvalidSecretDefinition {
                message: messages,
                secret_id: Some(id.to_string()),
            })
        }
        Err(other) => Err(other),
    }
}
