//! The validator bridge: transforms a raw argument map into a validated
//! instance of a declared implementation type. Constraints are attached
//! declaratively by building an [`ArgumentSchema`] once per function
//! definition, rather than through a decorator mechanism.

use causa_value::Value;
use std::sync::Arc;

/// The kind of constraint attached to a single declared field.
#[derive(Clone)]
pub enum ConstraintKind {
    /// The field must be a string.
    String,
    /// The field must be a string containing an `@`.
    Email,
    /// The field must be a map.
    Object,
    /// A caller-supplied predicate; returns `Err(message)` on failure.
    Custom(Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>),
}

impl std::fmt::Debug for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintKind::String => write!(f, "String"),
            ConstraintKind::Email => write!(f, "Email"),
            ConstraintKind::Object => write!(f, "Object"),
            ConstraintKind::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// The declared constraints for one field of an implementation type.
#[derive(Debug, Clone)]
pub struct FieldConstraint {
    /// The field's name, matched against argument map keys.
    pub name: String,
    /// The constraint kind to enforce when the field is present.
    pub kind: ConstraintKind,
    /// Skip validation when the field is absent from the argument map.
    pub allow_missing: bool,
    /// Skip validation when the field is present but `null`.
    pub allow_null: bool,
}

impl FieldConstraint {
    /// A required string field.
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::String,
            allow_missing: false,
            allow_null: false,
        }
    }

    /// Marks this field as optional (absence is not a validation failure).
    pub fn optional(mut self) -> Self {
        self.allow_missing = true;
        self
    }

    /// Marks this field as nullable.
    pub fn nullable(mut self) -> Self {
        self.allow_null = true;
        self
    }
}

/// The declared schema for one function definition's arguments: zero or
/// more field constraints. A type with no declared fields validates
/// only the empty map.
#[derive(Debug, Clone, Default)]
pub struct ArgumentSchema {
    /// The declared fields, in declaration order.
    pub fields: Vec<FieldConstraint>,
}

impl ArgumentSchema {
    /// Builds a schema from a fixed set of field constraints.
    pub fn new(fields: Vec<FieldConstraint>) -> Self {
        Self { fields }
    }
}

const EMPTY_EXPECTED_MESSAGE: &str = "Expected the object to validate to be empty.";

/// Validates `args` against `schema`, returning the list of
/// human-readable failure messages (empty on success).
pub fn validate(schema: &ArgumentSchema, args: &Value) -> Vec<String> {
    if schema.fields.is_empty() {
        return match args {
            Value::Map(m) if m.is_empty() => Vec::new(),
            Value::Null => Vec::new(),
            _ => vec![EMPTY_EXPECTED_MESSAGE.to_string()],
        };
    }

    let mut messages = Vec::new();
    let map = match args.as_map() {
        Some(m) => m,
        None => {
            messages.push("Expected the arguments to be an object.".to_string());
            return messages;
        }
    };

    let declared: std::collections::HashSet<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
    for key in map.keys() {
        if !declared.contains(key.as_str()) {
            messages.push(format!("Unexpected property '{key}'."));
        }
    }

    for field in &schema.fields {
        match map.get(&field.name) {
            None => {
                if !field.allow_missing {
                    messages.push(format!("Missing required property '{}'.", field.name));
                }
            }
            Some(Value::Null) => {
                if !field.allow_null {
                    messages.push(format!("Property '{}' must not be null.", field.name));
                }
            }
            Some(value) => {
                if let Err(message) = check_constraint(&field.kind, value) {
                    messages.push(format!("Property '{}' {message}", field.name));
                }
            }
        }
    }
    messages
}

fn check_constraint(kind: &ConstraintKind, value: &Value) -> Result<(), String> {
    match kind {
        ConstraintKind::String => match value {
            Value::String(_) => Ok(()),
            other => Err(format!("must be a string, got {}", other.kind())),
        },
        ConstraintKind::Email => match value.as_str() {
            Some(s) if s.contains('@') => Ok(()),
            Some(_) => Err("must be a valid email address".to_string()),
            None => Err(format!("must be a string, got {}", value.kind())),
        },
        ConstraintKind::Object => match value {
            Value::Map(_) => Ok(()),
            other => Err(format!("must be an object, got {}", other.kind())),
        },
        ConstraintKind::Custom(predicate) => predicate(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causa_value::Map;

    fn obj(pairs: &[(&str, Value)]) -> Value {
        let mut m = Map::new();
        for (k, v) in pairs {
            m.insert((*k).to_string(), v.clone());
        }
        Value::Map(m)
    }

    #[test]
    fn empty_schema_rejects_non_empty_input() {
        let schema = ArgumentSchema::default();
        assert!(validate(&schema, &obj(&[("a", Value::from(1_i64))])).contains(&EMPTY_EXPECTED_MESSAGE.to_string()));
        assert!(validate(&schema, &obj(&[])).is_empty());
    }

    #[test]
    fn required_field_missing_fails() {
        let schema = ArgumentSchema::new(vec![FieldConstraint::string("backend")]);
        let failures = validate(&schema, &obj(&[]));
        assert_eq!(failures, vec!["Missing required property 'backend'.".to_string()]);
    }

    #[test]
    fn optional_field_may_be_absent() {
        let schema = ArgumentSchema::new(vec![FieldConstraint::string("backend").optional()]);
        assert!(validate(&schema, &obj(&[])).is_empty());
    }

    #[test]
    fn extra_keys_are_rejected() {
        let schema = ArgumentSchema::new(vec![FieldConstraint::string("backend")]);
        let failures = validate(&schema, &obj(&[("backend", Value::from("x")), ("extra", Value::from(1_i64))]));
        assert_eq!(failures, vec!["Unexpected property 'extra'.".to_string()]);
    }

    #[test]
    fn nullable_field_allows_null() {
        let schema = ArgumentSchema::new(vec![FieldConstraint::string("backend").nullable()]);
        assert!(validate(&schema, &obj(&[("backend", Value::Null)])).is_empty());
    }

    #[test]
    fn wrong_type_fails() {
        let schema = ArgumentSchema::new(vec![FieldConstraint::string("backend")]);
        let failures = validate(&schema, &obj(&[("backend", Value::from(1_i64))]));
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("must be a string"));
    }
}
