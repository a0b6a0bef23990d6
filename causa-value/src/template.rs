use crate::value::Value;

/// The default map key that marks a value as a template object:
/// `{$format: "..."}`.
pub const DEFAULT_TEMPLATE_MARKER: &str = "$format";

/// A map whose *only* key equals `marker` is a template object. Every
/// other shape (including an empty map, or a map with the marker plus
/// other keys) is not.
pub fn is_template_object(value: &Value, marker: &str) -> bool {
    match value {
        Value::Map(map) => map.len() == 1 && map.contains_key(marker),
        _ => false,
    }
}

/// Extracts the format string out of a template object, if `value` is one.
pub fn template_format_string<'v>(value: &'v Value, marker: &str) -> Option<&'v str> {
    if !is_template_object(value, marker) {
        return None;
    }
    value.as_map()?.get(marker)?.as_str()
}

/// Recursively answers whether `value` contains any template object
/// anywhere in its subtree, without evaluating it. Used by the
/// configuration reader's safety guard.
pub fn contains_rendering_object(value: &Value, marker: &str) -> bool {
    if is_template_object(value, marker) {
        return true;
    }
    match value {
        Value::Map(map) => map.values().any(|v| contains_rendering_object(v, marker)),
        Value::List(list) => list.iter().any(|v| contains_rendering_object(v, marker)),
        _ => false,
    }
}
