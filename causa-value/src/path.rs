use crate::value::Value;

/// One segment of a dotted configuration path.
///
/// `"a.b.2.c"` parses to `[Key("a"), Key("b"), Index(2), Key("c")]`. A
/// segment that looks numeric is always treated as a list index; map keys
/// that happen to be numeric strings are not reachable through the path
/// syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A map key.
    Key(String),
    /// A zero-based list index.
    Index(usize),
}

/// Splits a dotted path into segments. An empty string yields no segments
/// (meaning "the whole tree").
pub fn path_segments(path: &str) -> Vec<PathSegment> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('.')
        .map(|part| match part.parse::<usize>() {
            Ok(idx) => PathSegment::Index(idx),
            Err(_) => PathSegment::Key(part.to_string()),
        })
        .collect()
}

/// Walks `segments` inside `value`, returning `None` if any segment is
/// missing. Missing segments are never an error.
pub fn get_path<'v>(value: &'v Value, segments: &[PathSegment]) -> Option<&'v Value> {
    let mut current = value;
    for segment in segments {
        current = match (current, segment) {
            (Value::Map(map), PathSegment::Key(key)) => map.get(key)?,
            (Value::List(list), PathSegment::Index(idx)) => list.get(*idx)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Map;

    #[test]
    fn parses_mixed_segments() {
        let segs = path_segments("a.b.2.c");
        assert_eq!(
            segs,
            vec![
                PathSegment::Key("a".into()),
                PathSegment::Key("b".into()),
                PathSegment::Index(2),
                PathSegment::Key("c".into()),
            ]
        );
    }

    #[test]
    fn missing_path_is_none_not_error() {
        let v = Value::Map(Map::new());
        assert!(get_path(&v, &path_segments("a.b")).is_none());
    }

    #[test]
    fn indexes_into_lists() {
        let v = Value::List(vec![Value::from(1_i64), Value::from(2_i64)]);
        assert_eq!(get_path(&v, &path_segments("1")), Some(&Value::from(2_i64)));
    }
}
