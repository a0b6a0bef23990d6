use crate::value::Value;

/// Merges `overlay` onto `base`:
///
/// - map merge is recursive
/// - list values are concatenated (`overlay` appended to `base`)
/// - every other scalar pairing is right-wins (`overlay` replaces `base`)
///
/// Both arguments are consumed; callers that need to keep an original
/// layer untouched should `clone()` it first, which is exactly what
/// [`causa_config`]'s `ConfigurationReader::merged_with` does before
/// folding layers so merging never mutates caller-owned input.
pub fn merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Map(mut base_map), Value::Map(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.shift_remove(&key) {
                    Some(base_value) => {
                        base_map.insert(key, merge(base_value, overlay_value));
                    }
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
            Value::Map(base_map)
        }
        (Value::List(mut base_list), Value::List(overlay_list)) => {
            base_list.extend(overlay_list);
            Value::List(base_list)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Map;

    fn map(pairs: &[(&str, Value)]) -> Value {
        let mut m = Map::new();
        for (k, v) in pairs {
            m.insert((*k).to_string(), v.clone());
        }
        Value::Map(m)
    }

    #[test]
    fn maps_merge_recursively() {
        let base = map(&[("a", Value::from(1_i64)), ("nested", map(&[("x", Value::from(1_i64))]))]);
        let overlay = map(&[("nested", map(&[("y", Value::from(2_i64))]))]);
        let merged = merge(base, overlay);
        let m = merged.as_map().unwrap();
        assert_eq!(m.get("a"), Some(&Value::from(1_i64)));
        let nested = m.get("nested").unwrap().as_map().unwrap();
        assert_eq!(nested.get("x"), Some(&Value::from(1_i64)));
        assert_eq!(nested.get("y"), Some(&Value::from(2_i64)));
    }

    #[test]
    fn lists_concatenate_right_appended_to_left() {
        let base = Value::List(vec![Value::from("x")]);
        let overlay = Value::List(vec![Value::from("y")]);
        let merged = merge(base, overlay);
        assert_eq!(
            merged.as_list().unwrap(),
            &[Value::from("x"), Value::from("y")]
        );
    }

    #[test]
    fn scalars_are_right_wins() {
        let merged = merge(Value::from(1_i64), Value::from(2_i64));
        assert_eq!(merged, Value::from(2_i64));
    }

    #[test]
    fn merge_grouping_does_not_affect_the_final_fold() {
        let a = map(&[("a", Value::from(1_i64))]);
        let b = map(&[("b", Value::from(2_i64))]);
        let c = map(&[("a", Value::from(3_i64))]);

        let grouped_left = merge(merge(a.clone(), b.clone()), c.clone());
        let grouped_right = merge(a, merge(b, c));
        assert_eq!(grouped_left, grouped_right);
    }
}
