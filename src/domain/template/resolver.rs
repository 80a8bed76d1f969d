// Dotted-path lookup against a context slice

use serde_json::{Map, Value};

/// Walk `segments` from `root`.
///
/// Objects are entered by key; arrays only by a non-negative integer
/// segment. Any other step stops resolution. A `null` at the end counts as
/// not found.
pub fn resolve_path<'a, S: AsRef<str>>(segments: &[S], root: &'a Value) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        let segment = segment.as_ref();
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Same walk, starting from a bare object map
pub fn resolve_in_object<'a, S: AsRef<str>>(segments: &[S], root: &'a Map<String, Value>) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let value = root.get(first.as_ref())?;
    resolve_path(rest, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_nested_object() {
        let root = json!({"author": {"name": "Ada"}});
        assert_eq!(resolve_path(&["author", "name"], &root), Some(&json!("Ada")));
    }

    #[test]
    fn test_resolve_array_index() {
        let root = json!({"tags": ["a", "b"]});
        assert_eq!(resolve_path(&["tags", "1"], &root), Some(&json!("b")));
        assert_eq!(resolve_path(&["tags", "2"], &root), None);
        assert_eq!(resolve_path(&["tags", "-1"], &root), None);
        assert_eq!(resolve_path(&["tags", "first"], &root), None);
    }

    #[test]
    fn test_resolve_through_scalar_stops() {
        let root = json!({"title": "Hello"});
        assert_eq!(resolve_path(&["title", "length"], &root), None);
    }

    #[test]
    fn test_null_is_not_found() {
        let root = json!({"a": null});
        assert_eq!(resolve_path(&["a"], &root), None);
    }

    #[test]
    fn test_empty_path_returns_root() {
        let root = json!({"a": 1});
        let empty: [&str; 0] = [];
        assert_eq!(resolve_path(&empty, &root), Some(&root));
    }

    #[test]
    fn test_resolve_in_object() {
        let root = json!({"zero": 0, "list": [{"n": 1}]});
        let map = root.as_object().unwrap();
        assert_eq!(resolve_in_object(&["zero"], map), Some(&json!(0)));
        assert_eq!(resolve_in_object(&["list", "0", "n"], map), Some(&json!(1)));
        let empty: [&str; 0] = [];
        assert_eq!(resolve_in_object(&empty, map), None);
    }
}
