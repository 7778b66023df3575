//! Leaf access by field path

use serde_json::Value;

use crate::path::{FieldPath, PathSegment};

/// Mutable reference to the node at `path`, if the path exists
pub fn node_mut<'a>(tree: &'a mut Value, path: &FieldPath) -> Option<&'a mut Value> {
    let mut node = tree;
    for segment in path.segments() {
        node = match (segment, node) {
            (PathSegment::Key(key), Value::Object(map)) => map.get_mut(key)?,
            (PathSegment::Index(idx), Value::Array(items)) => items.get_mut(*idx)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Replace the leaf at `path`; returns false when the path does not exist
pub fn replace(tree: &mut Value, path: &FieldPath, value: Value) -> bool {
    match node_mut(tree, path) {
        Some(node) => {
            *node = value;
            true
        }
        None => false,
    }
}

/// Current string value of the leaf at `path`
pub fn leaf_str<'a>(tree: &'a Value, path: &FieldPath) -> Option<&'a str> {
    let mut node = tree;
    for segment in path.segments() {
        node = match (segment, node) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
            (PathSegment::Index(idx), Value::Array(items)) => items.get(*idx)?,
            _ => return None,
        };
    }
    node.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_replace_nested_leaf() {
        let mut tree = json!({"hosts": [{"pw__Secret": "a"}, {"pw__Secret": "b"}]});
        let path: FieldPath = "hosts[1].pw__Secret".parse().unwrap();

        assert!(replace(&mut tree, &path, json!("<ref:x>")));
        assert_eq!(tree, json!({"hosts": [{"pw__Secret": "a"}, {"pw__Secret": "<ref:x>"}]}));
        assert_eq!(leaf_str(&tree, &path), Some("<ref:x>"));
    }

    #[test]
    fn test_missing_path() {
        let mut tree = json!({"a": 1});
        let path: FieldPath = "a.b".parse().unwrap();
        assert!(!replace(&mut tree, &path, Value::Null));
        assert_eq!(leaf_str(&tree, &path), None);
    }
}
