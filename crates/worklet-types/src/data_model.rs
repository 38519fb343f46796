//! Path-addressed data model tree shared by the worklets of one context.
//!
//! [`JsonDataModelTree`] wraps a `serde_json::Value`. Nodes are addressed
//! with RFC 6901 pointers. Allocation and attachment never overwrite an
//! existing node: `alloc` is a no-op when a node of the requested kind is
//! already present and an error otherwise, `attach` fails on any occupied
//! path.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::WorkflowError;
use crate::pointer::{JsonPointer, array_index};

// ---------------------------------------------------------------------------
// NodeType
// ---------------------------------------------------------------------------

/// Kind of leaf that [`DataModelTree::alloc`] creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Map,
    Array,
    Text,
}

impl NodeType {
    /// An empty node of this kind.
    pub fn empty(self) -> Value {
        match self {
            NodeType::Map => Value::Object(Map::new()),
            NodeType::Array => Value::Array(Vec::new()),
            NodeType::Text => Value::String(String::new()),
        }
    }

    pub fn matches(self, node: &Value) -> bool {
        matches!(
            (self, node),
            (NodeType::Map, Value::Object(_))
                | (NodeType::Array, Value::Array(_))
                | (NodeType::Text, Value::String(_))
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Map => "map",
            NodeType::Array => "array",
            NodeType::Text => "text",
        }
    }
}

/// Human-readable kind of a JSON value, used in type mismatch errors.
pub fn value_kind(node: &Value) -> &'static str {
    match node {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// DataModelTree
// ---------------------------------------------------------------------------

/// Hierarchical, path-addressed value store.
pub trait DataModelTree: Sized {
    /// Copy of the subtree at `path`, or `None` when absent.
    fn subtree(&self, path: &str) -> Option<Self>;

    /// Graft `tree` at a currently absent `path`.
    fn attach(&mut self, path: &str, tree: Self) -> Result<(), WorkflowError>;

    /// Create missing intermediate nodes down to `path` and a leaf of `leaf`.
    fn alloc(&mut self, path: &str, leaf: NodeType) -> Result<&mut Self, WorkflowError>;

    /// Delete the entry at `path`.
    fn remove(&mut self, path: &str) -> Result<(), WorkflowError>;

    /// Reset the value at `path` to null, keeping the entry.
    fn clear(&mut self, path: &str) -> Result<(), WorkflowError>;
}

// ---------------------------------------------------------------------------
// JsonDataModelTree
// ---------------------------------------------------------------------------

/// JSON realization of [`DataModelTree`] with typed accessors.
///
/// Null nodes are treated as absent by every read accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonDataModelTree {
    root: Value,
}

impl Default for JsonDataModelTree {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }
}

impl From<Value> for JsonDataModelTree {
    fn from(root: Value) -> Self {
        Self { root }
    }
}

impl JsonDataModelTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        match &self.root {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    /// The node at `path`, or `None` when absent or null.
    pub fn node_at(&self, path: &str) -> Result<Option<&Value>, WorkflowError> {
        let ptr = JsonPointer::compile(path)?;
        Ok(lookup(&self.root, ptr.segments()).filter(|node| !node.is_null()))
    }

    pub fn text_at(&self, path: &str) -> Result<Option<String>, WorkflowError> {
        match self.node_at(path)? {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(other) => Err(WorkflowError::type_mismatch(path, "string", value_kind(other))),
        }
    }

    pub fn int_at(&self, path: &str) -> Result<Option<i64>, WorkflowError> {
        match self.node_at(path)? {
            None => Ok(None),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| WorkflowError::type_mismatch(path, "integer", "out-of-range number")),
            Some(other) => Err(WorkflowError::type_mismatch(path, "integer", value_kind(other))),
        }
    }

    pub fn boolean_at(&self, path: &str) -> Result<Option<bool>, WorkflowError> {
        match self.node_at(path)? {
            None => Ok(None),
            Some(Value::Bool(flag)) => Ok(Some(*flag)),
            Some(other) => Err(WorkflowError::type_mismatch(path, "boolean", value_kind(other))),
        }
    }

    pub fn array_at(&self, path: &str) -> Result<Option<&Vec<Value>>, WorkflowError> {
        match self.node_at(path)? {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(other) => Err(WorkflowError::type_mismatch(path, "array", value_kind(other))),
        }
    }

    pub fn object_at(&self, path: &str) -> Result<Option<&Map<String, Value>>, WorkflowError> {
        match self.node_at(path)? {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(WorkflowError::type_mismatch(path, "object", value_kind(other))),
        }
    }

    /// Deserialize the array at `path` into a list of `T`.
    pub fn list_at<T: DeserializeOwned>(&self, path: &str) -> Result<Option<Vec<T>>, WorkflowError> {
        let Some(items) = self.array_at(path)? else {
            return Ok(None);
        };
        serde_json::from_value(Value::Array(items.clone()))
            .map(Some)
            .map_err(|e| WorkflowError::wrap(format!("cannot read list at '{path}'"), e))
    }

    /// Deserialize the object at `path` into a map of `T`.
    pub fn map_at<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<BTreeMap<String, T>>, WorkflowError> {
        let Some(map) = self.object_at(path)? else {
            return Ok(None);
        };
        serde_json::from_value(Value::Object(map.clone()))
            .map(Some)
            .map_err(|e| WorkflowError::wrap(format!("cannot read map at '{path}'"), e))
    }

    /// Write `value` at `path`, allocating missing parents.
    ///
    /// Unlike [`DataModelTree::attach`] this overwrites an existing node.
    pub fn set_at<T: Serialize>(&mut self, path: &str, value: T) -> Result<(), WorkflowError> {
        let ptr = JsonPointer::compile(path)?;
        let value = serde_json::to_value(value)
            .map_err(|e| WorkflowError::wrap(format!("cannot serialize value for '{path}'"), e))?;
        if ptr.is_root() {
            self.root = value;
            return Ok(());
        }
        if let Some(slot) = lookup_mut(&mut self.root, ptr.segments()) {
            *slot = value;
            return Ok(());
        }
        self.attach_value(&ptr, value)
    }

    pub fn formatted_root_string(&self) -> String {
        serde_json::to_string_pretty(&self.root).unwrap_or_else(|_| self.root.to_string())
    }

    fn attach_value(&mut self, ptr: &JsonPointer, value: Value) -> Result<(), WorkflowError> {
        let Some(last) = ptr.last() else {
            return Err(WorkflowError::InvalidPath {
                path: String::new(),
                reason: "cannot attach at the document root".to_string(),
            });
        };
        if lookup(&self.root, ptr.segments()).is_some_and(|node| !node.is_null()) {
            return Err(WorkflowError::PathOccupied(ptr.to_string()));
        }

        let head = ptr.head();
        if lookup(&self.root, head.segments()).is_none_or(Value::is_null) {
            let parent_type = if array_index(last).is_some() {
                NodeType::Array
            } else {
                NodeType::Map
            };
            alloc_node(&mut self.root, head.segments(), parent_type, &head)?;
        }

        let parent = lookup_mut(&mut self.root, head.segments())
            .ok_or_else(|| WorkflowError::MissingPath(head.to_string()))?;
        match parent {
            Value::Object(map) => {
                map.insert(last.to_string(), value);
                Ok(())
            }
            Value::Array(items) => {
                let index = array_index(last).ok_or_else(|| WorkflowError::InvalidPath {
                    path: ptr.to_string(),
                    reason: "an array parent needs a numeric index".to_string(),
                })?;
                match items.get_mut(index) {
                    Some(slot) => *slot = value,
                    None => {
                        check_append(items.len(), index, ptr)?;
                        items.push(value);
                    }
                }
                Ok(())
            }
            other => Err(WorkflowError::type_mismatch(
                head.to_string(),
                "object or array",
                value_kind(other),
            )),
        }
    }
}

impl DataModelTree for JsonDataModelTree {
    fn subtree(&self, path: &str) -> Option<Self> {
        let ptr = JsonPointer::compile(path).ok()?;
        lookup(&self.root, ptr.segments())
            .filter(|node| !node.is_null())
            .cloned()
            .map(Self::from_value)
    }

    fn attach(&mut self, path: &str, tree: Self) -> Result<(), WorkflowError> {
        let ptr = JsonPointer::compile(path)?;
        self.attach_value(&ptr, tree.root)
    }

    fn alloc(&mut self, path: &str, leaf: NodeType) -> Result<&mut Self, WorkflowError> {
        let ptr = JsonPointer::compile(path)?;
        alloc_node(&mut self.root, ptr.segments(), leaf, &ptr)?;
        Ok(self)
    }

    fn remove(&mut self, path: &str) -> Result<(), WorkflowError> {
        let ptr = JsonPointer::compile(path)?;
        let Some(last) = ptr.last() else {
            return Err(WorkflowError::InvalidPath {
                path: path.to_string(),
                reason: "cannot remove the document root".to_string(),
            });
        };
        match lookup_mut(&mut self.root, ptr.head().segments()) {
            Some(Value::Object(map)) => {
                map.remove(last);
            }
            Some(Value::Array(items)) => {
                if let Some(index) = array_index(last).filter(|i| *i < items.len()) {
                    items.remove(index);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn clear(&mut self, path: &str) -> Result<(), WorkflowError> {
        let ptr = JsonPointer::compile(path)?;
        if ptr.is_root() {
            self.root = Value::Null;
            return Ok(());
        }
        if let Some(slot) = lookup_mut(&mut self.root, ptr.segments()) {
            *slot = Value::Null;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Traversal helpers
// ---------------------------------------------------------------------------

fn lookup<'a>(node: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments.iter().try_fold(node, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => array_index(segment).and_then(|i| items.get(i)),
        _ => None,
    })
}

fn lookup_mut<'a>(node: &'a mut Value, segments: &[String]) -> Option<&'a mut Value> {
    let mut current = node;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(array_index(segment)?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Allocate along `segments`. New children are built off-tree and only
/// inserted once the whole remaining path succeeded.
fn alloc_node(
    node: &mut Value,
    segments: &[String],
    leaf: NodeType,
    full: &JsonPointer,
) -> Result<(), WorkflowError> {
    let Some((segment, rest)) = segments.split_first() else {
        if node.is_null() {
            *node = leaf.empty();
            return Ok(());
        }
        if leaf.matches(node) {
            return Ok(());
        }
        return Err(WorkflowError::type_mismatch(
            full.to_string(),
            leaf.as_str(),
            value_kind(node),
        ));
    };

    if node.is_null() {
        *node = if array_index(segment).is_some() {
            NodeType::Array.empty()
        } else {
            NodeType::Map.empty()
        };
    }

    match node {
        Value::Object(map) => {
            if let Some(child) = map.get_mut(segment) {
                return alloc_node(child, rest, leaf, full);
            }
            let mut child = Value::Null;
            alloc_node(&mut child, rest, leaf, full)?;
            map.insert(segment.clone(), child);
            Ok(())
        }
        Value::Array(items) => {
            let index = array_index(segment).ok_or_else(|| WorkflowError::InvalidPath {
                path: full.to_string(),
                reason: format!("segment '{segment}' is not an index into an array"),
            })?;
            if let Some(child) = items.get_mut(index) {
                return alloc_node(child, rest, leaf, full);
            }
            check_append(items.len(), index, full)?;
            let mut child = Value::Null;
            alloc_node(&mut child, rest, leaf, full)?;
            items.push(child);
            Ok(())
        }
        other => Err(WorkflowError::type_mismatch(
            full.to_string(),
            "object or array",
            value_kind(other),
        )),
    }
}

/// Arrays only grow by appending: a missing element must sit at `len`.
fn check_append(len: usize, index: usize, full: &JsonPointer) -> Result<(), WorkflowError> {
    if index == len {
        return Ok(());
    }
    Err(WorkflowError::InvalidPath {
        path: full.to_string(),
        reason: format!("index {index} is past the end of an array of length {len}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> JsonDataModelTree {
        JsonDataModelTree::from_value(json!({
            "device": { "id": "of:0001", "port": 3, "enabled": true },
            "hosts": ["h1", "h2"],
        }))
    }

    #[test]
    fn alloc_then_subtree_returns_requested_kind() {
        let mut tree = JsonDataModelTree::new();
        tree.alloc("/a/b", NodeType::Map).unwrap();
        tree.alloc("/a/list", NodeType::Array).unwrap();
        tree.alloc("/a/name", NodeType::Text).unwrap();

        assert!(tree.subtree("/a/b").unwrap().root().is_object());
        assert!(tree.subtree("/a/list").unwrap().root().is_array());
        assert_eq!(tree.subtree("/a/name").unwrap().root(), &json!(""));
    }

    #[test]
    fn alloc_numeric_segment_synthesizes_array() {
        let mut tree = JsonDataModelTree::new();
        tree.alloc("/ports/0/name", NodeType::Text).unwrap();
        tree.alloc("/ports/1", NodeType::Map).unwrap();
        assert_eq!(tree.root(), &json!({ "ports": [{ "name": "" }, {}] }));
    }

    #[test]
    fn array_index_past_the_end_is_rejected() {
        let mut tree = JsonDataModelTree::from_value(json!({ "ports": ["p0"] }));
        for path in ["/ports/2", "/ports/4000000000/name", "/ports/18446744073709551615"] {
            let err = tree.alloc(path, NodeType::Text).unwrap_err();
            assert!(matches!(err, WorkflowError::InvalidPath { .. }), "{path}: {err}");
        }
        let err = tree
            .attach("/ports/18446744073709551615", JsonDataModelTree::from_value(json!("x")))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidPath { .. }));
        let err = tree.set_at("/ports/7", "x").unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidPath { .. }));
        assert_eq!(tree.root(), &json!({ "ports": ["p0"] }));

        tree.attach("/ports/1", JsonDataModelTree::from_value(json!("p1"))).unwrap();
        assert_eq!(tree.root(), &json!({ "ports": ["p0", "p1"] }));
    }

    #[test]
    fn alloc_matching_type_is_noop() {
        let mut tree = sample();
        tree.alloc("/device", NodeType::Map).unwrap();
        tree.alloc("/device/id", NodeType::Text).unwrap();
        assert_eq!(tree, sample());
    }

    #[test]
    fn alloc_over_mismatched_type_fails() {
        let mut tree = sample();
        let err = tree.alloc("/device/id", NodeType::Map).unwrap_err();
        assert!(matches!(err, WorkflowError::TypeMismatch { .. }));
        let err = tree.alloc("/device/id/deeper", NodeType::Text).unwrap_err();
        assert!(matches!(err, WorkflowError::TypeMismatch { .. }));
        assert_eq!(tree, sample());
    }

    #[test]
    fn failed_alloc_leaves_no_partial_nodes() {
        let mut tree = JsonDataModelTree::from_value(json!({ "a": [] }));
        let err = tree.alloc("/a/x/y", NodeType::Text).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidPath { .. }));
        assert_eq!(tree.root(), &json!({ "a": [] }));
    }

    #[test]
    fn attach_into_absent_path_allocates_parents() {
        let mut tree = JsonDataModelTree::new();
        let branch = JsonDataModelTree::from_value(json!({ "mac": "00:11" }));
        tree.attach("/hosts/0", branch).unwrap();
        assert_eq!(tree.root(), &json!({ "hosts": [{ "mac": "00:11" }] }));
    }

    #[test]
    fn attach_at_occupied_path_fails() {
        let mut tree = sample();
        let err = tree
            .attach("/device/id", JsonDataModelTree::from_value(json!("other")))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::PathOccupied(path) if path == "/device/id"));
        let err = tree.attach("", JsonDataModelTree::new()).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidPath { .. }));
    }

    #[test]
    fn attach_replaces_cleared_node() {
        let mut tree = sample();
        tree.clear("/device/id").unwrap();
        tree.attach("/device/id", JsonDataModelTree::from_value(json!("of:0002")))
            .unwrap();
        assert_eq!(tree.text_at("/device/id").unwrap().as_deref(), Some("of:0002"));
    }

    #[test]
    fn remove_then_subtree_is_none() {
        let mut tree = sample();
        tree.remove("/device/port").unwrap();
        assert!(tree.subtree("/device/port").is_none());
        assert!(!tree.object_at("/device").unwrap().unwrap().contains_key("port"));

        tree.remove("/hosts/0").unwrap();
        assert_eq!(tree.array_at("/hosts").unwrap().unwrap(), &vec![json!("h2")]);

        // absent paths are ignored
        tree.remove("/nothing/here").unwrap();
    }

    #[test]
    fn clear_keeps_entry_as_null() {
        let mut tree = sample();
        tree.clear("/device/enabled").unwrap();
        assert!(tree.subtree("/device/enabled").is_none());
        assert!(tree.object_at("/device").unwrap().unwrap().contains_key("enabled"));
        assert_eq!(tree.boolean_at("/device/enabled").unwrap(), None);
    }

    #[test]
    fn typed_accessors_read_and_reject_mismatches() {
        let tree = sample();
        assert_eq!(tree.text_at("/device/id").unwrap().as_deref(), Some("of:0001"));
        assert_eq!(tree.int_at("/device/port").unwrap(), Some(3));
        assert_eq!(tree.boolean_at("/device/enabled").unwrap(), Some(true));
        assert_eq!(tree.array_at("/hosts").unwrap().map(Vec::len), Some(2));
        assert!(tree.node_at("/missing").unwrap().is_none());

        assert!(matches!(
            tree.int_at("/device/id").unwrap_err(),
            WorkflowError::TypeMismatch { .. }
        ));
        assert!(matches!(
            tree.object_at("/hosts").unwrap_err(),
            WorkflowError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn list_and_map_deserialize() {
        let tree = JsonDataModelTree::from_value(json!({
            "vlans": [10, 20],
            "labels": { "a": "x", "b": "y" },
        }));
        assert_eq!(tree.list_at::<u16>("/vlans").unwrap(), Some(vec![10, 20]));
        let labels = tree.map_at::<String>("/labels").unwrap().unwrap();
        assert_eq!(labels.get("b").map(String::as_str), Some("y"));
        assert!(tree.list_at::<String>("/vlans").is_err());
    }

    #[test]
    fn set_at_overwrites_and_allocates() {
        let mut tree = sample();
        tree.set_at("/device/port", 7).unwrap();
        tree.set_at("/new/path", "v").unwrap();
        assert_eq!(tree.int_at("/device/port").unwrap(), Some(7));
        assert_eq!(tree.text_at("/new/path").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn serde_is_transparent() {
        let tree = sample();
        let text = serde_json::to_string(&tree).unwrap();
        let parsed: JsonDataModelTree = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, tree);
        assert!(tree.formatted_root_string().contains("\"of:0001\""));
    }
}
