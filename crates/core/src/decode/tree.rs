use super::value::Value;
use crate::declaration::Fingerprint;
use crate::query::{QueryError, normalize_path};
use std::collections::HashMap;

/// Index of a node in a [`FieldValueTree`].
pub type NodeId = usize;

/// One decoded field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNode {
    /// Canonical path, e.g. `TBL.ITEM[2]`.
    pub path: String,
    /// Last path segment.
    pub name: String,
    /// Decoded value or child nodes.
    pub content: NodeContent,
}

/// Payload of a [`FieldNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeContent {
    /// A leaf value.
    Value(Value),
    /// Child nodes in declaration order.
    Group(Vec<NodeId>),
}

/// Decoded values of one record, addressable by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValueTree {
    pub(crate) fingerprint: Fingerprint,
    pub(crate) nodes: Vec<FieldNode>,
    pub(crate) by_path: HashMap<String, NodeId>,
}

/// Result of a path lookup.
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    /// The path names an elementary field.
    Value(&'a Value),
    /// The path names a group or array.
    Group(GroupView<'a>),
}

impl<'a> Lookup<'a> {
    /// The leaf value, if this is one.
    pub fn as_value(&self) -> Option<&'a Value> {
        match self {
            Lookup::Value(v) => Some(v),
            Lookup::Group(_) => None,
        }
    }

    /// The group, if this is one.
    pub fn as_group(&self) -> Option<GroupView<'a>> {
        match self {
            Lookup::Value(_) => None,
            Lookup::Group(g) => Some(*g),
        }
    }

    /// JSON rendering; see [`FieldValueTree::to_json`].
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Lookup::Value(v) => value_json(v),
            Lookup::Group(g) => g.to_json(),
        }
    }
}

/// A group node together with its tree, for structured access to children.
#[derive(Debug, Clone, Copy)]
pub struct GroupView<'a> {
    tree: &'a FieldValueTree,
    id: NodeId,
}

impl<'a> GroupView<'a> {
    fn child_ids(&self) -> &'a [NodeId] {
        match &self.tree.nodes[self.id].content {
            NodeContent::Group(children) => children,
            NodeContent::Value(_) => &[],
        }
    }

    /// Canonical path of the group.
    pub fn path(&self) -> &'a str {
        &self.tree.nodes[self.id].path
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.child_ids().len()
    }

    /// Whether the group has no children (an array with zero elements).
    pub fn is_empty(&self) -> bool {
        self.child_ids().is_empty()
    }

    /// Direct children as `(name, lookup)` pairs in declaration order.
    pub fn children(&self) -> impl Iterator<Item = (&'a str, Lookup<'a>)> + 'a {
        let tree = self.tree;
        self.child_ids()
            .iter()
            .map(move |&id| (tree.nodes[id].name.as_str(), tree.lookup(id)))
    }

    /// Direct child by name, case-insensitively (`"item[2]"` works).
    pub fn get(&self, name: &str) -> Option<Lookup<'a>> {
        let wanted = name.trim();
        self.children()
            .find(|(n, _)| n.eq_ignore_ascii_case(wanted))
            .map(|(_, l)| l)
    }

    /// JSON object of the children; see [`FieldValueTree::to_json`].
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.children()
                .map(|(name, l)| (name.to_string(), l.to_json()))
                .collect(),
        )
    }
}

impl FieldValueTree {
    fn lookup(&self, id: NodeId) -> Lookup<'_> {
        match &self.nodes[id].content {
            NodeContent::Value(v) => Lookup::Value(v),
            NodeContent::Group(_) => Lookup::Group(GroupView { tree: self, id }),
        }
    }

    /// Fingerprint of the declaration the decoding layout came from.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// The record root.
    pub fn root(&self) -> Lookup<'_> {
        self.lookup(0)
    }

    /// All nodes in pre-order.
    pub fn nodes(&self) -> &[FieldNode] {
        &self.nodes
    }

    /// Node by id.
    pub fn node(&self, id: NodeId) -> &FieldNode {
        &self.nodes[id]
    }

    /// Every leaf as `(path, value)` in declaration order.
    pub fn leaves(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.nodes.iter().filter_map(|n| match &n.content {
            NodeContent::Value(v) => Some((n.path.as_str(), v)),
            NodeContent::Group(_) => None,
        })
    }

    /// Look up a field by path.
    ///
    /// Paths are case-insensitive, may omit the root name, and use 1-based
    /// `[n]` indexes for array elements: `TYPE.CODE`, `TBL.ITEM[2]`.
    pub fn get(&self, path: &str) -> Result<Lookup<'_>, QueryError> {
        let root = &self.nodes[0].name;
        let root_name = root.split('[').next().unwrap_or(root);
        let canonical = normalize_path(path, root_name)?;
        self.by_path
            .get(&canonical)
            .map(|&id| self.lookup(id))
            .ok_or(QueryError::NotFound { path: canonical })
    }

    /// Leaf value at `path`; groups are [`QueryError::NotALeaf`].
    pub fn value(&self, path: &str) -> Result<&Value, QueryError> {
        match self.get(path)? {
            Lookup::Value(v) => Ok(v),
            Lookup::Group(g) => Err(QueryError::NotALeaf {
                path: g.path().to_string(),
            }),
        }
    }

    /// Nested JSON rendering of the whole record.
    ///
    /// Groups become objects keyed by child name; text is a string;
    /// integers are numbers when they fit in 64 bits and strings otherwise;
    /// decimals are exact strings; unknown values are `{"unknown": reason}`.
    pub fn to_json(&self) -> serde_json::Value {
        let root = &self.nodes[0];
        let mut map = serde_json::Map::new();
        map.insert(root.name.clone(), self.root().to_json());
        serde_json::Value::Object(map)
    }
}

fn value_json(value: &Value) -> serde_json::Value {
    use serde_json::json;
    match value {
        Value::Text(s) => json!(s),
        Value::Integer(n) => match i64::try_from(*n) {
            Ok(small) => json!(small),
            Err(_) => json!(n.to_string()),
        },
        Value::Decimal(d) => json!(d.to_string()),
        Value::Unknown(u) => json!({ "unknown": u.reason }),
    }
}
