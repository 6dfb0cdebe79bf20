//! core::object
//!
//! The object model: polymorphic graph nodes with dynamically named fields.
//!
//! # Architecture
//!
//! A graph is a set of nodes reachable from a root [`Value`]. Nodes are
//! shared through [`NodeRef`] (`Rc<RefCell<dyn GraphNode>>`), so the same
//! node may be reached along several paths and back-edges may form cycles.
//!
//! Any type implementing [`GraphNode`] participates in traversal. The
//! capability set is deliberately narrow:
//!
//! - identity: [`GraphNode::id`] (absent for structural wrappers)
//! - named fields: [`GraphNode::get`] / [`GraphNode::set`]
//! - introspection: [`GraphNode::member_names`] / [`GraphNode::member`]
//!
//! [`Node`] is the dynamic default implementation produced when a graph is
//! materialized from the object store.
//!
//! # Example
//!
//! ```
//! use graftwork::core::object::{GraphNode, Node, Value};
//!
//! let mut wall = Node::new("Objects.BuiltElements.Wall")
//!     .with_field("height", 3.2)
//!     .with_field("mark", "W-01");
//!
//! assert_eq!(wall.get("mark"), Some(Value::from("W-01")));
//! assert_eq!(wall.get("missing"), None);
//!
//! wall.set("mark", Value::from("W-02"));
//! assert_eq!(wall.member_names(), vec!["height", "mark"]);
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use super::types::ObjectId;

/// Shared, mutable handle to a graph node.
pub type NodeRef = Rc<RefCell<dyn GraphNode>>;

/// Wrap a concrete node into a shared handle.
pub fn node_ref<N: GraphNode + 'static>(node: N) -> NodeRef {
    Rc::new(RefCell::new(node))
}

/// Errors raised while fetching a named member during introspection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemberError {
    /// The member was enumerated but is not present.
    #[error("member '{0}' is not present")]
    Missing(String),

    /// The member exists but could not be read.
    #[error("member '{name}' could not be read: {reason}")]
    Unreadable { name: String, reason: String },

    /// The node holding the member is already borrowed.
    #[error("node is busy: {0}")]
    Busy(String),
}

/// Capability set every traversable node provides.
///
/// Implementations must never panic from `get`: an absent field is `None`,
/// which is distinct from a present field holding [`Value::Null`].
pub trait GraphNode: fmt::Debug {
    /// Stable identifier, if the node has one.
    fn id(&self) -> Option<&ObjectId>;

    /// Semantic kind of the node. Diagnostic only.
    fn type_tag(&self) -> &str;

    /// Fetch a field by name.
    fn get(&self, field: &str) -> Option<Value>;

    /// Set a field in place, inserting it if absent.
    fn set(&mut self, field: &str, value: Value);

    /// Names of the members to introspect.
    ///
    /// The returned list is an owned snapshot: calling [`GraphNode::set`]
    /// while iterating it is always safe.
    fn member_names(&self) -> Vec<String>;

    /// Fetch a member during introspection.
    ///
    /// Unlike [`GraphNode::get`], this may fail; traversal isolates such
    /// failures to the member that raised them.
    fn member(&self, name: &str) -> Result<Value, MemberError> {
        self.get(name)
            .ok_or_else(|| MemberError::Missing(name.to_string()))
    }

    /// Whether the field is present (possibly holding null).
    fn has_field(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Move every member value out, leaving the node without fields.
    ///
    /// Called while dropping the last handle to a node, so long chains are
    /// torn down in a loop. Nodes that do not own their members keep the
    /// default.
    fn take_members(&mut self) -> Vec<Value> {
        Vec::new()
    }
}

/// A field value.
///
/// Scalars, plain dictionaries, ordered sequences (possibly mixing nodes
/// and scalars), or nested graph nodes.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<Value>),
    /// A plain dictionary. Dictionaries are data, not graph structure, and
    /// are never descended into.
    Map(BTreeMap<String, Value>),
    Node(NodeRef),
}

impl Value {
    /// The shared node handle, if this value is a node.
    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    /// The string payload, if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The elements, if this value is a sequence.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Value::Node(_))
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Node(_) => "node",
        }
    }
}

/// Pointer identity for node handles, ignoring vtable metadata.
pub fn same_node(a: &NodeRef, b: &NodeRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => same_node(a, b),
            _ => false,
        }
    }
}

// Nodes print shallowly so cyclic graphs can be debug-formatted.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Value::Node(node) => match node.try_borrow() {
                Ok(node) => match node.id() {
                    Some(id) => write!(f, "Node({} {})", node.type_tag(), id),
                    None => write!(f, "Node({} <no id>)", node.type_tag()),
                },
                Err(_) => write!(f, "Node(<borrowed>)"),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => write!(f, "[{} items]", items.len()),
            Value::Map(map) => write!(f, "{{{} keys}}", map.len()),
            Value::Node(_) => write!(f, "{:?}", self),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON representation and become null.
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(node_ref(node))
    }
}

impl From<NodeRef> for Value {
    fn from(node: NodeRef) -> Self {
        Value::Node(node)
    }
}

/// Plain JSON data. Objects become [`Value::Map`]; no nodes are created.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// The dynamic node: an optional id, a type tag and ordered named fields.
#[derive(Debug, Clone, Default)]
pub struct Node {
    id: Option<ObjectId>,
    type_tag: String,
    /// Fields in insertion order.
    fields: Vec<(String, Value)>,
}

impl Node {
    /// Type tag used when none is known.
    pub const BASE_TYPE: &'static str = "Base";

    /// Create an empty node without an id.
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            id: None,
            type_tag: type_tag.into(),
            fields: Vec::new(),
        }
    }

    /// Set the node's id. Ids are fixed at construction.
    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = Some(id);
        self
    }

    /// Add or replace a field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        self.set(&name, value.into());
        self
    }

    /// Iterate over fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl GraphNode for Node {
    fn id(&self) -> Option<&ObjectId> {
        self.id.as_ref()
    }

    fn type_tag(&self) -> &str {
        &self.type_tag
    }

    fn get(&self, field: &str) -> Option<Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.clone())
    }

    fn set(&mut self, field: &str, value: Value) {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field.to_string(), value)),
        }
    }

    fn member_names(&self) -> Vec<String> {
        self.fields.iter().map(|(name, _)| name.clone()).collect()
    }

    fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == field)
    }

    fn take_members(&mut self) -> Vec<Value> {
        self.fields.drain(..).map(|(_, value)| value).collect()
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = self.take_members();
        while let Some(value) = pending.pop() {
            match value {
                Value::Node(node) => {
                    // Only the last handle empties the node; shared nodes stay intact.
                    if Rc::strong_count(&node) == 1 {
                        if let Ok(mut inner) = node.try_borrow_mut() {
                            pending.extend(inner.take_members());
                        }
                    }
                }
                Value::List(items) => pending.extend(items),
                Value::Map(map) => pending.extend(map.into_values()),
                _ => {}
            }
        }
    }
}
