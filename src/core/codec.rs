//! core::codec
//!
//! Content-addressed wire form of an object graph.
//!
//! # Format
//!
//! Every node becomes one JSON object:
//!
//! ```text
//! {
//!   "id": "<32 hex>",
//!   "speckle_type": "<type tag>",
//!   "<field>": <value>,
//!   "__closure": { "<descendant id>": <min depth>, ... },
//!   "totalChildrenCount": <n>
//! }
//! ```
//!
//! Nested nodes are detached and replaced by
//! `{"referencedId": "<id>", "speckle_type": "reference"}`. The id is the
//! SHA-256 (truncated to 32 hex characters) of the canonical, key-sorted
//! JSON of the object without its `id`.
//!
//! # Invariants
//!
//! - Encoding never writes ids back into the graph.
//! - A node shared along several paths is encoded once.
//! - Encoding a cyclic graph fails with [`CodecError::Cycle`].
//! - Materializing shares one [`NodeRef`] per id, so shared references
//!   stay shared in memory.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use serde_json::{json, Map as JsonMap, Value as Json};
use thiserror::Error;

use super::object::{node_ref, GraphNode, MemberError, Node, NodeRef, Value};
use super::types::ObjectId;

/// Objects keyed by id, as downloaded from a store.
pub type ObjectTable = HashMap<ObjectId, Json>;

/// Keys carrying store metadata rather than node fields.
const RESERVED_KEYS: [&str; 4] = ["id", "speckle_type", "__closure", "totalChildrenCount"];

/// Errors encoding or materializing a graph.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("graph contains a cycle through a {0} node; cyclic graphs cannot be content-addressed")]
    Cycle(String),

    #[error("root value is a {0}, not a node")]
    NotANode(&'static str),

    #[error("object {0} is referenced but was not downloaded")]
    MissingObject(ObjectId),

    #[error("malformed object: {0}")]
    Malformed(String),

    #[error("failed to read member while encoding: {0}")]
    Member(#[from] MemberError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One serialized object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedObject {
    pub id: ObjectId,
    /// Canonical JSON, including `id`.
    pub json: String,
}

/// A serialized graph. Children precede their parents; the root is last.
#[derive(Debug, Clone)]
pub struct EncodedGraph {
    pub root: ObjectId,
    pub objects: Vec<EncodedObject>,
}

impl EncodedGraph {
    /// All objects as one JSON array, ready for a batch upload.
    pub fn batch_json(&self) -> String {
        let parts: Vec<&str> = self.objects.iter().map(|o| o.json.as_str()).collect();
        format!("[{}]", parts.join(","))
    }

    /// Descendant count of the root.
    pub fn total_children(&self) -> usize {
        self.objects.len().saturating_sub(1)
    }
}

/// Descendant id -> minimum depth below the owning object.
type Closure = BTreeMap<ObjectId, usize>;

/// Serialize the graph rooted at `root`.
///
/// Nodes are scheduled on an explicit work stack, so nesting depth is
/// limited by memory rather than by the call stack.
///
/// # Errors
///
/// - `CodecError::NotANode` if `root` is not a node
/// - `CodecError::Cycle` if a node is reachable from itself
/// - `CodecError::Member` if a member cannot be read
pub fn encode(root: &Value) -> Result<EncodedGraph, CodecError> {
    let node = root.as_node().ok_or(CodecError::NotANode(root.kind()))?;
    let mut encoder = Encoder::default();
    let root_id = encoder.run(node)?;
    Ok(EncodedGraph {
        root: root_id,
        objects: encoder.objects,
    })
}

/// One unit of encoder work.
///
/// A node is entered once to snapshot its members and schedule its
/// children, then finished after every child is done.
enum EncodeStep {
    Enter(NodeRef),
    Finish {
        key: usize,
        type_tag: String,
        members: Vec<(String, Value)>,
    },
}

#[derive(Default)]
struct Encoder {
    /// Finished nodes by allocation address.
    done: HashMap<usize, (ObjectId, Closure)>,
    /// Nodes entered but not yet finished.
    path: HashSet<usize>,
    objects: Vec<EncodedObject>,
}

fn address(node: &NodeRef) -> usize {
    Rc::as_ptr(node) as *const () as usize
}

/// Push every node directly held by `value`, in field order.
fn child_nodes(value: &Value, out: &mut Vec<NodeRef>) {
    match value {
        Value::Node(node) => out.push(node.clone()),
        Value::List(items) => items.iter().for_each(|item| child_nodes(item, out)),
        Value::Map(map) => map.values().for_each(|item| child_nodes(item, out)),
        _ => {}
    }
}

impl Encoder {
    fn run(&mut self, root: &NodeRef) -> Result<ObjectId, CodecError> {
        let mut stack = vec![EncodeStep::Enter(root.clone())];

        while let Some(step) = stack.pop() {
            match step {
                EncodeStep::Enter(node) => {
                    let key = address(&node);
                    if self.done.contains_key(&key) {
                        continue;
                    }

                    let n = node
                        .try_borrow()
                        .map_err(|e| CodecError::Member(MemberError::Busy(e.to_string())))?;
                    // Still on the path and not done: reached from its own subtree.
                    if !self.path.insert(key) {
                        return Err(CodecError::Cycle(n.type_tag().to_string()));
                    }
                    let mut members = Vec::new();
                    for name in n.member_names() {
                        if RESERVED_KEYS.contains(&name.as_str()) {
                            continue;
                        }
                        let value = n.member(&name)?;
                        members.push((name, value));
                    }
                    let type_tag = n.type_tag().to_string();
                    drop(n);

                    let mut children = Vec::new();
                    for (_, value) in &members {
                        child_nodes(value, &mut children);
                    }
                    stack.push(EncodeStep::Finish {
                        key,
                        type_tag,
                        members,
                    });
                    stack.extend(children.into_iter().rev().map(EncodeStep::Enter));
                }
                EncodeStep::Finish {
                    key,
                    type_tag,
                    members,
                } => self.finish(key, type_tag, members)?,
            }
        }

        self.done
            .get(&address(root))
            .map(|(id, _)| id.clone())
            .ok_or_else(|| CodecError::Malformed("root node was not encoded".into()))
    }

    fn finish(
        &mut self,
        key: usize,
        type_tag: String,
        members: Vec<(String, Value)>,
    ) -> Result<(), CodecError> {
        let mut object = JsonMap::new();
        let mut closure = Closure::new();
        object.insert("speckle_type".into(), Json::String(type_tag));

        for (name, value) in members {
            let encoded = self.encode_value(&value, &mut closure)?;
            object.insert(name, encoded);
        }

        if !closure.is_empty() {
            let entries = closure
                .iter()
                .map(|(id, depth)| (id.to_string(), json!(depth)))
                .collect();
            object.insert("__closure".into(), Json::Object(entries));
        }
        object.insert("totalChildrenCount".into(), json!(closure.len()));

        let canonical = serde_json::to_string(&object)?;
        let id = ObjectId::for_content(canonical.as_bytes());
        object.insert("id".into(), Json::String(id.to_string()));

        self.objects.push(EncodedObject {
            id: id.clone(),
            json: serde_json::to_string(&object)?,
        });
        self.path.remove(&key);
        self.done.insert(key, (id, closure));
        Ok(())
    }

    /// Encode a member value. Every node it holds must already be done.
    fn encode_value(&self, value: &Value, closure: &mut Closure) -> Result<Json, CodecError> {
        Ok(match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => Json::Number(n.clone()),
            Value::String(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(
                items
                    .iter()
                    .map(|item| self.encode_value(item, closure))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(map) => {
                let mut object = JsonMap::new();
                for (k, v) in map {
                    object.insert(k.clone(), self.encode_value(v, closure)?);
                }
                Json::Object(object)
            }
            Value::Node(child) => {
                let (child_id, child_closure) = self
                    .done
                    .get(&address(child))
                    .ok_or_else(|| CodecError::Malformed("child encoded after its parent".into()))?;
                merge_depth(closure, child_id.clone(), 1);
                for (id, depth) in child_closure {
                    merge_depth(closure, id.clone(), depth + 1);
                }
                json!({"referencedId": child_id.as_str(), "speckle_type": "reference"})
            }
        })
    }
}

fn merge_depth(closure: &mut Closure, id: ObjectId, depth: usize) {
    closure
        .entry(id)
        .and_modify(|d| *d = (*d).min(depth))
        .or_insert(depth);
}

/// Rebuild the in-memory graph for `root` from downloaded objects.
///
/// Like [`encode`], this runs on an explicit work stack.
///
/// # Errors
///
/// - `CodecError::MissingObject` if a reference points outside `objects`
/// - `CodecError::Malformed` for non-object entries or invalid ids
/// - `CodecError::Cycle` if references loop
pub fn materialize(root: &ObjectId, objects: &ObjectTable) -> Result<NodeRef, CodecError> {
    let mut materializer = Materializer {
        objects,
        built: HashMap::new(),
        path: HashSet::new(),
    };
    materializer.run(root)
}

type JsonObject = JsonMap<String, Json>;

/// Identity of a stored node: its id, or for inline nodes without one, the
/// address of its JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Id(ObjectId),
    Inline(usize),
}

impl NodeKey {
    fn of(object: &JsonObject, id: &Option<ObjectId>) -> Self {
        match id {
            Some(id) => NodeKey::Id(id.clone()),
            None => NodeKey::Inline(object as *const JsonObject as usize),
        }
    }
}

/// A JSON object to build, with its resolved id.
type Pending<'a> = (&'a JsonObject, Option<ObjectId>);

enum BuildStep<'a> {
    Enter(Pending<'a>),
    Finish(Pending<'a>),
}

fn type_tag_of(object: &JsonObject) -> &str {
    object
        .get("speckle_type")
        .and_then(Json::as_str)
        .unwrap_or(Node::BASE_TYPE)
}

fn field_entries(object: &JsonObject) -> impl Iterator<Item = (&String, &Json)> {
    object
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
}

/// The object's own `id`, else `known`.
fn resolve_id(object: &JsonObject, known: Option<&ObjectId>) -> Result<Option<ObjectId>, CodecError> {
    match object.get("id").and_then(Json::as_str) {
        Some(raw) => ObjectId::new(raw)
            .map(Some)
            .map_err(|e| CodecError::Malformed(e.to_string())),
        None => Ok(known.cloned()),
    }
}

fn reference_of(object: &JsonObject) -> Result<Option<ObjectId>, CodecError> {
    object
        .get("referencedId")
        .and_then(Json::as_str)
        .map(|raw| ObjectId::new(raw).map_err(|e| CodecError::Malformed(e.to_string())))
        .transpose()
}

struct Materializer<'a> {
    objects: &'a ObjectTable,
    built: HashMap<NodeKey, NodeRef>,
    path: HashSet<NodeKey>,
}

impl<'a> Materializer<'a> {
    fn run(&mut self, root: &ObjectId) -> Result<NodeRef, CodecError> {
        let (object, id) = self.lookup(root)?;
        let root_key = NodeKey::of(object, &id);
        let mut stack = vec![BuildStep::Enter((object, id))];

        while let Some(step) = stack.pop() {
            match step {
                BuildStep::Enter((object, id)) => {
                    let key = NodeKey::of(object, &id);
                    if self.built.contains_key(&key) {
                        continue;
                    }
                    if !self.path.insert(key) {
                        return Err(CodecError::Cycle(type_tag_of(object).to_string()));
                    }

                    let mut children = Vec::new();
                    for (_, raw) in field_entries(object) {
                        self.child_objects(raw, &mut children)?;
                    }
                    stack.push(BuildStep::Finish((object, id)));
                    stack.extend(children.into_iter().rev().map(BuildStep::Enter));
                }
                BuildStep::Finish((object, id)) => self.finish(object, id)?,
            }
        }

        self.built
            .get(&root_key)
            .cloned()
            .ok_or_else(|| CodecError::Malformed(format!("object {} was not built", root)))
    }

    fn lookup(&self, id: &ObjectId) -> Result<Pending<'a>, CodecError> {
        let objects: &'a ObjectTable = self.objects;
        let object = objects
            .get(id)
            .ok_or_else(|| CodecError::MissingObject(id.clone()))?
            .as_object()
            .ok_or_else(|| CodecError::Malformed(format!("object {} is not a JSON object", id)))?;
        Ok((object, resolve_id(object, Some(id))?))
    }

    /// Collect the node objects held directly by a field value.
    fn child_objects(&self, raw: &'a Json, out: &mut Vec<Pending<'a>>) -> Result<(), CodecError> {
        match raw {
            Json::Object(map) => {
                if let Some(reference) = reference_of(map)? {
                    out.push(self.lookup(&reference)?);
                } else if map.contains_key("speckle_type") {
                    out.push((map, resolve_id(map, None)?));
                } else {
                    for value in map.values() {
                        self.child_objects(value, out)?;
                    }
                }
            }
            Json::Array(items) => {
                for item in items {
                    self.child_objects(item, out)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(&mut self, object: &'a JsonObject, id: Option<ObjectId>) -> Result<(), CodecError> {
        let mut node = Node::new(type_tag_of(object));
        if let Some(id) = &id {
            node = node.with_id(id.clone());
        }
        for (key, raw) in field_entries(object) {
            let value = self.decode(raw)?;
            node.set(key, value);
        }

        let key = NodeKey::of(object, &id);
        self.path.remove(&key);
        self.built.insert(key, node_ref(node));
        Ok(())
    }

    /// Decode a field value. Every node it holds must already be built.
    fn decode(&self, raw: &'a Json) -> Result<Value, CodecError> {
        Ok(match raw {
            Json::Object(map) => {
                if let Some(reference) = reference_of(map)? {
                    let (object, id) = self.lookup(&reference)?;
                    Value::Node(self.built_node(object, &id)?)
                } else if map.contains_key("speckle_type") {
                    let id = resolve_id(map, None)?;
                    Value::Node(self.built_node(map, &id)?)
                } else {
                    let mut out = BTreeMap::new();
                    for (k, v) in map {
                        out.insert(k.clone(), self.decode(v)?);
                    }
                    Value::Map(out)
                }
            }
            Json::Array(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.decode(item))
                    .collect::<Result<_, _>>()?,
            ),
            scalar => Value::from(scalar.clone()),
        })
    }

    fn built_node(&self, object: &JsonObject, id: &Option<ObjectId>) -> Result<NodeRef, CodecError> {
        self.built
            .get(&NodeKey::of(object, id))
            .cloned()
            .ok_or_else(|| {
                CodecError::Malformed(format!(
                    "{} node decoded before it was built",
                    type_tag_of(object)
                ))
            })
    }
}


/// Parse a download body of `id<TAB>json` lines into an object table.
///
/// Lines without a tab are parsed as bare JSON objects carrying their own
/// `id`. Blank lines are ignored.
pub fn parse_object_lines(body: &str) -> Result<ObjectTable, CodecError> {
    let mut table = ObjectTable::new();
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (id, json) = match line.split_once('\t') {
            Some((id, raw)) => (id.to_string(), serde_json::from_str::<Json>(raw)?),
            None => {
                let json: Json = serde_json::from_str(line)?;
                let id = json
                    .get("id")
                    .and_then(Json::as_str)
                    .ok_or_else(|| CodecError::Malformed("object line without id".into()))?
                    .to_string();
                (id, json)
            }
        };
        let id = ObjectId::new(id).map_err(|e| CodecError::Malformed(e.to_string()))?;
        table.insert(id, json);
    }
    Ok(table)
}

/// Build an object table from an encoded graph.
pub fn table_from_encoded(graph: &EncodedGraph) -> Result<ObjectTable, CodecError> {
    graph
        .objects
        .iter()
        .map(|o| -> Result<(ObjectId, Json), CodecError> {
            Ok((o.id.clone(), serde_json::from_str(&o.json)?))
        })
        .collect()
}
