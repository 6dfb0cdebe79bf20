//! engine::walk
//!
//! Depth-bounded, cycle-safe traversal of an object graph.
//!
//! # Algorithm
//!
//! Depth-first, pre-order. At each value:
//!
//! 1. Beyond `max_depth`: stop, no change.
//! 2. Not a node: stop, no change.
//! 3. Node id already visited: stop, no change.
//! 4. Record the id as visited *before* descending, so a node can never
//!    re-enter its own subtree.
//! 5. Apply the [`MutationPolicy`].
//! 6. For each member: recurse into nodes, and into the node elements of
//!    sequences, at `depth + 1`. Non-node elements are skipped. A member
//!    that fails to load is logged and recorded; its siblings still run.
//! 7. Report whether anything in the subtree changed.
//!
//! Nodes without an id are never deduplicated and are revisited each time
//! they are reached; `max_depth` still bounds them.
//!
//! # Invariants
//!
//! - The visited set and ledger live for exactly one [`walk`] call.
//! - Recursion depth never exceeds `max_depth + 1` frames.
//! - No failure inside the graph escapes the walk.
//!
//! # Example
//!
//! ```
//! use graftwork::core::object::{GraphNode, Node, Value};
//! use graftwork::core::types::ObjectId;
//! use graftwork::engine::policy::MutationPolicy;
//! use graftwork::engine::walk::{walk, WalkOptions};
//!
//! let child = Node::new("Base")
//!     .with_id(ObjectId::new("child").unwrap())
//!     .with_field("w", "5");
//! let root = Value::from(
//!     Node::new("Base")
//!         .with_id(ObjectId::new("root").unwrap())
//!         .with_field("elements", vec![Value::from(child), Value::from("scalar")]),
//! );
//!
//! let policy = MutationPolicy::new("w", Value::from("200")).unwrap();
//! let outcome = walk(&root, &policy, &WalkOptions::default());
//!
//! assert!(outcome.changed);
//! assert_eq!(outcome.ledger.mutation_count(), 1);
//! ```

use std::collections::HashSet;

use serde::Serialize;

use super::ledger::ChangeLedger;
use super::policy::{MutationPolicy, PolicyOutcome};
use crate::core::object::{MemberError, NodeRef, Value};
use crate::core::types::ObjectId;
use crate::ui::output::{self, Verbosity};

/// Default depth ceiling.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Largest depth ceiling accepted from configuration or flags.
pub const MAX_DEPTH_LIMIT: usize = 1024;

/// Traversal settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    /// Deepest level visited; the root is depth 0.
    pub max_depth: usize,
    /// Verbosity for traversal diagnostics.
    pub verbosity: Verbosity,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            verbosity: Verbosity::Quiet,
        }
    }
}

impl WalkOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }
}

/// A member that could not be loaded during the walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberFailure {
    /// Id of the node owning the member.
    pub node: Option<ObjectId>,
    /// Member name.
    pub member: String,
    /// Depth of the owning node.
    pub depth: usize,
    /// Error description.
    pub error: String,
}

/// Result of one traversal.
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    /// Whether any node in the graph was rewritten.
    pub changed: bool,
    /// Mutated and visited ids.
    pub ledger: ChangeLedger,
    /// Members skipped because they failed to load.
    pub failures: Vec<MemberFailure>,
    /// Number of nodes processed (revisits of id-less nodes included).
    pub nodes_processed: usize,
}

/// Walk the graph rooted at `root`, applying `policy` at every node.
///
/// The graph is mutated in place. A fresh visited set and ledger are
/// created for this call.
pub fn walk(root: &Value, policy: &MutationPolicy, options: &WalkOptions) -> WalkOutcome {
    let mut walker = Walker {
        policy,
        options,
        visited: HashSet::new(),
        ledger: ChangeLedger::new(),
        failures: Vec::new(),
        nodes_processed: 0,
    };

    let changed = walker.visit(root, 0);

    WalkOutcome {
        changed,
        ledger: walker.ledger,
        failures: walker.failures,
        nodes_processed: walker.nodes_processed,
    }
}

/// Per-call traversal state.
struct Walker<'a> {
    policy: &'a MutationPolicy,
    options: &'a WalkOptions,
    visited: HashSet<ObjectId>,
    ledger: ChangeLedger,
    failures: Vec<MemberFailure>,
    nodes_processed: usize,
}

impl Walker<'_> {
    fn visit(&mut self, value: &Value, depth: usize) -> bool {
        if depth > self.options.max_depth {
            self.debug(depth, "max depth reached");
            return false;
        }

        match value {
            Value::Node(node) => self.visit_node(node, depth),
            _ => false,
        }
    }

    fn visit_node(&mut self, node: &NodeRef, depth: usize) -> bool {
        let (id, type_tag) = match node.try_borrow() {
            Ok(n) => (n.id().cloned(), n.type_tag().to_string()),
            Err(e) => {
                self.fail(None, "<node>", depth, MemberError::Busy(e.to_string()));
                return false;
            }
        };

        if let Some(id) = &id {
            // insert() both tests and marks, before any descent
            if !self.visited.insert(id.clone()) {
                self.debug(depth, &format!("already processed: {}", id));
                return false;
            }
        }

        self.nodes_processed += 1;
        self.debug(
            depth,
            &format!(
                "processing {} ({})",
                id.as_ref().map(|i| i.as_str()).unwrap_or("<no id>"),
                type_tag
            ),
        );

        let mut changed = match node.try_borrow_mut() {
            Ok(mut n) => match self.policy.apply(&mut *n, &mut self.ledger) {
                PolicyOutcome::Rewritten { previous } => {
                    self.debug(
                        depth,
                        &format!(
                            "updated {}: '{}' -> '{}'",
                            self.policy.field(),
                            previous,
                            self.policy.replacement()
                        ),
                    );
                    true
                }
                PolicyOutcome::Untouched => false,
            },
            Err(e) => {
                self.fail(id.clone(), "<node>", depth, MemberError::Busy(e.to_string()));
                false
            }
        };

        let names = match node.try_borrow() {
            Ok(n) => n.member_names(),
            Err(e) => {
                self.fail(id.clone(), "<members>", depth, MemberError::Busy(e.to_string()));
                return changed;
            }
        };

        for name in names {
            // The borrow is released before recursing: children may be this
            // very node.
            let member = match node.try_borrow() {
                Ok(n) => n.member(&name),
                Err(e) => Err(MemberError::Busy(e.to_string())),
            };

            match member {
                Ok(child @ Value::Node(_)) => {
                    self.debug(depth, &format!("entering member: {}", name));
                    changed |= self.visit(&child, depth + 1);
                }
                Ok(Value::List(items)) => {
                    self.debug(depth, &format!("list {} ({} items)", name, items.len()));
                    for item in items.iter().filter(|item| item.is_node()) {
                        changed |= self.visit(item, depth + 1);
                    }
                }
                Ok(_) => {}
                Err(error) => self.fail(id.clone(), &name, depth, error),
            }
        }

        changed
    }

    fn fail(&mut self, node: Option<ObjectId>, member: &str, depth: usize, error: MemberError) {
        output::warn(
            format!("{}error processing member {}: {}", indent(depth), member, error),
            self.options.verbosity,
        );
        self.failures.push(MemberFailure {
            node,
            member: member.to_string(),
            depth,
            error: error.to_string(),
        });
    }

    fn debug(&self, depth: usize, message: &str) {
        output::debug(
            format_args!("{}{}", indent(depth), message),
            self.options.verbosity,
        );
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::object::{node_ref, GraphNode, Node};

    fn oid(s: &str) -> ObjectId {
        ObjectId::new(s).unwrap()
    }

    fn policy() -> MutationPolicy {
        MutationPolicy::new("w", Value::from("200")).unwrap()
    }

    fn field(node: &NodeRef, name: &str) -> Option<Value> {
        node.borrow().get(name)
    }

    /// A node whose named member always fails to load.
    #[derive(Debug)]
    struct Faulty {
        id: ObjectId,
        inner: Node,
        broken: &'static str,
    }

    impl GraphNode for Faulty {
        fn id(&self) -> Option<&ObjectId> {
            Some(&self.id)
        }
        fn type_tag(&self) -> &str {
            "Faulty"
        }
        fn get(&self, field: &str) -> Option<Value> {
            self.inner.get(field)
        }
        fn set(&mut self, field: &str, value: Value) {
            self.inner.set(field, value)
        }
        fn member_names(&self) -> Vec<String> {
            let mut names = self.inner.member_names();
            names.insert(0, self.broken.to_string());
            names
        }
        fn member(&self, name: &str) -> Result<Value, MemberError> {
            if name == self.broken {
                return Err(MemberError::Unreadable {
                    name: name.to_string(),
                    reason: "detached reference unavailable".into(),
                });
            }
            self.inner.member(name)
        }
    }

    #[test]
    fn scalar_root_is_no_change() {
        let outcome = walk(&Value::from("x"), &policy(), &WalkOptions::default());
        assert!(!outcome.changed);
        assert!(outcome.ledger.is_empty());
        assert_eq!(outcome.nodes_processed, 0);
    }

    #[test]
    fn shared_node_visited_once() {
        let x = node_ref(Node::new("Base").with_id(oid("x")).with_field("h", "1"));
        let y = node_ref(Node::new("Base").with_id(oid("y")).with_field("w", "5"));
        let root = Value::from(
            Node::new("Base")
                .with_id(oid("root"))
                .with_field("a", Value::Node(x.clone()))
                .with_field(
                    "b",
                    vec![
                        Value::Node(y.clone()),
                        Value::from("scalar"),
                        Value::Node(x.clone()),
                    ],
                ),
        );

        let outcome = walk(&root, &policy(), &WalkOptions::default());

        assert!(outcome.changed);
        assert_eq!(outcome.nodes_processed, 3);
        assert_eq!(outcome.ledger.mutated_ids(), &[Some(oid("y"))]);
        assert_eq!(field(&x, "w"), None);
        assert_eq!(field(&y, "w"), Some(Value::from("200")));
    }

    #[test]
    fn self_reference_terminates() {
        let a = node_ref(Node::new("Base").with_id(oid("a")).with_field("w", "1"));
        a.borrow_mut().set("me", Value::Node(a.clone()));
        a.borrow_mut()
            .set("many", Value::List(vec![Value::Node(a.clone()); 3]));

        let outcome = walk(&Value::Node(a.clone()), &policy(), &WalkOptions::default());

        assert_eq!(outcome.nodes_processed, 1);
        assert_eq!(outcome.ledger.mutated_ids(), &[Some(oid("a"))]);
    }

    #[test]
    fn id_less_cycle_bounded_by_depth() {
        let a = node_ref(Node::new("Base").with_field("w", "1"));
        a.borrow_mut().set("me", Value::Node(a.clone()));

        let options = WalkOptions::default().with_max_depth(4);
        let outcome = walk(&Value::Node(a), &policy(), &options);

        // depths 0..=4
        assert_eq!(outcome.nodes_processed, 5);
        assert_eq!(outcome.ledger.mutated_ids(), &[None, None, None, None, None]);
    }

    #[test]
    fn depth_zero_mutates_root_only() {
        let child = node_ref(Node::new("Base").with_id(oid("c")).with_field("w", "1"));
        let root = node_ref(
            Node::new("Base")
                .with_id(oid("r"))
                .with_field("w", "1")
                .with_field("child", Value::Node(child.clone())),
        );

        let options = WalkOptions::default().with_max_depth(0);
        let outcome = walk(&Value::Node(root.clone()), &policy(), &options);

        assert!(outcome.changed);
        assert_eq!(field(&root, "w"), Some(Value::from("200")));
        assert_eq!(field(&child, "w"), Some(Value::from("1")));
        assert_eq!(outcome.ledger.mutated_ids(), &[Some(oid("r"))]);
    }

    #[test]
    fn failing_member_does_not_abort_siblings() {
        let sibling = node_ref(Node::new("Base").with_id(oid("s")).with_field("w", "1"));
        let faulty = Faulty {
            id: oid("f"),
            inner: Node::new("Base").with_field("next", Value::Node(sibling.clone())),
            broken: "@displayValue",
        };

        let outcome = walk(
            &Value::Node(node_ref(faulty)),
            &policy(),
            &WalkOptions::default(),
        );

        assert!(outcome.changed);
        assert_eq!(field(&sibling, "w"), Some(Value::from("200")));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].member, "@displayValue");
        assert_eq!(outcome.failures[0].node, Some(oid("f")));
    }

    #[test]
    fn untouched_graph_reports_no_change() {
        let root = Value::from(
            Node::new("Base")
                .with_id(oid("r"))
                .with_field("child", Node::new("Base").with_id(oid("c"))),
        );

        let outcome = walk(&root, &policy(), &WalkOptions::default());

        assert!(!outcome.changed);
        assert!(outcome.ledger.mutated_ids().is_empty());
        assert_eq!(outcome.ledger.visited_ids().len(), 2);
    }

    #[test]
    fn maps_are_not_descended() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("w".to_string(), Value::from("5"));
        let root = Value::from(Node::new("Base").with_field("props", Value::Map(map)));

        let outcome = walk(&root, &policy(), &WalkOptions::default());

        assert!(!outcome.changed);
        assert_eq!(outcome.nodes_processed, 1);
    }

    #[test]
    fn nested_lists_are_not_flattened() {
        let inner = node_ref(Node::new("Base").with_id(oid("i")).with_field("w", "1"));
        let root = Value::from(Node::new("Base").with_field(
            "rows",
            vec![Value::List(vec![Value::Node(inner.clone())])],
        ));

        let outcome = walk(&root, &policy(), &WalkOptions::default());

        assert!(!outcome.changed);
        assert_eq!(field(&inner, "w"), Some(Value::from("1")));
    }
}
