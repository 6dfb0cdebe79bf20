//! engine::policy
//!
//! Mutation policy applied at every visited node.
//!
//! # Rule
//!
//! If the target field is present on the node, it is rewritten to the
//! replacement value and the node's id is recorded as mutated. The rewrite
//! is unconditional: a field already holding the replacement value is
//! still rewritten and still recorded.
//!
//! Independently, every node whose id differs from the caller-supplied
//! root token is recorded as visited. Without a token, every node is.
//!
//! # Example
//!
//! ```
//! use graftwork::core::object::{GraphNode, Node, Value};
//! use graftwork::engine::ledger::ChangeLedger;
//! use graftwork::engine::policy::MutationPolicy;
//!
//! let policy = MutationPolicy::new("w", Value::from("200")).unwrap();
//! let mut ledger = ChangeLedger::new();
//! let mut node = Node::new("Base").with_field("w", "5");
//!
//! let outcome = policy.apply(&mut node, &mut ledger);
//! assert!(outcome.is_rewritten());
//! assert_eq!(node.get("w"), Some(Value::from("200")));
//! ```

use thiserror::Error;

use super::ledger::ChangeLedger;
use crate::core::object::{GraphNode, Value};

/// Errors constructing a policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("target field name cannot be empty")]
    EmptyField,
}

/// What the policy did to one node.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyOutcome {
    /// The target field was rewritten; carries the previous value.
    Rewritten { previous: Value },
    /// The node has no target field.
    Untouched,
}

impl PolicyOutcome {
    pub fn is_rewritten(&self) -> bool {
        matches!(self, PolicyOutcome::Rewritten { .. })
    }
}

/// Field-rewrite rule: target field, replacement value, root token.
#[derive(Debug, Clone)]
pub struct MutationPolicy {
    field: String,
    replacement: Value,
    root_token: Option<String>,
}

impl MutationPolicy {
    /// Create a policy rewriting `field` to `replacement`.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::EmptyField` if the field name is empty. This is
    /// the only failure that propagates out of a traversal.
    pub fn new(field: impl Into<String>, replacement: Value) -> Result<Self, PolicyError> {
        let field = field.into();
        if field.is_empty() {
            return Err(PolicyError::EmptyField);
        }
        Ok(Self {
            field,
            replacement,
            root_token: None,
        })
    }

    /// Set the token visited ids are classified against.
    pub fn with_root_token(mut self, token: impl Into<String>) -> Self {
        self.root_token = Some(token.into());
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn replacement(&self) -> &Value {
        &self.replacement
    }

    pub fn root_token(&self) -> Option<&str> {
        self.root_token.as_deref()
    }

    /// Apply the rule to one node, recording into `ledger`.
    pub fn apply(&self, node: &mut dyn GraphNode, ledger: &mut ChangeLedger) -> PolicyOutcome {
        let id = node.id().cloned();

        let matches_token = match (self.root_token.as_deref(), id.as_ref()) {
            (Some(token), Some(id)) => token == id.as_str(),
            _ => false,
        };
        if !matches_token {
            ledger.record_visit(id.clone());
        }

        match node.get(&self.field) {
            Some(previous) => {
                node.set(&self.field, self.replacement.clone());
                ledger.record_mutation(id);
                PolicyOutcome::Rewritten { previous }
            }
            None => PolicyOutcome::Untouched,
        }
    }
}
