//! engine::ledger
//!
//! Change ledger for one traversal.
//!
//! # Architecture
//!
//! The ledger holds two ordered sequences:
//!
//! - `mutated_ids`: nodes whose target field was rewritten
//! - `visited_ids`: nodes visited whose id differs from the caller's
//!   root token
//!
//! A fresh ledger is created per traversal and handed back to the caller
//! with the walk outcome. It is append-only while the walk runs and
//! read-only afterwards: recording methods are crate-private.
//!
//! Entries are `Option<ObjectId>` because nodes without an id are still
//! recorded. There is no deduplication; a node without an id reached along
//! two paths appears twice.

use serde::Serialize;

use crate::core::types::ObjectId;

/// Per-traversal record of mutated and visited nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeLedger {
    mutated_ids: Vec<Option<ObjectId>>,
    visited_ids: Vec<Option<ObjectId>>,
}

impl ChangeLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_mutation(&mut self, id: Option<ObjectId>) {
        self.mutated_ids.push(id);
    }

    pub(crate) fn record_visit(&mut self, id: Option<ObjectId>) {
        self.visited_ids.push(id);
    }

    /// Ids of rewritten nodes, in traversal order.
    pub fn mutated_ids(&self) -> &[Option<ObjectId>] {
        &self.mutated_ids
    }

    /// Ids of visited nodes not matching the root token, in traversal order.
    pub fn visited_ids(&self) -> &[Option<ObjectId>] {
        &self.visited_ids
    }

    /// Whether the given id was rewritten.
    pub fn was_mutated(&self, id: &ObjectId) -> bool {
        self.mutated_ids.iter().flatten().any(|m| m == id)
    }

    pub fn mutation_count(&self) -> usize {
        self.mutated_ids.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.mutated_ids.is_empty() && self.visited_ids.is_empty()
    }
}

/// Render a ledger entry for display.
pub fn display_entry(entry: &Option<ObjectId>) -> String {
    match entry {
        Some(id) => id.to_string(),
        None => "<no id>".to_string(),
    }
}
