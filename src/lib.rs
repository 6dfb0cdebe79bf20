//! Graftwork - rewrite a field across a content-addressed object graph
//!
//! Graftwork downloads the object graph behind a Speckle model version,
//! sets one field on every object that carries it, and publishes the
//! rewritten graph as a new version of the same model.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Traversal, mutation policy, change ledger and the rewrite pipeline
//! - [`core`] - Domain types, the object model, URL parsing, codec and config
//! - [`remote`] - Abstraction over the object server (Speckle, plus an in-memory mock)
//! - [`secrets`] - Token storage and resolution
//! - [`ui`] - Output formatting
//!
//! # Invariants
//!
//! 1. Every object reachable within the depth limit is processed at most once
//! 2. Traversal never holds a borrow across a recursive step
//! 3. Object ids are always recomputed from content on upload
//! 4. Tokens are never printed

pub mod cli;
pub mod core;
pub mod engine;
pub mod remote;
pub mod secrets;
pub mod ui;
