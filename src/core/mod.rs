//! core
//!
//! Core domain types, the object model and wire formats for Graft.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ObjectId, ProjectId, ModelName, VersionId
//! - [`object`] - Graph nodes, member values and shared node handles
//! - [`codec`] - Detached JSON encoding and materialization of object graphs
//! - [`url`] - Model URL parsing and server address handling
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Object ids are derived from content and deterministic

pub mod codec;
pub mod config;
pub mod object;
pub mod types;
pub mod url;
