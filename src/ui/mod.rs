//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All console output goes through this module so quiet and debug modes
//! behave the same everywhere, including inside the traversal engine.

pub mod output;
