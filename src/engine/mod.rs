//! engine
//!
//! Traversal, mutation and the rewrite pipeline.
//!
//! # Architecture
//!
//! ```text
//! download -> materialize -> walk (policy + ledger) -> encode -> upload -> version
//! ```
//!
//! - [`walk`] - Depth-bounded, cycle-safe traversal
//! - [`policy`] - The rewrite rule applied at each node
//! - [`ledger`] - Record of mutated and visited nodes
//! - [`runner`] - The end-to-end pipeline against a [`Remote`]
//!
//! # Invariants
//!
//! - One traversal owns its visited set and ledger; nothing is shared
//!   between runs
//! - Failures inside the graph never abort a traversal
//! - Nothing is uploaded in dry-run mode
//!
//! [`Remote`]: crate::remote::Remote

pub mod ledger;
pub mod policy;
pub mod runner;
pub mod walk;

pub use ledger::ChangeLedger;
pub use policy::{MutationPolicy, PolicyError, PolicyOutcome};
pub use runner::{run_rewrite, RewriteReport, RewriteRequest, RunError, SkipReason};
pub use walk::{walk, MemberFailure, WalkOptions, WalkOutcome};

use std::path::PathBuf;

use crate::ui::output::Verbosity;

/// Execution context for commands.
///
/// Contains global settings derived from CLI flags that affect command behavior.
#[derive(Debug, Clone)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
    /// Interactive mode enabled.
    pub interactive: bool,
}

impl Context {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }

    /// The working directory: the override, else the process directory.
    pub fn work_dir(&self) -> std::io::Result<PathBuf> {
        match &self.cwd {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self {
            cwd: None,
            debug: false,
            quiet: false,
            interactive: true,
        }
    }
}
